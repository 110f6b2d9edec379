// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! axum listener in front of the interception proxy.
//!
//! Every method and path is routed to [`InterceptionProxy::handle`]; the
//! unit decides what it asks for, not the router.

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{Error, ProtocolError};

use super::message::InboundRequest;
use super::proxy::{InterceptionProxy, ProxyResponse};
use super::Upstream;

/// Builds the router serving `proxy`.
pub fn router<U: Upstream>(proxy: Arc<InterceptionProxy<U>>) -> Router {
    Router::new().fallback(handle::<U>).with_state(proxy)
}

/// Binds the configured address and serves until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns [`ProtocolError::ConnectionFailed`] if the address cannot be
/// bound or the server fails.
pub async fn serve<U: Upstream>(
    proxy: Arc<InterceptionProxy<U>>,
    shutdown: CancellationToken,
) -> Result<(), Error> {
    let address = proxy.config().socket_addr();
    let listener = TcpListener::bind(address)
        .await
        .map_err(|e| ProtocolError::ConnectionFailed(format!("cannot bind {address}: {e}")))?;
    serve_listener(listener, proxy, shutdown).await
}

/// Serves `proxy` on an already bound listener until `shutdown` is
/// cancelled.
///
/// # Errors
///
/// Returns [`ProtocolError::ConnectionFailed`] if the server fails.
pub async fn serve_listener<U: Upstream>(
    listener: TcpListener,
    proxy: Arc<InterceptionProxy<U>>,
    shutdown: CancellationToken,
) -> Result<(), Error> {
    if let Ok(address) = listener.local_addr() {
        info!(address = %address, upstream = proxy.has_upstream(), "Interception proxy listening");
    }
    axum::serve(listener, router(proxy))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| ProtocolError::ConnectionFailed(format!("proxy server error: {e}")))?;
    info!("Interception proxy stopped");
    Ok(())
}

async fn handle<U: Upstream>(
    State(proxy): State<Arc<InterceptionProxy<U>>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut request = InboundRequest::new(method.as_str(), uri.path()).with_body(body.to_vec());
    if let Some(query) = uri.query() {
        request = request.with_query(query);
    }
    for (name, value) in &headers {
        if let Ok(value) = value.to_str() {
            request = request.with_header(name.as_str(), value);
        }
    }

    into_response(proxy.handle(request).await)
}

fn into_response(response: ProxyResponse) -> Response {
    let status = StatusCode::from_u16(response.status()).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut headers = HeaderMap::new();
    for (name, value) in response.headers() {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => warn!(header = %name, "Dropping invalid response header"),
        }
    }
    (status, headers, response.body().to_vec()).into_response()
}
