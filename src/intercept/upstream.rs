// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Forwarding of intercepted requests to the vendor cloud.

use std::time::Duration;

use reqwest::{Client, Method};

use crate::error::ProtocolError;

use super::message::InboundRequest;
use super::proxy::ProxyResponse;
use super::Upstream;

/// Headers that describe one hop and are never forwarded.
const HOP_BY_HOP: [&str; 10] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// reqwest-backed upstream.
///
/// Forwards method, path, query, end-to-end headers and body verbatim.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl HttpUpstream {
    /// Creates an upstream for `base_url` (scheme and host, optional port).
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProtocolError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(ProtocolError::Http)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout,
        })
    }

    /// Returns the base URL requests are forwarded to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_url(&self, request: &InboundRequest) -> String {
        format!("{}{}", self.base_url, request.path_and_query())
    }

    fn map_error(&self, err: reqwest::Error) -> ProtocolError {
        if err.is_timeout() {
            #[allow(clippy::cast_possible_truncation)]
            let millis = self.timeout.as_millis() as u64;
            ProtocolError::Timeout(millis)
        } else if err.is_connect() {
            ProtocolError::ConnectionFailed(err.to_string())
        } else {
            ProtocolError::Http(err)
        }
    }
}

impl Upstream for HttpUpstream {
    async fn forward(&self, request: &InboundRequest) -> Result<ProxyResponse, ProtocolError> {
        let url = self.build_url(request);
        let method = Method::from_bytes(request.method().as_bytes())
            .map_err(|e| ProtocolError::InvalidRequest(e.to_string()))?;

        tracing::debug!(method = %method, url = %url, "Forwarding to upstream");

        let mut builder = self.client.request(method, &url);
        for (name, value) in request.headers() {
            if !is_hop_by_hop(name) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if !request.body().is_empty() {
            builder = builder.body(request.body().to_vec());
        }

        let response = builder.send().await.map_err(|e| self.map_error(e))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(|e| self.map_error(e))?;

        tracing::debug!(status, bytes = body.len(), "Upstream replied");

        Ok(ProxyResponse::new(status, headers, body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_url_keeps_path_and_query() {
        let upstream =
            HttpUpstream::new("http://cloud.example.com/", Duration::from_secs(5)).unwrap();
        let request = InboundRequest::new("GET", "/UI/UI.php").with_query("CM=UI_NTP");
        assert_eq!(
            upstream.build_url(&request),
            "http://cloud.example.com/UI/UI.php?CM=UI_NTP"
        );
    }

    #[test]
    fn hop_by_hop_headers() {
        assert!(is_hop_by_hop("Connection"));
        assert!(is_hop_by_hop("HOST"));
        assert!(!is_hop_by_hop("user-agent"));
    }
}
