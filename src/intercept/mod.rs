// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interception proxy for the vendor cloud protocol.
//!
//! Units that cannot be reached on the local network still talk to the
//! vendor cloud. With the vendor host name redirected to this proxy, every
//! request of the unit passes through [`InterceptionProxy::handle`]:
//!
//! 1. status pushes (`CM=UI_FLG`) are decoded and fed into a
//!    [`StatusSink`], normally a push-only [`Device`](crate::Device)
//! 2. the request is forwarded to the real cloud if an [`Upstream`] is
//!    configured, or answered locally otherwise
//! 3. the reply to a status push receives the locally pending commands,
//!    unless the cloud issued an update of its own
//!
//! Replies that do not match the vendor framing are passed through
//! unmodified.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use clima_link::Device;
//! use clima_link::intercept::{InterceptionProxy, ProxyConfig, server};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> clima_link::Result<()> {
//! let device = Device::push_only().build()?;
//! let proxy = InterceptionProxy::from_config(ProxyConfig::new(8080), Arc::new(device.clone()))?;
//!
//! server::serve(Arc::new(proxy), CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod flag;
mod message;
mod proxy;
mod setup;
#[cfg(feature = "server")]
pub mod server;
#[cfg(feature = "http")]
mod upstream;

pub use config::ProxyConfig;
pub use flag::{FlagResponse, TRAILER};
pub use message::{InboundRequest, InterceptedMessage, RequestKind, VENDOR_PATH, param, parse_form};
pub use proxy::{InterceptionProxy, ProxyResponse, time_sync_reply};
pub use setup::SetupRecord;
#[cfg(feature = "http")]
pub use upstream::HttpUpstream;

use std::future::Future;

use crate::device::Device;
use crate::error::ProtocolError;
use crate::protocol::Transport;

/// Receiver of intercepted status and source of commands to inject.
pub trait StatusSink: Send + Sync {
    /// Applies a 39-field status string pushed by the unit.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedStatus`] if the string has the
    /// wrong field count.
    fn ingest_status(&self, hmi: &str) -> Result<(), ProtocolError>;

    /// Returns the 36-field command string to inject, marking the commands
    /// as sent, or `None` if nothing is pending.
    fn take_pending_command(&self) -> Option<String>;
}

impl<T: Transport> StatusSink for Device<T> {
    fn ingest_status(&self, hmi: &str) -> Result<(), ProtocolError> {
        self.ingest(hmi).map(|_| ())
    }

    fn take_pending_command(&self) -> Option<String> {
        Device::take_pending_command(self)
    }
}

/// Where intercepted requests are forwarded.
pub trait Upstream: Send + Sync + 'static {
    /// Forwards `request` and returns the upstream reply.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] on timeouts and connection failures.
    fn forward(
        &self,
        request: &InboundRequest,
    ) -> impl Future<Output = Result<ProxyResponse, ProtocolError>> + Send;
}

/// Upstream placeholder for a proxy that answers everything itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoUpstream;

impl Upstream for NoUpstream {
    async fn forward(&self, _request: &InboundRequest) -> Result<ProxyResponse, ProtocolError> {
        Err(ProtocolError::ConnectionFailed(
            "no upstream configured".to_string(),
        ))
    }
}
