// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire protocol for talking to the air conditioner.
//!
//! The unit speaks a positional, comma-separated format called the HMI
//! string. The [`hmi`] codec converts between it and a
//! [`DeviceStatus`](crate::state::DeviceStatus); a [`Transport`] carries it
//! to the device.
//!
//! # Transports
//!
//! - [`HttpClient`]: direct `GET /?HMI=...&UPD=n` requests to the unit
//!   (feature `http`)

pub mod hmi;
#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::{HttpClient, HttpConfig};

use std::future::Future;

use crate::error::ProtocolError;

/// One exchange with the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HmiRequest {
    /// Ask for the current 39-field status.
    Poll,
    /// Submit a 36-field command string.
    Command(String),
}

impl HmiRequest {
    /// Returns the query string carrying this request.
    ///
    /// # Examples
    ///
    /// ```
    /// use clima_link::protocol::HmiRequest;
    ///
    /// assert_eq!(HmiRequest::Poll.query(), "HMI=&UPD=0");
    /// assert_eq!(HmiRequest::Command("N,N".into()).query(), "HMI=N,N&UPD=1");
    /// ```
    #[must_use]
    pub fn query(&self) -> String {
        match self {
            Self::Poll => "HMI=&UPD=0".to_string(),
            Self::Command(hmi) => format!("HMI={hmi}&UPD=1"),
        }
    }
}

/// Synchronous request/response capability towards the device.
///
/// Implementations must bound every exchange with a timeout and report it
/// as a transport error.
pub trait Transport: Send + Sync + 'static {
    /// Performs one exchange and returns the response body.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] on timeouts, connection failures and
    /// non-success responses.
    fn exchange(
        &self,
        request: &HmiRequest,
    ) -> impl Future<Output = Result<String, ProtocolError>> + Send;
}
