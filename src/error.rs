// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `clima_link` library.
//!
//! The hierarchy mirrors the failure classes of the protocol engine:
//!
//! - [`ProtocolError`]: wire-level failures (malformed status, a single bad
//!   field, transport timeouts, unparseable upstream replies)
//! - [`ValueError`]: a command input that does not fit the targeted setting
//! - [`ConfigError`]: invalid addresses, ports or durations at startup
//!
//! Element-level decode errors never abort a whole status cycle. They are
//! collected in an [`ApplyReport`](crate::protocol::hmi::ApplyReport) and
//! logged instead.

use thiserror::Error;

use crate::state::SettingKind;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred during protocol communication or decoding.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A command value failed validation.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// The session configuration is invalid.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The device did not confirm the listed settings before the deadline.
    ///
    /// The affected settings have been rolled back to their last confirmed
    /// values.
    #[error("device did not confirm {settings:?} before the deadline")]
    CommandFailed {
        /// Settings whose pending commands were aborted.
        settings: Vec<SettingKind>,
    },

    /// The session was disposed while the command was in flight.
    #[error("session disposed while command was in flight")]
    Cancelled,

    /// The setting cannot be written.
    #[error("setting {0:?} is read-only")]
    ReadOnly(SettingKind),

    /// The command was declined by the setting (e.g. value unchanged).
    #[error("command for {kind:?} rejected: {reason}")]
    CommandRejected {
        /// The targeted setting.
        kind: SettingKind,
        /// Why the command was declined.
        reason: String,
    },
}

/// Errors related to the device wire protocol and its transports.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The status string does not have the expected number of fields.
    #[error("malformed status: expected {expected} fields, got {actual}")]
    MalformedStatus {
        /// Required field count.
        expected: usize,
        /// Field count actually received.
        actual: usize,
    },

    /// A single field could not be decoded for its setting.
    #[error("cannot decode {raw:?} for {kind:?}")]
    ElementDecode {
        /// The setting owning the field.
        kind: SettingKind,
        /// The raw field text.
        raw: String,
    },

    /// HTTP request failed.
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Connection to the device or upstream failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Request timed out.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// The upstream reply does not match the vendor framing.
    #[error("unexpected upstream response: {0}")]
    UpstreamParse(String),

    /// An inbound request could not be understood.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ProtocolError {
    /// Returns `true` for failures of the transport itself (as opposed to
    /// content that failed to decode).
    #[must_use]
    pub fn is_transport(&self) -> bool {
        match self {
            #[cfg(feature = "http")]
            Self::Http(_) => true,
            Self::ConnectionFailed(_) | Self::Timeout(_) => true,
            _ => false,
        }
    }
}

/// Errors raised while type-checking a command input.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValueError {
    /// A numeric value is outside the allowed range.
    #[error("value {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Minimum allowed value.
        min: i64,
        /// Maximum allowed value.
        max: i64,
        /// The value that was provided.
        actual: i64,
    },

    /// The value is not a member of the setting's enumeration.
    #[error("{value:?} is not a valid {domain}")]
    NotAMember {
        /// Name of the enumeration.
        domain: &'static str,
        /// The rejected input.
        value: String,
    },

    /// The value has the wrong shape for the setting.
    #[error("expected {expected}, got {actual}")]
    WrongType {
        /// Description of the accepted shape.
        expected: &'static str,
        /// Description of the provided value.
        actual: String,
    },

    /// A time-of-day string could not be parsed.
    #[error("invalid time of day: {0}")]
    InvalidTime(String),
}

/// Errors in session or proxy configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The address is empty or cannot be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The port is not usable.
    #[error("invalid port: {0}")]
    InvalidPort(u16),

    /// A duration is zero or otherwise unusable.
    #[error("invalid duration for {0}")]
    InvalidDuration(&'static str),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
