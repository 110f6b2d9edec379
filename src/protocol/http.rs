// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP transport towards the air conditioner.

use std::time::Duration;

use reqwest::Client;

use crate::error::{ConfigError, ProtocolError};
use crate::protocol::{HmiRequest, Transport};

// ============================================================================
// HttpConfig - Connection parameters for a directly reachable unit
// ============================================================================

/// Configuration for a unit reachable over the local network.
///
/// HTTP is stateless: every poll and every command is an independent
/// `GET` whose query string is the protocol payload.
///
/// # Examples
///
/// ```
/// use clima_link::protocol::HttpConfig;
/// use std::time::Duration;
///
/// let config = HttpConfig::new("192.168.1.50")
///     .with_port(1001)
///     .with_timeout(Duration::from_secs(3));
/// assert!(config.validate().is_ok());
/// assert_eq!(config.base_url(), "http://192.168.1.50:1001");
/// ```
#[derive(Debug, Clone)]
pub struct HttpConfig {
    host: String,
    port: u16,
    timeout: Duration,
}

impl HttpConfig {
    /// Default port of the unit's embedded web server.
    pub const DEFAULT_PORT: u16 = 1001;
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a configuration for the specified host.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: Self::DEFAULT_PORT,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Sets a custom port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Builds the base URL from this configuration.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Checks the configuration before a session starts.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidAddress`] if the host is empty or contains
    ///   characters that cannot appear in a host name
    /// - [`ConfigError::InvalidPort`] if the port is 0
    /// - [`ConfigError::InvalidDuration`] if the timeout is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        let host = self.host.trim();
        if host.is_empty()
            || host.contains("://")
            || host.chars().any(|c| c.is_whitespace() || c == '/' || c == '?')
        {
            return Err(ConfigError::InvalidAddress(self.host.clone()));
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidDuration("timeout"));
        }
        Ok(())
    }

    /// Creates an `HttpClient` from this configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn into_client(self) -> Result<HttpClient, ProtocolError> {
        let base_url = self.base_url();

        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(ProtocolError::Http)?;

        Ok(HttpClient {
            base_url,
            client,
            timeout: self.timeout,
        })
    }
}

// ============================================================================
// HttpClient - reqwest-backed transport
// ============================================================================

/// HTTP client for a directly reachable unit.
///
/// Polls with `GET /?HMI=&UPD=0` and submits commands with
/// `GET /?HMI=<36 fields>&UPD=1`.
#[derive(Debug, Clone)]
pub struct HttpClient {
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl HttpClient {
    /// Returns the base URL of the device.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds the URL for a request.
    fn build_url(&self, request: &HmiRequest) -> String {
        format!("{}/?{}", self.base_url, request.query())
    }

    fn map_error(&self, err: reqwest::Error) -> ProtocolError {
        if err.is_timeout() {
            // Timeouts are configured in whole milliseconds at most
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

impl Transport for HttpClient {
    async fn exchange(&self, request: &HmiRequest) -> Result<String, ProtocolError> {
        let url = self.build_url(request);

        tracing::debug!(url = %url, "Sending HMI request");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        if !response.status().is_success() {
            return Err(ProtocolError::ConnectionFailed(format!(
                "HTTP {} - {}",
                response.status().as_u16(),
                response.status().canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body = response.text().await.map_err(|e| self.map_error(e))?;

        tracing::debug!(body = %body, "Received HMI response");

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_url_for_poll() {
        let client = HttpConfig::new("192.168.1.50").into_client().unwrap();
        assert_eq!(
            client.build_url(&HmiRequest::Poll),
            "http://192.168.1.50:1001/?HMI=&UPD=0"
        );
    }

    #[test]
    fn build_url_for_command() {
        let client = HttpConfig::new("10.0.0.2")
            .with_port(8080)
            .into_client()
            .unwrap();
        assert_eq!(
            client.build_url(&HmiRequest::Command("237,N".into())),
            "http://10.0.0.2:8080/?HMI=237,N&UPD=1"
        );
    }

    #[test]
    fn http_config_default_values() {
        let config = HttpConfig::new("192.168.1.50");
        assert_eq!(config.host(), "192.168.1.50");
        assert_eq!(config.port(), 1001);
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn validate_rejects_bad_host() {
        for host in ["", "  ", "http://x", "a b", "host/path"] {
            assert!(
                matches!(
                    HttpConfig::new(host).validate(),
                    Err(ConfigError::InvalidAddress(_))
                ),
                "{host:?}"
            );
        }
    }

    #[test]
    fn validate_rejects_port_zero_and_zero_timeout() {
        assert_eq!(
            HttpConfig::new("ac.local").with_port(0).validate(),
            Err(ConfigError::InvalidPort(0))
        );
        assert_eq!(
            HttpConfig::new("ac.local")
                .with_timeout(Duration::ZERO)
                .validate(),
            Err(ConfigError::InvalidDuration("timeout"))
        );
    }
}
