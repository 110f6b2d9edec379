// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interception proxy configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::error::ConfigError;

/// Configuration of the interception proxy.
///
/// # Examples
///
/// ```
/// use clima_link::intercept::ProxyConfig;
///
/// let config = ProxyConfig::new(8080)
///     .with_upstream("http://cloud.example.com")
///     .with_device_id("A1B2C3");
/// assert!(config.validate().is_ok());
/// assert_eq!(config.socket_addr().port(), 8080);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    listen_address: IpAddr,
    listen_port: u16,
    upstream: Option<String>,
    upstream_timeout: Duration,
    device_id: Option<String>,
    credentials: Option<(String, String)>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PORT)
    }
}

impl ProxyConfig {
    /// Port the unit talks to when the vendor host name is redirected.
    pub const DEFAULT_PORT: u16 = 80;
    /// Default timeout for forwarded requests.
    pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a stand-in configuration listening on all interfaces.
    #[must_use]
    pub fn new(listen_port: u16) -> Self {
        Self {
            listen_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            listen_port,
            upstream: None,
            upstream_timeout: Self::DEFAULT_UPSTREAM_TIMEOUT,
            device_id: None,
            credentials: None,
        }
    }

    /// Sets the listen address.
    #[must_use]
    pub fn with_listen_address(mut self, address: IpAddr) -> Self {
        self.listen_address = address;
        self
    }

    /// Forwards requests to `url` instead of answering them locally.
    #[must_use]
    pub fn with_upstream(mut self, url: impl Into<String>) -> Self {
        self.upstream = Some(url.into());
        self
    }

    /// Sets the timeout for forwarded requests.
    #[must_use]
    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    /// Only ingests pushes from the unit with this id.
    #[must_use]
    pub fn with_device_id(mut self, id: impl Into<String>) -> Self {
        self.device_id = Some(id.into());
        self
    }

    /// Only ingests pushes authenticated with these cloud credentials.
    #[must_use]
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((user.into(), password.into()));
        self
    }

    /// Address the listener binds.
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_address, self.listen_port)
    }

    /// Upstream base URL, if any.
    #[must_use]
    pub fn upstream(&self) -> Option<&str> {
        self.upstream.as_deref()
    }

    /// Timeout for forwarded requests.
    #[must_use]
    pub fn upstream_timeout(&self) -> Duration {
        self.upstream_timeout
    }

    /// Device id filter.
    #[must_use]
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Expected cloud user.
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.credentials.as_ref().map(|(user, _)| user.as_str())
    }

    /// Lowercase MD5 hex of the expected cloud password.
    #[must_use]
    pub fn password_hash(&self) -> Option<String> {
        self.credentials
            .as_ref()
            .map(|(_, password)| format!("{:x}", md5::compute(password)))
    }

    /// Checks the configuration before the listener starts.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidPort`] if the port is 0
    /// - [`ConfigError::InvalidAddress`] if the upstream is not an
    ///   `http(s)://host` URL
    /// - [`ConfigError::InvalidDuration`] if the upstream timeout is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_port == 0 {
            return Err(ConfigError::InvalidPort(self.listen_port));
        }
        if let Some(url) = &self.upstream {
            let host = url
                .strip_prefix("http://")
                .or_else(|| url.strip_prefix("https://"))
                .map(|rest| rest.split('/').next().unwrap_or_default());
            if host.is_none_or(|h| h.is_empty() || h.contains(char::is_whitespace)) {
                return Err(ConfigError::InvalidAddress(url.clone()));
            }
        }
        if self.upstream_timeout.is_zero() {
            return Err(ConfigError::InvalidDuration("upstream_timeout"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ProxyConfig::default();
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:80");
        assert!(config.upstream().is_none());
        assert_eq!(config.upstream_timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_values() {
        assert_eq!(
            ProxyConfig::new(0).validate(),
            Err(ConfigError::InvalidPort(0))
        );
        assert!(matches!(
            ProxyConfig::new(80).with_upstream("cloud.example.com").validate(),
            Err(ConfigError::InvalidAddress(_))
        ));
        assert!(matches!(
            ProxyConfig::new(80).with_upstream("http:///path").validate(),
            Err(ConfigError::InvalidAddress(_))
        ));
        assert_eq!(
            ProxyConfig::new(80)
                .with_upstream_timeout(Duration::ZERO)
                .validate(),
            Err(ConfigError::InvalidDuration("upstream_timeout"))
        );
    }

    #[test]
    fn password_hash_is_lowercase_md5() {
        let config = ProxyConfig::new(80).with_credentials("alice", "password");
        assert_eq!(config.user(), Some("alice"));
        assert_eq!(
            config.password_hash().as_deref(),
            Some("5f4dcc3b5aa765d61d8327deb882cf99")
        );
    }
}
