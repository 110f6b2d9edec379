// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-exchange interception logic.

use std::borrow::Cow;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::error::ConfigError;

use super::flag::{FlagResponse, TRAILER};
use super::message::{InboundRequest, InterceptedMessage, RequestKind};
use super::{NoUpstream, ProxyConfig, StatusSink, Upstream};

/// Reply sent back to the unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl ProxyResponse {
    /// Creates a response with the given status, headers and body.
    #[must_use]
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Creates a `200 OK` HTML reply, the way the vendor cloud answers.
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self::new(
            200,
            vec![("content-type".to_string(), "text/html".to_string())],
            body.into(),
        )
    }

    /// HTTP status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Headers to send.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Raw body.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body as text, lossily decoded.
    #[must_use]
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Replaces the body, dropping a stale `content-length`.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self.headers
            .retain(|(name, _)| !name.eq_ignore_ascii_case("content-length"));
        self
    }
}

/// Time-sync reply in the vendor's text format.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use clima_link::intercept::time_sync_reply;
///
/// let now = Utc.with_ymd_and_hms(2024, 3, 15, 18, 45, 10).unwrap();
/// assert_eq!(
///     time_sync_reply(now),
///     "NTP 2024-03-15T18:45:10+00:00 UI SERVER (M.A.V. srl)"
/// );
/// ```
#[must_use]
pub fn time_sync_reply(now: DateTime<Utc>) -> String {
    format!(
        "NTP {} UI SERVER (M.A.V. srl)",
        now.format("%Y-%m-%dT%H:%M:%S+00:00")
    )
}

/// Stateful relay between the unit and the vendor cloud.
///
/// Holds no per-connection state; every call to [`handle`](Self::handle)
/// is independent and may run concurrently with others.
pub struct InterceptionProxy<U: Upstream = NoUpstream> {
    config: ProxyConfig,
    sink: Arc<dyn StatusSink>,
    upstream: Option<U>,
    password_hash: Option<String>,
}

impl InterceptionProxy<NoUpstream> {
    /// Creates a proxy that answers every request itself.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid.
    pub fn stand_in(config: ProxyConfig, sink: Arc<dyn StatusSink>) -> Result<Self, ConfigError> {
        Self::new(config, sink, None)
    }
}

#[cfg(feature = "http")]
impl InterceptionProxy<super::HttpUpstream> {
    /// Creates a proxy forwarding to the configured upstream, if any.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Configuration`] if the configuration is
    /// invalid, or [`crate::Error::Protocol`] if the HTTP client cannot be
    /// created.
    pub fn from_config(config: ProxyConfig, sink: Arc<dyn StatusSink>) -> crate::Result<Self> {
        config.validate()?;
        let upstream = config
            .upstream()
            .map(|url| super::HttpUpstream::new(url, config.upstream_timeout()))
            .transpose()?;
        Ok(Self::new(config, sink, upstream)?)
    }
}

impl<U: Upstream> InterceptionProxy<U> {
    /// Creates a proxy with an explicit upstream.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid.
    pub fn new(
        config: ProxyConfig,
        sink: Arc<dyn StatusSink>,
        upstream: Option<U>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let password_hash = config.password_hash();
        Ok(Self {
            config,
            sink,
            upstream,
            password_hash,
        })
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Returns `true` if requests are forwarded to an upstream.
    #[must_use]
    pub fn has_upstream(&self) -> bool {
        self.upstream.is_some()
    }

    /// Handles one request from the unit and returns the reply to send.
    pub async fn handle(&self, request: InboundRequest) -> ProxyResponse {
        let message = InterceptedMessage::from_request(&request);
        let span = info_span!("exchange", id = %Uuid::new_v4(), kind = %message.kind());
        self.exchange(&request, &message).instrument(span).await
    }

    async fn exchange(&self, request: &InboundRequest, message: &InterceptedMessage) -> ProxyResponse {
        debug!(method = %request.method(), path = %request.path_and_query(), "Request from unit");

        let is_push = message.kind() == RequestKind::StatusPush;
        let trusted = is_push && self.is_trusted(message);
        if trusted {
            self.ingest(message);
        }

        let forwarded = match &self.upstream {
            Some(upstream) => match upstream.forward(request).await {
                Ok(response) => Some(response),
                Err(e) => {
                    warn!(error = %e, "Upstream failed, answering locally");
                    None
                }
            },
            None => None,
        };
        let response = forwarded.unwrap_or_else(|| synthesize(message.kind()));

        if trusted {
            self.inject(response)
        } else {
            response
        }
    }

    fn is_trusted(&self, message: &InterceptedMessage) -> bool {
        if let Some(expected) = self.config.device_id()
            && message.device_id() != Some(expected)
        {
            debug!(device_id = ?message.device_id(), "Status push from another unit ignored");
            return false;
        }
        if let Some(hash) = &self.password_hash {
            let user_matches = self.config.user().is_none_or(|user| message.user() == Some(user));
            if !user_matches || message.password_hash() != Some(hash.as_str()) {
                warn!(user = ?message.user(), "Status push failed authentication, not ingested");
                return false;
            }
        }
        true
    }

    fn ingest(&self, message: &InterceptedMessage) {
        let Some(status) = message.status() else {
            warn!("Status push without status field");
            return;
        };
        match self.sink.ingest_status(status) {
            Ok(()) => debug!(hmi = %status, "Status push ingested"),
            Err(e) => warn!(error = %e, "Status push not applied"),
        }
    }

    fn inject(&self, response: ProxyResponse) -> ProxyResponse {
        let parsed = FlagResponse::parse(&response.body_text());
        let mut flag = match parsed {
            Ok(flag) => flag,
            Err(e) => {
                warn!(error = %e, "Flag response passed through unmodified");
                return response;
            }
        };
        if flag.has_update() {
            debug!("Cloud issued its own update; nothing injected");
            return response;
        }
        let Some(hmi) = self.sink.take_pending_command() else {
            return response;
        };

        info!(hmi = %hmi, "Injecting local commands into flag response");
        flag.inject(&hmi);
        response.with_body(flag.to_string())
    }
}

impl<U: Upstream> std::fmt::Debug for InterceptionProxy<U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptionProxy")
            .field("config", &self.config)
            .field("has_upstream", &self.upstream.is_some())
            .finish_non_exhaustive()
    }
}

fn synthesize(kind: RequestKind) -> ProxyResponse {
    match kind {
        RequestKind::TimeSync => ProxyResponse::text(time_sync_reply(Utc::now())),
        RequestKind::StatusPush => ProxyResponse::text(FlagResponse::stand_in().to_string()),
        _ => ProxyResponse::text(TRAILER),
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::error::ProtocolError;
    use crate::intercept::VENDOR_PATH;

    #[derive(Default)]
    struct RecordingSink {
        ingested: Mutex<Vec<String>>,
        pending: Mutex<Option<String>>,
    }

    impl StatusSink for RecordingSink {
        fn ingest_status(&self, hmi: &str) -> Result<(), ProtocolError> {
            self.ingested.lock().push(hmi.to_string());
            Ok(())
        }

        fn take_pending_command(&self) -> Option<String> {
            self.pending.lock().clone()
        }
    }

    struct FixedUpstream(Result<String, ()>);

    impl Upstream for FixedUpstream {
        async fn forward(&self, _request: &InboundRequest) -> Result<ProxyResponse, ProtocolError> {
            match &self.0 {
                Ok(body) => Ok(ProxyResponse::new(
                    200,
                    vec![("content-length".into(), body.len().to_string())],
                    body.clone(),
                )),
                Err(()) => Err(ProtocolError::Timeout(5000)),
            }
        }
    }

    fn push() -> InboundRequest {
        InboundRequest::new("GET", VENDOR_PATH)
            .with_query("CM=UI_FLG&USR=alice&PSW=5f4dcc3b5aa765d61d8327deb882cf99&CPU_ID=U1&HMI=1%2C2")
    }

    fn command() -> String {
        let mut fields = vec!["N"; 36];
        fields[2] = "1";
        fields.join(",")
    }

    fn cloud_reply(preamble: &str) -> String {
        format!("{{{preamble}{}|}}[|0|||]{TRAILER}", vec!["N"; 36].join(","))
    }

    #[tokio::test]
    async fn stand_in_answers_and_injects() {
        let sink = Arc::new(RecordingSink::default());
        *sink.pending.lock() = Some(command());
        let proxy = InterceptionProxy::stand_in(ProxyConfig::new(8080), sink.clone()).unwrap();

        let response = proxy.handle(push()).await;

        assert_eq!(*sink.ingested.lock(), vec!["1,2".to_string()]);
        assert_eq!(response.status(), 200);
        let body = response.body_text();
        assert!(body.starts_with("{|0|0|1|0|1|1|N,N,1,"), "{body}");
        assert!(body.ends_with(TRAILER));
    }

    #[tokio::test]
    async fn upstream_reply_without_pending_is_unmodified() {
        let sink = Arc::new(RecordingSink::default());
        let raw = cloud_reply("|0|0|1|0|0|0|");
        let proxy = InterceptionProxy::new(
            ProxyConfig::new(8080),
            sink,
            Some(FixedUpstream(Ok(raw.clone()))),
        )
        .unwrap();

        let response = proxy.handle(push()).await;
        assert_eq!(response.body_text(), raw);
        assert_eq!(response.headers().len(), 1);
    }

    #[tokio::test]
    async fn upstream_reply_receives_pending_commands() {
        let sink = Arc::new(RecordingSink::default());
        *sink.pending.lock() = Some(command());
        let proxy = InterceptionProxy::new(
            ProxyConfig::new(8080),
            sink,
            Some(FixedUpstream(Ok(cloud_reply("|0|0|1|0|0|0|")))),
        )
        .unwrap();

        let response = proxy.handle(push()).await;
        assert!(response.body_text().starts_with("{|0|0|1|0|1|1|N,N,1,"));
        assert!(response.headers().is_empty(), "stale content-length dropped");
    }

    #[tokio::test]
    async fn cloud_update_wins_over_local_commands() {
        let sink = Arc::new(RecordingSink::default());
        *sink.pending.lock() = Some(command());
        let raw = cloud_reply("|0|0|1|0|1|1|");
        let proxy = InterceptionProxy::new(
            ProxyConfig::new(8080),
            sink,
            Some(FixedUpstream(Ok(raw.clone()))),
        )
        .unwrap();

        assert_eq!(proxy.handle(push()).await.body_text(), raw);
    }

    #[tokio::test]
    async fn malformed_upstream_reply_passes_through() {
        let sink = Arc::new(RecordingSink::default());
        *sink.pending.lock() = Some(command());
        let proxy = InterceptionProxy::new(
            ProxyConfig::new(8080),
            sink,
            Some(FixedUpstream(Ok("maintenance".to_string()))),
        )
        .unwrap();

        assert_eq!(proxy.handle(push()).await.body_text(), "maintenance");
    }

    #[tokio::test]
    async fn upstream_failure_falls_back_to_stand_in() {
        let sink = Arc::new(RecordingSink::default());
        let proxy =
            InterceptionProxy::new(ProxyConfig::new(8080), sink, Some(FixedUpstream(Err(()))))
                .unwrap();

        let response = proxy.handle(push()).await;
        assert_eq!(response.body_text(), FlagResponse::stand_in().to_string());
    }

    #[tokio::test]
    async fn time_sync_and_placeholder_replies() {
        let proxy =
            InterceptionProxy::stand_in(ProxyConfig::new(8080), Arc::new(RecordingSink::default()))
                .unwrap();

        let ntp = proxy
            .handle(InboundRequest::new("GET", VENDOR_PATH).with_query("CM=UI_NTP"))
            .await;
        let text = ntp.body_text();
        assert!(text.starts_with("NTP 20"), "{text}");
        assert!(text.ends_with("+00:00 UI SERVER (M.A.V. srl)"));

        let upd = proxy
            .handle(InboundRequest::new("GET", VENDOR_PATH).with_query("CM=OU_UPD"))
            .await;
        assert_eq!(upd.body_text(), TRAILER);

        let unknown = proxy.handle(InboundRequest::new("GET", "/favicon.ico")).await;
        assert_eq!(unknown.body_text(), TRAILER);
    }

    #[tokio::test]
    async fn wrong_password_is_answered_but_not_ingested() {
        let sink = Arc::new(RecordingSink::default());
        *sink.pending.lock() = Some(command());
        let config = ProxyConfig::new(8080).with_credentials("alice", "other");
        let proxy = InterceptionProxy::stand_in(config, sink.clone()).unwrap();

        let response = proxy.handle(push()).await;
        assert!(sink.ingested.lock().is_empty());
        assert_eq!(response.body_text(), FlagResponse::stand_in().to_string());
    }

    #[tokio::test]
    async fn matching_credentials_and_device_are_ingested() {
        let sink = Arc::new(RecordingSink::default());
        let config = ProxyConfig::new(8080)
            .with_credentials("alice", "password")
            .with_device_id("U1");
        let proxy = InterceptionProxy::stand_in(config, sink.clone()).unwrap();

        proxy.handle(push()).await;
        assert_eq!(sink.ingested.lock().len(), 1);
    }

    #[tokio::test]
    async fn other_device_is_not_ingested() {
        let sink = Arc::new(RecordingSink::default());
        let config = ProxyConfig::new(8080).with_device_id("U2");
        let proxy = InterceptionProxy::stand_in(config, sink.clone()).unwrap();

        proxy.handle(push()).await;
        assert!(sink.ingested.lock().is_empty());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let result =
            InterceptionProxy::stand_in(ProxyConfig::new(0), Arc::new(RecordingSink::default()));
        assert!(result.is_err());
    }
}
