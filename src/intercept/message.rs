// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inbound vendor-protocol requests and their classification.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::setup::SetupRecord;

/// Path of the vendor endpoint every unit request targets.
pub const VENDOR_PATH: &str = "/UI/UI.php";

/// Names of the request parameters understood by the proxy.
pub mod param {
    /// Vendor command name.
    pub const COMMAND: &str = "CM";
    /// Cloud user id.
    pub const USER: &str = "USR";
    /// Lowercase MD5 hex of the cloud password.
    pub const PASSWORD_HASH: &str = "PSW";
    /// Local IP of the unit.
    pub const LOCAL_IP: &str = "IP";
    /// Installed UI board firmware.
    pub const UI_FIRMWARE: &str = "VUI";
    /// Installed unit firmware.
    pub const UNIT_FIRMWARE: &str = "VOU";
    /// Unique id of the unit.
    pub const DEVICE_ID: &str = "CPU_ID";
    /// The 39-field status string.
    pub const STATUS: &str = "HMI";
    /// Timezone id.
    pub const TIMEZONE: &str = "TZ";
    /// Hex-encoded setup record.
    pub const SETUP: &str = "SETUP";
    /// Remote server id.
    pub const SERVER: &str = "SRV";
    /// Deletion flag of a confirm request.
    pub const DELETE: &str = "DEL";
    /// Payload of a confirm request.
    pub const DATA: &str = "DATA";
}

/// Kind of a vendor-protocol exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// `GET CM=UI_NTP`: the unit asks for the current time.
    TimeSync,
    /// `GET CM=UI_FLG`: periodic status push; the reply carries commands.
    StatusPush,
    /// `GET CM=UI_UPD`: firmware check for the UI board.
    UiFirmwareCheck,
    /// `GET CM=OU_UPD`: firmware check for the unit.
    UnitFirmwareCheck,
    /// `POST CM=UI_RT`: extended status confirmation.
    StatusConfirm,
    /// Anything else.
    Unknown,
}

impl RequestKind {
    /// Classifies a request from its method, path and parameters.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::BTreeMap;
    /// use clima_link::intercept::RequestKind;
    ///
    /// let params = BTreeMap::from([("CM".to_string(), "UI_FLG".to_string())]);
    /// assert_eq!(RequestKind::classify("GET", "/UI/UI.php", &params), RequestKind::StatusPush);
    /// assert_eq!(RequestKind::classify("GET", "/other", &params), RequestKind::Unknown);
    /// ```
    #[must_use]
    pub fn classify(method: &str, path: &str, params: &BTreeMap<String, String>) -> Self {
        if !path.eq_ignore_ascii_case(VENDOR_PATH) {
            return Self::Unknown;
        }
        let command = params.get(param::COMMAND).map(String::as_str);
        match (method.to_ascii_uppercase().as_str(), command) {
            ("GET", Some("UI_NTP")) => Self::TimeSync,
            ("GET", Some("UI_FLG")) => Self::StatusPush,
            ("GET", Some("UI_UPD")) => Self::UiFirmwareCheck,
            ("GET", Some("OU_UPD")) => Self::UnitFirmwareCheck,
            ("POST", Some("UI_RT")) => Self::StatusConfirm,
            _ => Self::Unknown,
        }
    }

    /// Vendor command name, if the kind is known.
    #[must_use]
    pub const fn command(self) -> Option<&'static str> {
        match self {
            Self::TimeSync => Some("UI_NTP"),
            Self::StatusPush => Some("UI_FLG"),
            Self::UiFirmwareCheck => Some("UI_UPD"),
            Self::UnitFirmwareCheck => Some("OU_UPD"),
            Self::StatusConfirm => Some("UI_RT"),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command().unwrap_or("UNKNOWN"))
    }
}

/// An HTTP request received from the unit, as seen by the proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundRequest {
    method: String,
    path: String,
    query: Option<String>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl InboundRequest {
    /// Creates a request without query, headers or body.
    #[must_use]
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Sets the raw query string (without the leading `?`).
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Appends a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// HTTP method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw query string.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Headers in arrival order.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Raw body.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Path plus query, as sent on the wire.
    #[must_use]
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(query) if !query.is_empty() => format!("{}?{query}", self.path),
            _ => self.path.clone(),
        }
    }

    /// Decoded parameters: the query string for `GET`, the form body for
    /// `POST`.
    #[must_use]
    pub fn params(&self) -> BTreeMap<String, String> {
        if self.method.eq_ignore_ascii_case("POST") {
            let mut params = parse_form(&String::from_utf8_lossy(&self.body));
            // the command name may also travel in the query
            for (key, value) in parse_form(self.query.as_deref().unwrap_or_default()) {
                params.entry(key).or_insert(value);
            }
            params
        } else {
            parse_form(self.query.as_deref().unwrap_or_default())
        }
    }
}

/// Parses an `application/x-www-form-urlencoded` string.
///
/// Undecodable components are kept verbatim. Later duplicates win.
#[must_use]
pub fn parse_form(input: &str) -> BTreeMap<String, String> {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced).map_or(spaced.clone(), std::borrow::Cow::into_owned)
}

/// One classified vendor-protocol exchange with its parsed fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedMessage {
    kind: RequestKind,
    params: BTreeMap<String, String>,
    setup: Option<SetupRecord>,
}

impl InterceptedMessage {
    /// Classifies `request` and decodes its parameters.
    ///
    /// Never fails: unknown requests yield [`RequestKind::Unknown`] and a
    /// corrupt setup blob yields a record with unknown fields.
    #[must_use]
    pub fn from_request(request: &InboundRequest) -> Self {
        let params = request.params();
        let kind = RequestKind::classify(request.method(), request.path(), &params);
        let setup = params.get(param::SETUP).map(|hex| SetupRecord::from_hex(hex));
        Self {
            kind,
            params,
            setup,
        }
    }

    /// Kind of exchange.
    #[must_use]
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Looks up a decoded parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// All decoded parameters.
    #[must_use]
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Cloud user id.
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.param(param::USER)
    }

    /// Password hash sent by the unit.
    #[must_use]
    pub fn password_hash(&self) -> Option<&str> {
        self.param(param::PASSWORD_HASH)
    }

    /// Unique id of the unit.
    #[must_use]
    pub fn device_id(&self) -> Option<&str> {
        self.param(param::DEVICE_ID)
    }

    /// The 39-field status string carried by a status push.
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.param(param::STATUS)
    }

    /// Local IP reported by the unit.
    #[must_use]
    pub fn local_ip(&self) -> Option<&str> {
        self.param(param::LOCAL_IP)
    }

    /// Installed firmware as (UI board, unit).
    #[must_use]
    pub fn firmware(&self) -> (Option<&str>, Option<&str>) {
        (self.param(param::UI_FIRMWARE), self.param(param::UNIT_FIRMWARE))
    }

    /// Timezone id.
    #[must_use]
    pub fn timezone(&self) -> Option<&str> {
        self.param(param::TIMEZONE)
    }

    /// Remote server id.
    #[must_use]
    pub fn server(&self) -> Option<&str> {
        self.param(param::SERVER)
    }

    /// Decoded setup record, if the request carried one.
    #[must_use]
    pub fn setup(&self) -> Option<&SetupRecord> {
        self.setup.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(query: &str) -> InboundRequest {
        InboundRequest::new("GET", VENDOR_PATH).with_query(query)
    }

    #[test]
    fn classify_known_commands() {
        let cases = [
            ("GET", "CM=UI_NTP", RequestKind::TimeSync),
            ("GET", "CM=UI_FLG&HMI=N", RequestKind::StatusPush),
            ("GET", "CM=UI_UPD", RequestKind::UiFirmwareCheck),
            ("GET", "CM=OU_UPD", RequestKind::UnitFirmwareCheck),
            ("GET", "CM=UI_XYZ", RequestKind::Unknown),
            ("POST", "CM=UI_FLG", RequestKind::Unknown),
        ];
        for (method, query, expected) in cases {
            let request = InboundRequest::new(method, VENDOR_PATH).with_query(query);
            let message = InterceptedMessage::from_request(&request);
            assert_eq!(message.kind(), expected, "{method} {query}");
        }
    }

    #[test]
    fn classify_post_uses_form_body() {
        let request = InboundRequest::new("POST", VENDOR_PATH)
            .with_body("CM=UI_RT&USR=alice&DEL=0&DATA=a%2Cb");
        let message = InterceptedMessage::from_request(&request);
        assert_eq!(message.kind(), RequestKind::StatusConfirm);
        assert_eq!(message.user(), Some("alice"));
        assert_eq!(message.param(param::DATA), Some("a,b"));
    }

    #[test]
    fn unknown_path_is_unknown() {
        let request = InboundRequest::new("GET", "/index.html").with_query("CM=UI_NTP");
        assert_eq!(
            InterceptedMessage::from_request(&request).kind(),
            RequestKind::Unknown
        );
    }

    #[test]
    fn status_push_fields() {
        let message = InterceptedMessage::from_request(&push(
            "CM=UI_FLG&USR=bob&PSW=abc&IP=192.168.1.7&VUI=1.4&VOU=2.1&CPU_ID=XYZ1\
             &HMI=215%2C243&TZ=Europe%2FRome&SRV=3",
        ));
        assert_eq!(message.device_id(), Some("XYZ1"));
        assert_eq!(message.status(), Some("215,243"));
        assert_eq!(message.timezone(), Some("Europe/Rome"));
        assert_eq!(message.firmware(), (Some("1.4"), Some("2.1")));
        assert_eq!(message.local_ip(), Some("192.168.1.7"));
        assert_eq!(message.server(), Some("3"));
        assert!(message.setup().is_none());
    }

    #[test]
    fn parse_form_handles_plus_and_bare_keys() {
        let params = parse_form("a=hello+world&flag&b=%ZZ");
        assert_eq!(params["a"], "hello world");
        assert_eq!(params["flag"], "");
        assert_eq!(params["b"], "%ZZ");
    }

    #[test]
    fn path_and_query() {
        assert_eq!(push("CM=UI_NTP").path_and_query(), "/UI/UI.php?CM=UI_NTP");
        assert_eq!(InboundRequest::new("GET", "/").path_and_query(), "/");
    }

    #[test]
    fn kind_display() {
        assert_eq!(RequestKind::StatusPush.to_string(), "UI_FLG");
        assert_eq!(RequestKind::Unknown.to_string(), "UNKNOWN");
    }
}
