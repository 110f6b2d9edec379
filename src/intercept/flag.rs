// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Flag response: the cloud's reply to a status push.
//!
//! ```text
//! {|f0|f1|f2|f3|f4|f5|<36 comma-separated fields>|}[|u0|||]<trailer>
//! ```
//!
//! `f4` asks the unit to apply the body silently, `f5` says the body holds
//! an update.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ProtocolError;
use crate::state::{SENTINEL, WRITE_FIELDS};

/// Literal trailer of every vendor reply.
pub const TRAILER: &str = "ACN_FREE <br>\t\t";

const APPLY_SILENTLY: usize = 4;
const HAS_UPDATE: usize = 5;

static FLAG_PATTERN: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(
        r"(?s)^\{\|(\d)\|(\d)\|(\d)\|(\d)\|(\d)\|(\d)\|([^|]*)\|\}\[\|([^|]*)\|\|\|\](.*)$",
    )
});

/// Parsed flag response.
///
/// # Examples
///
/// ```
/// use clima_link::intercept::FlagResponse;
///
/// let mut flag = FlagResponse::stand_in();
/// assert!(!flag.has_update());
///
/// flag.inject(&vec!["N"; 36].join(","));
/// assert!(flag.has_update());
/// assert!(flag.to_string().starts_with("{|0|0|1|0|1|1|"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagResponse {
    flags: [u8; 6],
    body: String,
    marker: String,
    trailer: String,
}

impl FlagResponse {
    /// Parses a cloud reply.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UpstreamParse`] if the framing does not
    /// match or the body does not have 36 fields.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let pattern = FLAG_PATTERN
            .as_ref()
            .map_err(|e| ProtocolError::UpstreamParse(e.to_string()))?;
        let captures = pattern
            .captures(raw)
            .ok_or_else(|| ProtocolError::UpstreamParse("flag framing not found".to_string()))?;

        let mut flags = [0u8; 6];
        for (index, flag) in flags.iter_mut().enumerate() {
            *flag = captures
                .get(index + 1)
                .and_then(|m| m.as_str().parse().ok())
                .ok_or_else(|| ProtocolError::UpstreamParse(format!("flag {index} missing")))?;
        }

        let body = captures.get(7).map_or("", |m| m.as_str());
        let fields = body.split(',').count();
        if fields != WRITE_FIELDS {
            return Err(ProtocolError::UpstreamParse(format!(
                "flag body has {fields} fields, expected {WRITE_FIELDS}"
            )));
        }

        Ok(Self {
            flags,
            body: body.to_string(),
            marker: captures.get(8).map_or("", |m| m.as_str()).to_string(),
            trailer: captures.get(9).map_or("", |m| m.as_str()).to_string(),
        })
    }

    /// Reply used when no cloud answer is available: no update, all
    /// sentinels.
    #[must_use]
    pub fn stand_in() -> Self {
        Self {
            flags: [0, 0, 1, 0, 0, 0],
            body: vec![SENTINEL; WRITE_FIELDS].join(","),
            marker: "0".to_string(),
            trailer: TRAILER.to_string(),
        }
    }

    /// The six preamble flags.
    #[must_use]
    pub fn flags(&self) -> [u8; 6] {
        self.flags
    }

    /// Command body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns `true` if the cloud itself issued an update.
    #[must_use]
    pub fn has_update(&self) -> bool {
        self.flags[HAS_UPDATE] != 0
    }

    /// Replaces the body with a local command string and flags it for
    /// silent application.
    pub fn inject(&mut self, hmi: &str) {
        self.body = hmi.to_string();
        self.flags[APPLY_SILENTLY] = 1;
        self.flags[HAS_UPDATE] = 1;
    }
}

impl fmt::Display for FlagResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for flag in self.flags {
            write!(f, "|{flag}")?;
        }
        write!(f, "|{}|}}[|{}|||]{}", self.body, self.marker, self.trailer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud_reply(preamble: &str, body: &str) -> String {
        format!("{{{preamble}{body}|}}[|0|||]{TRAILER}")
    }

    fn sentinels() -> String {
        vec!["N"; 36].join(",")
    }

    #[test]
    fn parse_and_serialize_are_byte_identical() {
        let raw = cloud_reply("|0|0|1|0|0|0|", &sentinels());
        let flag = FlagResponse::parse(&raw).unwrap();
        assert_eq!(flag.flags(), [0, 0, 1, 0, 0, 0]);
        assert!(!flag.has_update());
        assert_eq!(flag.to_string(), raw);
    }

    #[test]
    fn stand_in_matches_vendor_framing() {
        let expected = cloud_reply("|0|0|1|0|0|0|", &sentinels());
        assert_eq!(FlagResponse::stand_in().to_string(), expected);
        assert_eq!(FlagResponse::parse(&expected).unwrap(), FlagResponse::stand_in());
    }

    #[test]
    fn inject_sets_both_flags() {
        let mut flag = FlagResponse::parse(&cloud_reply("|0|0|1|0|0|0|", &sentinels())).unwrap();
        let mut fields = vec!["N"; 36];
        fields[2] = "1";
        let hmi = fields.join(",");
        flag.inject(&hmi);

        let serialized = flag.to_string();
        assert!(serialized.starts_with("{|0|0|1|0|1|1|N,N,1,"));
        assert!(serialized.ends_with(&format!("|}}[|0|||]{TRAILER}")));
    }

    #[test]
    fn cloud_update_is_detected() {
        let flag = FlagResponse::parse(&cloud_reply("|0|0|1|0|1|1|", &sentinels())).unwrap();
        assert!(flag.has_update());
    }

    #[test]
    fn malformed_replies_are_rejected() {
        assert!(FlagResponse::parse("ACN_FREE <br>\t\t").is_err());
        assert!(FlagResponse::parse(&cloud_reply("|0|0|1|0|0|", &sentinels())).is_err());
        assert!(matches!(
            FlagResponse::parse(&cloud_reply("|0|0|1|0|0|0|", "N,N,N")),
            Err(ProtocolError::UpstreamParse(_))
        ));
    }

    #[test]
    fn trailer_is_preserved_verbatim() {
        let raw = format!("{{|0|0|1|0|0|0|{}|}}[|7|||]custom\r\n", sentinels());
        let flag = FlagResponse::parse(&raw).unwrap();
        assert_eq!(flag.to_string(), raw);
    }
}
