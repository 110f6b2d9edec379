// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Setup record carried hex-encoded by status pushes.
//!
//! | Bytes | Field |
//! |---|---|
//! | 0..32 | WiFi SSID |
//! | 32..64 | WiFi password |
//! | 64..84 | UI user |
//! | 84..104 | UI password |
//! | 104..108 | local IPv4 address |
//! | 108..110 | unit firmware (major, minor) |
//! | 110..112 | UI firmware (major, minor) |
//! | 112..118 | local time (year - 2000, month, day, hour, minute, second) |
//!
//! Strings are NUL-padded ASCII. Every field is decoded on its own, so a
//! truncated or corrupt blob only loses the fields it cannot cover.

use std::net::Ipv4Addr;
use std::ops::Range;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::debug;

const SSID: Range<usize> = 0..32;
const WIFI_PASSWORD: Range<usize> = 32..64;
const UI_USER: Range<usize> = 64..84;
const UI_PASSWORD: Range<usize> = 84..104;
const LOCAL_IP: Range<usize> = 104..108;
const UNIT_FIRMWARE: Range<usize> = 108..110;
const UI_FIRMWARE: Range<usize> = 110..112;
const LOCAL_TIME: Range<usize> = 112..118;

/// Decoded setup record. Unknown fields are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SetupRecord {
    /// WiFi network name.
    pub ssid: Option<String>,
    /// WiFi password.
    #[serde(skip)]
    pub wifi_password: Option<String>,
    /// User of the unit's local UI.
    pub ui_user: Option<String>,
    /// Password of the unit's local UI.
    #[serde(skip)]
    pub ui_password: Option<String>,
    /// Local IPv4 address.
    pub local_ip: Option<Ipv4Addr>,
    /// Unit firmware (major, minor).
    pub unit_firmware: Option<(u8, u8)>,
    /// UI board firmware (major, minor).
    pub ui_firmware: Option<(u8, u8)>,
    /// Local time of the unit.
    pub local_time: Option<NaiveDateTime>,
}

impl SetupRecord {
    /// Decodes a hex blob. Never fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use clima_link::intercept::SetupRecord;
    ///
    /// let record = SetupRecord::from_hex("zz");
    /// assert_eq!(record, SetupRecord::default());
    /// ```
    #[must_use]
    pub fn from_hex(raw: &str) -> Self {
        match hex::decode(raw.trim()) {
            Ok(bytes) => Self::from_bytes(&bytes),
            Err(e) => {
                debug!(error = %e, "Setup blob is not valid hex");
                Self::default()
            }
        }
    }

    /// Decodes raw bytes field by field.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            ssid: text(bytes, SSID),
            wifi_password: text(bytes, WIFI_PASSWORD),
            ui_user: text(bytes, UI_USER),
            ui_password: text(bytes, UI_PASSWORD),
            local_ip: bytes
                .get(LOCAL_IP)
                .map(|octets| Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3])),
            unit_firmware: bytes.get(UNIT_FIRMWARE).map(|v| (v[0], v[1])),
            ui_firmware: bytes.get(UI_FIRMWARE).map(|v| (v[0], v[1])),
            local_time: bytes.get(LOCAL_TIME).and_then(local_time),
        }
    }
}

fn text(bytes: &[u8], range: Range<usize>) -> Option<String> {
    let raw = bytes.get(range)?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let value = std::str::from_utf8(&raw[..end]).ok()?;
    (!value.is_empty() && value.is_ascii()).then(|| value.to_string())
}

fn local_time(raw: &[u8]) -> Option<NaiveDateTime> {
    let date = chrono::NaiveDate::from_ymd_opt(
        2000 + i32::from(raw[0]),
        u32::from(raw[1]),
        u32::from(raw[2]),
    )?;
    date.and_hms_opt(u32::from(raw[3]), u32::from(raw[4]), u32::from(raw[5]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded(value: &str, len: usize) -> Vec<u8> {
        let mut bytes = value.as_bytes().to_vec();
        bytes.resize(len, 0);
        bytes
    }

    fn sample() -> Vec<u8> {
        let mut bytes = padded("HomeNet", 32);
        bytes.extend(padded("secret", 32));
        bytes.extend(padded("admin", 20));
        bytes.extend(padded("1234", 20));
        bytes.extend([192, 168, 1, 42]);
        bytes.extend([1, 5, 2, 3]);
        bytes.extend([24, 3, 15, 18, 45, 10]);
        bytes
    }

    #[test]
    fn full_record() {
        let record = SetupRecord::from_hex(&hex::encode(sample()));
        assert_eq!(record.ssid.as_deref(), Some("HomeNet"));
        assert_eq!(record.wifi_password.as_deref(), Some("secret"));
        assert_eq!(record.ui_user.as_deref(), Some("admin"));
        assert_eq!(record.ui_password.as_deref(), Some("1234"));
        assert_eq!(record.local_ip, Some(Ipv4Addr::new(192, 168, 1, 42)));
        assert_eq!(record.unit_firmware, Some((1, 5)));
        assert_eq!(record.ui_firmware, Some((2, 3)));
        assert_eq!(
            record.local_time.map(|t| t.to_string()).as_deref(),
            Some("2024-03-15 18:45:10")
        );
    }

    #[test]
    fn truncated_record_keeps_leading_fields() {
        let bytes = sample();
        let record = SetupRecord::from_bytes(&bytes[..70]);
        assert_eq!(record.ssid.as_deref(), Some("HomeNet"));
        assert_eq!(record.wifi_password.as_deref(), Some("secret"));
        assert!(record.ui_user.is_none());
        assert!(record.local_ip.is_none());
        assert!(record.local_time.is_none());
    }

    #[test]
    fn invalid_date_is_unknown() {
        let mut bytes = sample();
        bytes[113] = 13;
        let record = SetupRecord::from_bytes(&bytes);
        assert!(record.local_time.is_none());
        assert_eq!(record.ui_firmware, Some((2, 3)));
    }

    #[test]
    fn secrets_are_not_serialized() {
        let record = SetupRecord::from_bytes(&sample());
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("HomeNet"));
        assert!(!json.contains("secret"));
    }
}
