// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HMI string codec.
//!
//! Status strings from the device carry exactly 39 comma-separated fields;
//! command strings towards it carry exactly 36. Every setting sits at a
//! fixed position (see [`SettingKind::read_index`] and
//! [`SettingKind::write_index`]) and the sentinel `N` means "no value" or
//! "no change".
//!
//! # Examples
//!
//! ```
//! use std::time::{Duration, Instant};
//!
//! use clima_link::protocol::hmi;
//! use clima_link::state::{DeviceStatus, SettingKind};
//! use clima_link::types::SettingValue;
//!
//! let mut fields = vec!["N"; 39];
//! fields[2] = "1";
//! let raw = fields.join(",");
//!
//! let mut status = DeviceStatus::new();
//! let decoded = hmi::decode(&raw).unwrap();
//! hmi::apply(&decoded, &mut status, Instant::now(), Duration::from_secs(60));
//! assert_eq!(status.value(SettingKind::Power), Some(SettingValue::Switch(true)));
//! assert_eq!(status.value(SettingKind::Mode), None);
//! ```

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::ProtocolError;
use crate::state::{
    CommandTransition, DeviceStatus, READ_FIELDS, SENTINEL, SettingKind, StateChange,
    WRITE_FIELDS, WireContext,
};

/// Field separator of the HMI string.
pub const SEPARATOR: char = ',';

/// A status string split into its 39 raw fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatus {
    fields: Vec<String>,
}

impl RawStatus {
    /// Returns the raw field at `index`.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    /// Returns all fields.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

/// What applying a status changed.
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Display changes, in setting order.
    pub changes: Vec<StateChange>,
    /// Settings whose pending command was confirmed.
    pub confirmed: Vec<SettingKind>,
    /// Settings whose pending command expired.
    pub expired: Vec<SettingKind>,
    /// Fields that could not be decoded. Their settings kept their values.
    pub errors: Vec<ProtocolError>,
}

/// Splits a status string into its fields.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedStatus`] unless there are exactly 39
/// fields.
pub fn decode(raw: &str) -> Result<RawStatus, ProtocolError> {
    let fields: Vec<String> = raw
        .trim()
        .split(SEPARATOR)
        .map(|f| f.trim().to_string())
        .collect();
    if fields.len() != READ_FIELDS {
        return Err(ProtocolError::MalformedStatus {
            expected: READ_FIELDS,
            actual: fields.len(),
        });
    }
    Ok(RawStatus { fields })
}

/// Applies decoded fields to every readable setting.
///
/// A field that fails to decode is recorded in the report and logged; the
/// remaining fields are still applied.
pub fn apply(
    status_fields: &RawStatus,
    status: &mut DeviceStatus,
    now: Instant,
    amnesty: Duration,
) -> ApplyReport {
    let mut report = ApplyReport::default();

    for kind in SettingKind::ALL {
        let Some(raw) = kind.read_index().and_then(|i| status_fields.field(i)) else {
            continue;
        };
        match status.get_mut(kind).apply_device_value(raw, now, amnesty) {
            Ok(applied) => {
                match applied.transition {
                    Some(CommandTransition::Confirmed) => report.confirmed.push(kind),
                    Some(CommandTransition::Expired) => report.expired.push(kind),
                    Some(CommandTransition::Aborted) | None => {}
                }
                if applied.changed {
                    report.changes.push(StateChange::new(kind, applied.value));
                }
            }
            Err(e) => {
                warn!(%kind, raw, error = %e, "Ignoring undecodable status field");
                report.errors.push(e);
            }
        }
    }

    status.refresh_deferrals();
    report
}

/// Decodes a status string and applies it.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedStatus`] if the field count is wrong;
/// the status is left untouched in that case.
pub fn ingest(
    raw: &str,
    status: &mut DeviceStatus,
    now: Instant,
    amnesty: Duration,
) -> Result<ApplyReport, ProtocolError> {
    let fields = decode(raw).inspect_err(|e| warn!(error = %e, "Discarding malformed status"))?;
    debug!(raw = %raw.trim(), "Applying device status");
    Ok(apply(&fields, status, now, amnesty))
}

/// Builds the 36-field command string at the current wall-clock time.
#[must_use]
pub fn encode(status: &DeviceStatus) -> String {
    encode_with(status, &status.wire_context())
}

/// Builds the 36-field command string for `ctx`.
///
/// Every position defaults to the sentinel; settings with a transmittable
/// pending command, and settings that are always sent, fill their slot.
#[must_use]
pub fn encode_with(status: &DeviceStatus, ctx: &WireContext) -> String {
    let mut fields = vec![SENTINEL.to_string(); WRITE_FIELDS];
    for element in status.iter() {
        let Some(index) = element.kind().write_index() else {
            continue;
        };
        if element.should_transmit(ctx) {
            fields[index] = element.wire_value_to_send(ctx);
        }
    }
    let hmi = fields.join(",");
    debug!(hmi = %hmi, "Encoded command");
    hmi
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::schedule::StaticSchedule;
    use crate::types::{SettingValue, TimerType};

    const AMNESTY: Duration = Duration::from_secs(60);

    const SAMPLE: &str = "215,243,1,1,3,0,0,0,1,0,0,1,0,30,N,N,N,N,N,N,62,420,1320,105,0,70,\
                          N,N,N,N,N,N,N,N,N,N,N,N,N";

    fn ctx() -> WireContext {
        WireContext {
            now: DateTime::parse_from_rfc3339("2024-01-07T08:30:00Z")
                .unwrap()
                .with_timezone(&Utc),
            active_timer: None,
        }
    }

    fn sample_status() -> DeviceStatus {
        let mut status = DeviceStatus::new();
        let report = ingest(SAMPLE, &mut status, Instant::now(), AMNESTY).unwrap();
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        status
    }

    #[test]
    fn decode_rejects_wrong_field_count() {
        let err = decode("1,2,3").unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MalformedStatus { expected: 39, actual: 3 }
        ));
        let forty = vec!["N"; 40].join(",");
        assert!(decode(&forty).is_err());
    }

    #[test]
    fn malformed_status_leaves_state_untouched() {
        let mut status = sample_status();
        let before = status.clone();
        assert!(ingest("N,N", &mut status, Instant::now(), AMNESTY).is_err());
        assert_eq!(status, before);
    }

    #[test]
    fn sample_decodes_typed_values() {
        let status = sample_status();
        assert_eq!(
            status.value(SettingKind::TargetTemperature).unwrap().to_string(),
            "21.5\u{00b0}C"
        );
        assert_eq!(status.value(SettingKind::Mode).unwrap().to_string(), "COOL");
        assert_eq!(status.value(SettingKind::DelayTimer), Some(SettingValue::Number(30)));
        assert_eq!(status.value(SettingKind::TimerOnTime).unwrap().to_string(), "07:00");
        assert_eq!(
            status.value(SettingKind::FirmwareVersion),
            Some(SettingValue::Text("0105".into()))
        );
        assert_eq!(status.value(SettingKind::EcoPowerLimit), Some(SettingValue::Number(70)));
    }

    #[test]
    fn bad_field_does_not_abort_siblings() {
        let mut fields: Vec<&str> = SAMPLE.split(',').collect();
        fields[3] = "9";
        let mut status = DeviceStatus::new();
        let report = ingest(&fields.join(","), &mut status, Instant::now(), AMNESTY).unwrap();
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(
            report.errors[0],
            ProtocolError::ElementDecode { kind: SettingKind::Mode, .. }
        ));
        assert_eq!(status.value(SettingKind::Mode), None);
        assert_eq!(status.value(SettingKind::Power), Some(SettingValue::Switch(true)));
    }

    #[test]
    fn idle_status_encodes_only_clock_fields() {
        let status = sample_status();
        let hmi = encode_with(&status, &ctx());
        let fields: Vec<&str> = hmi.split(',').collect();
        assert_eq!(fields.len(), WRITE_FIELDS);
        // 2024-01-07 is a Sunday
        assert_eq!(fields[18], "510");
        assert_eq!(fields[19], "0");
        let others = fields
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != 18 && *i != 19)
            .all(|(_, f)| *f == SENTINEL);
        assert!(others);
    }

    #[test]
    fn pending_command_fills_its_write_slot() {
        let mut status = sample_status();
        status
            .handle_command(SettingKind::TargetTemperature, &23.7.into(), &StaticSchedule::new())
            .unwrap();
        let hmi = encode_with(&status, &ctx());
        assert_eq!(hmi.split(',').next(), Some("237"));
    }

    #[test]
    fn echo_confirms_and_mismatch_does_not() {
        let mut status = sample_status();
        status
            .handle_command(SettingKind::TargetTemperature, &23.7.into(), &StaticSchedule::new())
            .unwrap();

        let with_target = |t: &str| {
            let mut fields: Vec<&str> = SAMPLE.split(',').collect();
            fields[0] = t;
            fields.join(",")
        };

        let report = ingest(&with_target("230"), &mut status, Instant::now(), AMNESTY).unwrap();
        assert!(report.confirmed.is_empty());
        assert!(status.has_pending_updates());

        let report = ingest(&with_target("237"), &mut status, Instant::now(), AMNESTY).unwrap();
        assert_eq!(report.confirmed, vec![SettingKind::TargetTemperature]);
        assert!(!status.has_pending_updates());
    }

    #[test]
    fn schedule_slots_sent_while_schedule_active() {
        let mut fields: Vec<&str> = SAMPLE.split(',').collect();
        fields[12] = "2";
        let mut status = DeviceStatus::new();
        ingest(&fields.join(","), &mut status, Instant::now(), AMNESTY).unwrap();
        assert_eq!(status.active_timer(), Some(TimerType::Schedule1));

        let ctx = WireContext {
            active_timer: status.active_timer(),
            ..ctx()
        };
        let hmi = encode_with(&status, &ctx);
        let out: Vec<&str> = hmi.split(',').collect();
        assert_eq!(&out[20..23], &["62", "420", "1320"]);
        assert_eq!(out[12], SENTINEL);
    }

    #[test]
    fn unmodified_state_round_trips() {
        let status = sample_status();

        let mut fields = vec![SENTINEL.to_string(); READ_FIELDS];
        for element in status.iter() {
            if let (Some(i), Some(raw)) = (element.kind().read_index(), element.confirmed_wire()) {
                fields[i] = raw.to_string();
            }
        }
        let mut again = DeviceStatus::new();
        ingest(&fields.join(","), &mut again, Instant::now(), AMNESTY).unwrap();
        assert_eq!(again.snapshot(), status.snapshot());
    }
}
