// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! State change representation.
//!
//! A [`StateChange`] is emitted whenever the display value of a setting
//! changes, whether because the device reported a new value, a command was
//! accepted, or a command was rolled back.
//!
//! # Examples
//!
//! ```
//! use clima_link::state::{SettingKind, StateChange};
//! use clima_link::types::SettingValue;
//!
//! let change = StateChange::new(SettingKind::Power, Some(SettingValue::Switch(true)));
//! assert_eq!(change.to_string(), "power = ON");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::SettingValue;

use super::SettingKind;

/// A change in the display value of one setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    /// The setting that changed.
    pub kind: SettingKind,
    /// The new display value, `None` if it became unknown.
    pub value: Option<SettingValue>,
}

impl StateChange {
    /// Creates a state change.
    #[must_use]
    pub fn new(kind: SettingKind, value: Option<SettingValue>) -> Self {
        Self { kind, value }
    }
}

impl fmt::Display for StateChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{} = {value}", self.kind),
            None => write!(f, "{} = unknown", self.kind),
        }
    }
}

/// Final result of one reconciliation cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Every transmittable command was confirmed (or granted amnesty).
    Confirmed,
    /// The deadline passed; the listed settings were rolled back.
    Failed(Vec<SettingKind>),
    /// The session was disposed before the cycle finished.
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_unknown_value() {
        let change = StateChange::new(SettingKind::TimerOnTime, None);
        assert_eq!(change.to_string(), "timer_on_time = unknown");
    }

    #[test]
    fn serializes_as_json_line() {
        let change = StateChange::new(SettingKind::EcoPowerLimit, Some(SettingValue::Number(70)));
        let json = serde_json::to_string(&change).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"eco_power_limit","value":{"type":"number","value":70}}"#
        );
    }
}
