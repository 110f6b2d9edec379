// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Display-facing setting values and command inputs.
//!
//! [`SettingValue`] is what the engine produces for each setting after
//! decoding a device status. [`CommandInput`] is what a host hands in when
//! issuing a command; it is deliberately loose (a bool, a number, some text
//! or an already-typed value) and each setting type-checks it on its own.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{
    FanLevel, FlapLevel, OperationMode, Temperature, TemperatureUnit, TimeOfDay, TimerType,
    Weekday, WeekdaySet,
};

/// The decoded value of one setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SettingValue {
    /// On/off switch.
    Switch(bool),
    /// Operating mode.
    Mode(OperationMode),
    /// Fan speed.
    Fan(FanLevel),
    /// Flap position.
    Flap(FlapLevel),
    /// Active timer selection.
    Timer(TimerType),
    /// Display unit.
    Unit(TemperatureUnit),
    /// A temperature.
    Temperature(Temperature),
    /// A plain integer (ranges, delay minutes).
    Number(i64),
    /// A time of day.
    Time(TimeOfDay),
    /// A set of weekdays.
    Weekdays(WeekdaySet),
    /// A single weekday.
    Weekday(Weekday),
    /// Free text (firmware version).
    Text(String),
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Switch(true) => f.write_str("ON"),
            Self::Switch(false) => f.write_str("OFF"),
            Self::Mode(v) => v.fmt(f),
            Self::Fan(v) => v.fmt(f),
            Self::Flap(v) => v.fmt(f),
            Self::Timer(v) => v.fmt(f),
            Self::Unit(v) => v.fmt(f),
            Self::Temperature(v) => v.fmt(f),
            Self::Number(v) => v.fmt(f),
            Self::Time(v) => v.fmt(f),
            Self::Weekdays(v) => v.fmt(f),
            Self::Weekday(v) => write!(f, "{v:?}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// A command value as handed in by the host.
///
/// # Examples
///
/// ```
/// use clima_link::types::{CommandInput, OperationMode};
///
/// let a: CommandInput = true.into();
/// let b: CommandInput = 23.7.into();
/// let c: CommandInput = "cool".into();
/// let d: CommandInput = OperationMode::Cool.into();
/// # let _ = (a, b, c, d);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum CommandInput {
    /// A boolean switch command.
    Switch(bool),
    /// A numeric command (temperatures in degrees Celsius).
    Number(f64),
    /// A textual command (names, codes, `HH:MM` times, day lists).
    Text(String),
    /// An already-typed value.
    Typed(SettingValue),
}

impl CommandInput {
    /// Short description used in type-check errors.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Switch(v) => format!("switch {v}"),
            Self::Number(v) => format!("number {v}"),
            Self::Text(v) => format!("text {v:?}"),
            Self::Typed(v) => format!("value {v}"),
        }
    }
}

impl From<bool> for CommandInput {
    fn from(value: bool) -> Self {
        Self::Switch(value)
    }
}

impl From<f64> for CommandInput {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for CommandInput {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for CommandInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CommandInput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<SettingValue> for CommandInput {
    fn from(value: SettingValue) -> Self {
        Self::Typed(value)
    }
}

impl From<OperationMode> for CommandInput {
    fn from(value: OperationMode) -> Self {
        Self::Typed(SettingValue::Mode(value))
    }
}

impl From<FanLevel> for CommandInput {
    fn from(value: FanLevel) -> Self {
        Self::Typed(SettingValue::Fan(value))
    }
}

impl From<FlapLevel> for CommandInput {
    fn from(value: FlapLevel) -> Self {
        Self::Typed(SettingValue::Flap(value))
    }
}

impl From<TimerType> for CommandInput {
    fn from(value: TimerType) -> Self {
        Self::Typed(SettingValue::Timer(value))
    }
}

impl From<TemperatureUnit> for CommandInput {
    fn from(value: TemperatureUnit) -> Self {
        Self::Typed(SettingValue::Unit(value))
    }
}

impl From<Temperature> for CommandInput {
    fn from(value: Temperature) -> Self {
        Self::Typed(SettingValue::Temperature(value))
    }
}

impl From<TimeOfDay> for CommandInput {
    fn from(value: TimeOfDay) -> Self {
        Self::Typed(SettingValue::Time(value))
    }
}

impl From<WeekdaySet> for CommandInput {
    fn from(value: WeekdaySet) -> Self {
        Self::Typed(SettingValue::Weekdays(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setting_value_display() {
        assert_eq!(SettingValue::Switch(true).to_string(), "ON");
        assert_eq!(SettingValue::Mode(OperationMode::Dry).to_string(), "DRY");
        assert_eq!(
            SettingValue::Time(TimeOfDay::new(6, 0).unwrap()).to_string(),
            "06:00"
        );
    }

    #[test]
    fn setting_value_serializes_tagged() {
        let json = serde_json::to_value(SettingValue::Number(40)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "number", "value": 40}));
    }

    #[test]
    fn conversions_into_command_input() {
        assert_eq!(CommandInput::from(false), CommandInput::Switch(false));
        assert_eq!(CommandInput::from(35), CommandInput::Number(35.0));
        assert_eq!(
            CommandInput::from(TimerType::DelayTimer),
            CommandInput::Typed(SettingValue::Timer(TimerType::DelayTimer))
        );
    }
}
