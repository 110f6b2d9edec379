// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Setting kinds and their fixed HMI wire positions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Number of fields in a device status string.
pub const READ_FIELDS: usize = 39;

/// Number of fields in a command string.
pub const WRITE_FIELDS: usize = 36;

/// Sentinel meaning "no value" / "no change" in both directions.
pub const SENTINEL: &str = "N";

/// Direction(s) in which a setting travels over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMode {
    /// Reported by the device, never commanded.
    ReadOnly,
    /// Commanded, never reported back.
    WriteOnly,
    /// Reported and commanded.
    ReadWrite,
}

impl AccessMode {
    /// Returns `true` if the setting appears in the status string.
    #[must_use]
    pub const fn can_read(self) -> bool {
        matches!(self, Self::ReadOnly | Self::ReadWrite)
    }

    /// Returns `true` if the setting appears in the command string.
    #[must_use]
    pub const fn can_write(self) -> bool {
        matches!(self, Self::WriteOnly | Self::ReadWrite)
    }
}

/// Every controllable or observable attribute of the unit.
///
/// # Examples
///
/// ```
/// use clima_link::state::{AccessMode, SettingKind};
///
/// assert_eq!(SettingKind::Power.read_index(), Some(2));
/// assert_eq!(SettingKind::CurrentTime.access(), AccessMode::WriteOnly);
/// assert_eq!("target_temperature".parse(), Ok(SettingKind::TargetTemperature));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKind {
    /// Target temperature.
    TargetTemperature,
    /// Measured room temperature.
    ActualTemperature,
    /// Unit on/off.
    Power,
    /// Operating mode.
    Mode,
    /// Fan speed.
    FanLevel,
    /// Flap position.
    FlapLevel,
    /// Use the remote's temperature sensor.
    IFeel,
    /// Filter cleaning mode.
    FilterMode,
    /// Economy mode.
    EcoMode,
    /// Turbo mode.
    TurboMode,
    /// Night mode.
    NightMode,
    /// Display light.
    Light,
    /// Which timer drives the unit.
    ActiveTimer,
    /// Delay before the delay timer fires, in minutes.
    DelayTimer,
    /// Current time of day, sent with every command.
    CurrentTime,
    /// Current weekday, sent with every command.
    CurrentWeekday,
    /// Weekdays of the selected schedule.
    TimerWeekdays,
    /// Switch-on time of the selected schedule.
    TimerOnTime,
    /// Switch-off time of the selected schedule.
    TimerOffTime,
    /// Firmware version of the unit.
    FirmwareVersion,
    /// Factory reset trigger.
    FactoryReset,
    /// Unit of the device's own display.
    DisplayUnit,
    /// Power limit in economy mode, in percent.
    EcoPowerLimit,
}

impl SettingKind {
    /// Every setting kind.
    pub const ALL: [Self; 23] = [
        Self::TargetTemperature,
        Self::ActualTemperature,
        Self::Power,
        Self::Mode,
        Self::FanLevel,
        Self::FlapLevel,
        Self::IFeel,
        Self::FilterMode,
        Self::EcoMode,
        Self::TurboMode,
        Self::NightMode,
        Self::Light,
        Self::ActiveTimer,
        Self::DelayTimer,
        Self::CurrentTime,
        Self::CurrentWeekday,
        Self::TimerWeekdays,
        Self::TimerOnTime,
        Self::TimerOffTime,
        Self::FirmwareVersion,
        Self::FactoryReset,
        Self::DisplayUnit,
        Self::EcoPowerLimit,
    ];

    /// Returns the wire direction(s) of this setting.
    #[must_use]
    pub const fn access(self) -> AccessMode {
        match self {
            Self::ActualTemperature | Self::FirmwareVersion => AccessMode::ReadOnly,
            Self::CurrentTime | Self::CurrentWeekday | Self::FactoryReset => {
                AccessMode::WriteOnly
            }
            _ => AccessMode::ReadWrite,
        }
    }

    /// Returns the position in the 39-field status string.
    #[must_use]
    pub const fn read_index(self) -> Option<usize> {
        match self {
            Self::TargetTemperature => Some(0),
            Self::ActualTemperature => Some(1),
            Self::Power => Some(2),
            Self::Mode => Some(3),
            Self::FanLevel => Some(4),
            Self::FlapLevel => Some(5),
            Self::IFeel => Some(6),
            Self::FilterMode => Some(7),
            Self::EcoMode => Some(8),
            Self::TurboMode => Some(9),
            Self::NightMode => Some(10),
            Self::Light => Some(11),
            Self::ActiveTimer => Some(12),
            Self::DelayTimer => Some(13),
            Self::TimerWeekdays => Some(20),
            Self::TimerOnTime => Some(21),
            Self::TimerOffTime => Some(22),
            Self::FirmwareVersion => Some(23),
            Self::DisplayUnit => Some(24),
            Self::EcoPowerLimit => Some(25),
            Self::CurrentTime | Self::CurrentWeekday | Self::FactoryReset => None,
        }
    }

    /// Returns the position in the 36-field command string.
    #[must_use]
    pub const fn write_index(self) -> Option<usize> {
        match self {
            Self::TargetTemperature => Some(0),
            Self::Power => Some(2),
            Self::Mode => Some(3),
            Self::FanLevel => Some(4),
            Self::FlapLevel => Some(5),
            Self::IFeel => Some(6),
            Self::FilterMode => Some(7),
            Self::EcoMode => Some(8),
            Self::TurboMode => Some(9),
            Self::NightMode => Some(10),
            Self::Light => Some(11),
            Self::ActiveTimer => Some(12),
            Self::DelayTimer => Some(13),
            Self::CurrentTime => Some(18),
            Self::CurrentWeekday => Some(19),
            Self::TimerWeekdays => Some(20),
            Self::TimerOnTime => Some(21),
            Self::TimerOffTime => Some(22),
            Self::FactoryReset => Some(23),
            Self::DisplayUnit => Some(24),
            Self::EcoPowerLimit => Some(25),
            Self::ActualTemperature | Self::FirmwareVersion => None,
        }
    }

    /// Returns `true` for the three slots shared by the weekly schedules.
    #[must_use]
    pub const fn is_schedule_field(self) -> bool {
        matches!(
            self,
            Self::TimerWeekdays | Self::TimerOnTime | Self::TimerOffTime
        )
    }

    /// Returns the `snake_case` name of this setting.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TargetTemperature => "target_temperature",
            Self::ActualTemperature => "actual_temperature",
            Self::Power => "power",
            Self::Mode => "mode",
            Self::FanLevel => "fan_level",
            Self::FlapLevel => "flap_level",
            Self::IFeel => "i_feel",
            Self::FilterMode => "filter_mode",
            Self::EcoMode => "eco_mode",
            Self::TurboMode => "turbo_mode",
            Self::NightMode => "night_mode",
            Self::Light => "light",
            Self::ActiveTimer => "active_timer",
            Self::DelayTimer => "delay_timer",
            Self::CurrentTime => "current_time",
            Self::CurrentWeekday => "current_weekday",
            Self::TimerWeekdays => "timer_weekdays",
            Self::TimerOnTime => "timer_on_time",
            Self::TimerOffTime => "timer_off_time",
            Self::FirmwareVersion => "firmware_version",
            Self::FactoryReset => "factory_reset",
            Self::DisplayUnit => "display_unit",
            Self::EcoPowerLimit => "eco_power_limit",
        }
    }
}

impl fmt::Display for SettingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SettingKind {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ValueError::NotAMember {
                domain: "setting",
                value: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn write_indices_are_unique_and_in_bounds() {
        let mut seen = HashSet::new();
        for kind in SettingKind::ALL {
            if let Some(idx) = kind.write_index() {
                assert!(idx < WRITE_FIELDS, "{kind} out of bounds");
                assert!(seen.insert(idx), "{kind} shares write index {idx}");
            }
        }
    }

    #[test]
    fn read_indices_are_unique_and_in_bounds() {
        let mut seen = HashSet::new();
        for kind in SettingKind::ALL {
            if let Some(idx) = kind.read_index() {
                assert!(idx < READ_FIELDS, "{kind} out of bounds");
                assert!(seen.insert(idx), "{kind} shares read index {idx}");
            }
        }
    }

    #[test]
    fn access_matches_index_tables() {
        for kind in SettingKind::ALL {
            assert_eq!(kind.access().can_read(), kind.read_index().is_some(), "{kind}");
            assert_eq!(kind.access().can_write(), kind.write_index().is_some(), "{kind}");
        }
    }

    #[test]
    fn parse_by_name() {
        assert_eq!("POWER".parse(), Ok(SettingKind::Power));
        assert!("volume".parse::<SettingKind>().is_err());
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&SettingKind::EcoPowerLimit).unwrap();
        assert_eq!(json, "\"eco_power_limit\"");
    }
}
