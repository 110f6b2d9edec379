// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Enumerated settings and their HMI wire codes.
//!
//! Every enumerated setting is transmitted as its small integer code. The
//! [`WireEnum`] trait gives all of them the same parsing rules: a command
//! input may be the wire code (`"3"`) or the case-insensitive name
//! (`"warm"`).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// An enumeration whose members map one-to-one onto HMI wire codes.
pub trait WireEnum: Copy + Eq + fmt::Debug + Sized + 'static {
    /// Human-readable name of the enumeration, used in error messages.
    const DOMAIN: &'static str;

    /// Every member, in wire-code order.
    const ALL: &'static [Self];

    /// Returns the wire code of this member.
    fn code(self) -> u8;

    /// Returns the canonical name of this member.
    fn label(self) -> &'static str;

    /// Looks a member up by wire code.
    fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.code() == code)
    }

    /// Looks a member up by wire text (the decimal code).
    fn from_wire(raw: &str) -> Option<Self> {
        raw.trim().parse::<u8>().ok().and_then(Self::from_code)
    }

    /// Parses a command input: either the wire code or the name.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::NotAMember`] if neither matches.
    fn parse_input(input: &str) -> Result<Self, ValueError> {
        let trimmed = input.trim();
        Self::from_wire(trimmed)
            .or_else(|| {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|m| m.label().eq_ignore_ascii_case(trimmed))
            })
            .ok_or_else(|| ValueError::NotAMember {
                domain: Self::DOMAIN,
                value: input.to_string(),
            })
    }
}

/// Operating mode of the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationMode {
    /// Cooling.
    Cool,
    /// Dehumidifying.
    Dry,
    /// Heating.
    Warm,
    /// Fan only.
    Fan,
    /// Automatic heat/cool.
    Auto,
}

impl WireEnum for OperationMode {
    const DOMAIN: &'static str = "operation mode";
    const ALL: &'static [Self] = &[Self::Cool, Self::Dry, Self::Warm, Self::Fan, Self::Auto];

    fn code(self) -> u8 {
        match self {
            Self::Cool => 1,
            Self::Dry => 2,
            Self::Warm => 3,
            Self::Fan => 4,
            Self::Auto => 5,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Cool => "COOL",
            Self::Dry => "DRY",
            Self::Warm => "WARM",
            Self::Fan => "FAN",
            Self::Auto => "AUTO",
        }
    }
}

/// Fan speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FanLevel {
    /// Speed chosen by the unit.
    Auto,
    /// Lowest speed.
    Level1,
    /// Speed 2.
    Level2,
    /// Speed 3.
    Level3,
    /// Speed 4.
    Level4,
    /// Speed 5.
    Level5,
    /// Highest speed.
    Level6,
}

impl WireEnum for FanLevel {
    const DOMAIN: &'static str = "fan level";
    const ALL: &'static [Self] = &[
        Self::Auto,
        Self::Level1,
        Self::Level2,
        Self::Level3,
        Self::Level4,
        Self::Level5,
        Self::Level6,
    ];

    fn code(self) -> u8 {
        match self {
            Self::Auto => 0,
            Self::Level1 => 1,
            Self::Level2 => 2,
            Self::Level3 => 3,
            Self::Level4 => 4,
            Self::Level5 => 5,
            Self::Level6 => 6,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::Level1 => "LEVEL_1",
            Self::Level2 => "LEVEL_2",
            Self::Level3 => "LEVEL_3",
            Self::Level4 => "LEVEL_4",
            Self::Level5 => "LEVEL_5",
            Self::Level6 => "LEVEL_6",
        }
    }
}

/// Louver (flap) position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlapLevel {
    /// Swinging.
    Auto,
    /// Position 1.
    Level1,
    /// Position 2.
    Level2,
    /// Position 3.
    Level3,
    /// Position 4.
    Level4,
    /// Position 5.
    Level5,
    /// Position 6.
    Level6,
    /// Position 7.
    Level7,
}

impl WireEnum for FlapLevel {
    const DOMAIN: &'static str = "flap level";
    const ALL: &'static [Self] = &[
        Self::Auto,
        Self::Level1,
        Self::Level2,
        Self::Level3,
        Self::Level4,
        Self::Level5,
        Self::Level6,
        Self::Level7,
    ];

    fn code(self) -> u8 {
        match self {
            Self::Auto => 0,
            Self::Level1 => 1,
            Self::Level2 => 2,
            Self::Level3 => 3,
            Self::Level4 => 4,
            Self::Level5 => 5,
            Self::Level6 => 6,
            Self::Level7 => 7,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::Level1 => "LEVEL_1",
            Self::Level2 => "LEVEL_2",
            Self::Level3 => "LEVEL_3",
            Self::Level4 => "LEVEL_4",
            Self::Level5 => "LEVEL_5",
            Self::Level6 => "LEVEL_6",
            Self::Level7 => "LEVEL_7",
        }
    }
}

/// Which timer drives the unit.
///
/// The delay timer and the three weekly schedules share a single set of
/// weekday/on/off wire slots, so only the selected timer's values may be
/// transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerType {
    /// No timer active.
    NoTimer,
    /// Power off after a delay.
    DelayTimer,
    /// Weekly schedule slot 1.
    Schedule1,
    /// Weekly schedule slot 2.
    Schedule2,
    /// Weekly schedule slot 3.
    Schedule3,
}

impl TimerType {
    /// Returns the schedule slot (1-3) if this is a schedule timer.
    #[must_use]
    pub const fn schedule_slot(self) -> Option<u8> {
        match self {
            Self::Schedule1 => Some(1),
            Self::Schedule2 => Some(2),
            Self::Schedule3 => Some(3),
            Self::NoTimer | Self::DelayTimer => None,
        }
    }

    /// Returns `true` for the three schedule slots.
    #[must_use]
    pub const fn is_schedule(self) -> bool {
        self.schedule_slot().is_some()
    }
}

impl WireEnum for TimerType {
    const DOMAIN: &'static str = "timer type";
    const ALL: &'static [Self] = &[
        Self::NoTimer,
        Self::DelayTimer,
        Self::Schedule1,
        Self::Schedule2,
        Self::Schedule3,
    ];

    fn code(self) -> u8 {
        match self {
            Self::NoTimer => 0,
            Self::DelayTimer => 1,
            Self::Schedule1 => 2,
            Self::Schedule2 => 3,
            Self::Schedule3 => 4,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::NoTimer => "NO_TIMER",
            Self::DelayTimer => "DELAY_TIMER",
            Self::Schedule1 => "SCHEDULE_TIMER_1",
            Self::Schedule2 => "SCHEDULE_TIMER_2",
            Self::Schedule3 => "SCHEDULE_TIMER_3",
        }
    }
}

/// Unit used by the device's own display.
///
/// Purely cosmetic: temperatures are always exchanged in tenths of a degree
/// Celsius regardless of this flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemperatureUnit {
    /// Degrees Celsius.
    Celsius,
    /// Degrees Fahrenheit.
    Fahrenheit,
}

impl WireEnum for TemperatureUnit {
    const DOMAIN: &'static str = "temperature unit";
    const ALL: &'static [Self] = &[Self::Celsius, Self::Fahrenheit];

    fn code(self) -> u8 {
        match self {
            Self::Celsius => 0,
            Self::Fahrenheit => 1,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Celsius => "CELSIUS",
            Self::Fahrenheit => "FAHRENHEIT",
        }
    }
}

macro_rules! display_via_label {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        })*
    };
}

display_via_label!(OperationMode, FanLevel, FlapLevel, TimerType, TemperatureUnit);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_from_code_and_name() {
        assert_eq!(OperationMode::from_wire("3"), Some(OperationMode::Warm));
        assert_eq!(OperationMode::parse_input("cool"), Ok(OperationMode::Cool));
        assert_eq!(OperationMode::parse_input(" 5 "), Ok(OperationMode::Auto));
    }

    #[test]
    fn unknown_member_is_rejected() {
        let err = FanLevel::parse_input("turbo").unwrap_err();
        assert!(matches!(err, ValueError::NotAMember { domain: "fan level", .. }));
        assert!(OperationMode::from_wire("0").is_none());
        assert!(FlapLevel::from_wire("N").is_none());
    }

    #[test]
    fn codes_are_unique() {
        for (i, a) in FlapLevel::ALL.iter().enumerate() {
            for b in &FlapLevel::ALL[i + 1..] {
                assert_ne!(a.code(), b.code());
            }
        }
    }

    #[test]
    fn timer_schedule_slots() {
        assert_eq!(TimerType::Schedule2.schedule_slot(), Some(2));
        assert!(!TimerType::DelayTimer.is_schedule());
        assert_eq!(TimerType::from_code(4), Some(TimerType::Schedule3));
    }

    #[test]
    fn display_uses_label() {
        assert_eq!(TemperatureUnit::Fahrenheit.to_string(), "FAHRENHEIT");
    }
}
