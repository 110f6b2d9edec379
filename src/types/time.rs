// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Time-of-day and weekday types used by timers and the device clock.
//!
//! # Types
//!
//! - [`TimeOfDay`] - minute of the day, transmitted as `hour * 60 + minute`
//! - [`Weekday`] - a single day with its mask bit and clock index
//! - [`WeekdaySet`] - a set of days, transmitted as the OR of the day bits

use std::fmt;
use std::str::FromStr;

use chrono::Timelike;
use serde::{Deserialize, Serialize};

use crate::error::ValueError;

const MINUTES_PER_DAY: u16 = 24 * 60;

/// A time of day with minute resolution.
///
/// # Examples
///
/// ```
/// use clima_link::types::TimeOfDay;
///
/// let t: TimeOfDay = "07:30".parse().unwrap();
/// assert_eq!(t.to_wire(), "450");
/// assert_eq!(t.to_string(), "07:30");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    /// Creates a time of day.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::InvalidTime`] if hour > 23 or minute > 59.
    pub fn new(hour: u8, minute: u8) -> Result<Self, ValueError> {
        if hour > 23 || minute > 59 {
            return Err(ValueError::InvalidTime(format!("{hour:02}:{minute:02}")));
        }
        Ok(Self(u16::from(hour) * 60 + u16::from(minute)))
    }

    /// Creates a time of day from minutes since midnight.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::OutOfRange`] for values past 23:59.
    pub fn from_minutes(minutes: u16) -> Result<Self, ValueError> {
        if minutes >= MINUTES_PER_DAY {
            return Err(ValueError::OutOfRange {
                min: 0,
                max: i64::from(MINUTES_PER_DAY - 1),
                actual: i64::from(minutes),
            });
        }
        Ok(Self(minutes))
    }

    /// Extracts the time of day from a chrono timestamp.
    #[must_use]
    pub fn from_chrono<T: Timelike>(time: &T) -> Self {
        // hour() < 24 and minute() < 60 so the sum fits in u16
        #[allow(clippy::cast_possible_truncation)]
        let minutes = (time.hour() * 60 + time.minute()) as u16;
        Self(minutes)
    }

    /// Parses the wire representation (minutes since midnight).
    #[must_use]
    pub fn from_wire(raw: &str) -> Option<Self> {
        raw.trim()
            .parse::<u16>()
            .ok()
            .and_then(|m| Self::from_minutes(m).ok())
    }

    /// Returns the wire representation.
    #[must_use]
    pub fn to_wire(self) -> String {
        self.0.to_string()
    }

    /// Minutes since midnight.
    #[must_use]
    pub const fn minutes(self) -> u16 {
        self.0
    }

    /// Hour component (0-23).
    #[must_use]
    pub const fn hour(self) -> u8 {
        // < 24 by construction
        #[allow(clippy::cast_possible_truncation)]
        let h = (self.0 / 60) as u8;
        h
    }

    /// Minute component (0-59).
    #[must_use]
    pub const fn minute(self) -> u8 {
        #[allow(clippy::cast_possible_truncation)]
        let m = (self.0 % 60) as u8;
        m
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for TimeOfDay {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| ValueError::InvalidTime(s.to_string()))?;
        let hour = h
            .parse::<u8>()
            .map_err(|_| ValueError::InvalidTime(s.to_string()))?;
        // Accept "HH:MM" and "HH:MM:SS"
        let minute_part = m.split(':').next().unwrap_or(m);
        let minute = minute_part
            .parse::<u8>()
            .map_err(|_| ValueError::InvalidTime(s.to_string()))?;
        Self::new(hour, minute)
    }
}

/// A day of the week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weekday {
    /// Sunday.
    Sunday,
    /// Monday.
    Monday,
    /// Tuesday.
    Tuesday,
    /// Wednesday.
    Wednesday,
    /// Thursday.
    Thursday,
    /// Friday.
    Friday,
    /// Saturday.
    Saturday,
}

impl Weekday {
    /// All days, Sunday first.
    pub const ALL: [Self; 7] = [
        Self::Sunday,
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
        Self::Saturday,
    ];

    /// Bit value of this day within a [`WeekdaySet`] mask.
    ///
    /// Monday..Saturday use 1, 2, 4, 8, 16, 32. Sunday takes 64 so that a
    /// set containing it stays distinguishable from the empty set.
    #[must_use]
    pub const fn bit(self) -> u8 {
        match self {
            Self::Monday => 1,
            Self::Tuesday => 2,
            Self::Wednesday => 4,
            Self::Thursday => 8,
            Self::Friday => 16,
            Self::Saturday => 32,
            Self::Sunday => 64,
        }
    }

    /// Index sent in the current-weekday field (Sunday = 0).
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Self::Sunday => 0,
            Self::Monday => 1,
            Self::Tuesday => 2,
            Self::Wednesday => 3,
            Self::Thursday => 4,
            Self::Friday => 5,
            Self::Saturday => 6,
        }
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Sun => Self::Sunday,
            chrono::Weekday::Mon => Self::Monday,
            chrono::Weekday::Tue => Self::Tuesday,
            chrono::Weekday::Wed => Self::Wednesday,
            chrono::Weekday::Thu => Self::Thursday,
            chrono::Weekday::Fri => Self::Friday,
            chrono::Weekday::Sat => Self::Saturday,
        }
    }
}

impl FromStr for Weekday {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|d| {
                let name = format!("{d:?}").to_ascii_lowercase();
                name == lower || name[..3] == lower
            })
            .ok_or_else(|| ValueError::NotAMember {
                domain: "weekday",
                value: s.to_string(),
            })
    }
}

/// A set of weekdays, transmitted as a bitmask.
///
/// # Examples
///
/// ```
/// use clima_link::types::{Weekday, WeekdaySet};
///
/// let set = WeekdaySet::from_days([Weekday::Monday, Weekday::Friday]);
/// assert_eq!(set.to_wire(), "17");
/// assert!(set.contains(Weekday::Friday));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Every day of the week.
    pub const ALL: Self = Self(0x7f);

    /// Builds a set from individual days.
    #[must_use]
    pub fn from_days(days: impl IntoIterator<Item = Weekday>) -> Self {
        Self(days.into_iter().fold(0, |mask, d| mask | d.bit()))
    }

    /// Interprets a raw mask, ignoring undefined bits.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Parses the wire representation.
    #[must_use]
    pub fn from_wire(raw: &str) -> Option<Self> {
        let bits = raw.trim().parse::<u8>().ok()?;
        (bits & !Self::ALL.0 == 0).then_some(Self(bits))
    }

    /// Returns the wire representation.
    ///
    /// Sunday is bit 64 rather than 0, so a Sunday-only set stays distinct
    /// from the empty set.
    #[must_use]
    pub fn to_wire(self) -> String {
        self.0.to_string()
    }

    /// Raw mask.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` if `day` is in the set.
    #[must_use]
    pub const fn contains(self, day: Weekday) -> bool {
        self.0 & day.bit() != 0
    }

    /// Returns `true` if no day is selected.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates the selected days, Sunday first.
    pub fn days(self) -> impl Iterator<Item = Weekday> {
        Weekday::ALL.into_iter().filter(move |d| self.contains(*d))
    }
}

impl fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.days().map(|d| format!("{d:?}")).collect();
        write!(f, "[{}]", names.join(","))
    }
}

impl FromStr for WeekdaySet {
    type Err = ValueError;

    /// Parses a comma-separated list of day names (`"mon,wed,sun"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let days = s
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::parse::<Weekday>)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_days(days))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minute_of_day_wire_format() {
        let t = TimeOfDay::new(13, 5).unwrap();
        assert_eq!(t.to_wire(), "785");
        assert_eq!(TimeOfDay::from_wire("785"), Some(t));
        assert_eq!(TimeOfDay::from_wire("1440"), None);
        assert_eq!(TimeOfDay::from_wire("N"), None);
    }

    #[test]
    fn time_parsing() {
        assert_eq!("7:05".parse::<TimeOfDay>().unwrap().minutes(), 425);
        assert_eq!("23:59:30".parse::<TimeOfDay>().unwrap().minutes(), 1439);
        assert!("24:00".parse::<TimeOfDay>().is_err());
        assert!("noon".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn every_weekday_subset_round_trips() {
        for bits in 0u8..=0x7f {
            let set = WeekdaySet::from_bits(bits);
            let again = WeekdaySet::from_days(set.days());
            assert_eq!(again, set);
            assert_eq!(WeekdaySet::from_wire(&set.to_wire()), Some(set));
        }
    }

    #[test]
    fn day_bits_are_not_sequential_positions() {
        assert_eq!(Weekday::Monday.bit(), 1);
        assert_eq!(Weekday::Saturday.bit(), 32);
        assert_eq!(Weekday::Sunday.index(), 0);
        assert_eq!(Weekday::Saturday.index(), 6);
    }

    #[test]
    fn weekday_set_from_names() {
        let set: WeekdaySet = "mon, fri,sunday".parse().unwrap();
        assert_eq!(set.bits(), 1 | 16 | 64);
        assert!("funday".parse::<WeekdaySet>().is_err());
    }

    #[test]
    fn undefined_bits_rejected_on_wire() {
        assert_eq!(WeekdaySet::from_wire("128"), None);
        assert_eq!(WeekdaySet::from_bits(0xff), WeekdaySet::ALL);
    }
}
