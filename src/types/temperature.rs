// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Temperature type with HMI wire encoding.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A temperature held in tenths of a degree Celsius.
///
/// The HMI protocol transmits every temperature as an integer number of
/// tenths of a degree Celsius, independently of the display unit setting.
///
/// # Examples
///
/// ```
/// use clima_link::types::Temperature;
///
/// let t = Temperature::from_celsius(21.5);
/// assert_eq!(t.to_wire(), "215");
/// assert_eq!(Temperature::from_wire("215"), Some(t));
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Temperature(i32);

impl Temperature {
    /// Creates a temperature from degrees Celsius, rounded to one decimal.
    #[must_use]
    pub fn from_celsius(celsius: f64) -> Self {
        // Realistic temperatures fit comfortably in i32 tenths
        #[allow(clippy::cast_possible_truncation)]
        let tenths = (celsius * 10.0).round() as i32;
        Self(tenths)
    }

    /// Creates a temperature from tenths of a degree Celsius.
    #[must_use]
    pub const fn from_tenths(tenths: i32) -> Self {
        Self(tenths)
    }

    /// Parses the wire representation (integer tenths).
    #[must_use]
    pub fn from_wire(raw: &str) -> Option<Self> {
        raw.trim().parse::<i32>().ok().map(Self)
    }

    /// Returns the wire representation (integer tenths).
    #[must_use]
    pub fn to_wire(self) -> String {
        self.0.to_string()
    }

    /// Returns the value in tenths of a degree.
    #[must_use]
    pub const fn tenths(self) -> i32 {
        self.0
    }

    /// Returns the value in degrees Celsius.
    #[must_use]
    pub fn celsius(self) -> f64 {
        f64::from(self.0) / 10.0
    }

    /// Returns the value in degrees Fahrenheit.
    #[must_use]
    pub fn fahrenheit(self) -> f64 {
        self.celsius() * 9.0 / 5.0 + 32.0
    }

    /// Clamps into `[min, max]`.
    #[must_use]
    pub fn clamp(self, min: Self, max: Self) -> Self {
        Self(self.0.clamp(min.0, max.0))
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}\u{00b0}C", self.celsius())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn celsius_rounds_to_tenths() {
        assert_eq!(Temperature::from_celsius(23.7).to_wire(), "237");
        assert_eq!(Temperature::from_celsius(23.74).tenths(), 237);
        assert_eq!(Temperature::from_celsius(23.75).tenths(), 238);
    }

    #[test]
    fn wire_round_trip_in_range() {
        for tenths in 100..=320 {
            let t = Temperature::from_tenths(tenths);
            assert_eq!(Temperature::from_wire(&t.to_wire()), Some(t));
        }
    }

    #[test]
    fn sentinel_is_not_a_temperature() {
        assert_eq!(Temperature::from_wire("N"), None);
        assert_eq!(Temperature::from_wire(""), None);
    }

    #[test]
    fn display_and_fahrenheit() {
        let t = Temperature::from_celsius(20.0);
        assert_eq!(t.to_string(), "20.0\u{00b0}C");
        assert!((t.fahrenheit() - 68.0).abs() < f64::EPSILON);
    }

    #[test]
    fn clamp_to_bounds() {
        let min = Temperature::from_celsius(10.0);
        let max = Temperature::from_celsius(32.0);
        assert_eq!(Temperature::from_celsius(40.0).clamp(min, max), max);
        assert_eq!(Temperature::from_celsius(5.0).clamp(min, max), min);
    }
}
