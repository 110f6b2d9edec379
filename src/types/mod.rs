// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types for air-conditioner settings.
//!
//! Each type knows its HMI wire representation, so the codec never has to
//! special-case number formats.
//!
//! # Types
//!
//! - [`OperationMode`], [`FanLevel`], [`FlapLevel`], [`TimerType`],
//!   [`TemperatureUnit`] - enumerated settings (see [`WireEnum`])
//! - [`Temperature`] - tenths of a degree Celsius
//! - [`TimeOfDay`] - minute of the day
//! - [`Weekday`] / [`WeekdaySet`] - single days and day masks
//! - [`SettingValue`] - decoded value of any setting
//! - [`CommandInput`] - loosely-typed value handed in by a host

mod mode;
mod temperature;
mod time;
mod value;

pub use mode::{FanLevel, FlapLevel, OperationMode, TemperatureUnit, TimerType, WireEnum};
pub use temperature::Temperature;
pub use time::{TimeOfDay, Weekday, WeekdaySet};
pub use value::{CommandInput, SettingValue};
