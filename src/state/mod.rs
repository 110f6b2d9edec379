// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state management types.
//!
//! [`DeviceStatus`] owns one [`Element`] per [`SettingKind`]. Each element
//! tracks the value last confirmed by the device and at most one in-flight
//! command; [`StateChange`] reports display changes to subscribers.
//!
//! # Examples
//!
//! ```
//! use std::time::{Duration, Instant};
//!
//! use clima_link::state::{Element, SettingKind};
//! use clima_link::types::SettingValue;
//!
//! let mut power = Element::new(SettingKind::Power);
//! let applied = power
//!     .apply_device_value("1", Instant::now(), Duration::from_secs(60))
//!     .unwrap();
//! assert_eq!(applied.value, Some(SettingValue::Switch(true)));
//! ```

mod device_status;
mod element;
mod setting;
mod state_change;

pub use device_status::{DeviceStatus, Snapshot};
pub use element::{
    Applied, CommandAcceptance, CommandTransition, DELAY_STEP_MINUTES, Element, ElementVariant,
    EnumDomain, PendingCommand, TEMPERATURE_MAX, TEMPERATURE_MIN, WireContext,
};
pub use setting::{AccessMode, READ_FIELDS, SENTINEL, SettingKind, WRITE_FIELDS};
pub use state_change::{CommandOutcome, StateChange};
