// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Weekly schedule configuration.
//!
//! The unit stores a single set of weekday/on/off slots. Selecting one of
//! the three schedule timers programs those slots from the configuration
//! exposed by a [`ScheduleProvider`].

use serde::{Deserialize, Serialize};

use crate::types::{TimeOfDay, WeekdaySet};

/// One weekly schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Days on which the schedule runs.
    pub weekdays: WeekdaySet,
    /// Switch-on time.
    pub on_time: TimeOfDay,
    /// Switch-off time.
    pub off_time: TimeOfDay,
}

/// Supplies the configured schedule for each slot (1-3).
pub trait ScheduleProvider: Send + Sync {
    /// Returns the schedule configured for `slot`, if any.
    fn schedule(&self, slot: u8) -> Option<ScheduleEntry>;
}

/// In-memory schedule configuration.
///
/// # Examples
///
/// ```
/// use clima_link::schedule::{ScheduleEntry, ScheduleProvider, StaticSchedule};
/// use clima_link::types::{TimeOfDay, WeekdaySet};
///
/// let entry = ScheduleEntry {
///     weekdays: "mon,tue,wed,thu,fri".parse().unwrap(),
///     on_time: TimeOfDay::new(7, 0).unwrap(),
///     off_time: TimeOfDay::new(22, 30).unwrap(),
/// };
/// let schedule = StaticSchedule::new().with_slot(1, entry);
/// assert_eq!(schedule.schedule(1), Some(entry));
/// assert_eq!(schedule.schedule(2), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticSchedule {
    slots: [Option<ScheduleEntry>; 3],
}

impl StaticSchedule {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the schedule for `slot` (1-3). Other slot numbers are ignored.
    #[must_use]
    pub fn with_slot(mut self, slot: u8, entry: ScheduleEntry) -> Self {
        if let Some(target) = slot
            .checked_sub(1)
            .and_then(|i| self.slots.get_mut(usize::from(i)))
        {
            *target = Some(entry);
        }
        self
    }
}

impl ScheduleProvider for StaticSchedule {
    fn schedule(&self, slot: u8) -> Option<ScheduleEntry> {
        slot.checked_sub(1)
            .and_then(|i| self.slots.get(usize::from(i)))
            .copied()
            .flatten()
    }
}
