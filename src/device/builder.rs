// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device session builder.

use std::sync::Arc;

use crate::device::{Device, ReconcileTiming};
use crate::error::Error;
use crate::protocol::Transport;
use crate::schedule::{ScheduleProvider, StaticSchedule};

/// Builder for device sessions.
///
/// Created by [`Device::http`], [`Device::push_only`] or
/// [`Device::with_transport`]. Building does not touch the network; the
/// first status arrives with [`Device::refresh`], the refresh task or a
/// status push.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use clima_link::Device;
/// use clima_link::device::ReconcileTiming;
/// use clima_link::protocol::HttpConfig;
/// use clima_link::schedule::{ScheduleEntry, StaticSchedule};
/// use clima_link::types::{TimeOfDay, WeekdaySet};
///
/// # fn example() -> clima_link::Result<()> {
/// let schedule = StaticSchedule::new().with_slot(
///     1,
///     ScheduleEntry {
///         weekdays: WeekdaySet::ALL,
///         on_time: TimeOfDay::new(7, 0).unwrap(),
///         off_time: TimeOfDay::new(22, 30).unwrap(),
///     },
/// );
///
/// let device = Device::http(HttpConfig::new("192.168.1.50"))
///     .with_timing(ReconcileTiming::default().with_direct_deadline(Duration::from_secs(20)))
///     .with_schedule(schedule)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct DeviceBuilder<T: Transport> {
    transport: Result<Option<T>, Error>,
    timing: ReconcileTiming,
    schedule: Arc<dyn ScheduleProvider>,
}

impl<T: Transport> DeviceBuilder<T> {
    pub(crate) fn new(transport: Result<Option<T>, Error>) -> Self {
        Self {
            transport,
            timing: ReconcileTiming::default(),
            schedule: Arc::new(StaticSchedule::new()),
        }
    }

    /// Sets the timing parameters.
    #[must_use]
    pub fn with_timing(mut self, timing: ReconcileTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Sets the provider consulted when a schedule timer is selected.
    #[must_use]
    pub fn with_schedule(mut self, schedule: impl ScheduleProvider + 'static) -> Self {
        self.schedule = Arc::new(schedule);
        self
    }

    /// Sets a schedule provider shared with other sessions.
    #[must_use]
    pub fn with_shared_schedule(mut self, schedule: Arc<dyn ScheduleProvider>) -> Self {
        self.schedule = schedule;
        self
    }

    /// Returns the timing that will be used.
    #[must_use]
    pub fn timing(&self) -> ReconcileTiming {
        self.timing
    }

    /// Builds the session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the transport configuration or
    /// the timing is invalid, or [`Error::Protocol`] if the HTTP client
    /// cannot be created.
    pub fn build(self) -> Result<Device<T>, Error> {
        let transport = self.transport?;
        self.timing.validate()?;
        Ok(Device::from_parts(transport, self.timing, self.schedule))
    }
}

impl<T: Transport> std::fmt::Debug for DeviceBuilder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBuilder")
            .field("transport_ok", &self.transport.is_ok())
            .field("timing", &self.timing)
            .finish_non_exhaustive()
    }
}
