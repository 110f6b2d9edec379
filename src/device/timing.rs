// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Timing parameters of the reconciliation loop.

use std::time::Duration;

use crate::error::ConfigError;

/// How commands reach the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryMode {
    /// The unit is polled and commanded over its local HTTP server.
    Direct,
    /// The unit is only reached through the interception proxy, which
    /// injects commands into the replies to the unit's own status pushes.
    PushOnly,
}

/// Durations that bound every retrying path of a session.
///
/// # Examples
///
/// ```
/// use clima_link::device::{DeliveryMode, ReconcileTiming};
/// use std::time::Duration;
///
/// let timing = ReconcileTiming::default().with_direct_deadline(Duration::from_secs(20));
/// assert_eq!(timing.deadline(DeliveryMode::Direct), Duration::from_secs(20));
/// assert_eq!(timing.deadline(DeliveryMode::PushOnly), Duration::from_secs(150));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileTiming {
    debounce: Duration,
    resend_interval: Duration,
    poll_interval: Duration,
    direct_deadline: Duration,
    push_deadline: Duration,
    command_amnesty: Duration,
    refresh_interval: Duration,
    unreachable_after: u32,
}

impl Default for ReconcileTiming {
    fn default() -> Self {
        Self {
            debounce: Self::DEFAULT_DEBOUNCE,
            resend_interval: Self::DEFAULT_RESEND_INTERVAL,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            direct_deadline: Self::DEFAULT_DIRECT_DEADLINE,
            push_deadline: Self::DEFAULT_PUSH_DEADLINE,
            command_amnesty: Self::DEFAULT_COMMAND_AMNESTY,
            refresh_interval: Self::DEFAULT_REFRESH_INTERVAL,
            unreachable_after: Self::DEFAULT_UNREACHABLE_AFTER,
        }
    }
}

impl ReconcileTiming {
    /// Default coalescing window for rapid successive commands.
    pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);
    /// Default interval between command retransmissions.
    pub const DEFAULT_RESEND_INTERVAL: Duration = Duration::from_secs(2);
    /// Default interval between confirmation polls.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
    /// Default overall deadline in direct mode.
    pub const DEFAULT_DIRECT_DEADLINE: Duration = Duration::from_secs(10);
    /// Default overall deadline in push-only mode.
    pub const DEFAULT_PUSH_DEADLINE: Duration = Duration::from_secs(150);
    /// Default age after which a sent, non-confirmable command counts as applied.
    pub const DEFAULT_COMMAND_AMNESTY: Duration = Duration::from_secs(60);
    /// Default interval of the periodic refresh task.
    pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(15);
    /// Default number of consecutive failures before the unit counts as unreachable.
    pub const DEFAULT_UNREACHABLE_AFTER: u32 = 3;

    /// Sets the debounce window.
    #[must_use]
    pub fn with_debounce(mut self, value: Duration) -> Self {
        self.debounce = value;
        self
    }

    /// Sets the resend interval.
    #[must_use]
    pub fn with_resend_interval(mut self, value: Duration) -> Self {
        self.resend_interval = value;
        self
    }

    /// Sets the confirmation poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, value: Duration) -> Self {
        self.poll_interval = value;
        self
    }

    /// Sets the deadline used in direct mode.
    #[must_use]
    pub fn with_direct_deadline(mut self, value: Duration) -> Self {
        self.direct_deadline = value;
        self
    }

    /// Sets the deadline used in push-only mode.
    #[must_use]
    pub fn with_push_deadline(mut self, value: Duration) -> Self {
        self.push_deadline = value;
        self
    }

    /// Sets the amnesty period for non-confirmable commands.
    #[must_use]
    pub fn with_command_amnesty(mut self, value: Duration) -> Self {
        self.command_amnesty = value;
        self
    }

    /// Sets the periodic refresh interval.
    #[must_use]
    pub fn with_refresh_interval(mut self, value: Duration) -> Self {
        self.refresh_interval = value;
        self
    }

    /// Sets how many consecutive failures mark the unit unreachable.
    #[must_use]
    pub fn with_unreachable_after(mut self, failures: u32) -> Self {
        self.unreachable_after = failures;
        self
    }

    /// Debounce window.
    #[must_use]
    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Resend interval.
    #[must_use]
    pub fn resend_interval(&self) -> Duration {
        self.resend_interval
    }

    /// Confirmation poll interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Amnesty period for non-confirmable commands.
    #[must_use]
    pub fn command_amnesty(&self) -> Duration {
        self.command_amnesty
    }

    /// Periodic refresh interval.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Consecutive failures before the unit counts as unreachable.
    #[must_use]
    pub fn unreachable_after(&self) -> u32 {
        self.unreachable_after
    }

    /// Overall deadline of one reconciliation cycle in `mode`.
    #[must_use]
    pub fn deadline(&self, mode: DeliveryMode) -> Duration {
        match mode {
            DeliveryMode::Direct => self.direct_deadline,
            DeliveryMode::PushOnly => self.push_deadline,
        }
    }

    /// Checks that every retrying path is bounded.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDuration`] naming the first zero
    /// interval or deadline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("resend_interval", self.resend_interval),
            ("poll_interval", self.poll_interval),
            ("direct_deadline", self.direct_deadline),
            ("push_deadline", self.push_deadline),
            ("refresh_interval", self.refresh_interval),
        ];
        if let Some((name, _)) = checks.iter().find(|(_, d)| d.is_zero()) {
            return Err(ConfigError::InvalidDuration(name));
        }
        if self.unreachable_after == 0 {
            return Err(ConfigError::InvalidDuration("unreachable_after"));
        }
        Ok(())
    }
}
