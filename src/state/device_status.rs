// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state aggregate.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::schedule::ScheduleProvider;
use crate::types::{CommandInput, SettingValue, TimerType};

use super::element::{CommandAcceptance, Element, WireContext};
use super::{SettingKind, StateChange};

/// Settings keyed by kind, as handed to collaborators.
pub type Snapshot = BTreeMap<SettingKind, SettingValue>;

/// Full tracked state of one air conditioner.
///
/// Holds one [`Element`] per [`SettingKind`]. Created once per session and
/// mutated in place by every decoded status and every accepted command.
///
/// # Examples
///
/// ```
/// use clima_link::schedule::StaticSchedule;
/// use clima_link::state::{DeviceStatus, SettingKind};
///
/// let mut status = DeviceStatus::new();
/// status
///     .handle_command(SettingKind::Power, &true.into(), &StaticSchedule::new())
///     .unwrap();
/// assert!(status.has_pending_updates());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStatus {
    elements: Vec<Element>,
}

impl Default for DeviceStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceStatus {
    /// Creates a status with every setting unknown.
    #[must_use]
    pub fn new() -> Self {
        Self {
            elements: SettingKind::ALL.into_iter().map(Element::new).collect(),
        }
    }

    /// Returns the cell for `kind`.
    #[must_use]
    pub fn get(&self, kind: SettingKind) -> &Element {
        &self.elements[kind as usize]
    }

    pub(crate) fn get_mut(&mut self, kind: SettingKind) -> &mut Element {
        &mut self.elements[kind as usize]
    }

    /// Iterates over every cell.
    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter()
    }

    /// Current display value of `kind`.
    #[must_use]
    pub fn value(&self, kind: SettingKind) -> Option<SettingValue> {
        self.get(kind).value()
    }

    /// Effective timer selection: the pending one, else the confirmed one.
    #[must_use]
    pub fn active_timer(&self) -> Option<TimerType> {
        match self.value(SettingKind::ActiveTimer) {
            Some(SettingValue::Timer(timer)) => Some(timer),
            _ => None,
        }
    }

    /// Wire context for encoding at the current wall-clock time.
    #[must_use]
    pub fn wire_context(&self) -> WireContext {
        WireContext::now(self.active_timer())
    }

    /// Cells with a pending command, ordered by write index.
    #[must_use]
    pub fn items_with_pending_updates(&self) -> Vec<&Element> {
        let mut items: Vec<&Element> = self.elements.iter().filter(|e| e.has_pending()).collect();
        items.sort_by_key(|e| e.kind().write_index());
        items
    }

    /// Returns `true` if any command is in flight, deferred ones included.
    #[must_use]
    pub fn has_pending_updates(&self) -> bool {
        self.elements.iter().any(Element::has_pending)
    }

    /// Settings whose commands are transmittable and still unconfirmed.
    #[must_use]
    pub fn awaiting_confirmation(&self) -> Vec<SettingKind> {
        let active = self.active_timer();
        self.items_with_pending_updates()
            .into_iter()
            .filter(|e| e.awaits_confirmation(active))
            .map(Element::kind)
            .collect()
    }

    /// Returns `true` if at least one command may go out on the wire.
    #[must_use]
    pub fn has_transmittable_updates(&self) -> bool {
        let active = self.active_timer();
        self.elements.iter().any(|e| e.awaits_confirmation(active))
    }

    /// Applies a command from the host.
    ///
    /// Selecting a schedule timer also programs the shared weekday/on/off
    /// slots from `schedule`. Returns the display changes caused by the
    /// command.
    ///
    /// # Errors
    ///
    /// - [`Error::ReadOnly`] if the setting cannot be written
    /// - [`Error::Value`] if the input does not fit the setting
    /// - [`Error::CommandRejected`] if the setting declined it
    pub fn handle_command(
        &mut self,
        kind: SettingKind,
        input: &CommandInput,
        schedule: &dyn ScheduleProvider,
    ) -> Result<Vec<StateChange>> {
        self.handle_command_at(kind, input, schedule, Instant::now())
    }

    pub(crate) fn handle_command_at(
        &mut self,
        kind: SettingKind,
        input: &CommandInput,
        schedule: &dyn ScheduleProvider,
        now: Instant,
    ) -> Result<Vec<StateChange>> {
        let access = kind.access();
        if !access.can_write() {
            return Err(Error::ReadOnly(kind));
        }

        let mut changes = Vec::new();
        self.issue(kind, input, access.can_read(), now, &mut changes)?;

        if kind == SettingKind::ActiveTimer
            && let Some(slot) = self.active_timer().and_then(TimerType::schedule_slot)
        {
            match schedule.schedule(slot) {
                Some(entry) => {
                    let synthetic = [
                        (SettingKind::TimerWeekdays, CommandInput::from(entry.weekdays)),
                        (SettingKind::TimerOnTime, CommandInput::from(entry.on_time)),
                        (SettingKind::TimerOffTime, CommandInput::from(entry.off_time)),
                    ];
                    for (field, value) in synthetic {
                        match self.issue(field, &value, true, now, &mut changes) {
                            Ok(()) | Err(Error::CommandRejected { .. }) => {}
                            Err(e) => warn!(kind = %field, error = %e, "Schedule slot not programmed"),
                        }
                    }
                }
                None => debug!(slot, "No schedule configured for slot"),
            }
        }

        self.refresh_deferrals();
        Ok(changes)
    }

    fn issue(
        &mut self,
        kind: SettingKind,
        input: &CommandInput,
        requires_confirmation: bool,
        now: Instant,
        changes: &mut Vec<StateChange>,
    ) -> Result<()> {
        let active = self.active_timer();
        let element = self.get_mut(kind);
        let before = element.value();
        match element.handle_command(input, requires_confirmation, active, now)? {
            CommandAcceptance::Accepted { .. } => {
                let after = element.value();
                if after != before {
                    changes.push(StateChange::new(kind, after));
                }
                Ok(())
            }
            CommandAcceptance::Rejected(reason) => Err(Error::CommandRejected {
                kind,
                reason: reason.to_string(),
            }),
        }
    }

    /// Re-evaluates which pending commands are withheld by the timer
    /// selection.
    pub fn refresh_deferrals(&mut self) {
        let active = self.active_timer();
        for element in &mut self.elements {
            element.refresh_deferral(active);
        }
    }

    /// Marks every transmittable pending command as sent.
    ///
    /// Returns the settings marked.
    pub fn mark_sent(&mut self) -> Vec<SettingKind> {
        let active = self.active_timer();
        self.elements
            .iter_mut()
            .filter_map(|e| e.mark_sent(active).then(|| e.kind()))
            .collect()
    }

    /// Grants amnesty to sent, non-confirmable commands older than
    /// `amnesty`.
    ///
    /// Returns the settings whose commands expired.
    pub fn expire(&mut self, now: Instant, amnesty: Duration) -> Vec<SettingKind> {
        self.elements
            .iter_mut()
            .filter_map(|e| e.expire(now, amnesty).then(|| e.kind()))
            .collect()
    }

    /// Aborts transmittable commands that are still unconfirmed.
    ///
    /// Deferred commands stay staged. Returns the display changes caused by
    /// the rollback and the settings that were aborted.
    pub fn abort_unconfirmed(&mut self) -> (Vec<StateChange>, Vec<SettingKind>) {
        let active = self.active_timer();
        self.abort_where(|e| e.awaits_confirmation(active))
    }

    /// Aborts every pending command, deferred ones included.
    pub fn abort_all(&mut self) -> (Vec<StateChange>, Vec<SettingKind>) {
        self.abort_where(Element::has_pending)
    }

    fn abort_where(
        &mut self,
        predicate: impl Fn(&Element) -> bool,
    ) -> (Vec<StateChange>, Vec<SettingKind>) {
        let targets: Vec<SettingKind> = self
            .items_with_pending_updates()
            .into_iter()
            .filter(|&e| predicate(e))
            .map(Element::kind)
            .collect();

        let mut changes = Vec::new();
        for &kind in &targets {
            let element = self.get_mut(kind);
            let before = element.value();
            element.abort();
            let after = element.value();
            if after != before {
                changes.push(StateChange::new(kind, after));
            }
        }
        self.refresh_deferrals();
        (changes, targets)
    }

    /// Display values of every known setting.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.elements
            .iter()
            .filter_map(|e| e.value().map(|v| (e.kind(), v)))
            .collect()
    }
}
