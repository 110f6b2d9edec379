// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device session.
//!
//! A [`Device`] owns the [`DeviceStatus`] of one air conditioner and drives
//! commands to completion.
//!
//! # Delivery modes
//!
//! ## Direct
//!
//! The unit is reachable on the local network. Commands are transmitted
//! with `GET /?HMI=...&UPD=1` and confirmed by polling.
//!
//! ```no_run
//! use clima_link::Device;
//! use clima_link::protocol::HttpConfig;
//! use clima_link::state::SettingKind;
//!
//! # async fn example() -> clima_link::Result<()> {
//! let device = Device::http(HttpConfig::new("192.168.1.50")).build()?;
//! device.start();
//!
//! device.send_command(SettingKind::Power, true).await?;
//! device.send_command(SettingKind::TargetTemperature, 22.5).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Push-only
//!
//! The unit only talks to the vendor cloud. Status arrives through the
//! interception proxy, and commands ride back on the replies to the unit's
//! status pushes.
//!
//! ```no_run
//! use clima_link::Device;
//! use clima_link::state::SettingKind;
//!
//! # async fn example() -> clima_link::Result<()> {
//! let device = Device::push_only().build()?;
//! // hand `device.clone()` to an InterceptionProxy, then:
//! device.send_command(SettingKind::Mode, "cool").await?;
//! # Ok(())
//! # }
//! ```

mod builder;
mod reconcile;
mod timing;

pub use builder::DeviceBuilder;
pub use timing::{DeliveryMode, ReconcileTiming};

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, ProtocolError, Result};
use crate::protocol::hmi::{self, ApplyReport};
use crate::protocol::{HmiRequest, Transport};
#[cfg(feature = "http")]
use crate::protocol::{HttpClient, HttpConfig};
use crate::schedule::ScheduleProvider;
use crate::state::{CommandOutcome, DeviceStatus, SettingKind, Snapshot, StateChange};
use crate::subscription::{CallbackRegistry, Subscribable, SubscriptionId};
use crate::types::{CommandInput, SettingValue};

/// Transport placeholder for sessions without a direct connection.
///
/// Every exchange fails; push-only sessions never call it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PushOnly;

impl Transport for PushOnly {
    async fn exchange(&self, _request: &HmiRequest) -> std::result::Result<String, ProtocolError> {
        Err(ProtocolError::ConnectionFailed(
            "session has no direct connection".to_string(),
        ))
    }
}

#[derive(Debug, Default)]
struct CycleSlot {
    last_id: u64,
    running: Option<(u64, CancellationToken)>,
}

#[derive(Debug, Default)]
struct Reachability {
    reachable: bool,
    failures: u32,
    last_seen: Option<Instant>,
}

pub(crate) struct Inner<T> {
    transport: Option<T>,
    mode: DeliveryMode,
    timing: ReconcileTiming,
    schedule: Arc<dyn ScheduleProvider>,
    status: Mutex<DeviceStatus>,
    callbacks: CallbackRegistry,
    session: CancellationToken,
    cycle: Mutex<CycleSlot>,
    outcomes: watch::Sender<Option<(u64, CommandOutcome)>>,
    reach: Mutex<Reachability>,
    ingested: Notify,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Transport> Inner<T> {
    fn apply_status(&self, raw: &str) -> std::result::Result<ApplyReport, ProtocolError> {
        let report = {
            let mut status = self.status.lock();
            hmi::ingest(
                raw,
                &mut status,
                Instant::now().into_std(),
                self.timing.command_amnesty(),
            )?
        };
        self.callbacks.dispatch_all(&report.changes);
        self.record_success();
        self.ingested.notify_waiters();
        Ok(report)
    }

    fn apply_echo(&self, body: &str) {
        match hmi::decode(body) {
            Ok(_) => {
                if let Err(e) = self.apply_status(body) {
                    warn!(error = %e, "Command echo not applied");
                }
            }
            Err(e) => {
                debug!(error = %e, "Command echo carries no status");
                self.record_success();
            }
        }
    }

    async fn poll_once(&self, transport: &T) -> Result<ApplyReport> {
        match transport.exchange(&HmiRequest::Poll).await {
            Ok(body) => Ok(self.apply_status(&body)?),
            Err(e) => {
                self.record_failure(&e);
                Err(e.into())
            }
        }
    }

    fn record_success(&self) {
        let became_reachable = {
            let mut reach = self.reach.lock();
            reach.failures = 0;
            reach.last_seen = Some(Instant::now());
            !std::mem::replace(&mut reach.reachable, true)
        };
        if became_reachable {
            info!("Device reachable");
            self.callbacks.dispatch_reachability(true);
        }
    }

    fn record_failure(&self, error: &ProtocolError) {
        let became_unreachable = {
            let mut reach = self.reach.lock();
            reach.failures = reach.failures.saturating_add(1);
            let exhausted = reach.failures >= self.timing.unreachable_after();
            debug!(failures = reach.failures, error = %error, "Device exchange failed");
            exhausted && std::mem::replace(&mut reach.reachable, false)
        };
        if became_unreachable {
            warn!(error = %error, "Device unreachable");
            self.callbacks.dispatch_reachability(false);
        }
    }

    fn check_push_staleness(&self) {
        let became_unreachable = {
            let mut reach = self.reach.lock();
            let stale = reach
                .last_seen
                .is_some_and(|seen| seen.elapsed() > self.timing.deadline(DeliveryMode::PushOnly));
            stale && std::mem::replace(&mut reach.reachable, false)
        };
        if became_unreachable {
            warn!("No status push received; device unreachable");
            self.callbacks.dispatch_reachability(false);
        }
    }

    fn take_injection(&self) -> Option<String> {
        if self.session.is_cancelled() {
            return None;
        }
        let mut status = self.status.lock();
        if !status.has_transmittable_updates() {
            return None;
        }
        let hmi = hmi::encode(&status);
        let sent = status.mark_sent();
        debug!(?sent, "Command string handed out");
        Some(hmi)
    }

    /// Expires stale commands; returns `true` once nothing awaits confirmation.
    fn settle(&self, amnesty: Duration) -> bool {
        let (changes, settled) = {
            let mut status = self.status.lock();
            let expired = status.expire(Instant::now().into_std(), amnesty);
            let changes: Vec<StateChange> = expired
                .iter()
                .map(|&kind| StateChange::new(kind, status.value(kind)))
                .collect();
            if !expired.is_empty() {
                debug!(?expired, "Granted command amnesty");
            }
            (changes, status.awaiting_confirmation().is_empty())
        };
        self.callbacks.dispatch_all(&changes);
        settled
    }

    fn publish(&self, id: u64, outcome: CommandOutcome) {
        self.outcomes.send_replace(Some((id, outcome)));
    }

    fn finish_cycle(&self, id: u64) {
        let mut slot = self.cycle.lock();
        if slot.running.as_ref().is_some_and(|(running, _)| *running == id) {
            slot.running = None;
        }
    }

    fn cycle_running(&self) -> bool {
        self.cycle.lock().running.is_some()
    }
}

/// A session with one air conditioner.
///
/// Cloning is cheap; every clone refers to the same session.
pub struct Device<T: Transport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> Clone for Device<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> std::fmt::Debug for Device<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("mode", &self.inner.mode)
            .field("reachable", &self.is_reachable())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "http")]
impl Device<HttpClient> {
    /// Creates a builder for a unit reachable over HTTP.
    ///
    /// The configuration is validated when the builder is built.
    #[must_use]
    pub fn http(config: HttpConfig) -> DeviceBuilder<HttpClient> {
        let transport = config
            .validate()
            .map_err(Error::from)
            .and_then(|()| config.into_client().map_err(Error::from))
            .map(Some);
        DeviceBuilder::new(transport)
    }
}

impl Device<PushOnly> {
    /// Creates a builder for a unit reached only through the interception
    /// proxy.
    #[must_use]
    pub fn push_only() -> DeviceBuilder<PushOnly> {
        DeviceBuilder::new(Ok(None))
    }
}

impl<T: Transport> Device<T> {
    /// Creates a builder for a unit reached through a custom transport.
    #[must_use]
    pub fn with_transport(transport: T) -> DeviceBuilder<T> {
        DeviceBuilder::new(Ok(Some(transport)))
    }

    pub(crate) fn from_parts(
        transport: Option<T>,
        timing: ReconcileTiming,
        schedule: Arc<dyn ScheduleProvider>,
    ) -> Self {
        let mode = if transport.is_some() {
            DeliveryMode::Direct
        } else {
            DeliveryMode::PushOnly
        };
        let (outcomes, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                transport,
                mode,
                timing,
                schedule,
                status: Mutex::new(DeviceStatus::new()),
                callbacks: CallbackRegistry::new(),
                session: CancellationToken::new(),
                cycle: Mutex::new(CycleSlot::default()),
                outcomes,
                reach: Mutex::new(Reachability::default()),
                ingested: Notify::new(),
                refresh_task: Mutex::new(None),
            }),
        }
    }

    /// How commands reach the unit.
    #[must_use]
    pub fn mode(&self) -> DeliveryMode {
        self.inner.mode
    }

    /// Timing parameters of this session.
    #[must_use]
    pub fn timing(&self) -> ReconcileTiming {
        self.inner.timing
    }

    /// Display values of every known setting.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.inner.status.lock().snapshot()
    }

    /// Display value of one setting.
    #[must_use]
    pub fn value(&self, kind: SettingKind) -> Option<SettingValue> {
        self.inner.status.lock().value(kind)
    }

    /// Copy of the full state, pending commands included.
    #[must_use]
    pub fn status(&self) -> DeviceStatus {
        self.inner.status.lock().clone()
    }

    /// Returns `true` while the unit answers (direct) or pushes (push-only).
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        self.inner.reach.lock().reachable
    }

    /// Returns `true` once [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.session.is_cancelled()
    }

    /// Issues a command and waits for the reconciliation cycle covering it.
    ///
    /// Rapid successive commands share one cycle; a newer command supersedes
    /// the running cycle, which hands its pending commands over.
    ///
    /// # Errors
    ///
    /// - [`Error::ReadOnly`], [`Error::Value`] or [`Error::CommandRejected`]
    ///   if the command is not accepted
    /// - [`Error::CommandFailed`] if the unit did not confirm before the
    ///   deadline; the listed settings have been rolled back
    /// - [`Error::Cancelled`] if the session is disposed
    pub async fn send_command(
        &self,
        kind: SettingKind,
        value: impl Into<CommandInput>,
    ) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::Cancelled);
        }
        let input = value.into();
        let changes = {
            let mut status = self.inner.status.lock();
            status.handle_command_at(
                kind,
                &input,
                self.inner.schedule.as_ref(),
                Instant::now().into_std(),
            )?
        };
        self.inner.callbacks.dispatch_all(&changes);

        let mut outcomes = self.inner.outcomes.subscribe();
        let id = self.trigger();
        self.await_outcome(&mut outcomes, id, kind).await
    }

    fn trigger(&self) -> u64 {
        let (id, token) = {
            let mut slot = self.inner.cycle.lock();
            slot.last_id += 1;
            let id = slot.last_id;
            let token = self.inner.session.child_token();
            if let Some((previous, old)) = slot.running.replace((id, token.clone())) {
                debug!(previous, cycle = id, "Superseding reconciliation cycle");
                old.cancel();
            }
            (id, token)
        };
        tokio::spawn(reconcile::run_cycle(Arc::clone(&self.inner), id, token));
        id
    }

    async fn await_outcome(
        &self,
        outcomes: &mut watch::Receiver<Option<(u64, CommandOutcome)>>,
        id: u64,
        kind: SettingKind,
    ) -> Result<()> {
        loop {
            let latest = outcomes.borrow_and_update().clone();
            if let Some((seen, outcome)) = latest
                && seen >= id
            {
                return match outcome {
                    CommandOutcome::Failed(settings) if settings.contains(&kind) => {
                        Err(Error::CommandFailed { settings })
                    }
                    CommandOutcome::Confirmed | CommandOutcome::Failed(_) => Ok(()),
                    CommandOutcome::Cancelled => Err(Error::Cancelled),
                };
            }
            tokio::select! {
                changed = outcomes.changed() => {
                    if changed.is_err() {
                        return Err(Error::Cancelled);
                    }
                }
                () = self.inner.session.cancelled() => return Err(Error::Cancelled),
            }
        }
    }

    /// Polls the unit once and applies the status, without retries.
    ///
    /// Push-only sessions have nothing to poll and return immediately.
    ///
    /// # Errors
    ///
    /// Returns the transport or decode error of the poll, or
    /// [`Error::Cancelled`] if the session is disposed.
    pub async fn refresh(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::Cancelled);
        }
        let Some(transport) = self.inner.transport.as_ref() else {
            debug!("Push-only session; state arrives with the next status push");
            return Ok(());
        };
        tokio::select! {
            () = self.inner.session.cancelled() => Err(Error::Cancelled),
            result = self.inner.poll_once(transport) => result.map(|_| ()),
        }
    }

    /// Starts the periodic refresh task. Calling it again has no effect.
    ///
    /// Must be called within a Tokio runtime.
    pub fn start(&self) {
        let mut task = self.inner.refresh_task.lock();
        if task.is_some() || self.is_disposed() {
            return;
        }
        *task = Some(tokio::spawn(reconcile::refresh_loop(Arc::clone(&self.inner))));
        info!(mode = ?self.inner.mode, "Session started");
    }

    /// Ends the session.
    ///
    /// Cancels the refresh task, any running reconciliation cycle and any
    /// request in flight, and rolls back every pending command. Subscribers
    /// see the rollback and are then dropped.
    pub fn dispose(&self) {
        if self.is_disposed() {
            return;
        }
        self.inner.session.cancel();
        if let Some(task) = self.inner.refresh_task.lock().take() {
            task.abort();
        }

        let (changes, aborted) = self.inner.status.lock().abort_all();
        self.inner.callbacks.dispatch_all(&changes);
        if !aborted.is_empty() {
            info!(?aborted, "Rolled back pending commands");
        }

        let last = self.inner.cycle.lock().last_id;
        self.inner.publish(last, CommandOutcome::Cancelled);
        self.inner.callbacks.clear();
        info!("Session disposed");
    }

    /// Applies a status string that arrived outside of a poll (a status
    /// push seen by the interception proxy).
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedStatus`] if the field count is
    /// wrong.
    pub fn ingest(&self, raw: &str) -> std::result::Result<ApplyReport, ProtocolError> {
        self.inner.apply_status(raw)
    }

    /// Encodes the pending commands for delivery by another path and marks
    /// them as sent.
    ///
    /// Returns `None` when nothing is waiting to be transmitted.
    #[must_use]
    pub fn take_pending_command(&self) -> Option<String> {
        self.inner.take_injection()
    }

    /// Returns `true` if commands are waiting to be transmitted.
    #[must_use]
    pub fn has_pending_command(&self) -> bool {
        self.inner.status.lock().has_transmittable_updates()
    }
}

impl<T: Transport> Subscribable for Device<T> {
    fn on_state_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        self.inner.callbacks.on_state_changed(callback)
    }

    fn on_reachability_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.inner.callbacks.on_reachability_changed(callback)
    }

    fn on_command_failed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&[SettingKind]) + Send + Sync + 'static,
    {
        self.inner.callbacks.on_command_failed(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.callbacks.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests;
