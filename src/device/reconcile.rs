// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reconciliation cycle and periodic refresh.
//!
//! A cycle runs until every transmittable command is confirmed or the
//! deadline of the delivery mode passes. Direct sessions retransmit the
//! encoded command string and poll for confirmation. Push-only sessions
//! wait for the proxy to carry the commands out and bring a status back.
//!
//! Only one cycle runs per session. A newer cycle cancels the running one
//! without rolling anything back, so pending commands carry over.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::protocol::{HmiRequest, Transport};
use crate::state::CommandOutcome;

use super::Inner;

pub(super) async fn run_cycle<T: Transport>(
    inner: Arc<Inner<T>>,
    id: u64,
    token: CancellationToken,
) {
    let outcome = tokio::select! {
        biased;
        () = token.cancelled() => None,
        outcome = drive(&inner, id) => Some(outcome),
    };
    inner.finish_cycle(id);

    match outcome {
        Some(outcome) => {
            debug!(cycle = id, ?outcome, "Reconciliation finished");
            inner.publish(id, outcome);
        }
        None if inner.session.is_cancelled() => {
            debug!(cycle = id, "Reconciliation cancelled by disposal");
        }
        None => debug!(cycle = id, "Reconciliation superseded"),
    }
}

async fn drive<T: Transport>(inner: &Inner<T>, id: u64) -> CommandOutcome {
    let timing = inner.timing;
    if !timing.debounce().is_zero() {
        tokio::time::sleep(timing.debounce()).await;
    }

    let start = Instant::now();
    let deadline = start + timing.deadline(inner.mode);
    let mut next_send = start;
    let mut next_poll = start + timing.poll_interval();
    debug!(cycle = id, mode = ?inner.mode, "Reconciliation started");

    loop {
        if inner.settle(timing.command_amnesty()) {
            return CommandOutcome::Confirmed;
        }
        if Instant::now() >= deadline {
            break;
        }

        let Some(transport) = inner.transport.as_ref() else {
            let wake = (Instant::now() + timing.poll_interval()).min(deadline);
            tokio::select! {
                () = tokio::time::sleep_until(wake) => {}
                () = inner.ingested.notified() => {}
            }
            continue;
        };

        if Instant::now() >= next_send {
            if let Some(hmi) = inner.take_injection() {
                debug!(cycle = id, hmi = %hmi, "Transmitting command");
                match transport.exchange(&HmiRequest::Command(hmi)).await {
                    Ok(echo) => inner.apply_echo(&echo),
                    Err(e) => inner.record_failure(&e),
                }
            }
            next_send = Instant::now() + timing.resend_interval();
            if inner.settle(timing.command_amnesty()) {
                return CommandOutcome::Confirmed;
            }
        }

        if Instant::now() >= next_poll {
            if let Err(e) = inner.poll_once(transport).await {
                debug!(cycle = id, error = %e, "Confirmation poll failed");
            }
            next_poll = Instant::now() + timing.poll_interval();
            continue;
        }

        tokio::time::sleep_until(next_send.min(next_poll).min(deadline)).await;
    }

    give_up(inner, id)
}

fn give_up<T: Transport>(inner: &Inner<T>, id: u64) -> CommandOutcome {
    // Sent write-only commands cannot be confirmed; the deadline ends their wait.
    if inner.settle(Duration::ZERO) {
        return CommandOutcome::Confirmed;
    }

    let (changes, failed) = inner.status.lock().abort_unconfirmed();
    inner.callbacks.dispatch_all(&changes);
    if failed.is_empty() {
        return CommandOutcome::Confirmed;
    }
    warn!(cycle = id, ?failed, "Commands not confirmed before deadline, rolled back");
    inner.callbacks.dispatch_command_failed(&failed);
    CommandOutcome::Failed(failed)
}

pub(super) async fn refresh_loop<T: Transport>(inner: Arc<Inner<T>>) {
    let mut ticker = tokio::time::interval(inner.timing.refresh_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(
        interval_ms = u64::try_from(inner.timing.refresh_interval().as_millis()).unwrap_or(u64::MAX),
        "Refresh task running"
    );

    loop {
        tokio::select! {
            () = inner.session.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(transport) = inner.transport.as_ref() else {
            inner.check_push_staleness();
            continue;
        };
        if inner.cycle_running() {
            continue;
        }
        tokio::select! {
            () = inner.session.cancelled() => break,
            result = inner.poll_once(transport) => {
                if let Err(e) = result {
                    debug!(error = %e, "Periodic refresh failed");
                }
            }
        }
    }
    debug!("Refresh task stopped");
}
