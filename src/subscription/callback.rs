// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callback storage for session events.
//!
//! A [`CallbackRegistry`] keeps three independent callback tables (value
//! changes, reachability and command failures) keyed by [`SubscriptionId`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::state::{SettingKind, StateChange};

/// Unique identifier for a subscription.
///
/// This ID is returned when creating a subscription and can be used to
/// unsubscribe later. IDs are unique within a session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Creates a new subscription ID with the given value.
    #[must_use]
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

/// Type alias for state change callbacks.
type StateChangedCallback = Arc<dyn Fn(&StateChange) + Send + Sync>;

/// Type alias for reachability callbacks.
type ReachabilityCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Type alias for command failure callbacks.
type CommandFailedCallback = Arc<dyn Fn(&[SettingKind]) + Send + Sync>;

/// Registry for managing session subscription callbacks.
///
/// Uses `parking_lot::RwLock` for interior mutability. Callbacks are cloned
/// out of the registry before being invoked, so a callback may itself
/// subscribe or unsubscribe.
pub struct CallbackRegistry {
    /// Counter for generating unique subscription IDs.
    next_id: AtomicU64,
    /// Display value change callbacks.
    state_changed_callbacks: RwLock<HashMap<SubscriptionId, StateChangedCallback>>,
    /// Reachability change callbacks.
    reachability_callbacks: RwLock<HashMap<SubscriptionId, ReachabilityCallback>>,
    /// Command failure callbacks.
    command_failed_callbacks: RwLock<HashMap<SubscriptionId, CommandFailedCallback>>,
}

impl CallbackRegistry {
    /// Creates a new empty callback registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            state_changed_callbacks: RwLock::new(HashMap::new()),
            reachability_callbacks: RwLock::new(HashMap::new()),
            command_failed_callbacks: RwLock::new(HashMap::new()),
        }
    }

    /// Generates a new unique subscription ID.
    fn next_id(&self) -> SubscriptionId {
        SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    // =========================================================================
    // Registration methods
    // =========================================================================

    /// Registers a callback for display value changes.
    pub fn on_state_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.state_changed_callbacks
            .write()
            .insert(id, Arc::new(callback));
        id
    }

    /// Registers a callback for reachability changes.
    ///
    /// The callback receives `true` when the device becomes reachable.
    pub fn on_reachability_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.reachability_callbacks
            .write()
            .insert(id, Arc::new(callback));
        id
    }

    /// Registers a callback for commands that were rolled back.
    pub fn on_command_failed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&[SettingKind]) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.command_failed_callbacks
            .write()
            .insert(id, Arc::new(callback));
        id
    }

    // =========================================================================
    // Unsubscription
    // =========================================================================

    /// Unregisters a callback by its subscription ID.
    ///
    /// Returns `true` if a callback was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.state_changed_callbacks.write().remove(&id).is_some()
            || self.reachability_callbacks.write().remove(&id).is_some()
            || self.command_failed_callbacks.write().remove(&id).is_some()
    }

    /// Clears all callbacks.
    pub fn clear(&self) {
        self.state_changed_callbacks.write().clear();
        self.reachability_callbacks.write().clear();
        self.command_failed_callbacks.write().clear();
    }

    // =========================================================================
    // Dispatch methods
    // =========================================================================

    /// Dispatches a state change to every state callback.
    pub fn dispatch(&self, change: &StateChange) {
        let callbacks: Vec<_> = self.state_changed_callbacks.read().values().cloned().collect();
        for callback in callbacks {
            callback(change);
        }
    }

    /// Dispatches a batch of state changes in order.
    pub fn dispatch_all(&self, changes: &[StateChange]) {
        for change in changes {
            self.dispatch(change);
        }
    }

    /// Dispatches a reachability change.
    pub fn dispatch_reachability(&self, reachable: bool) {
        let callbacks: Vec<_> = self.reachability_callbacks.read().values().cloned().collect();
        for callback in callbacks {
            callback(reachable);
        }
    }

    /// Dispatches a command failure.
    pub fn dispatch_command_failed(&self, settings: &[SettingKind]) {
        let callbacks: Vec<_> = self
            .command_failed_callbacks
            .read()
            .values()
            .cloned()
            .collect();
        for callback in callbacks {
            callback(settings);
        }
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Returns the total number of registered callbacks.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.state_changed_callbacks.read().len()
            + self.reachability_callbacks.read().len()
            + self.command_failed_callbacks.read().len()
    }

    /// Returns `true` if there are no registered callbacks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callback_count() == 0
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("callback_count", &self.callback_count())
            .finish()
    }
}
