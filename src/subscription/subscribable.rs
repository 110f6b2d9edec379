// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscribable trait for sessions that report events.

use crate::state::{SettingKind, StateChange};
use crate::subscription::SubscriptionId;

/// Trait for types that support event subscriptions.
///
/// # Examples
///
/// ```no_run
/// use clima_link::Device;
/// use clima_link::protocol::HttpConfig;
/// use clima_link::subscription::Subscribable;
///
/// # fn example() -> clima_link::Result<()> {
/// let device = Device::http(HttpConfig::new("192.168.1.50")).build()?;
///
/// let sub_id = device.on_state_changed(|change| {
///     println!("{change}");
/// });
/// device.on_reachability_changed(|reachable| {
///     println!("reachable: {reachable}");
/// });
///
/// device.unsubscribe(sub_id);
/// # Ok(())
/// # }
/// ```
pub trait Subscribable {
    /// Subscribes to display value changes.
    ///
    /// Called for device reports, accepted commands and rollbacks alike.
    fn on_state_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&StateChange) + Send + Sync + 'static;

    /// Subscribes to reachability changes.
    fn on_reachability_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(bool) + Send + Sync + 'static;

    /// Subscribes to commands that were given up and rolled back.
    fn on_command_failed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&[SettingKind]) + Send + Sync + 'static;

    /// Unsubscribes a callback by its subscription ID.
    ///
    /// Returns `true` if the subscription was found and removed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}
