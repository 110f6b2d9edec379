// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `clima_link` - protocol engine for HMI-protocol air conditioners.
//!
//! The units speak a positional, comma-separated "HMI" string: 39 fields
//! when reporting status, 36 fields when receiving commands. This library
//! keeps a typed model of the unit's settings, drives commands until the
//! unit confirms them and, for units that only talk to the vendor cloud,
//! intercepts that traffic to read status and deliver commands.
//!
//! # Supported Features
//!
//! - **Typed settings**: power, mode, fan and flap levels, temperatures,
//!   timers and weekly schedules, with range checks and clamping
//! - **Reconciliation**: optimistic updates, retransmission, confirmation
//!   by echo, rollback on deadline
//! - **Direct mode**: polling over the unit's local HTTP server
//! - **Push-only mode**: status and commands carried by the cloud protocol
//!   through the [`intercept`] proxy
//! - **Events**: callbacks on value, reachability and command failure
//!
//! # Quick Start
//!
//! ## Direct Mode
//!
//! ```no_run
//! use clima_link::Device;
//! use clima_link::protocol::HttpConfig;
//! use clima_link::state::SettingKind;
//! use clima_link::subscription::Subscribable;
//!
//! #[tokio::main]
//! async fn main() -> clima_link::Result<()> {
//!     let device = Device::http(HttpConfig::new("192.168.1.50")).build()?;
//!     device.on_state_changed(|change| println!("{change}"));
//!     device.start();
//!
//!     device.send_command(SettingKind::Mode, "cool").await?;
//!     device.send_command(SettingKind::TargetTemperature, 23.7).await?;
//!
//!     device.dispose();
//!     Ok(())
//! }
//! ```
//!
//! ## Push-only Mode
//!
//! ```no_run
//! use std::sync::Arc;
//! use clima_link::Device;
//! use clima_link::intercept::{InterceptionProxy, ProxyConfig, server};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> clima_link::Result<()> {
//!     let device = Device::push_only().build()?;
//!     device.start();
//!
//!     let config = ProxyConfig::new(80).with_upstream("http://cloud.example.com");
//!     let proxy = InterceptionProxy::from_config(config, Arc::new(device.clone()))?;
//!     server::serve(Arc::new(proxy), CancellationToken::new()).await
//! }
//! ```

pub mod device;
pub mod error;
pub mod intercept;
pub mod protocol;
pub mod schedule;
pub mod state;
pub mod subscription;
pub mod types;

pub use device::{DeliveryMode, Device, DeviceBuilder, PushOnly, ReconcileTiming};
pub use error::{ConfigError, Error, ProtocolError, Result, ValueError};
#[cfg(feature = "http")]
pub use protocol::HttpConfig;
pub use state::{DeviceStatus, SettingKind, StateChange};
pub use subscription::{Subscribable, SubscriptionId};
pub use types::{CommandInput, SettingValue};
