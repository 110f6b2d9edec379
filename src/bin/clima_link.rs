// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `clima-link`: runs a device session and, optionally, the interception
//! proxy. State changes are printed to stdout as JSON lines.

use std::net::IpAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use clima_link::device::{DeviceBuilder, ReconcileTiming};
use clima_link::intercept::{InterceptionProxy, ProxyConfig, server};
use clima_link::protocol::{HttpConfig, Transport};
use clima_link::schedule::{ScheduleEntry, StaticSchedule};
use clima_link::subscription::Subscribable;
use clima_link::{Device, ProtocolError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Local control of HMI-protocol air conditioners.
#[derive(Parser, Debug)]
#[command(name = "clima-link", version, about, long_about = None)]
struct Args {
    /// Host of a unit reachable on the local network (direct mode).
    /// Without it the session is push-only and relies on the proxy.
    #[arg(long, env = "CLIMA_DEVICE_HOST")]
    device_host: Option<String>,

    /// Port of the unit's web server
    #[arg(long, env = "CLIMA_DEVICE_PORT", default_value_t = HttpConfig::DEFAULT_PORT)]
    device_port: u16,

    /// Port for the interception proxy; the proxy is disabled without it
    #[arg(long, env = "CLIMA_LISTEN_PORT")]
    listen_port: Option<u16>,

    /// Address for the interception proxy
    #[arg(long, env = "CLIMA_LISTEN_ADDRESS", default_value = "0.0.0.0")]
    listen_address: IpAddr,

    /// Vendor cloud base URL to forward intercepted requests to
    #[arg(long, env = "CLIMA_UPSTREAM")]
    upstream: Option<String>,

    /// Only ingest status pushes from this CPU_ID
    #[arg(long, env = "CLIMA_DEVICE_ID")]
    device_id: Option<String>,

    /// Cloud user expected in status pushes
    #[arg(long, env = "CLIMA_CLOUD_USER", requires = "cloud_password")]
    cloud_user: Option<String>,

    /// Cloud password expected (as MD5) in status pushes
    #[arg(long, env = "CLIMA_CLOUD_PASSWORD", requires = "cloud_user")]
    cloud_password: Option<String>,

    /// Weekly schedule, e.g. `1=mon,tue,wed,thu,fri@07:00-22:30` (repeatable)
    #[arg(long = "schedule", value_parser = parse_schedule)]
    schedules: Vec<(u8, ScheduleEntry)>,

    /// Seconds between periodic refreshes
    #[arg(long, env = "CLIMA_REFRESH_SECS", default_value_t = 15)]
    refresh_secs: u64,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn initialize_logging(&self) {
        let filter = if self.debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }

    fn configure<T: Transport>(&self, builder: DeviceBuilder<T>) -> DeviceBuilder<T> {
        let schedule = self
            .schedules
            .iter()
            .fold(StaticSchedule::new(), |schedule, (slot, entry)| {
                schedule.with_slot(*slot, *entry)
            });
        builder
            .with_timing(
                ReconcileTiming::default()
                    .with_refresh_interval(Duration::from_secs(self.refresh_secs)),
            )
            .with_schedule(schedule)
    }

    fn proxy_config(&self, port: u16) -> ProxyConfig {
        let mut config = ProxyConfig::new(port).with_listen_address(self.listen_address);
        if let Some(upstream) = &self.upstream {
            config = config.with_upstream(upstream.clone());
        }
        if let Some(id) = &self.device_id {
            config = config.with_device_id(id.clone());
        }
        if let (Some(user), Some(password)) = (&self.cloud_user, &self.cloud_password) {
            config = config.with_credentials(user.clone(), password.clone());
        }
        config
    }
}

fn parse_schedule(raw: &str) -> Result<(u8, ScheduleEntry), String> {
    let usage = || format!("expected SLOT=DAYS@HH:MM-HH:MM, got {raw:?}");
    let (slot, rest) = raw.split_once('=').ok_or_else(usage)?;
    let (days, times) = rest.split_once('@').ok_or_else(usage)?;
    let (on, off) = times.split_once('-').ok_or_else(usage)?;

    let slot: u8 = slot.trim().parse().map_err(|_| usage())?;
    if !(1..=3).contains(&slot) {
        return Err(format!("schedule slot must be 1-3, got {slot}"));
    }
    Ok((
        slot,
        ScheduleEntry {
            weekdays: days.parse().map_err(|e| format!("{e}"))?,
            on_time: on.parse().map_err(|e| format!("{e}"))?,
            off_time: off.parse().map_err(|e| format!("{e}"))?,
        },
    ))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    args.initialize_logging();

    let result = match &args.device_host {
        Some(host) => {
            let config = HttpConfig::new(host.clone()).with_port(args.device_port);
            run(args.configure(Device::http(config)), &args).await
        }
        None => run(args.configure(Device::push_only()), &args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "clima-link failed");
            ExitCode::FAILURE
        }
    }
}

async fn run<T: Transport>(builder: DeviceBuilder<T>, args: &Args) -> clima_link::Result<()> {
    let device = builder.build()?;

    device.on_state_changed(|change| match serde_json::to_string(change) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!(error = %e, "Cannot serialize state change"),
    });
    device.on_reachability_changed(|reachable| info!(reachable, "Reachability changed"));
    device.on_command_failed(|settings| warn!(?settings, "Command rolled back"));
    device.start();

    let shutdown = CancellationToken::new();
    let mut proxy_task = match args.listen_port {
        Some(port) => {
            let proxy =
                InterceptionProxy::from_config(args.proxy_config(port), Arc::new(device.clone()))?;
            Some(tokio::spawn(server::serve(Arc::new(proxy), shutdown.clone())))
        }
        None => None,
    };

    info!(mode = ?device.mode(), "clima-link running, press Ctrl-C to stop");
    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "Cannot listen for Ctrl-C");
            }
            Ok(())
        }
        result = wait_for(proxy_task.as_mut()) => result,
    };

    info!("Shutting down");
    shutdown.cancel();
    device.dispose();
    if let Some(task) = proxy_task
        && !task.is_finished()
    {
        let _ = task.await;
    }
    outcome
}

async fn wait_for(task: Option<&mut JoinHandle<clima_link::Result<()>>>) -> clima_link::Result<()> {
    match task {
        Some(task) => match task.await {
            Ok(result) => result,
            Err(e) => Err(ProtocolError::ConnectionFailed(format!("proxy task failed: {e}")).into()),
        },
        None => std::future::pending().await,
    }
}
