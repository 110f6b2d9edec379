// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use super::*;
use crate::schedule::{ScheduleEntry, StaticSchedule};
use crate::types::{OperationMode, TimeOfDay, WeekdaySet};

const SAMPLE: &str = "215,243,1,1,3,0,0,0,1,0,0,1,0,30,N,N,N,N,N,N,62,420,1320,105,0,70,\
                      N,N,N,N,N,N,N,N,N,N,N,N,N";

/// Simulated unit: copies every non-sentinel command field into its status
/// and answers each request with the full status.
struct FakeUnit {
    state: Mutex<Vec<String>>,
    applies: AtomicBool,
    online: AtomicBool,
    commands: Mutex<Vec<String>>,
}

#[derive(Clone)]
struct FakeTransport(Arc<FakeUnit>);

impl FakeTransport {
    fn new(applies: bool) -> Self {
        Self(Arc::new(FakeUnit {
            state: Mutex::new(SAMPLE.split(',').map(str::to_string).collect()),
            applies: AtomicBool::new(applies),
            online: AtomicBool::new(true),
            commands: Mutex::new(Vec::new()),
        }))
    }

    fn commands(&self) -> Vec<String> {
        self.0.commands.lock().clone()
    }
}

impl Transport for FakeTransport {
    async fn exchange(&self, request: &HmiRequest) -> std::result::Result<String, ProtocolError> {
        let unit = &self.0;
        if !unit.online.load(Ordering::SeqCst) {
            return Err(ProtocolError::Timeout(5000));
        }
        if let HmiRequest::Command(hmi) = request {
            unit.commands.lock().push(hmi.clone());
            if unit.applies.load(Ordering::SeqCst) {
                let mut state = unit.state.lock();
                for (index, field) in hmi.split(',').enumerate() {
                    // clock fields and the reset trigger are not echoed
                    if field != "N" && !matches!(index, 18 | 19 | 23) {
                        state[index] = field.to_string();
                    }
                }
            }
        }
        Ok(unit.state.lock().join(","))
    }
}

async fn connected(applies: bool) -> (FakeTransport, Device<FakeTransport>) {
    let transport = FakeTransport::new(applies);
    let device = Device::with_transport(transport.clone()).build().unwrap();
    device.refresh().await.unwrap();
    (transport, device)
}

#[tokio::test(start_paused = true)]
async fn command_confirmed_by_echo() {
    let (transport, device) = connected(true).await;
    assert_eq!(device.value(SettingKind::Power), Some(SettingValue::Switch(true)));

    device.send_command(SettingKind::Power, false).await.unwrap();

    assert_eq!(device.value(SettingKind::Power), Some(SettingValue::Switch(false)));
    assert!(!device.status().has_pending_updates());
    let commands = transport.commands();
    assert_eq!(commands.len(), 1);
    let fields: Vec<&str> = commands[0].split(',').collect();
    assert_eq!(fields.len(), 36);
    assert_eq!(fields[2], "0");
    assert_eq!(fields[3], "N");
}

#[tokio::test(start_paused = true)]
async fn unconfirmed_command_is_rolled_back() {
    let (transport, device) = connected(false).await;
    let failed = Arc::new(Mutex::new(Vec::new()));
    let failed_clone = failed.clone();
    device.on_command_failed(move |settings| failed_clone.lock().extend_from_slice(settings));

    let result = device.send_command(SettingKind::Mode, "warm").await;

    match result {
        Err(Error::CommandFailed { settings }) => assert_eq!(settings, vec![SettingKind::Mode]),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(
        device.value(SettingKind::Mode),
        Some(SettingValue::Mode(OperationMode::Cool))
    );
    assert_eq!(*failed.lock(), vec![SettingKind::Mode]);
    assert!(transport.commands().len() >= 2, "command should be retransmitted");
}

#[tokio::test(start_paused = true)]
async fn write_only_command_succeeds_at_deadline() {
    let (transport, device) = connected(false).await;

    device.send_command(SettingKind::FactoryReset, true).await.unwrap();

    assert!(!device.status().has_pending_updates());
    assert!(!transport.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn rapid_commands_share_one_transmission() {
    let (transport, device) = connected(true).await;

    let (light, eco) = tokio::join!(
        device.send_command(SettingKind::Light, false),
        device.send_command(SettingKind::EcoMode, false),
    );
    light.unwrap();
    eco.unwrap();

    let commands = transport.commands();
    assert_eq!(commands.len(), 1);
    let fields: Vec<&str> = commands[0].split(',').collect();
    assert_eq!((fields[8], fields[11]), ("0", "0"));
}

#[tokio::test(start_paused = true)]
async fn dispose_cancels_and_rolls_back() {
    let (_transport, device) = connected(false).await;
    let before = device.value(SettingKind::FanLevel);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    device.on_state_changed(move |change| sink.lock().push(change.clone()));

    let pending = device.clone();
    let task =
        tokio::spawn(async move { pending.send_command(SettingKind::FanLevel, "level_5").await });
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_ne!(device.value(SettingKind::FanLevel), before);

    device.dispose();

    assert!(matches!(task.await.unwrap(), Err(Error::Cancelled)));
    assert_eq!(device.value(SettingKind::FanLevel), before);
    assert_eq!(
        seen.lock().last(),
        Some(&StateChange::new(SettingKind::FanLevel, before.clone()))
    );
    assert!(device.inner.callbacks.is_empty());
    assert!(device.is_disposed());
    assert!(matches!(
        device.send_command(SettingKind::Power, false).await,
        Err(Error::Cancelled)
    ));
}

#[tokio::test(start_paused = true)]
async fn rejected_commands_never_reach_the_unit() {
    let (transport, device) = connected(true).await;

    assert!(matches!(
        device.send_command(SettingKind::Power, true).await,
        Err(Error::CommandRejected { .. })
    ));
    assert!(matches!(
        device.send_command(SettingKind::ActualTemperature, 20.0).await,
        Err(Error::ReadOnly(SettingKind::ActualTemperature))
    ));
    assert!(matches!(
        device.send_command(SettingKind::Mode, "sauna").await,
        Err(Error::Value(_))
    ));
    assert!(transport.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn reachability_follows_consecutive_failures() {
    let transport = FakeTransport::new(true);
    let device = Device::with_transport(transport.clone()).build().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    device.on_reachability_changed(move |reachable| seen_clone.lock().push(reachable));

    device.refresh().await.unwrap();
    assert!(device.is_reachable());

    transport.0.online.store(false, Ordering::SeqCst);
    for _ in 0..2 {
        assert!(device.refresh().await.is_err());
    }
    assert!(device.is_reachable());
    assert!(device.refresh().await.is_err());
    assert!(!device.is_reachable());

    transport.0.online.store(true, Ordering::SeqCst);
    device.refresh().await.unwrap();
    assert_eq!(*seen.lock(), vec![true, false, true]);
}

#[tokio::test(start_paused = true)]
async fn refresh_task_polls_until_disposed() {
    let transport = FakeTransport::new(true);
    let device = Device::with_transport(transport).build().unwrap();
    assert!(device.snapshot().is_empty());

    device.start();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(
        device.value(SettingKind::EcoPowerLimit),
        Some(SettingValue::Number(70))
    );

    device.dispose();
    assert!(matches!(device.refresh().await, Err(Error::Cancelled)));
}

#[tokio::test(start_paused = true)]
async fn schedule_timer_programs_slots() {
    let entry = ScheduleEntry {
        weekdays: WeekdaySet::from_bits(31),
        on_time: TimeOfDay::new(6, 30).unwrap(),
        off_time: TimeOfDay::new(8, 0).unwrap(),
    };
    let transport = FakeTransport::new(true);
    let device = Device::with_transport(transport.clone())
        .with_schedule(StaticSchedule::new().with_slot(1, entry))
        .build()
        .unwrap();
    device.refresh().await.unwrap();

    device
        .send_command(SettingKind::ActiveTimer, "schedule_timer_1")
        .await
        .unwrap();

    let commands = transport.commands();
    let fields: Vec<&str> = commands[0].split(',').collect();
    assert_eq!(&fields[12..14], &["2", "N"]);
    assert_eq!(&fields[20..23], &["31", "390", "480"]);
    assert_eq!(
        device.value(SettingKind::TimerOnTime),
        Some(SettingValue::Time(entry.on_time))
    );
}

#[tokio::test(start_paused = true)]
async fn push_only_command_rides_on_status_push() {
    let device = Device::push_only().build().unwrap();
    device.ingest(SAMPLE).unwrap();
    assert!(device.is_reachable());
    assert!(device.take_pending_command().is_none());

    let pending = device.clone();
    let task = tokio::spawn(async move { pending.send_command(SettingKind::Light, false).await });
    tokio::time::sleep(Duration::from_millis(500)).await;

    let hmi = device.take_pending_command().unwrap();
    assert_eq!(hmi.split(',').nth(11), Some("0"));

    let mut fields: Vec<&str> = SAMPLE.split(',').collect();
    fields[11] = "0";
    device.ingest(&fields.join(",")).unwrap();

    task.await.unwrap().unwrap();
    assert_eq!(device.value(SettingKind::Light), Some(SettingValue::Switch(false)));
}

#[tokio::test(start_paused = true)]
async fn push_only_command_fails_without_pushes() {
    let device = Device::push_only()
        .with_timing(ReconcileTiming::default().with_push_deadline(Duration::from_secs(5)))
        .build()
        .unwrap();
    device.ingest(SAMPLE).unwrap();

    let result = device.send_command(SettingKind::Light, false).await;

    assert!(matches!(result, Err(Error::CommandFailed { .. })));
    assert_eq!(device.value(SettingKind::Light), Some(SettingValue::Switch(true)));
}

#[test]
fn push_only_transport_refuses_exchanges() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let result = runtime.block_on(PushOnly.exchange(&HmiRequest::Poll));
    assert!(matches!(result, Err(ProtocolError::ConnectionFailed(_))));
}
