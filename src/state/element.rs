// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-setting value cell.
//!
//! An [`Element`] holds the last value confirmed by the device for one
//! setting, plus at most one in-flight [`PendingCommand`]. The display value
//! is the pending command's expected value while one exists and the confirmed
//! value otherwise, so a rollback is simply dropping the pending command.
//!
//! # Command lifecycle
//!
//! ```text
//! Idle --handle_command--> Issued --matching echo------> Confirmed
//!                            |---amnesty elapsed-------> Expired
//!                            `---abort-----------------> Aborted
//! ```

use std::time::{Duration, Instant};

use chrono::{DateTime, Datelike, Utc};
use tracing::{debug, info};

use crate::error::{ProtocolError, ValueError};
use crate::types::{
    CommandInput, FanLevel, FlapLevel, OperationMode, SettingValue, Temperature,
    TemperatureUnit, TimeOfDay, TimerType, Weekday, WeekdaySet, WireEnum,
};

use super::setting::{AccessMode, SENTINEL, SettingKind};

/// Lowest accepted target temperature.
pub const TEMPERATURE_MIN: Temperature = Temperature::from_tenths(100);

/// Highest accepted target temperature.
pub const TEMPERATURE_MAX: Temperature = Temperature::from_tenths(320);

/// Granularity of the delay timer, in minutes.
pub const DELAY_STEP_MINUTES: i64 = 10;

/// Which enumeration an [`ElementVariant::Enum`] cell holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumDomain {
    /// [`OperationMode`].
    Mode,
    /// [`FanLevel`].
    Fan,
    /// [`FlapLevel`].
    Flap,
    /// [`TemperatureUnit`].
    Unit,
}

/// Encoding and command rules of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementVariant {
    /// `0`/`1` switch.
    OnOff,
    /// Member of a small enumeration, sent as its code.
    Enum(EnumDomain),
    /// Integer clamped into `[min, max]`.
    Range {
        /// Lower bound.
        min: i64,
        /// Upper bound.
        max: i64,
    },
    /// Temperature in tenths, clamped into `[min, max]`.
    Temperature {
        /// Lower bound for commands.
        min: Temperature,
        /// Upper bound for commands.
        max: Temperature,
    },
    /// Minute of the day.
    TimeOfDay,
    /// Weekday bitmask.
    WeekdayMask,
    /// Raw firmware string, shown with a leading zero.
    FirmwareString,
    /// Minutes rounded to `step`, clamped into `[min, max]`.
    DelayMinutes {
        /// Lower bound.
        min: i64,
        /// Upper bound.
        max: i64,
        /// Rounding step.
        step: i64,
    },
    /// Wall-clock time of day, computed at transmission.
    CurrentTime,
    /// Wall-clock weekday index, computed at transmission.
    CurrentWeekday,
    /// Timer selector.
    ActiveTimer,
}

impl ElementVariant {
    /// Returns the variant used for `kind`.
    #[must_use]
    pub const fn for_kind(kind: SettingKind) -> Self {
        match kind {
            SettingKind::TargetTemperature | SettingKind::ActualTemperature => Self::Temperature {
                min: TEMPERATURE_MIN,
                max: TEMPERATURE_MAX,
            },
            SettingKind::Power
            | SettingKind::IFeel
            | SettingKind::FilterMode
            | SettingKind::EcoMode
            | SettingKind::TurboMode
            | SettingKind::NightMode
            | SettingKind::Light
            | SettingKind::FactoryReset => Self::OnOff,
            SettingKind::Mode => Self::Enum(EnumDomain::Mode),
            SettingKind::FanLevel => Self::Enum(EnumDomain::Fan),
            SettingKind::FlapLevel => Self::Enum(EnumDomain::Flap),
            SettingKind::DisplayUnit => Self::Enum(EnumDomain::Unit),
            SettingKind::ActiveTimer => Self::ActiveTimer,
            SettingKind::DelayTimer => Self::DelayMinutes {
                min: 10,
                max: 1190,
                step: DELAY_STEP_MINUTES,
            },
            SettingKind::CurrentTime => Self::CurrentTime,
            SettingKind::CurrentWeekday => Self::CurrentWeekday,
            SettingKind::TimerWeekdays => Self::WeekdayMask,
            SettingKind::TimerOnTime | SettingKind::TimerOffTime => Self::TimeOfDay,
            SettingKind::FirmwareVersion => Self::FirmwareString,
            SettingKind::EcoPowerLimit => Self::Range { min: 30, max: 99 },
        }
    }

    /// Returns `true` for cells whose wire value comes from the clock.
    #[must_use]
    pub const fn is_computed(self) -> bool {
        matches!(self, Self::CurrentTime | Self::CurrentWeekday)
    }

    /// Decodes a raw field into its display value.
    ///
    /// Returns `None` when the text is not valid for this variant.
    #[must_use]
    pub fn decode(self, raw: &str) -> Option<SettingValue> {
        match self {
            Self::OnOff => match raw {
                "0" => Some(SettingValue::Switch(false)),
                "1" => Some(SettingValue::Switch(true)),
                _ => None,
            },
            Self::Enum(EnumDomain::Mode) => OperationMode::from_wire(raw).map(SettingValue::Mode),
            Self::Enum(EnumDomain::Fan) => FanLevel::from_wire(raw).map(SettingValue::Fan),
            Self::Enum(EnumDomain::Flap) => FlapLevel::from_wire(raw).map(SettingValue::Flap),
            Self::Enum(EnumDomain::Unit) => {
                TemperatureUnit::from_wire(raw).map(SettingValue::Unit)
            }
            Self::ActiveTimer => TimerType::from_wire(raw).map(SettingValue::Timer),
            Self::Range { .. } | Self::DelayMinutes { .. } => {
                raw.parse::<i64>().ok().map(SettingValue::Number)
            }
            Self::Temperature { .. } => Temperature::from_wire(raw).map(SettingValue::Temperature),
            Self::TimeOfDay | Self::CurrentTime => TimeOfDay::from_wire(raw).map(SettingValue::Time),
            Self::WeekdayMask => WeekdaySet::from_wire(raw).map(SettingValue::Weekdays),
            Self::CurrentWeekday => raw
                .parse::<u8>()
                .ok()
                .and_then(|i| Weekday::ALL.into_iter().find(|d| d.index() == i))
                .map(SettingValue::Weekday),
            Self::FirmwareString => (!raw.is_empty()).then(|| SettingValue::Text(format!("0{raw}"))),
        }
    }

    /// Encodes a typed value into its wire text.
    #[must_use]
    pub fn encode(self, value: &SettingValue) -> Option<String> {
        match (self, value) {
            (Self::OnOff, SettingValue::Switch(on)) => Some(if *on { "1" } else { "0" }.into()),
            (Self::Enum(EnumDomain::Mode), SettingValue::Mode(m)) => Some(m.code().to_string()),
            (Self::Enum(EnumDomain::Fan), SettingValue::Fan(f)) => Some(f.code().to_string()),
            (Self::Enum(EnumDomain::Flap), SettingValue::Flap(f)) => Some(f.code().to_string()),
            (Self::Enum(EnumDomain::Unit), SettingValue::Unit(u)) => Some(u.code().to_string()),
            (Self::ActiveTimer, SettingValue::Timer(t)) => Some(t.code().to_string()),
            (Self::Range { .. } | Self::DelayMinutes { .. }, SettingValue::Number(n)) => {
                Some(n.to_string())
            }
            (Self::Temperature { .. }, SettingValue::Temperature(t)) => Some(t.to_wire()),
            (Self::TimeOfDay | Self::CurrentTime, SettingValue::Time(t)) => Some(t.to_wire()),
            (Self::WeekdayMask, SettingValue::Weekdays(w)) => Some(w.to_wire()),
            (Self::CurrentWeekday, SettingValue::Weekday(d)) => Some(d.index().to_string()),
            _ => None,
        }
    }

    /// Type-checks a command input and returns the value to request.
    ///
    /// Ranges and temperatures clamp out-of-bounds input instead of failing.
    /// `current` is the cell's current display value, used by the delay
    /// timer's step rounding.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError`] if the input has the wrong shape or is not a
    /// member of the setting's enumeration.
    pub fn parse_command(
        self,
        kind: SettingKind,
        input: &CommandInput,
        current: Option<&SettingValue>,
    ) -> Result<SettingValue, ValueError> {
        match self {
            Self::OnOff => parse_switch(input).map(SettingValue::Switch),
            Self::Enum(EnumDomain::Mode) => parse_enum(input, |v| match v {
                SettingValue::Mode(m) => Some(*m),
                _ => None,
            })
            .map(SettingValue::Mode),
            Self::Enum(EnumDomain::Fan) => parse_enum(input, |v| match v {
                SettingValue::Fan(f) => Some(*f),
                _ => None,
            })
            .map(SettingValue::Fan),
            Self::Enum(EnumDomain::Flap) => parse_enum(input, |v| match v {
                SettingValue::Flap(f) => Some(*f),
                _ => None,
            })
            .map(SettingValue::Flap),
            Self::Enum(EnumDomain::Unit) => parse_enum(input, |v| match v {
                SettingValue::Unit(u) => Some(*u),
                _ => None,
            })
            .map(SettingValue::Unit),
            Self::ActiveTimer => parse_enum(input, |v| match v {
                SettingValue::Timer(t) => Some(*t),
                _ => None,
            })
            .map(SettingValue::Timer),
            Self::Range { min, max } => {
                let requested = parse_integer(input)?;
                let clamped = requested.clamp(min, max);
                if clamped != requested {
                    info!(%kind, requested, clamped, "Clamped command value");
                }
                Ok(SettingValue::Number(clamped))
            }
            Self::Temperature { min, max } => {
                let requested = parse_temperature(input)?;
                let clamped = requested.clamp(min, max);
                if clamped != requested {
                    info!(%kind, %requested, %clamped, "Clamped temperature command");
                }
                Ok(SettingValue::Temperature(clamped))
            }
            Self::DelayMinutes { min, max, step } => {
                let requested = parse_integer(input)?;
                let current = match current {
                    Some(SettingValue::Number(n)) => Some(*n),
                    _ => None,
                };
                Ok(SettingValue::Number(step_minutes(
                    requested, current, min, max, step,
                )))
            }
            Self::TimeOfDay => parse_time(input).map(SettingValue::Time),
            Self::WeekdayMask => parse_weekdays(input).map(SettingValue::Weekdays),
            Self::FirmwareString | Self::CurrentTime | Self::CurrentWeekday => {
                Err(ValueError::WrongType {
                    expected: "no command",
                    actual: input.describe(),
                })
            }
        }
    }
}

/// Rounds `requested` to the nearest `step`, moving at least one step away
/// from `current` whenever the request differs from it.
fn step_minutes(requested: i64, current: Option<i64>, min: i64, max: i64, step: i64) -> i64 {
    let requested = requested.clamp(min.saturating_sub(step), max.saturating_add(step));
    let mut rounded = (requested + step / 2).div_euclid(step) * step;
    if let Some(current) = current
        && rounded == current
        && requested != current
    {
        rounded = if requested > current {
            current.saturating_add(step)
        } else {
            current.saturating_sub(step)
        };
    }
    rounded.clamp(min, max)
}

fn parse_switch(input: &CommandInput) -> Result<bool, ValueError> {
    match input {
        CommandInput::Switch(on) | CommandInput::Typed(SettingValue::Switch(on)) => Ok(*on),
        CommandInput::Number(n) if *n == 0.0 => Ok(false),
        CommandInput::Number(n) if *n == 1.0 => Ok(true),
        CommandInput::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "on" | "1" | "true" => Ok(true),
            "off" | "0" | "false" => Ok(false),
            _ => Err(ValueError::NotAMember {
                domain: "switch state",
                value: s.clone(),
            }),
        },
        other => Err(ValueError::WrongType {
            expected: "on/off",
            actual: other.describe(),
        }),
    }
}

fn parse_enum<E: WireEnum>(
    input: &CommandInput,
    extract: impl Fn(&SettingValue) -> Option<E>,
) -> Result<E, ValueError> {
    match input {
        CommandInput::Typed(value) => extract(value).ok_or_else(|| ValueError::WrongType {
            expected: E::DOMAIN,
            actual: input.describe(),
        }),
        CommandInput::Number(n) => {
            let code = (n.fract() == 0.0 && (0.0..=255.0).contains(n))
                .then(|| {
                    // Checked to be an integer in u8 range above
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let code = *n as u8;
                    code
                });
            code.and_then(E::from_code)
                .ok_or_else(|| ValueError::NotAMember {
                    domain: E::DOMAIN,
                    value: n.to_string(),
                })
        }
        CommandInput::Text(s) => E::parse_input(s),
        CommandInput::Switch(_) => Err(ValueError::WrongType {
            expected: E::DOMAIN,
            actual: input.describe(),
        }),
    }
}

fn parse_integer(input: &CommandInput) -> Result<i64, ValueError> {
    let number = match input {
        CommandInput::Number(n) => *n,
        CommandInput::Typed(SettingValue::Number(n)) => return Ok(*n),
        CommandInput::Text(s) => s.trim().parse::<f64>().map_err(|_| ValueError::WrongType {
            expected: "number",
            actual: input.describe(),
        })?,
        other => {
            return Err(ValueError::WrongType {
                expected: "number",
                actual: other.describe(),
            });
        }
    };
    if !number.is_finite() {
        return Err(ValueError::WrongType {
            expected: "finite number",
            actual: input.describe(),
        });
    }
    // Saturating float-to-int cast; callers clamp afterwards
    #[allow(clippy::cast_possible_truncation)]
    let rounded = number.round() as i64;
    Ok(rounded)
}

fn parse_temperature(input: &CommandInput) -> Result<Temperature, ValueError> {
    let celsius = match input {
        CommandInput::Typed(SettingValue::Temperature(t)) => return Ok(*t),
        CommandInput::Number(n) => *n,
        CommandInput::Text(s) => s
            .trim()
            .trim_end_matches("\u{00b0}C")
            .trim()
            .parse::<f64>()
            .map_err(|_| ValueError::WrongType {
                expected: "temperature",
                actual: input.describe(),
            })?,
        other => {
            return Err(ValueError::WrongType {
                expected: "temperature",
                actual: other.describe(),
            });
        }
    };
    if celsius.is_finite() {
        Ok(Temperature::from_celsius(celsius))
    } else {
        Err(ValueError::WrongType {
            expected: "finite temperature",
            actual: input.describe(),
        })
    }
}

fn parse_time(input: &CommandInput) -> Result<TimeOfDay, ValueError> {
    match input {
        CommandInput::Typed(SettingValue::Time(t)) => Ok(*t),
        CommandInput::Text(s) => s.parse(),
        CommandInput::Number(_) => {
            let minutes = parse_integer(input)?;
            u16::try_from(minutes)
                .map_err(|_| ValueError::OutOfRange {
                    min: 0,
                    max: 1439,
                    actual: minutes,
                })
                .and_then(TimeOfDay::from_minutes)
        }
        other => Err(ValueError::WrongType {
            expected: "time of day",
            actual: other.describe(),
        }),
    }
}

fn parse_weekdays(input: &CommandInput) -> Result<WeekdaySet, ValueError> {
    match input {
        CommandInput::Typed(SettingValue::Weekdays(w)) => Ok(*w),
        CommandInput::Text(s) => s.parse(),
        CommandInput::Number(_) => {
            let bits = parse_integer(input)?;
            u8::try_from(bits)
                .ok()
                .filter(|b| WeekdaySet::from_bits(*b).bits() == *b)
                .map(WeekdaySet::from_bits)
                .ok_or(ValueError::OutOfRange {
                    min: 0,
                    max: i64::from(WeekdaySet::ALL.bits()),
                    actual: bits,
                })
        }
        other => Err(ValueError::WrongType {
            expected: "weekday list",
            actual: other.describe(),
        }),
    }
}

/// A command waiting for the device to confirm it.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCommand {
    wire_value: String,
    expected: SettingValue,
    issued_at: Instant,
    requires_confirmation: bool,
    deferred: bool,
    sent: bool,
}

impl PendingCommand {
    /// Wire text the device is expected to echo.
    #[must_use]
    pub fn wire_value(&self) -> &str {
        &self.wire_value
    }

    /// Value shown while the command is in flight.
    #[must_use]
    pub fn expected(&self) -> &SettingValue {
        &self.expected
    }

    /// When the command was accepted.
    #[must_use]
    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }

    /// Whether only a matching device echo may clear this command.
    #[must_use]
    pub fn requires_confirmation(&self) -> bool {
        self.requires_confirmation
    }

    /// Whether transmission is withheld until the active timer matches.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// Whether the command has been transmitted at least once.
    #[must_use]
    pub fn is_sent(&self) -> bool {
        self.sent
    }

    /// Returns `true` once a sent, non-confirmable command has outlived
    /// `amnesty`.
    #[must_use]
    pub fn is_expired(&self, now: Instant, amnesty: Duration) -> bool {
        !self.requires_confirmation
            && self.sent
            && now.saturating_duration_since(self.issued_at) > amnesty
    }
}

/// How a pending command left the in-flight state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandTransition {
    /// The device echoed the expected value.
    Confirmed,
    /// Treated as applied after the amnesty period.
    Expired,
    /// Given up and rolled back.
    Aborted,
}

/// Result of applying one device field to a cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// Display value after the update.
    pub value: Option<SettingValue>,
    /// Pending-command transition caused by the update, if any.
    pub transition: Option<CommandTransition>,
    /// Whether the display value changed.
    pub changed: bool,
}

/// Whether a cell took a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAcceptance {
    /// A pending command was installed.
    Accepted {
        /// Transmission is withheld until the active timer matches.
        deferred: bool,
    },
    /// The cell declined the command.
    Rejected(&'static str),
}

/// Inputs that wire encoding depends on besides the cell itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireContext {
    /// Wall-clock time used for the clock fields.
    pub now: DateTime<Utc>,
    /// Effective active timer (pending selection, else confirmed).
    pub active_timer: Option<TimerType>,
}

impl WireContext {
    /// Context for the current wall-clock time.
    #[must_use]
    pub fn now(active_timer: Option<TimerType>) -> Self {
        Self {
            now: Utc::now(),
            active_timer,
        }
    }
}

/// Value cell for one setting.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    kind: SettingKind,
    variant: ElementVariant,
    access: AccessMode,
    confirmed: Option<String>,
    pending: Option<PendingCommand>,
}

impl Element {
    /// Creates an empty cell for `kind`.
    #[must_use]
    pub const fn new(kind: SettingKind) -> Self {
        Self {
            kind,
            variant: ElementVariant::for_kind(kind),
            access: kind.access(),
            confirmed: None,
            pending: None,
        }
    }

    /// The setting this cell holds.
    #[must_use]
    pub const fn kind(&self) -> SettingKind {
        self.kind
    }

    /// Encoding rules of this cell.
    #[must_use]
    pub const fn variant(&self) -> ElementVariant {
        self.variant
    }

    /// Wire direction(s) of this cell.
    #[must_use]
    pub const fn access(&self) -> AccessMode {
        self.access
    }

    /// The in-flight command, if any.
    #[must_use]
    pub fn pending(&self) -> Option<&PendingCommand> {
        self.pending.as_ref()
    }

    /// Returns `true` while a command is in flight.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Raw text of the last value confirmed by the device.
    #[must_use]
    pub fn confirmed_wire(&self) -> Option<&str> {
        self.confirmed.as_deref()
    }

    /// Last value confirmed by the device.
    #[must_use]
    pub fn confirmed_value(&self) -> Option<SettingValue> {
        self.confirmed
            .as_deref()
            .and_then(|raw| self.variant.decode(raw))
    }

    /// Display value: the pending expectation, else the confirmed value.
    #[must_use]
    pub fn value(&self) -> Option<SettingValue> {
        match &self.pending {
            Some(p) => Some(p.expected.clone()),
            None => self.confirmed_value(),
        }
    }

    fn effective_wire(&self) -> Option<&str> {
        self.pending
            .as_ref()
            .map(|p| p.wire_value.as_str())
            .or(self.confirmed.as_deref())
    }

    /// Returns `true` if this cell may be transmitted under `active_timer`.
    #[must_use]
    pub fn precondition_met(&self, active_timer: Option<TimerType>) -> bool {
        match self.kind {
            SettingKind::DelayTimer => active_timer == Some(TimerType::DelayTimer),
            kind if kind.is_schedule_field() => active_timer.is_some_and(TimerType::is_schedule),
            _ => true,
        }
    }

    /// Returns `true` if a pending command exists but is withheld under
    /// `active_timer`.
    #[must_use]
    pub fn is_deferred(&self, active_timer: Option<TimerType>) -> bool {
        self.pending.is_some() && !self.precondition_met(active_timer)
    }

    /// Returns `true` if a pending command exists and may be transmitted.
    #[must_use]
    pub fn awaits_confirmation(&self, active_timer: Option<TimerType>) -> bool {
        self.pending.is_some() && self.precondition_met(active_timer)
    }

    /// Re-evaluates the deferral flag of the pending command.
    pub fn refresh_deferral(&mut self, active_timer: Option<TimerType>) {
        let deferred = !self.precondition_met(active_timer);
        if let Some(pending) = self.pending.as_mut()
            && pending.deferred != deferred
        {
            debug!(kind = %self.kind, deferred, "Command deferral changed");
            pending.deferred = deferred;
        }
    }

    /// Returns `true` if this cell's wire value goes out every cycle.
    #[must_use]
    pub fn always_sent(&self, ctx: &WireContext) -> bool {
        self.variant.is_computed()
            || (self.kind.is_schedule_field()
                && ctx.active_timer.is_some_and(TimerType::is_schedule))
    }

    /// Returns `true` if this cell contributes to the next command string.
    #[must_use]
    pub fn should_transmit(&self, ctx: &WireContext) -> bool {
        self.access.can_write()
            && (self.awaits_confirmation(ctx.active_timer) || self.always_sent(ctx))
    }

    /// Returns the wire text for the next command string, or the sentinel.
    #[must_use]
    pub fn wire_value_to_send(&self, ctx: &WireContext) -> String {
        if !self.access.can_write() {
            return SENTINEL.to_string();
        }
        match self.variant {
            ElementVariant::CurrentTime => TimeOfDay::from_chrono(&ctx.now).to_wire(),
            ElementVariant::CurrentWeekday => {
                Weekday::from(ctx.now.weekday()).index().to_string()
            }
            _ if self.awaits_confirmation(ctx.active_timer) => self
                .effective_wire()
                .map_or_else(|| SENTINEL.to_string(), str::to_string),
            _ if self.always_sent(ctx) => self
                .confirmed
                .clone()
                .unwrap_or_else(|| SENTINEL.to_string()),
            _ => SENTINEL.to_string(),
        }
    }

    /// Applies the raw field reported by the device.
    ///
    /// A pending command blocks the reported value unless the report matches
    /// it (confirmation) or the command has outlived `amnesty` (expiry). The
    /// sentinel leaves the confirmed value untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::ElementDecode`] if `raw` is not valid for
    /// this cell. The cell keeps its previous state in that case.
    pub fn apply_device_value(
        &mut self,
        raw: &str,
        now: Instant,
        amnesty: Duration,
    ) -> Result<Applied, ProtocolError> {
        let raw = raw.trim();
        let reported = if raw == SENTINEL {
            None
        } else if self.variant.decode(raw).is_some() {
            Some(raw)
        } else {
            return Err(ProtocolError::ElementDecode {
                kind: self.kind,
                raw: raw.to_string(),
            });
        };

        let before = self.value();
        let (adopt, transition) = match &self.pending {
            None => (true, None),
            Some(p) if reported == Some(p.wire_value.as_str()) => {
                (true, Some(CommandTransition::Confirmed))
            }
            Some(p) if p.is_expired(now, amnesty) => (true, Some(CommandTransition::Expired)),
            Some(_) => (false, None),
        };
        if let Some(transition) = transition {
            debug!(kind = %self.kind, raw, ?transition, "Pending command cleared");
            self.pending = None;
        }
        if adopt && let Some(raw) = reported {
            self.confirmed = Some(raw.to_string());
        }

        let value = self.value();
        Ok(Applied {
            changed: value != before,
            value,
            transition,
        })
    }

    /// Type-checks `input` and installs it as the pending command.
    ///
    /// A new command replaces any command already in flight. Readable
    /// settings decline a command that matches their current value.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError`] if `input` does not fit this setting.
    pub fn handle_command(
        &mut self,
        input: &CommandInput,
        requires_confirmation: bool,
        active_timer: Option<TimerType>,
        now: Instant,
    ) -> Result<CommandAcceptance, ValueError> {
        if !self.access.can_write() {
            return Ok(CommandAcceptance::Rejected("setting is read-only"));
        }
        if self.variant.is_computed() {
            return Ok(CommandAcceptance::Rejected("value follows the clock"));
        }

        let current = self.value();
        let expected = self.variant.parse_command(self.kind, input, current.as_ref())?;
        let wire_value = self
            .variant
            .encode(&expected)
            .ok_or_else(|| ValueError::WrongType {
                expected: "encodable value",
                actual: input.describe(),
            })?;

        if self.access.can_read() && self.effective_wire() == Some(wire_value.as_str()) {
            return Ok(CommandAcceptance::Rejected("value unchanged"));
        }

        let deferred = !self.precondition_met(active_timer);
        debug!(kind = %self.kind, wire = %wire_value, deferred, "Command issued");
        self.pending = Some(PendingCommand {
            wire_value,
            expected,
            issued_at: now,
            requires_confirmation,
            deferred,
            sent: false,
        });
        Ok(CommandAcceptance::Accepted { deferred })
    }

    /// Records that the pending command went out on the wire.
    ///
    /// Returns `true` if a transmittable command was marked.
    pub fn mark_sent(&mut self, active_timer: Option<TimerType>) -> bool {
        if !self.awaits_confirmation(active_timer) {
            return false;
        }
        match self.pending.as_mut() {
            Some(pending) => {
                pending.sent = true;
                true
            }
            None => false,
        }
    }

    /// Clears the pending command if it has outlived `amnesty`.
    ///
    /// Returns `true` if the command expired.
    pub fn expire(&mut self, now: Instant, amnesty: Duration) -> bool {
        if self.pending.as_ref().is_some_and(|p| p.is_expired(now, amnesty)) {
            debug!(kind = %self.kind, transition = ?CommandTransition::Expired, "Pending command cleared");
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Drops the pending command, reverting to the confirmed value.
    pub fn abort(&mut self) -> Option<PendingCommand> {
        let aborted = self.pending.take();
        if aborted.is_some() {
            debug!(kind = %self.kind, transition = ?CommandTransition::Aborted, "Pending command cleared");
        }
        aborted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AMNESTY: Duration = Duration::from_secs(60);

    fn ctx(active_timer: Option<TimerType>) -> WireContext {
        WireContext::now(active_timer)
    }

    fn confirmed(kind: SettingKind, raw: &str) -> Element {
        let mut element = Element::new(kind);
        element
            .apply_device_value(raw, Instant::now(), AMNESTY)
            .unwrap();
        element
    }

    #[test]
    fn temperature_command_confirmed_by_matching_echo() {
        let mut element = confirmed(SettingKind::TargetTemperature, "220");
        let now = Instant::now();
        let acc = element
            .handle_command(&CommandInput::Number(23.7), true, None, now)
            .unwrap();
        assert_eq!(acc, CommandAcceptance::Accepted { deferred: false });
        assert_eq!(element.pending().unwrap().wire_value(), "237");

        let applied = element.apply_device_value("230", now, AMNESTY).unwrap();
        assert!(element.has_pending());
        assert_eq!(applied.transition, None);

        let applied = element.apply_device_value("237", now, AMNESTY).unwrap();
        assert_eq!(applied.transition, Some(CommandTransition::Confirmed));
        assert!(!element.has_pending());
        assert_eq!(element.confirmed_wire(), Some("237"));
    }

    #[test]
    fn temperature_out_of_range_is_clamped() {
        let mut element = Element::new(SettingKind::TargetTemperature);
        element
            .handle_command(&CommandInput::Number(45.0), true, None, Instant::now())
            .unwrap();
        assert_eq!(element.pending().unwrap().wire_value(), "320");
        element.abort();
        element
            .handle_command(&"3.5".into(), true, None, Instant::now())
            .unwrap();
        assert_eq!(element.pending().unwrap().wire_value(), "100");
    }

    #[test]
    fn unchanged_value_is_rejected() {
        let mut element = confirmed(SettingKind::Power, "1");
        let acc = element
            .handle_command(&true.into(), true, None, Instant::now())
            .unwrap();
        assert_eq!(acc, CommandAcceptance::Rejected("value unchanged"));
        assert!(!element.has_pending());
    }

    #[test]
    fn new_command_overwrites_pending() {
        let mut element = confirmed(SettingKind::Mode, "1");
        let now = Instant::now();
        element.handle_command(&"warm".into(), true, None, now).unwrap();
        element.handle_command(&"fan".into(), true, None, now).unwrap();
        assert_eq!(element.pending().unwrap().wire_value(), "4");
        assert_eq!(element.value(), Some(SettingValue::Mode(OperationMode::Fan)));
    }

    #[test]
    fn enum_rejects_non_member() {
        let mut element = Element::new(SettingKind::FanLevel);
        let err = element
            .handle_command(&"turbo".into(), true, None, Instant::now())
            .unwrap_err();
        assert!(matches!(err, ValueError::NotAMember { .. }));
        let err = element
            .handle_command(&CommandInput::Number(9.0), true, None, Instant::now())
            .unwrap_err();
        assert!(matches!(err, ValueError::NotAMember { .. }));
    }

    #[test]
    fn delay_minutes_rounds_and_amplifies() {
        assert_eq!(step_minutes(35, Some(30), 10, 1190, 10), 40);
        assert_eq!(step_minutes(33, Some(30), 10, 1190, 10), 40);
        assert_eq!(step_minutes(27, Some(30), 10, 1190, 10), 20);
        assert_eq!(step_minutes(44, None, 10, 1190, 10), 40);
        assert_eq!(step_minutes(5000, Some(30), 10, 1190, 10), 1190);
        assert_eq!(step_minutes(0, None, 10, 1190, 10), 10);
    }

    #[test]
    fn delay_minutes_extremes_are_clamped() {
        assert_eq!(step_minutes(i64::MAX, Some(30), 10, 1190, 10), 1190);
        assert_eq!(step_minutes(i64::MIN, Some(30), 10, 1190, 10), 10);
        assert_eq!(step_minutes(i64::MAX, Some(i64::MAX), 10, 1190, 10), 1190);

        let mut element = Element::new(SettingKind::DelayTimer);
        element
            .handle_command(
                &CommandInput::Number(1e300),
                true,
                Some(TimerType::DelayTimer),
                Instant::now(),
            )
            .unwrap();
        assert_eq!(element.pending().unwrap().wire_value(), "1190");
    }

    #[test]
    fn delay_command_uses_current_value() {
        let mut element = confirmed(SettingKind::DelayTimer, "30");
        element
            .handle_command(
                &CommandInput::Number(35.0),
                true,
                Some(TimerType::DelayTimer),
                Instant::now(),
            )
            .unwrap();
        assert_eq!(element.pending().unwrap().wire_value(), "40");
    }

    #[test]
    fn decode_error_keeps_previous_value() {
        let mut element = confirmed(SettingKind::EcoPowerLimit, "50");
        let err = element
            .apply_device_value("abc", Instant::now(), AMNESTY)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::ElementDecode { kind: SettingKind::EcoPowerLimit, .. }));
        assert_eq!(element.value(), Some(SettingValue::Number(50)));
    }

    #[test]
    fn sentinel_is_absent_not_zero() {
        let mut element = Element::new(SettingKind::Power);
        let applied = element
            .apply_device_value("N", Instant::now(), AMNESTY)
            .unwrap();
        assert_eq!(applied.value, None);
        assert!(!applied.changed);
    }

    #[test]
    fn firmware_is_shown_with_leading_zero() {
        let element = confirmed(SettingKind::FirmwareVersion, "123");
        assert_eq!(element.confirmed_wire(), Some("123"));
        assert_eq!(element.value(), Some(SettingValue::Text("0123".into())));
    }

    #[test]
    fn abort_restores_confirmed_value() {
        let mut element = confirmed(SettingKind::Light, "0");
        element
            .handle_command(&true.into(), true, None, Instant::now())
            .unwrap();
        assert_eq!(element.value(), Some(SettingValue::Switch(true)));
        assert!(element.abort().is_some());
        assert_eq!(element.value(), Some(SettingValue::Switch(false)));
    }

    #[test]
    fn unsent_or_confirmable_commands_never_expire() {
        let start = Instant::now();
        let later = start + Duration::from_secs(120);

        let mut reset = Element::new(SettingKind::FactoryReset);
        reset.handle_command(&true.into(), false, None, start).unwrap();
        assert!(!reset.expire(later, AMNESTY));
        assert!(reset.mark_sent(None));
        assert!(!reset.expire(start + Duration::from_secs(30), AMNESTY));
        assert!(reset.expire(later, AMNESTY));

        let mut power = confirmed(SettingKind::Power, "0");
        power.handle_command(&true.into(), true, None, start).unwrap();
        power.mark_sent(None);
        assert!(!power.expire(later, AMNESTY));
    }

    #[test]
    fn schedule_field_deferred_until_schedule_active() {
        let mut element = Element::new(SettingKind::TimerOnTime);
        let acc = element
            .handle_command(&"07:30".into(), true, Some(TimerType::NoTimer), Instant::now())
            .unwrap();
        assert_eq!(acc, CommandAcceptance::Accepted { deferred: true });
        assert_eq!(element.wire_value_to_send(&ctx(Some(TimerType::NoTimer))), SENTINEL);
        assert!(!element.mark_sent(Some(TimerType::NoTimer)));

        let active = ctx(Some(TimerType::Schedule2));
        assert!(element.should_transmit(&active));
        assert_eq!(element.wire_value_to_send(&active), "450");
        element.refresh_deferral(active.active_timer);
        assert!(!element.pending().unwrap().is_deferred());
    }

    #[test]
    fn schedule_fields_always_sent_while_schedule_active() {
        let element = confirmed(SettingKind::TimerWeekdays, "31");
        assert_eq!(element.wire_value_to_send(&ctx(None)), SENTINEL);
        assert_eq!(
            element.wire_value_to_send(&ctx(Some(TimerType::Schedule1))),
            "31"
        );
    }

    #[test]
    fn clock_fields_follow_the_clock() {
        let now = DateTime::parse_from_rfc3339("2024-03-06T14:05:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let ctx = WireContext {
            now,
            active_timer: None,
        };
        let time = Element::new(SettingKind::CurrentTime);
        let day = Element::new(SettingKind::CurrentWeekday);
        assert_eq!(time.wire_value_to_send(&ctx), "845");
        // 2024-03-06 is a Wednesday
        assert_eq!(day.wire_value_to_send(&ctx), "3");

        let mut time = time;
        let acc = time
            .handle_command(&"10:00".into(), false, None, Instant::now())
            .unwrap();
        assert!(matches!(acc, CommandAcceptance::Rejected(_)));
    }

    #[test]
    fn read_only_cell_declines_commands() {
        let mut element = Element::new(SettingKind::ActualTemperature);
        let acc = element
            .handle_command(&CommandInput::Number(20.0), true, None, Instant::now())
            .unwrap();
        assert_eq!(acc, CommandAcceptance::Rejected("setting is read-only"));
        assert_eq!(element.wire_value_to_send(&ctx(None)), SENTINEL);
    }
}
