//! Wall-clock scheduled actuator (lights, mostly).
//!
//! Each weekday carries its own (on_hour, off_hour) pair. The on/off
//! decision is a pure function of the hour so it can be swept across all
//! 24 hours in tests; the device around it only caches the current
//! weekday's hours (recomputed at midnight rollover) and writes pins
//! edge-triggered.
//!
//! An optional block override wires a momentary button: while its countdown
//! runs, the output is forced OFF regardless of the schedule.

use log::{debug, info, warn};

use crate::config::{ClockOutputConfig, DayHours};
use crate::device::{Action, ActionTable, Device, DueActions, TickContext};
use crate::error::ConfigError;
use crate::outputs::PinBank;

const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

// ───────────────────────────────────────────────────────────────
// Weekly schedule
// ───────────────────────────────────────────────────────────────

/// Validated on/off hours for all seven weekdays, indexed 0 = Monday.
#[derive(Debug, Clone, Copy)]
pub struct WeeklySchedule {
    days: [DayHours; 7],
}

impl WeeklySchedule {
    /// Build from a configured name → hours map. Fails unless exactly the
    /// seven English weekday names are present with hours in 0–23.
    pub fn from_map(
        device: &str,
        map: &std::collections::BTreeMap<String, DayHours>,
    ) -> Result<Self, ConfigError> {
        if map.len() != 7 {
            return Err(ConfigError::new(format!(
                "weekly schedule for '{device}' must contain 7 days, found {}",
                map.len()
            )));
        }

        let mut days = [DayHours {
            on_hour: 0,
            off_hour: 0,
        }; 7];

        for (name, hours) in map {
            let index = WEEKDAY_NAMES
                .iter()
                .position(|day| day == name)
                .ok_or_else(|| {
                    ConfigError::new(format!(
                        "'{name}' is not a day of the week (device '{device}')"
                    ))
                })?;

            if hours.on_hour > 23 || hours.off_hour > 23 {
                return Err(ConfigError::new(format!(
                    "hours for {name} on '{device}' must be 0-23, found on={} off={}",
                    hours.on_hour, hours.off_hour
                )));
            }

            days[index] = *hours;
        }

        Ok(Self { days })
    }

    pub fn hours_for(&self, weekday: u8) -> DayHours {
        self.days[usize::from(weekday) % 7]
    }
}

/// Pure schedule decision for one hour of the day.
///
/// - `on_hour == off_hour` means always on.
/// - `off_hour < on_hour` wraps past midnight: on from `on_hour` through
///   23, and again from 0 until `off_hour`.
/// - Otherwise the plain daytime window `[on_hour, off_hour)`.
pub fn scheduled_on(on_hour: u8, off_hour: u8, current_hour: u8) -> bool {
    if on_hour == off_hour {
        true
    } else if off_hour < on_hour {
        current_hour >= on_hour || current_hour < off_hour
    } else {
        current_hour >= on_hour && current_hour < off_hour
    }
}

// ───────────────────────────────────────────────────────────────
// Device
// ───────────────────────────────────────────────────────────────

/// Momentary-button override: while `remaining_secs` counts down the
/// output is held OFF. A press during an active countdown has no further
/// effect; the countdown is only reloaded once it has expired.
#[derive(Debug)]
struct BlockOverride {
    button_pin: u8,
    duration_secs: u32,
    remaining_secs: i64,
}

/// Weekly on/off-hour actuator.
pub struct ClockOutput {
    name: String,
    actions: ActionTable,
    bank: PinBank,
    schedule: WeeklySchedule,
    /// Weekday the cached hours belong to; `None` until the first tick.
    cached_weekday: Option<u8>,
    on_hour: u8,
    off_hour: u8,
    block: Option<BlockOverride>,
}

impl ClockOutput {
    pub fn from_config(cfg: &ClockOutputConfig) -> Result<Self, ConfigError> {
        let schedule = WeeklySchedule::from_map(&cfg.name, &cfg.week_schedule)?;

        let block = match (cfg.block_button_pin, cfg.block_duration_secs) {
            (None, None) => None,
            (Some(pin), Some(duration)) if duration > 0 => Some(BlockOverride {
                button_pin: pin,
                duration_secs: duration,
                remaining_secs: 0,
            }),
            _ => {
                return Err(ConfigError::new(format!(
                    "'{}' needs both block_button_pin and a non-zero block_duration_secs",
                    cfg.name
                )));
            }
        };

        let mut capabilities = vec![Action::FindState];
        if block.is_some() {
            capabilities.push(Action::CheckBlockButton);
        }
        let actions = ActionTable::resolve(&cfg.name, &capabilities, &cfg.actions)?;

        Ok(Self {
            name: cfg.name.clone(),
            actions,
            bank: PinBank::new(cfg.pins.clone(), false),
            schedule,
            cached_weekday: None,
            on_hour: 0,
            off_hour: 0,
            block,
        })
    }

    /// True while the block countdown is running.
    fn blocked(&self) -> bool {
        self.block.as_ref().is_some_and(|b| b.remaining_secs > 0)
    }

    fn find_state(&mut self, cx: &mut TickContext<'_>) {
        // Midnight rollover: refresh the cached hours when the weekday
        // moves on (or on the very first evaluation).
        if self.cached_weekday != Some(cx.wall.weekday) {
            let hours = self.schedule.hours_for(cx.wall.weekday);
            self.cached_weekday = Some(cx.wall.weekday);
            self.on_hour = hours.on_hour;
            self.off_hour = hours.off_hour;
            debug!(
                "{}: schedule for weekday {} is on={} off={}",
                self.name, cx.wall.weekday, self.on_hour, self.off_hour
            );
        }

        let want = scheduled_on(self.on_hour, self.off_hour, cx.wall.hour);
        if want != self.bank.state() && !self.blocked() {
            info!("{}: schedule turns output {}", self.name, on_off(want));
            self.bank.apply(&self.name, want, cx.pins);
        }

        cx.board.publish(&self.name, self.bank.state());
    }

    fn check_block_button(&mut self, cx: &mut TickContext<'_>) {
        let interval = self
            .actions
            .interval_secs(Action::CheckBlockButton)
            .unwrap_or(1);

        let Some(block) = &mut self.block else {
            return;
        };

        // Pull-up wiring: the pin reads low while the button is held.
        let pressed = match cx.pins.read(block.button_pin) {
            Ok(level) => !level,
            Err(e) => {
                warn!("{}: block button read failed: {e}", self.name);
                false
            }
        };

        if pressed && block.remaining_secs <= 0 {
            debug!("{}: block button pressed", self.name);
            block.remaining_secs = i64::from(block.duration_secs);
        } else if block.remaining_secs > 0 {
            block.remaining_secs -= i64::from(interval);
        }

        if block.remaining_secs > 0 {
            debug!(
                "{}: blocked, {}s remaining",
                self.name, block.remaining_secs
            );
            if self.bank.state() {
                self.bank.apply(&self.name, false, cx.pins);
            }
            cx.board.publish(&self.name, false);
        }
    }
}

fn on_off(state: bool) -> &'static str {
    if state { "ON" } else { "OFF" }
}

impl Device for ClockOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn due_actions(&mut self, now: i64) -> DueActions {
        self.actions.due(now)
    }

    fn perform(&mut self, action: Action, cx: &mut TickContext<'_>) {
        match action {
            Action::FindState => self.find_state(cx),
            Action::CheckBlockButton => self.check_block_button(cx),
            other => debug!("{}: ignoring unbound action {other:?}", self.name),
        }
    }

    fn output_pins(&self) -> &[u8] {
        self.bank.pins()
    }

    fn input_pin(&self) -> Option<u8> {
        self.block.as_ref().map(|b| b.button_pin)
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
