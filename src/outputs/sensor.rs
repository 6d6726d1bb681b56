//! Hysteresis actuator driven by stored sensor readings.
//!
//! The decision chain per evaluation, in order:
//!
//! 1. **Interlocks** — any peer in its blocking state forces this output
//!    OFF before anything else is considered.
//! 2. **Freshness** — the latest stored reading must exist, be from the
//!    current calendar day and be younger than `good_reading_interval`;
//!    anything else is treated as "no valid data" and fails safe to OFF.
//! 3. **Hysteresis** — bang-bang with a deadband around the target,
//!    tracked by a [`ModulationState`] so the actuator never re-triggers
//!    until the *opposite* deadband edge is crossed. No chatter at the
//!    boundaries.
//!
//! The hysteresis step and the freshness check are pure functions —
//! everything with a clock or a wire stays in [`SensorOutput`] itself.

use chrono::NaiveDateTime;
use log::{debug, info, warn};

use crate::config::SensorOutputConfig;
use crate::device::{Action, ActionTable, Device, DueActions, TickContext};
use crate::error::ConfigError;
use crate::outputs::PinBank;

// ───────────────────────────────────────────────────────────────
// Pure decision pieces
// ───────────────────────────────────────────────────────────────

/// Which way the actuator pushes the sensed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShift {
    /// Running the actuator raises the value (heater, CO2 valve).
    Increasing,
    /// Running the actuator lowers the value (chiller, dehumidifier).
    Decreasing,
}

impl ValueShift {
    /// Configuration symbol: "+" increases, "-" decreases. Anything else
    /// is a fatal configuration error.
    pub fn parse(device: &str, symbol: &str) -> Result<Self, ConfigError> {
        match symbol {
            "+" => Ok(Self::Increasing),
            "-" => Ok(Self::Decreasing),
            other => Err(ConfigError::new(format!(
                "value_shift for '{device}' must be \"+\" or \"-\", found \"{other}\""
            ))),
        }
    }
}

/// Which deadband boundary was crossed last. Determines which boundary
/// must be crossed next before the output may flip again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModulationState {
    #[default]
    Neutral,
    /// The value dropped through `target - range`.
    LowEdge,
    /// Armed toward `target + range` (increasing-effect actuators).
    HighEdge,
}

/// One hysteresis evaluation: `(desired_state, next_modulation)`.
///
/// `lo = target - range`, `hi = target + range`.
///
/// - **Decreasing-effect**: runs while the value sits above `lo`; once the
///   value falls to `lo` it switches off and stays off until the value
///   climbs back to `hi`.
/// - **Increasing-effect**: idles (holding its current state) until the
///   value falls to `lo`, then runs until the value reaches `hi`.
pub fn hysteresis_step(
    shift: ValueShift,
    modulation: ModulationState,
    currently_on: bool,
    value: f64,
    target: f64,
    range: f64,
) -> (bool, ModulationState) {
    let lo = target - range;
    let hi = target + range;

    match shift {
        ValueShift::Decreasing => match modulation {
            ModulationState::LowEdge => {
                if value >= hi {
                    (true, ModulationState::Neutral)
                } else {
                    (false, ModulationState::LowEdge)
                }
            }
            // HighEdge is never armed for a decreasing actuator; treat a
            // stray one like Neutral.
            ModulationState::Neutral | ModulationState::HighEdge => {
                if value <= lo {
                    (false, ModulationState::LowEdge)
                } else {
                    (true, ModulationState::Neutral)
                }
            }
        },
        ValueShift::Increasing => match modulation {
            ModulationState::HighEdge => {
                if value >= hi {
                    (false, ModulationState::Neutral)
                } else {
                    (true, ModulationState::HighEdge)
                }
            }
            ModulationState::Neutral | ModulationState::LowEdge => {
                if value <= lo {
                    (true, ModulationState::HighEdge)
                } else {
                    (currently_on, ModulationState::Neutral)
                }
            }
        },
    }
}

/// A reading may drive an actuator only if it is from today and no older
/// than the staleness window. A timestamp from the future fails too — the
/// wall clock moved and the reading's age is unknowable.
pub fn reading_is_fresh(reading_at: NaiveDateTime, now: NaiveDateTime, good_for_secs: i64) -> bool {
    if reading_at.date() != now.date() {
        return false;
    }
    let age_secs = (now - reading_at).num_seconds();
    (0..=good_for_secs).contains(&age_secs)
}

// ───────────────────────────────────────────────────────────────
// Device
// ───────────────────────────────────────────────────────────────

/// Forces this output OFF while the named peer is in `blocking_state`.
#[derive(Debug, Clone)]
pub struct InterlockRule {
    pub peer: String,
    pub blocking_state: bool,
}

pub struct SensorOutput {
    name: String,
    actions: ActionTable,
    bank: PinBank,
    table: String,
    timestamp_column: String,
    column: String,
    shift: ValueShift,
    target_value: f64,
    target_range: f64,
    good_reading_interval_secs: i64,
    interlocks: Vec<InterlockRule>,
    modulation: ModulationState,
}

impl SensorOutput {
    const CAPABILITIES: &'static [Action] = &[Action::FindState];

    pub fn from_config(cfg: &SensorOutputConfig) -> Result<Self, ConfigError> {
        let shift = ValueShift::parse(&cfg.name, &cfg.value_shift)?;
        if cfg.target_range < 0.0 {
            return Err(ConfigError::new(format!(
                "target_range for '{}' must not be negative",
                cfg.name
            )));
        }
        let actions = ActionTable::resolve(&cfg.name, Self::CAPABILITIES, &cfg.actions)?;

        Ok(Self {
            name: cfg.name.clone(),
            actions,
            bank: PinBank::new(cfg.pins.clone(), false),
            table: cfg.table.clone(),
            timestamp_column: cfg.timestamp_column.clone(),
            column: cfg.column.clone(),
            shift,
            target_value: cfg.target_value,
            target_range: cfg.target_range,
            good_reading_interval_secs: cfg.good_reading_interval_secs,
            interlocks: cfg.interlocks
                .iter()
                .map(|rule| InterlockRule {
                    peer: rule.peer.clone(),
                    blocking_state: rule.blocking_state,
                })
                .collect(),
            modulation: ModulationState::Neutral,
        })
    }

    /// Peer whose published state currently blocks this output, if any.
    fn blocking_peer(&self, cx: &TickContext<'_>) -> Option<&InterlockRule> {
        self.interlocks
            .iter()
            .find(|rule| cx.board.state_of(&rule.peer) == Some(rule.blocking_state))
    }

    /// Latest usable value, fetched fresh from the store — never cached
    /// across evaluations.
    fn current_value(&mut self, cx: &mut TickContext<'_>) -> Option<f64> {
        let reading = cx
            .store
            .latest(&self.table, &[&self.timestamp_column, &self.column])?;

        if !reading_is_fresh(reading.timestamp, cx.wall.stamp, self.good_reading_interval_secs) {
            debug!("{}: reading from {} is stale", self.name, reading.timestamp);
            return None;
        }

        match reading.value.as_ref().and_then(crate::ports::Value::as_f64) {
            Some(value) => Some(value),
            None => {
                warn!("{}: column '{}' holds no numeric value", self.name, self.column);
                None
            }
        }
    }

    fn find_state(&mut self, cx: &mut TickContext<'_>) {
        let want = if let Some(rule) = self.blocking_peer(cx) {
            debug!("{}: blocked by '{}', forcing OFF", self.name, rule.peer);
            false
        } else if let Some(value) = self.current_value(cx) {
            let (state, modulation) = hysteresis_step(
                self.shift,
                self.modulation,
                self.bank.state(),
                value,
                self.target_value,
                self.target_range,
            );
            self.modulation = modulation;
            state
        } else {
            info!("{}: no valid reading, forcing OFF", self.name);
            false
        };

        if want != self.bank.state() {
            info!("{}: output {}", self.name, if want { "ON" } else { "OFF" });
            self.bank.apply(&self.name, want, cx.pins);
        } else {
            // State is steady — verify the relay actually agrees.
            self.bank.confirm(&self.name, cx.pins);
        }

        cx.board.publish(&self.name, self.bank.state());
    }
}

impl Device for SensorOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn due_actions(&mut self, now: i64) -> DueActions {
        self.actions.due(now)
    }

    fn perform(&mut self, action: Action, cx: &mut TickContext<'_>) {
        match action {
            Action::FindState => self.find_state(cx),
            other => debug!("{}: ignoring unbound action {other:?}", self.name),
        }
    }

    fn output_pins(&self) -> &[u8] {
        self.bank.pins()
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ActionBinding, InterlockRuleConfig};
    use crate::ports::Value;
    use crate::testutil::{TestParts, stamp};

    fn config() -> SensorOutputConfig {
        SensorOutputConfig {
            name: "heater-0".to_owned(),
            actions: vec![ActionBinding {
                action: "find_state".to_owned(),
                interval_secs: 5,
            }],
            pins: vec![15],
            table: "sensors".to_owned(),
            timestamp_column: "recorded_at".to_owned(),
            column: "temperature".to_owned(),
            value_shift: "+".to_owned(),
            target_value: 75.0,
            target_range: 2.0,
            good_reading_interval_secs: 120,
            interlocks: Vec::new(),
        }
    }

    #[test]
    fn value_shift_symbol_is_validated() {
        assert_eq!(ValueShift::parse("x", "+").unwrap(), ValueShift::Increasing);
        assert_eq!(ValueShift::parse("x", "-").unwrap(), ValueShift::Decreasing);
        assert!(ValueShift::parse("x", "~").is_err());
        assert!(ValueShift::parse("x", "increasing").is_err());
    }

    #[test]
    fn increasing_effect_deadband_no_chatter() {
        // Heater, target 75 ± 2: descending through 73 arms it ON, it
        // holds through 74–76 and releases only at 77; it must not
        // re-trigger until the value drops to 73 again.
        let shift = ValueShift::Increasing;
        let mut on = false;
        let mut m = ModulationState::Neutral;

        for (value, expect_on) in [
            (75.0, false), // in band, holds OFF
            (74.0, false),
            (73.0, true), // low edge crossed
            (74.0, true),
            (75.0, true),
            (76.0, true),
            (77.0, false), // high edge crossed
            (76.0, false), // no chatter at 75 ± 1
            (75.0, false),
            (74.0, false),
            (73.0, true), // re-arms only here
        ] {
            let (next, next_m) = hysteresis_step(shift, m, on, value, 75.0, 2.0);
            assert_eq!(next, expect_on, "value {value}");
            on = next;
            m = next_m;
        }
    }

    #[test]
    fn decreasing_effect_deadband_no_chatter() {
        // Chiller, target 20 ± 1: runs above 19, cuts out at 19 and stays
        // out until the value climbs back to 21.
        let shift = ValueShift::Decreasing;
        let mut on = false;
        let mut m = ModulationState::Neutral;

        for (value, expect_on) in [
            (22.0, true),
            (20.0, true),
            (19.0, false), // low edge
            (19.5, false),
            (20.9, false), // still armed
            (21.0, true),  // high edge releases it
            (20.0, true),
        ] {
            let (next, next_m) = hysteresis_step(shift, m, on, value, 20.0, 1.0);
            assert_eq!(next, expect_on, "value {value}");
            on = next;
            m = next_m;
        }
    }

    #[test]
    fn freshness_window() {
        let now = stamp(0, 12, 0);
        assert!(reading_is_fresh(stamp(0, 11, 59), now, 120));
        // Older than the window.
        assert!(!reading_is_fresh(stamp(0, 11, 57), now, 119));
        // Yesterday, even if within the window by seconds.
        assert!(!reading_is_fresh(stamp(0, 12, 0) - chrono::Duration::days(1), now, 120));
        // From the future.
        assert!(!reading_is_fresh(stamp(0, 12, 1), now, 120));
    }

    #[test]
    fn missing_or_stale_reading_fails_safe_off() {
        let mut parts = TestParts::new();
        parts.configure_output(15);
        let mut heater = SensorOutput::from_config(&config()).unwrap();

        // Empty store: OFF.
        heater.perform(Action::FindState, &mut parts.cx(5, 0, 12));
        assert_eq!(parts.pins.level(15), Some(false));

        // Cold reading turns it on.
        parts.insert_reading("sensors", stamp(0, 12, 0), "temperature", Value::Real(70.0));
        heater.perform(Action::FindState, &mut parts.cx_at(10, stamp(0, 12, 1)));
        assert_eq!(parts.pins.level(15), Some(true));

        // Same reading three minutes later is stale: fail-safe OFF even
        // though the raw value still says "heat".
        heater.perform(Action::FindState, &mut parts.cx_at(200, stamp(0, 12, 4)));
        assert_eq!(parts.pins.level(15), Some(false));
    }

    #[test]
    fn interlock_overrides_sensor_demand() {
        let mut parts = TestParts::new();
        parts.configure_output(15);

        let mut cfg = config();
        cfg.name = "co2-0".to_owned();
        cfg.column = "co2".to_owned();
        cfg.interlocks = vec![InterlockRuleConfig {
            peer: "exhaust-fan".to_owned(),
            blocking_state: true,
        }];
        let mut co2 = SensorOutput::from_config(&cfg).unwrap();

        // Raw value demands ON…
        parts.insert_reading("sensors", stamp(0, 12, 0), "co2", Value::Real(70.0));

        // …but the fan is running, so the valve stays shut.
        parts.board.publish("exhaust-fan", true);
        co2.perform(Action::FindState, &mut parts.cx_at(5, stamp(0, 12, 0)));
        assert_eq!(parts.pins.level(15), Some(false));

        // Fan stops: the valve opens on the next evaluation.
        parts.board.publish("exhaust-fan", false);
        co2.perform(Action::FindState, &mut parts.cx_at(10, stamp(0, 12, 1)));
        assert_eq!(parts.pins.level(15), Some(true));
    }

    #[test]
    fn steady_state_heals_a_flipped_relay() {
        let mut parts = TestParts::new();
        parts.configure_output(15);
        let mut heater = SensorOutput::from_config(&config()).unwrap();

        parts.insert_reading("sensors", stamp(0, 12, 0), "temperature", Value::Real(70.0));
        heater.perform(Action::FindState, &mut parts.cx_at(5, stamp(0, 12, 0)));
        assert_eq!(parts.pins.level(15), Some(true));

        // External interference flips the relay while the computed state
        // stays ON; the next evaluation re-asserts it.
        parts.pins.force_level(15, false);
        heater.perform(Action::FindState, &mut parts.cx_at(10, stamp(0, 12, 1)));
        assert_eq!(parts.pins.level(15), Some(true));
    }

    #[test]
    fn integer_readings_drive_the_actuator_too() {
        let mut parts = TestParts::new();
        parts.configure_output(15);
        let mut cfg = config();
        cfg.column = "co2".to_owned();
        let mut valve = SensorOutput::from_config(&cfg).unwrap();

        parts.insert_reading("sensors", stamp(0, 12, 0), "co2", Value::Int(60));
        valve.perform(Action::FindState, &mut parts.cx_at(5, stamp(0, 12, 0)));
        assert_eq!(parts.pins.level(15), Some(true));
    }
}
