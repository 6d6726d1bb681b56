//! The device abstraction: a closed action registry, per-action timers and
//! the trait every tickable device implements.
//!
//! Configuration binds action *names* to intervals. Instead of looking the
//! names up reflectively at tick time, each device variant declares its
//! capability set as a slice of [`Action`] discriminants and resolution
//! happens once, at construction — an unknown or unsupported name aborts
//! startup with a [`ConfigError`] rather than failing at first tick.

use std::collections::HashMap;

use crate::config::ActionBinding;
use crate::error::ConfigError;
use crate::notify::AlertGate;
use crate::ports::PinDriver;
use crate::storage::Storage;
use crate::timing::{Timer, WallTime};

// ───────────────────────────────────────────────────────────────
// Actions
// ───────────────────────────────────────────────────────────────

/// Maximum actions a single device can bind. Sized for the busiest variant
/// (the multi-sensor binds three).
pub const MAX_ACTIONS: usize = 4;

/// Fixed-capacity list of actions due in one tick, in binding order.
pub type DueActions = heapless::Vec<Action, MAX_ACTIONS>;

/// Every action any device variant can perform. The per-variant capability
/// set is a subset of this enum; configuration refers to actions by their
/// canonical snake_case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Re-evaluate the actuator's on/off state.
    FindState,
    /// Sample the block-override button and run its countdown.
    CheckBlockButton,
    /// Poll the serial link and ingest waiting telemetry.
    PollReadings,
    /// Run the dead-link watchdog.
    CheckLink,
    /// Compare stored readings against alarm thresholds.
    AlarmCheck,
    /// Purge aged rows from the store.
    PurgeHistory,
}

impl Action {
    /// Canonical name used in configuration records.
    pub fn name(self) -> &'static str {
        match self {
            Self::FindState => "find_state",
            Self::CheckBlockButton => "check_block_button",
            Self::PollReadings => "poll_readings",
            Self::CheckLink => "check_link",
            Self::AlarmCheck => "alarm_check",
            Self::PurgeHistory => "purge_history",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "find_state" => Some(Self::FindState),
            "check_block_button" => Some(Self::CheckBlockButton),
            "poll_readings" => Some(Self::PollReadings),
            "check_link" => Some(Self::CheckLink),
            "alarm_check" => Some(Self::AlarmCheck),
            "purge_history" => Some(Self::PurgeHistory),
            _ => None,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Action table
// ───────────────────────────────────────────────────────────────

/// A device's resolved action set: one [`Timer`] per bound action, in the
/// order the bindings appeared in configuration. That order is the order
/// due actions run in, every tick, forever.
#[derive(Debug, Clone)]
pub struct ActionTable {
    entries: Vec<(Action, Timer)>,
}

impl ActionTable {
    /// Resolve configured bindings against a device's capability set.
    ///
    /// Fails fast on a name that is not a known action, names the device
    /// cannot perform, and duplicate bindings.
    pub fn resolve(
        device: &str,
        capabilities: &[Action],
        bindings: &[ActionBinding],
    ) -> Result<Self, ConfigError> {
        let mut entries: Vec<(Action, Timer)> = Vec::with_capacity(bindings.len());

        for binding in bindings {
            let action = Action::from_name(&binding.action).ok_or_else(|| {
                ConfigError::new(format!(
                    "'{}' is not an action name (device '{device}')",
                    binding.action
                ))
            })?;

            if !capabilities.contains(&action) {
                return Err(ConfigError::new(format!(
                    "device '{device}' cannot perform '{}'",
                    binding.action
                )));
            }

            if entries.iter().any(|(a, _)| *a == action) {
                return Err(ConfigError::new(format!(
                    "action '{}' bound twice for device '{device}'",
                    binding.action
                )));
            }

            entries.push((action, Timer::new(binding.interval_secs)));
        }

        Ok(Self { entries })
    }

    /// Check every timer against `now`; returns the actions whose interval
    /// elapsed, in binding order.
    pub fn due(&mut self, now: i64) -> DueActions {
        let mut due = DueActions::new();
        for (action, timer) in &mut self.entries {
            if timer.check(now) {
                // Capacity bound is MAX_ACTIONS and resolve() rejects
                // duplicates, so this push cannot fail.
                let _ = due.push(*action);
            }
        }
        due
    }

    /// Configured interval for a bound action. Countdown-style devices use
    /// this as their decrement step.
    pub fn interval_secs(&self, action: Action) -> Option<u32> {
        self.entries
            .iter()
            .find(|(a, _)| *a == action)
            .map(|(_, t)| t.interval_secs())
    }

    pub fn is_bound(&self, action: Action) -> bool {
        self.entries.iter().any(|(a, _)| *a == action)
    }
}

// ───────────────────────────────────────────────────────────────
// State board
// ───────────────────────────────────────────────────────────────

/// Published on/off state of every output device, keyed by device name.
///
/// Outputs publish after each evaluation; interlock rules read their peer's
/// state from here. Because devices run in a fixed order within one tick, a
/// peer that updates later in the same tick is observed one tick late —
/// acceptable lag, not a race (there is only one thread).
#[derive(Debug, Default)]
pub struct StateBoard {
    states: HashMap<String, bool>,
}

impl StateBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&mut self, device: &str, on: bool) {
        self.states.insert(device.to_owned(), on);
    }

    /// `None` means the peer has never published (unknown device name, or
    /// a device registered after this tick started).
    pub fn state_of(&self, device: &str) -> Option<bool> {
        self.states.get(device).copied()
    }
}

// ───────────────────────────────────────────────────────────────
// Tick context & device trait
// ───────────────────────────────────────────────────────────────

/// Everything an action may touch during one tick: the collaborator ports,
/// the shared state board and the tick's time snapshot.
pub struct TickContext<'a> {
    /// Monotonic seconds (same value every device sees this tick).
    pub now: i64,
    /// Wall-clock snapshot taken at the start of the tick.
    pub wall: WallTime,
    pub pins: &'a mut dyn PinDriver,
    pub store: &'a mut Storage,
    pub alerts: &'a mut AlertGate,
    pub board: &'a mut StateBoard,
}

/// A tickable device. The scheduler calls [`due_actions`](Device::due_actions)
/// once per tick and then [`perform`](Device::perform) for each due action,
/// synchronously and in binding order. A slow action stalls the whole loop;
/// the domain tolerates that (no deadline shorter than seconds), but
/// actions must still bound their own I/O.
pub trait Device {
    fn name(&self) -> &str;

    /// Actions whose interval has elapsed at `now`.
    fn due_actions(&mut self, now: i64) -> DueActions;

    /// Execute one due action. Never panics; recoverable trouble is logged
    /// and swallowed so the loop keeps running.
    fn perform(&mut self, action: Action, cx: &mut TickContext<'_>);

    /// Relay output pins this device drives. Used for assignment
    /// validation and initial pin assertion at registration.
    fn output_pins(&self) -> &[u8] {
        &[]
    }

    /// Digital input pin (block-override button), if any.
    fn input_pin(&self) -> Option<u8> {
        None
    }

    /// State the output pins are asserted to at registration.
    fn initial_state(&self) -> bool {
        false
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(action: &str, interval: u32) -> ActionBinding {
        ActionBinding {
            action: action.to_owned(),
            interval_secs: interval,
        }
    }

    #[test]
    fn resolves_known_actions_in_order() {
        let table = ActionTable::resolve(
            "airco-0",
            &[Action::FindState, Action::CheckBlockButton],
            &[binding("check_block_button", 1), binding("find_state", 5)],
        )
        .unwrap();

        assert_eq!(table.interval_secs(Action::CheckBlockButton), Some(1));
        assert_eq!(table.interval_secs(Action::FindState), Some(5));
    }

    #[test]
    fn unknown_action_name_fails_construction() {
        let err = ActionTable::resolve(
            "airco-0",
            &[Action::FindState],
            &[binding("fnd_state", 5)],
        )
        .unwrap_err();
        assert!(err.to_string().contains("fnd_state"));
    }

    #[test]
    fn unsupported_capability_fails_construction() {
        let err = ActionTable::resolve(
            "fan-1",
            &[Action::FindState],
            &[binding("alarm_check", 60)],
        )
        .unwrap_err();
        assert!(err.to_string().contains("cannot perform"));
    }

    #[test]
    fn duplicate_binding_fails_construction() {
        let err = ActionTable::resolve(
            "fan-1",
            &[Action::FindState],
            &[binding("find_state", 5), binding("find_state", 10)],
        )
        .unwrap_err();
        assert!(err.to_string().contains("bound twice"));
    }

    #[test]
    fn due_preserves_binding_order() {
        let mut table = ActionTable::resolve(
            "sensor-0",
            &[Action::PollReadings, Action::CheckLink, Action::AlarmCheck],
            &[
                binding("poll_readings", 5),
                binding("check_link", 5),
                binding("alarm_check", 5),
            ],
        )
        .unwrap();

        let due = table.due(6);
        assert_eq!(
            due.as_slice(),
            &[Action::PollReadings, Action::CheckLink, Action::AlarmCheck]
        );

        // Nothing due again until another interval passes.
        assert!(table.due(8).is_empty());
    }

    #[test]
    fn board_round_trips_state() {
        let mut board = StateBoard::new();
        assert_eq!(board.state_of("lights-0"), None);
        board.publish("lights-0", true);
        assert_eq!(board.state_of("lights-0"), Some(true));
        board.publish("lights-0", false);
        assert_eq!(board.state_of("lights-0"), Some(false));
    }
}
