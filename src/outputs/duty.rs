//! Fixed duty-cycle actuator (exhaust fans, circulation pumps).
//!
//! Starts ON with a countdown of `on_seconds`; every evaluation the
//! countdown shrinks by the action's own interval, and at zero the state
//! flips and the countdown reloads from the opposite duration. No sensed
//! input, no wall clock — pure elapsed time.

use log::{debug, info};

use crate::config::DutyCycleConfig;
use crate::device::{Action, ActionTable, Device, DueActions, TickContext};
use crate::error::ConfigError;
use crate::outputs::PinBank;

pub struct DutyCycleOutput {
    name: String,
    actions: ActionTable,
    bank: PinBank,
    on_seconds: u32,
    off_seconds: u32,
    /// Seconds left in the current phase. May go negative on a coarse
    /// check interval; the flip triggers at or below zero.
    countdown: i64,
}

impl DutyCycleOutput {
    const CAPABILITIES: &'static [Action] = &[Action::FindState];

    pub fn from_config(cfg: &DutyCycleConfig) -> Result<Self, ConfigError> {
        if cfg.on_seconds == 0 && cfg.off_seconds == 0 {
            return Err(ConfigError::new(format!(
                "'{}' needs a non-zero on_seconds or off_seconds",
                cfg.name
            )));
        }

        let actions = ActionTable::resolve(&cfg.name, Self::CAPABILITIES, &cfg.actions)?;

        Ok(Self {
            name: cfg.name.clone(),
            actions,
            bank: PinBank::new(cfg.pins.clone(), true),
            on_seconds: cfg.on_seconds,
            off_seconds: cfg.off_seconds,
            countdown: i64::from(cfg.on_seconds),
        })
    }

    fn find_state(&mut self, cx: &mut TickContext<'_>) {
        let interval = self.actions.interval_secs(Action::FindState).unwrap_or(1);
        self.countdown -= i64::from(interval);

        if self.countdown <= 0 {
            let next = !self.bank.state();
            self.countdown = if next {
                i64::from(self.on_seconds)
            } else {
                i64::from(self.off_seconds)
            };
            info!("{}: duty cycle flips output {}", self.name, if next { "ON" } else { "OFF" });
            self.bank.apply(&self.name, next, cx.pins);
        } else {
            debug!("{}: {}s left in phase", self.name, self.countdown);
        }

        cx.board.publish(&self.name, self.bank.state());
    }
}

impl Device for DutyCycleOutput {
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

    fn initial_state(&self) -> bool {
        true
    }
}
