//! The rig: device registry, pin-assignment validation and the cooperative
//! control loop.
//!
//! Single-threaded on purpose. Every tick the scheduler snapshots the
//! clock once, then walks the devices in registration order and runs each
//! device's due actions in binding order. No device observes time moving
//! within a tick, and no two actions ever run concurrently — interlock
//! reads through the state board are at worst one tick stale, never torn.

use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use log::{debug, info};

use crate::device::{Device, StateBoard, TickContext};
use crate::error::{ConfigError, Error, Result};
use crate::notify::AlertGate;
use crate::ports::{PinDirection, PinDriver};
use crate::storage::Storage;
use crate::timing::{Clock, WallTime};

pub struct Rig {
    devices: Vec<Box<dyn Device>>,
    pins: Box<dyn PinDriver>,
    store: Storage,
    alerts: AlertGate,
    board: StateBoard,
    /// Header pins allowed to drive a relay channel.
    valid_output_pins: Vec<u8>,
    /// Every pin claimed so far, outputs and buttons alike.
    claimed_pins: HashSet<u8>,
    loop_interval: Duration,
}

impl Rig {
    pub fn new(
        pins: Box<dyn PinDriver>,
        store: Storage,
        alerts: AlertGate,
        valid_output_pins: Vec<u8>,
        loop_interval: Duration,
    ) -> Self {
        Self {
            devices: Vec::new(),
            pins,
            store,
            alerts,
            board: StateBoard::new(),
            valid_output_pins,
            claimed_pins: HashSet::new(),
            loop_interval,
        }
    }

    /// Register a device: validate and claim its pins, drive the outputs to
    /// their initial state and seed the state board. Registration order is
    /// tick execution order.
    pub fn register(&mut self, device: Box<dyn Device>) -> Result<()> {
        let name = device.name().to_owned();
        if self.devices.iter().any(|d| d.name() == name) {
            return Err(ConfigError::new(format!("device name '{name}' used twice")).into());
        }

        let initial = device.initial_state();
        for &pin in device.output_pins() {
            if !self.valid_output_pins.contains(&pin) {
                return Err(ConfigError::new(format!(
                    "pin {pin} ('{name}') is not a valid output pin"
                ))
                .into());
            }
            self.claim(pin, &name)?;
            self.pins.configure(pin, PinDirection::Output)?;
            self.pins.write(pin, initial)?;
        }

        if let Some(pin) = device.input_pin() {
            self.claim(pin, &name)?;
            self.pins.configure(pin, PinDirection::Input)?;
        }

        if !device.output_pins().is_empty() {
            self.board.publish(&name, initial);
        }

        info!(
            "registered '{name}' (outputs {:?}, initial {})",
            device.output_pins(),
            if initial { "ON" } else { "OFF" }
        );
        self.devices.push(device);
        Ok(())
    }

    fn claim(&mut self, pin: u8, device: &str) -> Result<()> {
        if !self.claimed_pins.insert(pin) {
            return Err(Error::Config(ConfigError::new(format!(
                "pin {pin} ('{device}') is already assigned"
            ))));
        }
        Ok(())
    }

    /// One pass over all devices at an explicit instant.
    pub fn tick_at(&mut self, now: i64, wall: WallTime) {
        for device in &mut self.devices {
            for action in device.due_actions(now) {
                debug!("{}: running {}", device.name(), action.name());
                let mut cx = TickContext {
                    now,
                    wall,
                    pins: self.pins.as_mut(),
                    store: &mut self.store,
                    alerts: &mut self.alerts,
                    board: &mut self.board,
                };
                device.perform(action, &mut cx);
            }
        }
    }

    pub fn tick(&mut self, clock: &impl Clock) {
        self.tick_at(clock.monotonic_secs(), clock.wall());
    }

    /// Run the control loop forever, pacing ticks by the configured loop
    /// interval.
    pub fn run(&mut self, clock: &impl Clock) -> ! {
        info!(
            "control loop starting: {} devices, tick every {:?}",
            self.devices.len(),
            self.loop_interval
        );
        loop {
            self.tick(clock);
            thread::sleep(self.loop_interval);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
