//! Actuator device variants and the shared relay-pin helper.

pub mod clock;
pub mod duty;
pub mod sensor;

pub use clock::ClockOutput;
pub use duty::DutyCycleOutput;
pub use sensor::SensorOutput;

use log::{error, warn};

use crate::ports::PinDriver;

/// The relay pins one output drives, plus the cached commanded state.
///
/// Writes go through here so every output gets the same policy: pin-driver
/// failures are logged and survived (the next evaluation re-asserts), and
/// [`confirm`](PinBank::confirm) re-drives any pin whose live level
/// disagrees with the cache — self-healing against missed writes or
/// external interference.
#[derive(Debug)]
pub struct PinBank {
    pins: Vec<u8>,
    state: bool,
}

impl PinBank {
    pub fn new(pins: Vec<u8>, initial_state: bool) -> Self {
        Self {
            pins,
            state: initial_state,
        }
    }

    pub fn pins(&self) -> &[u8] {
        &self.pins
    }

    /// Last commanded state.
    pub fn state(&self) -> bool {
        self.state
    }

    /// Command all pins to `state` and cache it.
    pub fn apply(&mut self, device: &str, state: bool, pins: &mut dyn PinDriver) {
        self.state = state;
        for &pin in &self.pins {
            if let Err(e) = pins.write(pin, state) {
                warn!("{device}: write to pin {pin} failed: {e}");
            }
        }
    }

    /// Compare each live pin level against the cached state; on mismatch,
    /// log and re-assert the expected level.
    pub fn confirm(&mut self, device: &str, pins: &mut dyn PinDriver) {
        for &pin in &self.pins {
            match pins.read(pin) {
                Ok(level) if level == self.state => {}
                Ok(level) => {
                    error!(
                        "{device}: pin {pin} should be {} but reads {level}, re-asserting",
                        self.state
                    );
                    if let Err(e) = pins.write(pin, self.state) {
                        warn!("{device}: re-assert of pin {pin} failed: {e}");
                    }
                }
                Err(e) => warn!("{device}: cannot read back pin {pin}: {e}"),
            }
        }
    }
}
