//! In-memory pin driver.

use std::collections::HashMap;

use crate::ports::{PinDirection, PinDriver, PinError};

struct PinState {
    direction: PinDirection,
    level: bool,
}

/// [`PinDriver`] over a plain map, with extra inspection hooks the real
/// electrical layer cannot offer: reading the level of any pin, forcing a
/// level from "outside" and counting writes.
#[derive(Default)]
pub struct MemoryPinDriver {
    pins: HashMap<u8, PinState>,
    writes: u64,
}

impl MemoryPinDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current level of a configured pin, `None` if unconfigured.
    pub fn level(&self, pin: u8) -> Option<bool> {
        self.pins.get(&pin).map(|p| p.level)
    }

    /// Set a pin's level behind the framework's back, as external
    /// interference (or a pressed button) would.
    pub fn force_level(&mut self, pin: u8, level: bool) {
        if let Some(state) = self.pins.get_mut(&pin) {
            state.level = level;
        }
    }

    /// Writes issued through [`PinDriver::write`] since the last reset.
    pub fn write_count(&self) -> u64 {
        self.writes
    }

    pub fn reset_write_count(&mut self) {
        self.writes = 0;
    }
}

impl PinDriver for MemoryPinDriver {
    fn configure(&mut self, pin: u8, direction: PinDirection) -> Result<(), PinError> {
        if self.pins.contains_key(&pin) {
            return Err(PinError::AlreadyAssigned(pin));
        }
        self.pins.insert(
            pin,
            PinState {
                direction,
                level: false,
            },
        );
        Ok(())
    }

    fn write(&mut self, pin: u8, high: bool) -> Result<(), PinError> {
        let state = self.pins.get_mut(&pin).ok_or(PinError::NotConfigured(pin))?;
        if state.direction != PinDirection::Output {
            return Err(PinError::NotAnOutput(pin));
        }
        state.level = high;
        self.writes += 1;
        Ok(())
    }

    fn read(&self, pin: u8) -> Result<bool, PinError> {
        self.pins
            .get(&pin)
            .map(|p| p.level)
            .ok_or(PinError::NotConfigured(pin))
    }
}
