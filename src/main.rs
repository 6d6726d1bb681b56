//! Rig runner.
//!
//! Loads a rig configuration, builds every device record into its device,
//! registers them in file order and runs the control loop. This binary
//! wires the in-memory adapters, which makes it a dry run out of the box;
//! a hardware deployment swaps in its own pin driver, store, notifier and
//! serial link at the [`Rig`] constructor.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use log::info;

use growrig::Rig;
use growrig::adapters::{LogNotifier, MemoryPinDriver, MemoryStore, ScriptedSerial};
use growrig::config::{DeviceConfig, RigConfig};
use growrig::device::Device;
use growrig::inputs::MultiSensorInput;
use growrig::notify::AlertGate;
use growrig::outputs::{ClockOutput, DutyCycleOutput, SensorOutput};
use growrig::storage::{HistoryKeeper, Storage};
use growrig::timing::SystemClock;

fn build(record: &DeviceConfig) -> Result<Box<dyn Device>> {
    let device: Box<dyn Device> = match record {
        DeviceConfig::Clock(c) => Box::new(ClockOutput::from_config(c)?),
        DeviceConfig::DutyCycle(c) => Box::new(DutyCycleOutput::from_config(c)?),
        DeviceConfig::Sensor(c) => Box::new(SensorOutput::from_config(c)?),
        DeviceConfig::MultiSensor(c) => Box::new(MultiSensorInput::from_config(
            c,
            Box::new(ScriptedSerial::new()),
        )?),
        DeviceConfig::HistoryKeeper(c) => Box::new(HistoryKeeper::from_config(c)?),
    };
    Ok(device)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: growrig <rig-config.json>")?;
    let cfg = RigConfig::load(&path)?;

    let mut rig = Rig::new(
        Box::new(MemoryPinDriver::new()),
        Storage::new(Box::new(MemoryStore::new())),
        AlertGate::new(Box::new(LogNotifier)),
        cfg.valid_output_pins.clone(),
        Duration::from_millis(cfg.loop_interval_ms),
    );

    for record in &cfg.devices {
        info!("building device '{}'", record.name());
        rig.register(build(record)?)
            .with_context(|| format!("registering '{}'", record.name()))?;
    }

    rig.run(&SystemClock::new())
}
