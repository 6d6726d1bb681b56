//! Configuration records.
//!
//! One record per device, deserialized from a single JSON rig file by the
//! binary. Records are plain data — cross-field validation (weekly
//! schedule shape, action-name resolution, value-shift symbols, pin
//! assignments) happens in the constructors that consume them, so a broken
//! record aborts startup with a message naming the device and field.
//!
//! There is deliberately no module-level mutable state here: everything a
//! device needs arrives through its record at construction.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default control-loop pacing between ticks.
fn default_loop_interval_ms() -> u64 {
    500
}

/// Raspberry Pi header pins that can legally drive a relay channel.
fn default_valid_output_pins() -> Vec<u8> {
    vec![7, 11, 12, 13, 15, 16, 18, 22, 29, 31, 32, 33, 36, 37]
}

fn default_timestamp_column() -> String {
    "recorded_at".to_owned()
}

/// Top-level rig configuration: loop pacing, the legal output-pin set and
/// every device record, in registration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigConfig {
    #[serde(default = "default_loop_interval_ms")]
    pub loop_interval_ms: u64,
    #[serde(default = "default_valid_output_pins")]
    pub valid_output_pins: Vec<u8>,
    pub devices: Vec<DeviceConfig>,
}

impl RigConfig {
    /// Load and parse a rig file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|e| ConfigError::new(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| ConfigError::new(format!("cannot parse {}: {e}", path.display())))
    }
}

/// Binds an action name to the interval (seconds) it runs at. Binding
/// order in the record is execution order within a tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionBinding {
    pub action: String,
    pub interval_secs: u32,
}

/// One device record, tagged by variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceConfig {
    Clock(ClockOutputConfig),
    DutyCycle(DutyCycleConfig),
    Sensor(SensorOutputConfig),
    MultiSensor(MultiSensorConfig),
    HistoryKeeper(HistoryKeeperConfig),
}

impl DeviceConfig {
    pub fn name(&self) -> &str {
        match self {
            Self::Clock(c) => &c.name,
            Self::DutyCycle(c) => &c.name,
            Self::Sensor(c) => &c.name,
            Self::MultiSensor(c) => &c.name,
            Self::HistoryKeeper(c) => &c.name,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Clock output
// ───────────────────────────────────────────────────────────────

/// On/off hours for one weekday. Hours are 0–23 (validated on
/// construction, not here).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DayHours {
    pub on_hour: u8,
    pub off_hour: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockOutputConfig {
    pub name: String,
    pub actions: Vec<ActionBinding>,
    pub pins: Vec<u8>,
    /// Keyed by English weekday name ("Monday" … "Sunday"); must contain
    /// exactly the seven days.
    pub week_schedule: BTreeMap<String, DayHours>,
    #[serde(default)]
    pub block_button_pin: Option<u8>,
    #[serde(default)]
    pub block_duration_secs: Option<u32>,
}

// ───────────────────────────────────────────────────────────────
// Duty-cycle output
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DutyCycleConfig {
    pub name: String,
    pub actions: Vec<ActionBinding>,
    pub pins: Vec<u8>,
    pub on_seconds: u32,
    pub off_seconds: u32,
}

// ───────────────────────────────────────────────────────────────
// Sensor-driven output
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterlockRuleConfig {
    /// Name of the peer device whose state blocks this output.
    pub peer: String,
    /// Peer state that forces this output OFF.
    pub blocking_state: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorOutputConfig {
    pub name: String,
    pub actions: Vec<ActionBinding>,
    pub pins: Vec<u8>,
    /// Table the driving sensor persists into.
    pub table: String,
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,
    /// Column holding the value this actuator regulates.
    pub column: String,
    /// "+" for an increasing-effect actuator (heater), "-" for a
    /// decreasing-effect one (chiller, exhaust). Anything else is fatal.
    pub value_shift: String,
    pub target_value: f64,
    /// Deadband half-width around the target.
    pub target_range: f64,
    /// Oldest a reading may be (seconds) and still drive the actuator.
    pub good_reading_interval_secs: i64,
    #[serde(default)]
    pub interlocks: Vec<InterlockRuleConfig>,
}

// ───────────────────────────────────────────────────────────────
// Multi-value serial sensor
// ───────────────────────────────────────────────────────────────

/// Declared type of a telemetry column; token values must coerce to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Integer,
    Real,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

/// High/low thresholds that trigger a rate-limited alarm notification.
/// Either bound may be absent.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AlarmBounds {
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiSensorConfig {
    pub name: String,
    pub actions: Vec<ActionBinding>,
    /// Table assembled readings are persisted to.
    pub table: String,
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,
    /// Telemetry columns, in the order tokens are matched against them.
    pub columns: Vec<ColumnSpec>,
    /// Consecutive silent polls before the link is torn down and reopened.
    pub no_readings_limit: u32,
    /// Alarm thresholds keyed by column name.
    #[serde(default)]
    pub alarms: BTreeMap<String, AlarmBounds>,
}

// ───────────────────────────────────────────────────────────────
// History keeper
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryKeeperConfig {
    pub name: String,
    pub actions: Vec<ActionBinding>,
    pub table: String,
    /// Rows older than this many days are purged.
    pub max_age_days: u32,
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
