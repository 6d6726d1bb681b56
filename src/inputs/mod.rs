//! Input device variants (telemetry ingestion).

pub mod multi_sensor;

pub use multi_sensor::MultiSensorInput;
