//! Cooperative control framework for grow-tent rigs.
//!
//! A rig is a set of devices sharing one Raspberry Pi: relay-driven
//! actuators (lights on a weekly schedule, fans on a duty cycle, heaters
//! and CO2 valves regulated against stored sensor readings) plus a serial
//! multi-value sensor feeding the readings in. A single-threaded scheduler
//! ticks every device's due actions in a fixed order; there are no threads,
//! no interrupts and no async.
//!
//! Layering follows ports-and-adapters:
//! - [`ports`] defines the traits to the outside world (pins, row store,
//!   notifications, serial link) and their typed errors,
//! - [`device`], [`timing`], [`outputs`], [`inputs`], [`storage`] and
//!   [`notify`] are the domain — they only ever see the port traits,
//! - [`adapters`] holds the in-memory implementations used by tests and
//!   the dry-run binary; real integrations plug in at the same seams,
//! - [`scheduler`] owns registration, pin validation and the tick loop.

pub mod adapters;
pub mod config;
pub mod device;
pub mod error;
pub mod inputs;
pub mod notify;
pub mod outputs;
pub mod ports;
pub mod scheduler;
pub mod storage;
pub mod timing;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{Error, Result};
pub use scheduler::Rig;
