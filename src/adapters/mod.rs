//! Host-side adapters for the port traits.
//!
//! These back the binary's dry-run mode and the test suites: everything is
//! in memory, deterministic and inspectable. Real deployments substitute
//! their own implementations (GPIO character device, SQLite, SMTP, a UART)
//! at the same seams.

pub mod notify;
pub mod pins;
pub mod serial;
pub mod store;

pub use notify::LogNotifier;
pub use pins::MemoryPinDriver;
pub use serial::ScriptedSerial;
pub use store::MemoryStore;
