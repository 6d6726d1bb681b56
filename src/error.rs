//! Unified error types for the growrig framework.
//!
//! One crate-level `Error` enum that every subsystem converts into, keeping
//! the control loop's error handling uniform. Startup-fatal problems are
//! always a [`ConfigError`]; everything that can happen after startup is
//! logged and survived by the loop (see the per-port error enums in
//! [`crate::ports`]).

use std::fmt;

use crate::ports::{NotifyError, PinError, SerialError, StoreError};

// ---------------------------------------------------------------------------
// Top-level framework error
// ---------------------------------------------------------------------------

/// Every fallible operation in the framework funnels into this type.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration is invalid. Fatal at startup, never retried.
    Config(ConfigError),
    /// A pin-driver operation failed.
    Pin(PinError),
    /// The row store failed.
    Store(StoreError),
    /// The serial link failed.
    Serial(SerialError),
    /// Notification delivery failed.
    Notify(NotifyError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Pin(e) => write!(f, "pin: {e}"),
            Self::Store(e) => write!(f, "store: {e}"),
            Self::Serial(e) => write!(f, "serial: {e}"),
            Self::Notify(e) => write!(f, "notify: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// A configuration record failed validation.
///
/// Carries a human-readable message naming the device and the offending
/// field; these abort startup, so the message is the whole interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    message: String,
}

impl ConfigError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<PinError> for Error {
    fn from(e: PinError) -> Self {
        Self::Pin(e)
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<SerialError> for Error {
    fn from(e: SerialError) -> Self {
        Self::Serial(e)
    }
}

impl From<NotifyError> for Error {
    fn from(e: NotifyError) -> Self {
        Self::Notify(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Framework-wide `Result` alias.
pub type Result<T> = std::result::Result<T, Error>;
