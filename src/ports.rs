//! Port traits — the boundary between the control framework and its
//! external collaborators.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Device / Rig (domain)
//! ```
//!
//! The electrical pin driver, the row store, the notification transport and
//! the serial transport all live outside this crate. Devices only ever see
//! these traits; adapters (real hardware, SQLite, SMTP, a UART) implement
//! them at the integration point. Host-side in-memory adapters live in
//! [`crate::adapters`].
//!
//! Port errors are typed and defined next to their trait. None of them is
//! allowed to take down the control loop: the storage façade
//! ([`crate::storage::Storage`]) and the alert gate
//! ([`crate::notify::AlertGate`]) translate failure into "no result" plus a
//! log line, and the serial watchdog turns link failure into a reconnect.

use std::fmt;

use chrono::NaiveDateTime;

// ───────────────────────────────────────────────────────────────
// Pin driver (domain → electrical layer)
// ───────────────────────────────────────────────────────────────

/// Direction a pin is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinDirection {
    /// Digital input (momentary buttons; sampled, never interrupt-driven).
    Input,
    /// Digital output (relay channels).
    Output,
}

/// Write-side port for the electrical layer.
///
/// Implementations must reject configuring the same pin twice — the rig
/// additionally validates assignments against its valid-output-pin set
/// before ever calling [`configure`](PinDriver::configure), so a duplicate
/// reaching the driver is a wiring bug, not an operator mistake.
pub trait PinDriver {
    /// Claim `pin` for the given direction.
    fn configure(&mut self, pin: u8, direction: PinDirection) -> std::result::Result<(), PinError>;

    /// Drive an output pin high (`true`) or low (`false`).
    fn write(&mut self, pin: u8, high: bool) -> std::result::Result<(), PinError>;

    /// Sample the current level of a configured pin.
    fn read(&self, pin: u8) -> std::result::Result<bool, PinError>;
}

/// Errors from [`PinDriver`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinError {
    /// The pin was already claimed by an earlier `configure` call.
    AlreadyAssigned(u8),
    /// The pin has not been configured.
    NotConfigured(u8),
    /// The pin is configured as an input but was written to.
    NotAnOutput(u8),
    /// The underlying electrical layer failed.
    Io,
}

impl fmt::Display for PinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyAssigned(p) => write!(f, "pin {p} is already assigned"),
            Self::NotConfigured(p) => write!(f, "pin {p} is not configured"),
            Self::NotAnOutput(p) => write!(f, "pin {p} is not an output"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Row store (domain ↔ persistence)
// ───────────────────────────────────────────────────────────────

/// A single cell value in a stored row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Real(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Numeric view of the value, if it has one. Alarm thresholds and
    /// hysteresis targets compare through this.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Real(v) => Some(*v),
            Self::Text(_) | Self::Timestamp(_) => None,
        }
    }
}

/// One row: column name → value, in insertion order.
pub type Row = Vec<(String, Value)>;

/// The latest stored reading for one column: when it was recorded and what
/// was recorded. `value` is `None` when the column was absent from the row.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub timestamp: NaiveDateTime,
    pub value: Option<Value>,
}

/// Minimal key/value row-store contract.
///
/// `latest` takes a two-column selection: the timestamp column first, the
/// value column second.
pub trait RowStore {
    /// Append one row to `table`.
    fn insert(&mut self, table: &str, row: &Row) -> std::result::Result<(), StoreError>;

    /// Most recent reading for `columns = [timestamp_column, value_column]`.
    /// `Ok(None)` means the table has no row carrying both columns yet.
    fn latest(
        &mut self,
        table: &str,
        columns: &[&str],
    ) -> std::result::Result<Option<Reading>, StoreError>;

    /// Delete rows older than `max_age_days`. Returns the number removed.
    fn purge_older_than(
        &mut self,
        table: &str,
        max_age_days: u32,
    ) -> std::result::Result<u64, StoreError>;
}

/// Errors from [`RowStore`] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The requested table does not exist.
    NoSuchTable(String),
    /// The backend rejected the operation (transient or permanent).
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSuchTable(t) => write!(f, "no such table '{t}'"),
            Self::Backend(msg) => write!(f, "backend error: {msg}"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Notification transport (domain → operator)
// ───────────────────────────────────────────────────────────────

/// Why an alert is being raised. Used both as the message subject line and
/// as half of the rate-limit key in [`crate::notify::AlertGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertCategory {
    Fault,
    HighValue,
    LowValue,
}

impl AlertCategory {
    pub fn key(self) -> &'static str {
        match self {
            Self::Fault => "FAULT",
            Self::HighValue => "HIGH-VALUE-ALERT",
            Self::LowValue => "LOW-VALUE-ALERT",
        }
    }
}

/// Outward delivery port (email, SMS, whatever the adapter wires up).
/// Always called through the rate-limiting [`crate::notify::AlertGate`].
pub trait Notifier {
    fn send(&mut self, category: AlertCategory, message: &str)
    -> std::result::Result<(), NotifyError>;
}

/// Errors from [`Notifier`] delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    Transport(String),
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "transport: {msg}"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Serial transport (telemetry → domain)
// ───────────────────────────────────────────────────────────────

/// Line-oriented serial transport to the multi-value sensor.
///
/// `reconnect` is a full close-and-reopen, including any pre-connection
/// step a wireless transport needs; the adapter owns that detail.
pub trait SerialLink {
    /// Number of bytes ready to read without blocking.
    fn bytes_waiting(&mut self) -> std::result::Result<usize, SerialError>;

    /// Read and decode one newline-terminated line (terminator stripped).
    fn read_line(&mut self) -> std::result::Result<String, SerialError>;

    /// Tear the link down and bring it back up.
    fn reconnect(&mut self) -> std::result::Result<(), SerialError>;
}

/// Errors from [`SerialLink`] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialError {
    /// The link is down (open failed or the peer went away).
    Disconnected,
    /// The received bytes were not valid text.
    Decode,
    /// The underlying transport failed.
    Io(String),
}

impl fmt::Display for SerialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "link disconnected"),
            Self::Decode => write!(f, "undecodable bytes"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}
