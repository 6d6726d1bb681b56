//! Log-only notification transport.

use log::warn;

use crate::ports::{AlertCategory, Notifier, NotifyError};

/// Writes every alert to the log at WARN and calls it delivered. The
/// dry-run default when no real transport is wired up.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&mut self, category: AlertCategory, message: &str) -> Result<(), NotifyError> {
        warn!("[{}] {message}", category.key());
        Ok(())
    }
}
