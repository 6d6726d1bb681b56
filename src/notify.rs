//! Rate-limited operator notifications.
//!
//! Alarm conditions persist for many ticks, so raw [`Notifier`] calls would
//! flood the channel. [`AlertGate`] sits in front of the transport and
//! enforces a minimum resend interval per `(subject, category)` pair, so a
//! stuck-high temperature repeats every few minutes instead of every tick
//! while a *different* alarm still goes out immediately.
//!
//! Delivery failures are logged and swallowed: notifications are
//! best-effort by contract and never disturb the control loop.

use std::collections::HashMap;

use log::{debug, error, info};

use crate::ports::{AlertCategory, Notifier};
use crate::timing::Timer;

/// Minimum seconds between resends of the same `(subject, category)` alert.
pub const MIN_RESEND_SECS: u32 = 300;

/// Rate-limiting façade over a notification transport.
pub struct AlertGate {
    transport: Box<dyn Notifier>,
    /// One timer per (subject, category) pair ever alerted on.
    timers: HashMap<(String, AlertCategory), Timer>,
    min_resend_secs: u32,
}

impl AlertGate {
    pub fn new(transport: Box<dyn Notifier>) -> Self {
        Self::with_resend_interval(transport, MIN_RESEND_SECS)
    }

    pub fn with_resend_interval(transport: Box<dyn Notifier>, min_resend_secs: u32) -> Self {
        Self {
            transport,
            timers: HashMap::new(),
            min_resend_secs,
        }
    }

    /// Send `message` unless the same `(subject, category)` pair fired
    /// within the resend interval. The first alert for a pair always goes
    /// out immediately.
    pub fn notify(&mut self, now: i64, subject: &str, category: AlertCategory, message: &str) {
        let key = (subject.to_owned(), category);
        let due = match self.timers.get_mut(&key) {
            Some(timer) => timer.check(now),
            None => {
                self.timers
                    .insert(key, Timer::started_at(self.min_resend_secs, now));
                true
            }
        };

        if !due {
            debug!("alert '{subject}' ({}) suppressed by resend interval", category.key());
            return;
        }

        info!("alert '{subject}' ({}): {message}", category.key());
        if let Err(e) = self.transport.send(category, message) {
            error!("alert '{subject}' ({}) delivery failed: {e}", category.key());
        }
    }
}
