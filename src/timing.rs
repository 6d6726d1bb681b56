//! Per-action timers and the clock seam.
//!
//! Nothing in the framework ever sleeps inside an action: every device owns
//! one [`Timer`] per configured action and the scheduler simply asks each
//! timer whether its interval has elapsed. That keeps the loop cooperative
//! and lets every action run on its own cadence.
//!
//! [`Clock`] separates the time sources: `Timer`s run off monotonic seconds
//! (immune to NTP steps), while weekday schedules and reading timestamps
//! use the wall clock via a per-tick [`WallTime`] snapshot.

use chrono::{Datelike, Local, NaiveDateTime, Timelike};

// ───────────────────────────────────────────────────────────────
// Timer
// ───────────────────────────────────────────────────────────────

/// Fires once each time `interval` seconds have elapsed.
///
/// The reference point starts at zero, so the first fire happens one full
/// interval after the monotonic clock's origin. Firing resets the
/// reference to "now" — not to "now + interval" — so drift can only
/// shrink the next wait, never grow it. Not thread-safe by design: only
/// the scheduler thread ever calls [`check`](Timer::check).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    interval: u32,
    last_fired: i64,
}

impl Timer {
    pub fn new(interval_secs: u32) -> Self {
        Self {
            interval: interval_secs,
            last_fired: 0,
        }
    }

    /// Timer whose reference point is `now`, i.e. the first fire comes one
    /// full interval from the given instant.
    pub fn started_at(interval_secs: u32, now: i64) -> Self {
        Self {
            interval: interval_secs,
            last_fired: now,
        }
    }

    pub fn interval_secs(&self) -> u32 {
        self.interval
    }

    /// True iff more than `interval` seconds have passed since the last
    /// fire; on true the reference point is reset to `now`. No side
    /// effects on false — repeated calls between fires stay false.
    pub fn check(&mut self, now: i64) -> bool {
        // A rewound reference (clock stepped backwards before the snapshot
        // was taken) must not stall the timer forever.
        if self.last_fired < 0 {
            self.last_fired = 0;
        }

        if now - self.last_fired > i64::from(self.interval) {
            self.last_fired = now;
            true
        } else {
            false
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Wall-clock snapshot
// ───────────────────────────────────────────────────────────────

/// Wall-clock facts captured once per tick and handed to every device, so
/// all decisions within a tick agree on what time it is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallTime {
    /// Day of week, 0 = Monday … 6 = Sunday.
    pub weekday: u8,
    /// Hour of day, 0–23.
    pub hour: u8,
    /// Full local timestamp (reading freshness checks, row timestamps).
    pub stamp: NaiveDateTime,
}

/// Time source for the scheduler. Production uses [`SystemClock`]; tests
/// drive simulated clocks through the same trait.
pub trait Clock {
    /// Monotonic seconds since an arbitrary origin.
    fn monotonic_secs(&self) -> i64;

    /// Current local wall-clock snapshot.
    fn wall(&self) -> WallTime;
}

/// Process clock: monotonic seconds from [`std::time::Instant`], wall time
/// from the local timezone via chrono.
pub struct SystemClock {
    start: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn monotonic_secs(&self) -> i64 {
        self.start.elapsed().as_secs() as i64
    }

    fn wall(&self) -> WallTime {
        let now = Local::now().naive_local();
        WallTime {
            weekday: now.weekday().num_days_from_monday() as u8,
            hour: now.hour() as u8,
            stamp: now,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
