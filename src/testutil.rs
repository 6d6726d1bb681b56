//! Shared fixtures for the unit tests: one bundle of in-memory
//! collaborators plus helpers to mint tick contexts and canned readings.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

use crate::adapters::MemoryPinDriver;
use crate::device::{StateBoard, TickContext};
use crate::notify::AlertGate;
use crate::ports::{AlertCategory, Notifier, NotifyError, PinDirection, PinDriver, Value};
use crate::storage::Storage;
use crate::timing::WallTime;

/// Everything a [`Notifier`] was asked to deliver.
#[derive(Default)]
pub struct Outbox {
    pub sent: Vec<(AlertCategory, String)>,
}

struct RecordingNotifier(Rc<RefCell<Outbox>>);

impl Notifier for RecordingNotifier {
    fn send(&mut self, category: AlertCategory, message: &str) -> Result<(), NotifyError> {
        self.0.borrow_mut().sent.push((category, message.to_owned()));
        Ok(())
    }
}

/// Wall timestamp on the fixture's reference week: `weekday` days past a
/// Monday, at `hour:minute:00`.
pub fn stamp(weekday: u8, hour: u32, minute: u32) -> NaiveDateTime {
    let monday = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
    (monday + Duration::days(i64::from(weekday)))
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

/// The collaborator set a device touches during a tick, all in memory.
pub struct TestParts {
    pub pins: MemoryPinDriver,
    pub store: Storage,
    pub alerts: AlertGate,
    pub board: StateBoard,
    pub outbox: Rc<RefCell<Outbox>>,
}

impl TestParts {
    pub fn new() -> Self {
        let outbox = Rc::new(RefCell::new(Outbox::default()));
        Self {
            pins: MemoryPinDriver::new(),
            store: Storage::new(Box::new(crate::adapters::MemoryStore::new())),
            alerts: AlertGate::new(Box::new(RecordingNotifier(Rc::clone(&outbox)))),
            board: StateBoard::new(),
            outbox,
        }
    }

    pub fn configure_output(&mut self, pin: u8) {
        self.pins.configure(pin, PinDirection::Output).unwrap();
    }

    pub fn configure_input(&mut self, pin: u8, level: bool) {
        self.pins.configure(pin, PinDirection::Input).unwrap();
        self.pins.force_level(pin, level);
    }

    /// Tick context at monotonic second `now`, with the wall clock showing
    /// `weekday`/`hour` on the fixture's reference week.
    pub fn cx(&mut self, now: i64, weekday: u8, hour: u8) -> TickContext<'_> {
        self.cx_at(now, stamp(weekday, u32::from(hour), 0))
    }

    /// Tick context with an exact wall timestamp (freshness tests need
    /// minute precision).
    pub fn cx_at(&mut self, now: i64, at: NaiveDateTime) -> TickContext<'_> {
        let wall = WallTime {
            weekday: at.weekday().num_days_from_monday() as u8,
            hour: at.hour() as u8,
            stamp: at,
        };
        TickContext {
            now,
            wall,
            pins: &mut self.pins,
            store: &mut self.store,
            alerts: &mut self.alerts,
            board: &mut self.board,
        }
    }

    /// Persist one timestamped reading the way the multi-sensor would.
    pub fn insert_reading(&mut self, table: &str, at: NaiveDateTime, column: &str, value: Value) {
        let row = vec![
            ("recorded_at".to_owned(), Value::Timestamp(at)),
            (column.to_owned(), value),
        ];
        self.store.insert(table, &row);
    }
}
