//! End-to-end rig scenarios: devices registered on one scheduler, driven
//! tick by tick through in-memory collaborators held by shared handles so
//! the tests can inspect pins, rows and alerts from outside.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime};

use growrig::Rig;
use growrig::adapters::{MemoryPinDriver, MemoryStore, ScriptedSerial};
use growrig::config::{
    ActionBinding, AlarmBounds, ColumnKind, ColumnSpec, DutyCycleConfig, InterlockRuleConfig,
    MultiSensorConfig, SensorOutputConfig,
};
use growrig::inputs::MultiSensorInput;
use growrig::notify::AlertGate;
use growrig::outputs::{DutyCycleOutput, SensorOutput};
use growrig::ports::{
    AlertCategory, Notifier, NotifyError, PinDirection, PinDriver, PinError, Reading, Row,
    RowStore, StoreError, Value,
};
use growrig::storage::Storage;
use growrig::timing::WallTime;

// ─── shared-handle collaborators ───

#[derive(Clone, Default)]
struct SharedPins(Rc<RefCell<MemoryPinDriver>>);

impl SharedPins {
    fn level(&self, pin: u8) -> Option<bool> {
        self.0.borrow().level(pin)
    }
}

impl PinDriver for SharedPins {
    fn configure(&mut self, pin: u8, direction: PinDirection) -> Result<(), PinError> {
        self.0.borrow_mut().configure(pin, direction)
    }

    fn write(&mut self, pin: u8, high: bool) -> Result<(), PinError> {
        self.0.borrow_mut().write(pin, high)
    }

    fn read(&self, pin: u8) -> Result<bool, PinError> {
        self.0.borrow().read(pin)
    }
}

#[derive(Clone, Default)]
struct SharedStore(Rc<RefCell<MemoryStore>>);

impl RowStore for SharedStore {
    fn insert(&mut self, table: &str, row: &Row) -> Result<(), StoreError> {
        self.0.borrow_mut().insert(table, row)
    }

    fn latest(&mut self, table: &str, columns: &[&str]) -> Result<Option<Reading>, StoreError> {
        self.0.borrow_mut().latest(table, columns)
    }

    fn purge_older_than(&mut self, table: &str, max_age_days: u32) -> Result<u64, StoreError> {
        self.0.borrow_mut().purge_older_than(table, max_age_days)
    }
}

#[derive(Clone, Default)]
struct Recorder(Rc<RefCell<Vec<(AlertCategory, String)>>>);

impl Recorder {
    fn count(&self) -> usize {
        self.0.borrow().len()
    }
}

impl Notifier for Recorder {
    fn send(&mut self, category: AlertCategory, message: &str) -> Result<(), NotifyError> {
        self.0.borrow_mut().push((category, message.to_owned()));
        Ok(())
    }
}

// ─── fixture helpers ───

fn midday() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 4, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn wall_at(stamp: NaiveDateTime) -> WallTime {
    WallTime {
        weekday: 0,
        hour: 12,
        stamp,
    }
}

fn rig() -> (Rig, SharedPins, SharedStore, Recorder) {
    let pins = SharedPins::default();
    let store = SharedStore::default();
    let recorder = Recorder::default();
    let rig = Rig::new(
        Box::new(pins.clone()),
        Storage::new(Box::new(store.clone())),
        AlertGate::new(Box::new(recorder.clone())),
        vec![7, 11, 12, 13, 15, 16],
        Duration::from_millis(500),
    );
    (rig, pins, store, recorder)
}

fn bind(action: &str, interval: u32) -> ActionBinding {
    ActionBinding {
        action: action.to_owned(),
        interval_secs: interval,
    }
}

fn co2_reading(stamp: NaiveDateTime, ppm: i64) -> Row {
    vec![
        ("recorded_at".to_owned(), Value::Timestamp(stamp)),
        ("co2".to_owned(), Value::Int(ppm)),
    ]
}

fn multi_sensor_config(limit: u32) -> MultiSensorConfig {
    MultiSensorConfig {
        name: "tent-sensor".to_owned(),
        actions: vec![
            bind("poll_readings", 5),
            bind("check_link", 5),
            bind("alarm_check", 5),
        ],
        table: "sensors".to_owned(),
        timestamp_column: "recorded_at".to_owned(),
        columns: vec![
            ColumnSpec {
                name: "temperature".to_owned(),
                kind: ColumnKind::Real,
            },
            ColumnSpec {
                name: "co2".to_owned(),
                kind: ColumnKind::Integer,
            },
        ],
        no_readings_limit: limit,
        alarms: [(
            "temperature".to_owned(),
            AlarmBounds {
                high: Some(32.0),
                low: None,
            },
        )]
        .into(),
    }
}

// ─── scenarios ───

#[test]
fn interlock_blocks_the_valve_until_the_fan_stops() {
    let (mut rig, pins, store, _) = rig();

    // CO2 valve wants to run whenever the level is low, but never while
    // the exhaust fan is venting. Valve registered first, so within a tick
    // it sees the fan state published last tick.
    let valve = SensorOutput::from_config(&SensorOutputConfig {
        name: "co2-valve".to_owned(),
        actions: vec![bind("find_state", 5)],
        pins: vec![13],
        table: "sensors".to_owned(),
        timestamp_column: "recorded_at".to_owned(),
        column: "co2".to_owned(),
        value_shift: "+".to_owned(),
        target_value: 800.0,
        target_range: 50.0,
        good_reading_interval_secs: 3600,
        interlocks: vec![InterlockRuleConfig {
            peer: "exhaust-fan".to_owned(),
            blocking_state: true,
        }],
    })
    .unwrap();

    // Fan runs a 5s ON phase, then stays off for a long time.
    let fan = DutyCycleOutput::from_config(&DutyCycleConfig {
        name: "exhaust-fan".to_owned(),
        actions: vec![bind("find_state", 5)],
        pins: vec![11],
        on_seconds: 5,
        off_seconds: 1000,
    })
    .unwrap();

    rig.register(Box::new(valve)).unwrap();
    rig.register(Box::new(fan)).unwrap();

    // Registration asserted initial states: fan ON, valve OFF.
    assert_eq!(pins.level(11), Some(true));
    assert_eq!(pins.level(13), Some(false));

    // CO2 is low the whole time.
    let mut writer = store.clone();
    writer
        .insert("sensors", &co2_reading(midday(), 700))
        .unwrap();

    // First tick: the fan is still venting, so the valve stays shut even
    // though the reading demands CO2.
    rig.tick_at(6, wall_at(midday()));
    assert_eq!(pins.level(13), Some(false));

    // The same tick exhausted the fan's ON phase.
    assert_eq!(pins.level(11), Some(false));

    // Next tick the block is gone and the valve opens.
    rig.tick_at(12, wall_at(midday() + ChronoDuration::seconds(6)));
    assert_eq!(pins.level(13), Some(true));
}

#[test]
fn telemetry_flows_from_serial_line_to_actuator() {
    let (mut rig, pins, _, _) = rig();

    let link = ScriptedSerial::new();
    let sensor =
        MultiSensorInput::from_config(&multi_sensor_config(10), Box::new(link.clone())).unwrap();

    // Heater regulated at 75 ± 2 on the column the sensor fills in.
    let heater = SensorOutput::from_config(&SensorOutputConfig {
        name: "heater-0".to_owned(),
        actions: vec![bind("find_state", 5)],
        pins: vec![15],
        table: "sensors".to_owned(),
        timestamp_column: "recorded_at".to_owned(),
        column: "temperature".to_owned(),
        value_shift: "+".to_owned(),
        target_value: 75.0,
        target_range: 2.0,
        good_reading_interval_secs: 600,
        interlocks: Vec::new(),
    })
    .unwrap();

    rig.register(Box::new(sensor)).unwrap();
    rig.register(Box::new(heater)).unwrap();

    // A cold reading arrives over the wire; the sensor ingests it and the
    // heater, evaluated later in the same tick, reacts to it.
    link.push_line("temperature:70.0 co2:812");
    rig.tick_at(6, wall_at(midday()));
    assert_eq!(pins.level(15), Some(true));

    // Warm enough: the heater releases at the high edge.
    link.push_line("temperature:77.5");
    rig.tick_at(12, wall_at(midday() + ChronoDuration::seconds(6)));
    assert_eq!(pins.level(15), Some(false));
}

#[test]
fn dead_link_reconnects_exactly_once() {
    let (mut rig, _, _, _) = rig();

    let link = ScriptedSerial::new();
    let sensor =
        MultiSensorInput::from_config(&multi_sensor_config(2), Box::new(link.clone())).unwrap();
    rig.register(Box::new(sensor)).unwrap();

    // Two silent polls reach the limit on the second tick.
    rig.tick_at(6, wall_at(midday()));
    assert_eq!(link.reconnect_count(), 0);
    rig.tick_at(12, wall_at(midday() + ChronoDuration::seconds(6)));
    assert_eq!(link.reconnect_count(), 1);

    // The reconnect cleared the silence count, so the next tick stays calm.
    rig.tick_at(18, wall_at(midday() + ChronoDuration::seconds(12)));
    assert_eq!(link.reconnect_count(), 1);
}

#[test]
fn threshold_alarm_fires_once_and_is_rate_limited() {
    let (mut rig, _, _, recorder) = rig();

    let link = ScriptedSerial::new();
    let sensor =
        MultiSensorInput::from_config(&multi_sensor_config(10), Box::new(link.clone())).unwrap();
    rig.register(Box::new(sensor)).unwrap();

    link.push_line("temperature:33.5");
    rig.tick_at(6, wall_at(midday()));
    assert_eq!(recorder.count(), 1);

    // Condition persists across the next checks; the gate holds the line.
    rig.tick_at(12, wall_at(midday() + ChronoDuration::seconds(6)));
    rig.tick_at(18, wall_at(midday() + ChronoDuration::seconds(12)));
    assert_eq!(recorder.count(), 1);
}
