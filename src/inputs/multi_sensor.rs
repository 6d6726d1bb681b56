//! Multi-value serial sensor: line ingestion, fuzzy key matching, the
//! dead-link watchdog and threshold alarms.
//!
//! The sensor board emits one whitespace-separated line of `key:value`
//! tokens per reading cycle. Firmware on the board occasionally garbles a
//! key by a character (serial noise, or a typo baked into a deployed
//! build), so keys match their configured column by edit distance rather
//! than equality. Values that fail to coerce to the column's declared kind
//! are dropped without ceremony — one bad token must not cost the rest of
//! the line.
//!
//! Three bound actions, usually on separate intervals:
//! - `poll_readings` drains at most one line per call and persists it,
//! - `check_link` reopens the link after too many silent polls,
//! - `alarm_check` compares the latest stored values against thresholds.

use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::config::{AlarmBounds, ColumnKind, ColumnSpec, MultiSensorConfig};
use crate::device::{Action, ActionTable, Device, DueActions, TickContext};
use crate::error::ConfigError;
use crate::ports::{AlertCategory, SerialLink, Value};

// ───────────────────────────────────────────────────────────────
// Line parsing
// ───────────────────────────────────────────────────────────────

/// Edit distance with substitutions, insertions, deletions and adjacent
/// transpositions all costing one. Transpositions matter here: "ligth" is
/// one slip away from "light", not two.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (n, m) = (a.len(), b.len());
    if n == 0 {
        return m;
    }
    if m == 0 {
        return n;
    }

    // Three rolling rows: two back (for transpositions), one back, current.
    let mut prev2 = vec![0usize; m + 1];
    let mut prev: Vec<usize> = (0..=m).collect();
    let mut curr = vec![0usize; m + 1];

    for i in 1..=n {
        curr[0] = i;
        for j in 1..=m {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                curr[j] = curr[j].min(prev2[j - 2] + 1);
            }
        }
        std::mem::swap(&mut prev2, &mut prev);
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[m]
}

/// Keys within this distance of a configured column name still match.
const KEY_MATCH_TOLERANCE: usize = 1;

fn coerce(raw: &str, kind: ColumnKind) -> Option<Value> {
    match kind {
        ColumnKind::Integer => raw.parse::<i64>().ok().map(Value::Int),
        ColumnKind::Real => raw.parse::<f64>().ok().map(Value::Real),
    }
}

/// Parse one telemetry line into column/value pairs.
///
/// Tokens without a `:`, with an unmatchable key or with an uncoercible
/// value are skipped silently. A later token for an already-filled column
/// overwrites the earlier one.
pub fn parse_line(line: &str, columns: &[ColumnSpec]) -> Vec<(String, Value)> {
    let mut row: Vec<(String, Value)> = Vec::new();

    for token in line.split_whitespace() {
        let Some((key, raw)) = token.split_once(':') else {
            debug!("token '{token}' has no key:value shape, skipping");
            continue;
        };

        let Some(column) = columns
            .iter()
            .find(|c| edit_distance(key, &c.name) <= KEY_MATCH_TOLERANCE)
        else {
            debug!("token key '{key}' matches no column, skipping");
            continue;
        };

        let Some(value) = coerce(raw, column.kind) else {
            debug!("token '{token}' does not coerce to {:?}, skipping", column.kind);
            continue;
        };

        match row.iter_mut().find(|(name, _)| *name == column.name) {
            Some(slot) => slot.1 = value,
            None => row.push((column.name.clone(), value)),
        }
    }

    row
}

// ───────────────────────────────────────────────────────────────
// Device
// ───────────────────────────────────────────────────────────────

pub struct MultiSensorInput {
    name: String,
    actions: ActionTable,
    link: Box<dyn SerialLink>,
    table: String,
    timestamp_column: String,
    columns: Vec<ColumnSpec>,
    no_readings_limit: u32,
    /// Consecutive polls that produced no line. Reset by a successful read
    /// and by a watchdog reconnect.
    silent_polls: u32,
    alarms: BTreeMap<String, AlarmBounds>,
}

impl MultiSensorInput {
    const CAPABILITIES: &'static [Action] =
        &[Action::PollReadings, Action::CheckLink, Action::AlarmCheck];

    pub fn from_config(
        cfg: &MultiSensorConfig,
        link: Box<dyn SerialLink>,
    ) -> Result<Self, ConfigError> {
        if cfg.columns.is_empty() {
            return Err(ConfigError::new(format!(
                "'{}' declares no telemetry columns",
                cfg.name
            )));
        }
        for column in cfg.alarms.keys() {
            if !cfg.columns.iter().any(|c| c.name == *column) {
                return Err(ConfigError::new(format!(
                    "'{}' has an alarm on unknown column '{column}'",
                    cfg.name
                )));
            }
        }
        let actions = ActionTable::resolve(&cfg.name, Self::CAPABILITIES, &cfg.actions)?;

        Ok(Self {
            name: cfg.name.clone(),
            actions,
            link,
            table: cfg.table.clone(),
            timestamp_column: cfg.timestamp_column.clone(),
            columns: cfg.columns.clone(),
            no_readings_limit: cfg.no_readings_limit,
            silent_polls: 0,
            alarms: cfg.alarms.clone(),
        })
    }

    /// Drain at most one waiting line and persist whatever parsed out of
    /// it, stamped with this tick's wall time.
    fn poll_readings(&mut self, cx: &mut TickContext<'_>) {
        match self.link.bytes_waiting() {
            Ok(0) => {
                self.silent_polls += 1;
                debug!("{}: nothing waiting ({} silent polls)", self.name, self.silent_polls);
            }
            Ok(_) => match self.link.read_line() {
                Ok(line) => {
                    self.silent_polls = 0;
                    let mut row = parse_line(&line, &self.columns);
                    if row.is_empty() {
                        debug!("{}: no usable tokens in '{line}'", self.name);
                        return;
                    }
                    row.insert(
                        0,
                        (self.timestamp_column.clone(), Value::Timestamp(cx.wall.stamp)),
                    );
                    cx.store.insert(&self.table, &row);
                }
                Err(e) => {
                    self.silent_polls += 1;
                    warn!("{}: read failed: {e}", self.name);
                }
            },
            Err(e) => {
                self.silent_polls += 1;
                warn!("{}: cannot query link: {e}", self.name);
            }
        }
    }

    /// Dead-link watchdog. Reopening resets the silence count so one
    /// outage triggers exactly one reconnect, not one per subsequent call.
    fn check_link(&mut self, cx: &mut TickContext<'_>) {
        if self.silent_polls < self.no_readings_limit {
            return;
        }

        warn!(
            "{}: {} consecutive silent polls, reopening link",
            self.name, self.silent_polls
        );
        cx.alerts.notify(
            cx.now,
            &self.name,
            AlertCategory::Fault,
            &format!("{}: serial link silent, reconnecting", self.name),
        );

        if let Err(e) = self.link.reconnect() {
            warn!("{}: reconnect failed: {e}", self.name);
        } else {
            info!("{}: link reopened", self.name);
        }
        self.silent_polls = 0;
    }

    /// Compare the latest stored value of every alarmed column against its
    /// bounds. The alert gate rate-limits repeats.
    fn alarm_check(&mut self, cx: &mut TickContext<'_>) {
        for (column, bounds) in &self.alarms {
            let Some(reading) = cx
                .store
                .latest(&self.table, &[&self.timestamp_column, column])
            else {
                continue;
            };
            if reading.timestamp.date() != cx.wall.stamp.date() {
                debug!("{}: '{column}' has no reading from today, skipping alarm", self.name);
                continue;
            }
            let Some(value) = reading.value.as_ref().and_then(Value::as_f64) else {
                continue;
            };

            let subject = format!("{}.{column}", self.name);
            if let Some(high) = bounds.high {
                if value >= high {
                    cx.alerts.notify(
                        cx.now,
                        &subject,
                        AlertCategory::HighValue,
                        &format!("{column} is {value}, at or above {high}"),
                    );
                }
            }
            if let Some(low) = bounds.low {
                if value <= low {
                    cx.alerts.notify(
                        cx.now,
                        &subject,
                        AlertCategory::LowValue,
                        &format!("{column} is {value}, at or below {low}"),
                    );
                }
            }
        }
    }
}

impl Device for MultiSensorInput {
    fn name(&self) -> &str {
        &self.name
    }

    fn due_actions(&mut self, now: i64) -> DueActions {
        self.actions.due(now)
    }

    fn perform(&mut self, action: Action, cx: &mut TickContext<'_>) {
        match action {
            Action::PollReadings => self.poll_readings(cx),
            Action::CheckLink => self.check_link(cx),
            Action::AlarmCheck => self.alarm_check(cx),
            other => debug!("{}: ignoring unbound action {other:?}", self.name),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
