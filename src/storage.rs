//! Storage façade and the history-keeper device.
//!
//! [`Storage`] wraps the [`RowStore`] port with the crate's persistence
//! policy: one bounded retry, then log and return "no result". A storage
//! failure must never propagate into the control loop — callers treat an
//! absent result exactly like "no valid data yet" and the fail-safe paths
//! (actuator OFF, alarm skipped) take over.

use log::{debug, error, warn};

use crate::config::HistoryKeeperConfig;
use crate::device::{Action, ActionTable, Device, DueActions, TickContext};
use crate::error::ConfigError;
use crate::ports::{Reading, Row, RowStore, StoreError};

// ───────────────────────────────────────────────────────────────
// Storage façade
// ───────────────────────────────────────────────────────────────

/// Row-store access with retry-once-then-swallow semantics.
pub struct Storage {
    inner: Box<dyn RowStore>,
}

impl Storage {
    pub fn new(inner: Box<dyn RowStore>) -> Self {
        Self { inner }
    }

    /// Append one row. Failure after the retry is logged and dropped.
    pub fn insert(&mut self, table: &str, row: &Row) {
        let result = self
            .inner
            .insert(table, row)
            .or_else(|first| self.retry_insert(table, row, &first));
        if let Err(e) = result {
            error!("store: insert into '{table}' failed after retry: {e}");
        }
    }

    /// Latest reading for `[timestamp_column, value_column]`, or `None` —
    /// which covers "no data yet" and "store is down" alike.
    pub fn latest(&mut self, table: &str, columns: &[&str]) -> Option<Reading> {
        match self
            .inner
            .latest(table, columns)
            .or_else(|first| self.retry_latest(table, columns, &first))
        {
            Ok(reading) => reading,
            Err(e) => {
                error!("store: latest({table}, {columns:?}) failed after retry: {e}");
                None
            }
        }
    }

    /// Purge rows older than `max_age_days`. Failure after the retry is
    /// logged and dropped.
    pub fn purge_older_than(&mut self, table: &str, max_age_days: u32) {
        let result = self
            .inner
            .purge_older_than(table, max_age_days)
            .or_else(|first| {
                warn!("store: purge of '{table}' failed, retrying once: {first}");
                self.inner.purge_older_than(table, max_age_days)
            });
        match result {
            Ok(removed) => debug!("store: purged {removed} rows older than {max_age_days}d from '{table}'"),
            Err(e) => error!("store: purge of '{table}' failed after retry: {e}"),
        }
    }

    fn retry_insert(
        &mut self,
        table: &str,
        row: &Row,
        first: &StoreError,
    ) -> Result<(), StoreError> {
        warn!("store: insert into '{table}' failed, retrying once: {first}");
        self.inner.insert(table, row)
    }

    fn retry_latest(
        &mut self,
        table: &str,
        columns: &[&str],
        first: &StoreError,
    ) -> Result<Option<Reading>, StoreError> {
        warn!("store: latest from '{table}' failed, retrying once: {first}");
        self.inner.latest(table, columns)
    }
}

// ───────────────────────────────────────────────────────────────
// History keeper
// ───────────────────────────────────────────────────────────────

/// Scheduled device that keeps a telemetry table from growing without
/// bound. Its single action purges rows older than the configured age.
pub struct HistoryKeeper {
    name: String,
    actions: ActionTable,
    table: String,
    max_age_days: u32,
}

impl HistoryKeeper {
    const CAPABILITIES: &'static [Action] = &[Action::PurgeHistory];

    pub fn from_config(cfg: &HistoryKeeperConfig) -> Result<Self, ConfigError> {
        let actions = ActionTable::resolve(&cfg.name, Self::CAPABILITIES, &cfg.actions)?;
        Ok(Self {
            name: cfg.name.clone(),
            actions,
            table: cfg.table.clone(),
            max_age_days: cfg.max_age_days,
        })
    }
}

impl Device for HistoryKeeper {
    fn name(&self) -> &str {
        &self.name
    }

    fn due_actions(&mut self, now: i64) -> DueActions {
        self.actions.due(now)
    }

    fn perform(&mut self, action: Action, cx: &mut TickContext<'_>) {
        match action {
            Action::PurgeHistory => cx.store.purge_older_than(&self.table, self.max_age_days),
            other => debug!("{}: ignoring unbound action {other:?}", self.name),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
