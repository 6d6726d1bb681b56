//! In-memory row store.

use std::collections::HashMap;

use chrono::{Duration, Local, NaiveDateTime};

use crate::ports::{Reading, Row, RowStore, StoreError};

/// [`RowStore`] over per-table row vectors. Tables spring into existence on
/// first insert, matching how the production schema is created on startup.
#[derive(Default)]
pub struct MemoryStore {
    tables: HashMap<String, Vec<Row>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, Vec::len)
    }
}

fn timestamp_of(row: &Row, column: &str) -> Option<NaiveDateTime> {
    row.iter().find_map(|(name, value)| match value {
        crate::ports::Value::Timestamp(ts) if name == column => Some(*ts),
        _ => None,
    })
}

/// First timestamp-typed cell in the row, whatever its column name.
fn any_timestamp(row: &Row) -> Option<NaiveDateTime> {
    row.iter().find_map(|(_, value)| match value {
        crate::ports::Value::Timestamp(ts) => Some(*ts),
        _ => None,
    })
}

impl RowStore for MemoryStore {
    fn insert(&mut self, table: &str, row: &Row) -> Result<(), StoreError> {
        self.tables
            .entry(table.to_owned())
            .or_default()
            .push(row.clone());
        Ok(())
    }

    fn latest(&mut self, table: &str, columns: &[&str]) -> Result<Option<Reading>, StoreError> {
        let &[ts_column, value_column] = columns else {
            return Err(StoreError::Backend(format!(
                "latest() wants [timestamp, value], got {} columns",
                columns.len()
            )));
        };
        let Some(rows) = self.tables.get(table) else {
            return Ok(None);
        };

        let newest = rows
            .iter()
            .filter_map(|row| {
                let ts = timestamp_of(row, ts_column)?;
                let value = row
                    .iter()
                    .find(|(name, _)| name == value_column)
                    .map(|(_, v)| v.clone())?;
                Some((ts, value))
            })
            .max_by_key(|(ts, _)| *ts);

        Ok(newest.map(|(timestamp, value)| Reading {
            timestamp,
            value: Some(value),
        }))
    }

    fn purge_older_than(&mut self, table: &str, max_age_days: u32) -> Result<u64, StoreError> {
        let rows = self
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::NoSuchTable(table.to_owned()))?;

        let cutoff = Local::now().naive_local() - Duration::days(i64::from(max_age_days));
        let before = rows.len();
        // Rows without any timestamp cell are unjudgeable; keep them.
        rows.retain(|row| any_timestamp(row).is_none_or(|ts| ts >= cutoff));
        Ok((before - rows.len()) as u64)
    }
}
