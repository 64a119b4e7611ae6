// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::{HashMap, HashSet};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use itertools::Itertools as _;
use parking_lot::{Mutex, RwLock};

use super::{Cell, Error, RangeLock, Storage, column, row_key, upserts};
use crate::chain::HeightRange;
use crate::model::{GAP_REPORTS, GapStatus, PROCESSING_REPORTS, ReportStatus, TipsetBundle, Value};
use crate::shim::clock::ChainEpoch;

type Rows = BTreeMap<String, Vec<Value>>;

/// A [`Storage`] that keeps rows in process, keyed by primary key.
#[derive(Default)]
pub struct MemoryStorage {
    allow_upsert: bool,
    tables: RwLock<HashMap<&'static str, Rows>>,
    locks: Arc<Mutex<Vec<HeightRange>>>,
    failing: Mutex<HashSet<String>>,
}

/// A processing report as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredReport {
    pub height: ChainEpoch,
    pub state_root: String,
    pub task: String,
    pub status: ReportStatus,
    pub completed_at: DateTime<Utc>,
}

impl MemoryStorage {
    pub fn new(allow_upsert: bool) -> Self {
        Self {
            allow_upsert,
            ..Default::default()
        }
    }

    /// Makes every batch that touches `table` fail until cleared.
    pub fn fail_table(&self, table: &str) {
        self.failing.lock().insert(table.to_owned());
    }

    pub fn clear_failures(&self) {
        self.failing.lock().clear();
    }

    pub fn rows(&self, table: &str) -> Vec<Vec<Value>> {
        self.tables
            .read()
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn count(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, BTreeMap::len)
    }

    /// Rows of `table` at `height`.
    pub fn count_at(&self, table: &str, height: ChainEpoch) -> usize {
        self.rows(table)
            .iter()
            .filter(|row| row.first().and_then(Value::as_int) == Some(height))
            .count()
    }

    pub fn reports(&self) -> Result<Vec<StoredReport>, Error> {
        let table = &PROCESSING_REPORTS;
        let (height, state_root, task, status, completed_at) = (
            column(table, "height")?,
            column(table, "state_root")?,
            column(table, "task")?,
            column(table, "status")?,
            column(table, "completed_at")?,
        );
        self.rows(table.name)
            .into_iter()
            .map(|row| {
                let invalid = |reason: &str| Error::InvalidRow {
                    table: table.name,
                    reason: reason.to_owned(),
                };
                Ok(StoredReport {
                    height: row[height].as_int().ok_or_else(|| invalid("height"))?,
                    state_root: row[state_root].as_text().unwrap_or_default().to_owned(),
                    task: row[task].as_text().unwrap_or_default().to_owned(),
                    status: row[status]
                        .as_text()
                        .and_then(|s| s.parse().ok())
                        .ok_or_else(|| invalid("status"))?,
                    completed_at: match &row[completed_at] {
                        Value::Timestamp(Some(t)) => *t,
                        _ => return Err(invalid("completed_at")),
                    },
                })
            })
            .collect()
    }

    /// Removes reports matching `predicate`, returning how many went.
    pub fn delete_reports(&self, predicate: impl Fn(ChainEpoch, &str) -> bool) -> usize {
        let table = &PROCESSING_REPORTS;
        let (Some(height), Some(task)) = (table.index_of("height"), table.index_of("task")) else {
            return 0;
        };
        let mut tables = self.tables.write();
        let Some(rows) = tables.get_mut(table.name) else {
            return 0;
        };
        let before = rows.len();
        rows.retain(|_, row| {
            !matches!(
                (row[height].as_int(), row[task].as_text()),
                (Some(h), Some(t)) if predicate(h, t)
            )
        });
        before - rows.len()
    }

    fn gap_rows(&self) -> Result<Vec<(Cell, GapStatus)>, Error> {
        let table = &GAP_REPORTS;
        let (height, task, status) = (
            column(table, "height")?,
            column(table, "task")?,
            column(table, "status")?,
        );
        Ok(self
            .rows(table.name)
            .into_iter()
            .filter_map(|row| {
                let cell = (row[height].as_int()?, row[task].as_text()?.to_owned());
                let status = row[status].as_text()?.parse().ok()?;
                Some((cell, status))
            })
            .collect())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn persist_batch(&self, bundle: TipsetBundle) -> Result<(), Error> {
        {
            let failing = self.failing.lock();
            if let Some(batch) = bundle
                .batches
                .iter()
                .find(|b| failing.contains(b.table.name))
            {
                return Err(Error::Other(format!(
                    "injected failure writing {}",
                    batch.table
                )));
            }
        }
        // Validate everything before touching any table so a bad row writes nothing.
        let mut keyed = Vec::with_capacity(bundle.batches.len());
        for batch in bundle.batches {
            let mut rows = Vec::with_capacity(batch.rows.len());
            for row in batch.rows {
                if row.len() != batch.table.columns.len() {
                    return Err(Error::InvalidRow {
                        table: batch.table.name,
                        reason: format!(
                            "{} values for {} columns",
                            row.len(),
                            batch.table.columns.len()
                        ),
                    });
                }
                rows.push((row_key(batch.table, &row)?, row));
            }
            keyed.push((batch.table, rows));
        }

        let mut tables = self.tables.write();
        for (table, rows) in keyed {
            let upsert = upserts(table, self.allow_upsert);
            let stored = tables.entry(table.name).or_default();
            for (key, row) in rows {
                if upsert {
                    stored.insert(key, row);
                } else {
                    stored.entry(key).or_insert(row);
                }
            }
        }
        Ok(())
    }

    async fn find_gaps(&self, range: HeightRange, tasks: &[String]) -> Result<Vec<Cell>, Error> {
        let mut latest: HashMap<(ChainEpoch, &str), (DateTime<Utc>, ReportStatus)> =
            HashMap::default();
        let reports = self.reports()?;
        for report in reports.iter().filter(|r| range.contains(r.height)) {
            let entry = latest
                .entry((report.height, report.task.as_str()))
                .or_insert((report.completed_at, report.status));
            if report.completed_at > entry.0 {
                *entry = (report.completed_at, report.status);
            }
        }
        Ok(range
            .iter()
            .cartesian_product(tasks.iter().sorted())
            .filter(|(height, task)| {
                !latest
                    .get(&(*height, task.as_str()))
                    .is_some_and(|(_, status)| status.is_complete())
            })
            .map(|(height, task)| (height, task.clone()))
            .collect())
    }

    async fn open_gaps(&self, range: HeightRange, tasks: &[String]) -> Result<Vec<Cell>, Error> {
        Ok(self
            .gap_rows()?
            .into_iter()
            .filter(|((height, task), status)| {
                *status == GapStatus::Gap
                    && range.contains(*height)
                    && (tasks.is_empty() || tasks.contains(task))
            })
            .map(|(cell, _)| cell)
            .sorted()
            .collect())
    }

    async fn lock_range(&self, range: HeightRange) -> Result<Box<dyn RangeLock>, Error> {
        let mut locks = self.locks.lock();
        if locks
            .iter()
            .any(|held| held.min <= range.max && range.min <= held.max)
        {
            return Err(Error::Locked(range));
        }
        locks.push(range);
        Ok(Box::new(MemoryRangeLock {
            locks: self.locks.clone(),
            range,
        }))
    }
}

struct MemoryRangeLock {
    locks: Arc<Mutex<Vec<HeightRange>>>,
    range: HeightRange,
}

impl Drop for MemoryRangeLock {
    fn drop(&mut self) {
        let mut locks = self.locks.lock();
        if let Some(i) = locks.iter().position(|held| *held == self.range) {
            locks.swap_remove(i);
        }
    }
}

#[async_trait]
impl RangeLock for MemoryRangeLock {
    async fn release(self: Box<Self>) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;
    use crate::model::{BlockParentRow, ProcessingReportRow};

    fn report(height: i64, task: &str, status: ReportStatus, at: i64) -> ProcessingReportRow {
        let time = Utc.timestamp_opt(at, 0).unwrap();
        ProcessingReportRow {
            height,
            state_root: "root".into(),
            reporter: "test".into(),
            task: task.into(),
            started_at: time,
            completed_at: time,
            status,
            status_information: None,
            errors_detected: None,
        }
    }

    fn parent(height: i64, parent: &str) -> BlockParentRow {
        BlockParentRow {
            height,
            block: "b".into(),
            parent: parent.into(),
        }
    }

    #[tokio::test]
    async fn data_rows_keep_first_reports_keep_last() {
        let storage = MemoryStorage::default();
        let mut bundle = TipsetBundle::default();
        bundle.push_rows([parent(1, "p")]);
        bundle.push_rows([report(1, "block_parent", ReportStatus::Error, 1)]);
        storage.persist_batch(bundle).await.unwrap();

        let mut bundle = TipsetBundle::default();
        bundle.push_rows([parent(1, "p")]);
        bundle.push_rows([report(1, "block_parent", ReportStatus::Ok, 2)]);
        storage.persist_batch(bundle).await.unwrap();

        assert_eq!(storage.count("block_parents"), 1);
        let reports = storage.reports().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].status, ReportStatus::Ok);
    }

    #[tokio::test]
    async fn failed_batches_write_nothing() {
        let storage = MemoryStorage::default();
        storage.fail_table("processing_reports");
        let mut bundle = TipsetBundle::default();
        bundle.push_rows([parent(1, "p")]);
        bundle.push_rows([report(1, "block_parent", ReportStatus::Ok, 1)]);
        assert!(storage.persist_batch(bundle).await.is_err());
        assert_eq!(storage.count("block_parents"), 0);
    }

    #[tokio::test]
    async fn gaps_follow_latest_report() {
        let storage = MemoryStorage::default();
        let mut bundle = TipsetBundle::default();
        bundle.push_rows([
            report(1, "a", ReportStatus::Ok, 1),
            report(2, "a", ReportStatus::Error, 1),
            report(3, "a", ReportStatus::Info, 1),
            report(1, "b", ReportStatus::Skipped, 1),
        ]);
        storage.persist_batch(bundle).await.unwrap();

        let gaps = storage
            .find_gaps(
                HeightRange::new(1, 3).unwrap(),
                &["a".to_owned(), "b".to_owned()],
            )
            .await
            .unwrap();
        assert_eq!(
            gaps,
            vec![
                (1, "b".to_owned()),
                (2, "a".to_owned()),
                (2, "b".to_owned()),
                (3, "b".to_owned())
            ]
        );
    }

    #[tokio::test]
    async fn overlapping_locks_conflict() {
        let storage = MemoryStorage::default();
        let lock = storage
            .lock_range(HeightRange::new(0, 10).unwrap())
            .await
            .unwrap();
        assert!(matches!(
            storage.lock_range(HeightRange::new(10, 20).unwrap()).await,
            Err(Error::Locked(_))
        ));
        let other = storage
            .lock_range(HeightRange::new(11, 20).unwrap())
            .await
            .unwrap();
        lock.release().await.unwrap();
        assert!(storage.lock_range(HeightRange::new(5, 6).unwrap()).await.is_ok());
        other.release().await.unwrap();
    }
}
