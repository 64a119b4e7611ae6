// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use chrono::Utc;
use futures::{StreamExt as _, TryStreamExt as _};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{Dispatcher, executed_parent};
use crate::blocks::Tipset;
use crate::chain::{HeightRange, ResolveNullTipset, tipset_by_height};
use crate::datasource::DataSource;
use crate::model::{GapReportRow, GapStatus, TipsetBundle};
use crate::schedule::Runnable;
use crate::shim::clock::ChainEpoch;
use crate::storage::{RangeLock, Storage};
use crate::tasks::{Task, task_names};

fn gap_rows(
    cells: impl IntoIterator<Item = (ChainEpoch, String)>,
    status: GapStatus,
    reporter: &str,
) -> TipsetBundle {
    let reported_at = Utc::now();
    let mut bundle = TipsetBundle::default();
    bundle.push_rows(cells.into_iter().map(|(height, task)| GapReportRow {
        height,
        task,
        status,
        reporter: reporter.to_owned(),
        reported_at,
    }));
    bundle
}

/// Releases `lock` whatever `work` returned.
async fn with_lock<T>(
    lock: Box<dyn RangeLock>,
    work: impl Future<Output = anyhow::Result<T>>,
) -> anyhow::Result<T> {
    let result = work.await;
    let released = lock.release().await;
    let value = result?;
    released.context("failed to release gap lock")?;
    Ok(value)
}

/// Records a `GAP` row for every cell of `range × tasks` that is not indexed.
pub struct GapFinder {
    source: Arc<dyn DataSource>,
    storage: Arc<dyn Storage>,
    tasks: Vec<Task>,
    range: HeightRange,
    reporter: String,
}

impl GapFinder {
    pub fn new(
        source: Arc<dyn DataSource>,
        storage: Arc<dyn Storage>,
        tasks: &[Task],
        range: HeightRange,
        reporter: impl Into<String>,
    ) -> Self {
        Self {
            source,
            storage,
            tasks: tasks.to_vec(),
            range,
            reporter: reporter.into(),
        }
    }

    /// Finds and records the gaps, returning how many were found. Nothing is recorded when
    /// `cancel` fires before the search completes.
    pub async fn find(&self, cancel: &CancellationToken) -> anyhow::Result<usize> {
        let head = self.source.chain_head().await.context("failed to read chain head")?;
        // Heights above the head cannot be indexed yet.
        let Ok(range) = HeightRange::new(self.range.min, self.range.max.min(head.epoch())) else {
            return Ok(0);
        };
        let lock = self.storage.lock_range(range).await?;
        with_lock(lock, async {
            let names = task_names(&self.tasks);
            let gaps = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(%range, "gap search cancelled");
                    return Ok(0);
                }
                gaps = self.storage.find_gaps(range, &names) => gaps?,
            };
            let found = gaps.len();
            self.storage
                .persist_batch(gap_rows(gaps, GapStatus::Gap, &self.reporter))
                .await?;
            info!(%range, gaps = found, "gap search complete");
            Ok(found)
        })
        .await
    }
}

#[async_trait]
impl Runnable for GapFinder {
    async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        self.find(&cancel).await.map(|_| ())
    }
}

/// Re-indexes every open gap in a range, grouped by height, and marks the filled ones.
pub struct GapFiller {
    source: Arc<dyn DataSource>,
    dispatcher: Arc<Dispatcher>,
    tasks: Vec<Task>,
    range: HeightRange,
    workers: usize,
    reporter: String,
}

impl GapFiller {
    pub fn new(
        source: Arc<dyn DataSource>,
        dispatcher: Arc<Dispatcher>,
        tasks: &[Task],
        range: HeightRange,
        workers: usize,
        reporter: impl Into<String>,
    ) -> Self {
        Self {
            source,
            dispatcher,
            tasks: tasks.to_vec(),
            range,
            workers,
            reporter: reporter.into(),
        }
    }

    fn storage(&self) -> &Arc<dyn Storage> {
        self.dispatcher.indexer().storage()
    }

    /// Fills the gaps and returns how many cells were filled.
    pub async fn fill(&self, cancel: &CancellationToken) -> anyhow::Result<usize> {
        let head = self.source.chain_head().await.context("failed to read chain head")?;
        let Ok(range) = HeightRange::new(self.range.min, self.range.max.min(head.epoch())) else {
            return Ok(0);
        };
        let lock = self.storage().lock_range(range).await?;
        with_lock(lock, async {
            let gaps = self
                .storage()
                .open_gaps(range, &task_names(&self.tasks))
                .await?;
            let mut by_height: BTreeMap<ChainEpoch, Vec<Task>> = BTreeMap::new();
            for (height, name) in gaps {
                match name.parse::<Task>() {
                    Ok(task) => by_height.entry(height).or_default().push(task),
                    Err(_) => warn!(height, task = %name, "ignoring gap for unknown task"),
                }
            }
            let filled: Vec<usize> = futures::stream::iter(by_height)
                .map(|(height, tasks)| self.fill_height(&head, height, tasks, cancel))
                .buffer_unordered(self.workers.max(1))
                .try_collect()
                .await?;
            let filled = filled.into_iter().sum();
            info!(%range, filled, "gap fill complete");
            Ok(filled)
        })
        .await
    }

    async fn fill_height(
        &self,
        head: &Tipset,
        height: ChainEpoch,
        tasks: Vec<Task>,
        cancel: &CancellationToken,
    ) -> anyhow::Result<usize> {
        if cancel.is_cancelled() || height > head.epoch() {
            return Ok(0);
        }
        let current = tipset_by_height(
            self.source.as_ref(),
            height,
            head,
            ResolveNullTipset::TakeNewer,
        )
        .await
        .with_context(|| format!("failed to resolve tipset at {height}"))?;
        let executed = executed_parent(self.source.as_ref(), &current).await?;

        let filled: Vec<Task> = if current.epoch() != height {
            // A null round; the tipset above it is not part of the gap.
            self.dispatcher
                .deliver_null_rounds(&current, &executed, HeightRange::new(height, height)?, &tasks)
                .await?;
            tasks
        } else if self.dispatcher.is_notify() {
            self.dispatcher
                .deliver(&current, &executed, &tasks, cancel)
                .await?;
            tasks
        } else {
            let report = self
                .dispatcher
                .indexer()
                .index(&current, &executed, &tasks, cancel)
                .await
                .with_context(|| format!("failed to persist gap fill at {height}"))?;
            tasks
                .into_iter()
                .filter(|task| {
                    report.reports.iter().any(|r| {
                        r.height == height && r.task == task.name() && r.status.is_complete()
                    })
                })
                .collect()
        };
        let count = filled.len();
        let cells = filled.into_iter().map(|t| (height, t.name().to_owned()));
        self.storage()
            .persist_batch(gap_rows(cells, GapStatus::Filled, &self.reporter))
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl Runnable for GapFiller {
    async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        self.fill(&cancel).await.map(|_| ())
    }
}
