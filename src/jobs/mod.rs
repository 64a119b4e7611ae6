// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Runnables the scheduler supervises.
//!
//! Every job that produces `(current, executed)` pairs hands them to a [`Dispatcher`], which
//! either indexes them in-process or, in notify mode, publishes them to a queue for tipset
//! workers to pick up.

mod gap;
mod survey;
mod walk;
mod watch;
mod worker;

pub use gap::{GapFiller, GapFinder};
pub use survey::Survey;
pub use walk::Walker;
pub use watch::{WatchConfig, Watcher};
pub use worker::TipsetWorker;

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use anyhow::Context as _;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::blocks::Tipset;
use crate::chain::HeightRange;
use crate::datasource::DataSource;
use crate::indexer::Indexer;
use crate::model::ReportStatus;
use crate::queue::{IndexTipset, PublishOptions, Queue};
use crate::tasks::Task;

/// Where notify-mode jobs publish their work.
pub struct Notifier {
    pub queue: Arc<dyn Queue>,
    pub name: String,
    pub options: PublishOptions,
}

/// Routes produced tipsets to the indexer or to a queue.
pub struct Dispatcher {
    indexer: Arc<Indexer>,
    notifier: Option<Notifier>,
}

impl Dispatcher {
    pub fn local(indexer: Arc<Indexer>) -> Self {
        Self {
            indexer,
            notifier: None,
        }
    }

    pub fn notify(indexer: Arc<Indexer>, notifier: Notifier) -> Self {
        Self {
            indexer,
            notifier: Some(notifier),
        }
    }

    pub fn indexer(&self) -> &Arc<Indexer> {
        &self.indexer
    }

    pub fn is_notify(&self) -> bool {
        self.notifier.is_some()
    }

    /// Indexes or publishes one pair. Task failures end up in the report ledger; only storage
    /// and queue failures are returned.
    pub async fn deliver(
        &self,
        current: &Tipset,
        executed: &Tipset,
        tasks: &[Task],
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        if let Some(notifier) = &self.notifier {
            let payload = IndexTipset::new(current, tasks, self.indexer.reporter());
            let published = notifier
                .queue
                .publish(&notifier.name, &payload, &notifier.options)
                .await
                .with_context(|| format!("failed to publish tipset at {}", current.epoch()))?;
            debug!(height = current.epoch(), queue = %notifier.name, published, "published tipset");
            return Ok(());
        }
        let report = self
            .indexer
            .index(current, executed, tasks, cancel)
            .await
            .with_context(|| format!("failed to persist tipset at {}", current.epoch()))?;
        if !report.is_complete() {
            warn!(
                height = current.epoch(),
                errors = report.count(ReportStatus::Error),
                "tipset indexed with errors"
            );
        }
        Ok(())
    }

    /// Records the null rounds in `heights` that lie between `executed` and `current`. Null rounds
    /// have no tipset to publish, so this always writes to storage directly.
    pub async fn deliver_null_rounds(
        &self,
        current: &Tipset,
        executed: &Tipset,
        heights: HeightRange,
        tasks: &[Task],
    ) -> anyhow::Result<()> {
        self.indexer
            .index_null_rounds(current, executed, heights, tasks)
            .await
            .with_context(|| format!("failed to record null rounds in {heights}"))?;
        Ok(())
    }

    /// Records that `ts` was not indexed.
    pub async fn record(
        &self,
        ts: &Tipset,
        tasks: &[Task],
        status: ReportStatus,
        information: &str,
    ) -> anyhow::Result<()> {
        self.indexer
            .record(ts, tasks, status, information)
            .await
            .with_context(|| format!("failed to record {status} at {}", ts.epoch()))
    }
}

/// A tipset ready for indexing.
#[derive(Debug, Clone)]
pub(crate) struct WorkItem {
    pub current: Tipset,
    pub executed: Tipset,
}

/// The tipset a tipset's parent state was produced by executing. Genesis executes itself.
pub(crate) async fn executed_parent(
    source: &dyn DataSource,
    ts: &Tipset,
) -> anyhow::Result<Tipset> {
    if ts.epoch() == 0 || ts.parents().is_empty() {
        return Ok(ts.clone());
    }
    source
        .tipset(ts.parents())
        .await
        .with_context(|| format!("failed to load parent of tipset at {}", ts.epoch()))
}

/// Sheds work that fell too far behind the live head.
#[derive(Clone)]
pub(crate) struct Watermark {
    live: Arc<AtomicI64>,
    max_lag: i64,
}

impl Watermark {
    pub fn new(max_lag: i64) -> Self {
        Self {
            live: Arc::new(AtomicI64::new(0)),
            max_lag,
        }
    }

    pub fn observe(&self, height: i64) {
        self.live.fetch_max(height, Ordering::Relaxed);
    }

    pub fn is_stale(&self, height: i64) -> bool {
        self.live.load(Ordering::Relaxed) - height > self.max_lag
    }
}

/// Spawns `workers` consumers of `rx`. A worker that fails cancels `stop` so the producer and the
/// other workers wind down.
pub(crate) fn spawn_workers(
    workers: usize,
    rx: flume::Receiver<WorkItem>,
    dispatcher: Arc<Dispatcher>,
    tasks: Arc<[Task]>,
    watermark: Option<Watermark>,
    stop: CancellationToken,
) -> JoinSet<anyhow::Result<()>> {
    let mut set = JoinSet::new();
    for _ in 0..workers.max(1) {
        let rx = rx.clone();
        let dispatcher = dispatcher.clone();
        let tasks = tasks.clone();
        let watermark = watermark.clone();
        let stop = stop.clone();
        set.spawn(async move {
            loop {
                let item = tokio::select! {
                    item = rx.recv_async() => match item {
                        Ok(item) => item,
                        Err(_) => return Ok(()),
                    },
                    _ = stop.cancelled() => return Ok(()),
                };
                let result = match &watermark {
                    Some(w) if w.is_stale(item.current.epoch()) => {
                        warn!(height = item.current.epoch(), "skipping tipset below watermark");
                        dispatcher
                            .record(&item.current, &tasks, ReportStatus::Skipped, "behind watermark")
                            .await
                    }
                    _ => {
                        dispatcher
                            .deliver(&item.current, &item.executed, &tasks, &stop)
                            .await
                    }
                };
                if let Err(e) = result {
                    stop.cancel();
                    return Err(e);
                }
            }
        });
    }
    set
}

/// Waits for every worker and returns the first failure.
pub(crate) async fn join_workers(mut set: JoinSet<anyhow::Result<()>>) -> anyhow::Result<()> {
    let mut first = Ok(());
    while let Some(joined) = set.join_next().await {
        let result = joined.map_err(anyhow::Error::from).and_then(|r| r);
        if first.is_ok() {
            first = result;
        }
    }
    first
}
