// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The tipset indexer.
//!
//! [`Indexer::index`] runs a set of tasks over one `(current, executed)` pair in parallel under a
//! time window, turns every task outcome into a processing report and persists the reports
//! together with the rows of the successful tasks in a single batch. Tasks still running when the
//! caller's cancellation token fires are reported as errors.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt as _;
use serde_json::json;
use tracing::debug;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub use crate::tasks::TaskError;
use crate::blocks::Tipset;
use crate::chain::HeightRange;
use crate::datasource::DataSource;
use crate::model::{ProcessingReportRow, ReportStatus, TipsetBundle};
use crate::shim::clock::ChainEpoch;
use crate::storage::{self, Storage};
use crate::tasks::{CodeResolver, Task, TaskOutput, TipsetContext, null_round_rows};

/// Default wall-clock budget for one tipset.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(30);

/// The reports written for one tipset.
#[derive(Debug, Clone, PartialEq)]
pub struct TipsetReport {
    pub height: ChainEpoch,
    pub reports: Vec<ProcessingReportRow>,
}

impl TipsetReport {
    pub fn count(&self, status: ReportStatus) -> usize {
        self.reports.iter().filter(|r| r.status == status).count()
    }

    /// Whether every report at the indexed height counts as indexed.
    pub fn is_complete(&self) -> bool {
        self.reports.iter().all(|r| r.status.is_complete())
    }
}

pub struct Indexer {
    source: Arc<dyn DataSource>,
    storage: Arc<dyn Storage>,
    codes: Arc<CodeResolver>,
    reporter: String,
    window: Duration,
    parallelism: usize,
}

impl Indexer {
    pub fn new(
        source: Arc<dyn DataSource>,
        storage: Arc<dyn Storage>,
        reporter: impl Into<String>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            source,
            storage,
            codes: Arc::new(CodeResolver::new()?),
            reporter: reporter.into(),
            window: DEFAULT_WINDOW,
            parallelism: num_cpus::get().max(1),
        })
    }

    /// A zero window disables the deadline.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn reporter(&self) -> &str {
        &self.reporter
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn report(
        &self,
        height: ChainEpoch,
        state_root: &str,
        task: Task,
        started_at: DateTime<Utc>,
        status: ReportStatus,
        information: Option<String>,
    ) -> ProcessingReportRow {
        let errors_detected = match status {
            ReportStatus::Error => information.as_ref().map(|e| json!([e])),
            _ => None,
        };
        ProcessingReportRow {
            height,
            state_root: state_root.to_owned(),
            reporter: self.reporter.clone(),
            task: task.name().to_owned(),
            started_at,
            completed_at: Utc::now(),
            status,
            status_information: information,
            errors_detected,
        }
    }

    /// INFO reports for the null rounds between `executed` and `current` that fall in `heights`.
    fn null_round_reports(
        &self,
        current: &Tipset,
        executed: &Tipset,
        heights: HeightRange,
        tasks: &[Task],
    ) -> Vec<ProcessingReportRow> {
        let state_root = current.parent_state().to_string();
        let from = (executed.epoch() + 1).max(heights.min);
        let to = (current.epoch() - 1).min(heights.max);
        (from..=to)
            .flat_map(|height| tasks.iter().map(move |task| (height, *task)))
            .map(|(height, task)| {
                self.report(
                    height,
                    &state_root,
                    task,
                    Utc::now(),
                    ReportStatus::Info,
                    Some("null round".into()),
                )
            })
            .collect()
    }

    /// Runs `tasks` over the pair and returns the rows of the tasks that succeeded along with a
    /// report for every task, without persisting anything.
    pub async fn process(
        &self,
        current: &Tipset,
        executed: &Tipset,
        tasks: &[Task],
        cancel: &CancellationToken,
    ) -> (TipsetBundle, Vec<ProcessingReportRow>) {
        let ctx = Arc::new(TipsetContext::new(
            self.source.clone(),
            self.codes.clone(),
            current.clone(),
            executed.clone(),
        ));
        let height = current.epoch();
        let state_root = ctx.state_root();
        let version = ctx.network_version;
        let mut bundle = TipsetBundle::default();
        // Null rounds between the pair are recorded so gap detection sees them as indexed.
        let mut reports = self.null_round_reports(current, executed, HeightRange::FULL, tasks);

        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let deadline = (!self.window.is_zero()).then(|| tokio::time::Instant::now() + self.window);
        let window = self.window;
        let mut set = JoinSet::new();
        let mut pending = Vec::new();
        for &task in tasks {
            if !task.supports(version) {
                reports.push(self.report(
                    height,
                    &state_root,
                    task,
                    Utc::now(),
                    ReportStatus::Skipped,
                    Some(format!("network version {version} is not supported")),
                ));
                continue;
            }
            if ctx.is_genesis() && task.needs_parent() {
                reports.push(self.report(
                    height,
                    &state_root,
                    task,
                    Utc::now(),
                    ReportStatus::Info,
                    Some("genesis has no parent execution".into()),
                ));
                continue;
            }
            pending.push(task);
            let ctx = ctx.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            set.spawn(async move {
                let started_at = Utc::now();
                let work = async {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| TaskError::Panicked(e.to_string()))?;
                    match AssertUnwindSafe(task.run(&ctx)).catch_unwind().await {
                        Ok(result) => result,
                        Err(panic) => Err(TaskError::Panicked(panic_message(&*panic))),
                    }
                };
                let bounded = async {
                    match deadline {
                        Some(deadline) => tokio::time::timeout_at(deadline, work)
                            .await
                            .unwrap_or(Err(TaskError::WindowExceeded(window))),
                        None => work.await,
                    }
                };
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(TaskError::Cancelled),
                    result = bounded => result,
                };
                (task, started_at, result)
            });
        }

        while let Some(joined) = set.join_next().await {
            let (task, started_at, result): (Task, DateTime<Utc>, Result<TaskOutput, TaskError>) =
                match joined {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::error!(height, error = %e, "indexing task aborted");
                        continue;
                    }
                };
            pending.retain(|t| *t != task);
            match result {
                Ok(TaskOutput { bundle: rows, info }) => {
                    let status = match info {
                        Some(_) => ReportStatus::Info,
                        None => ReportStatus::Ok,
                    };
                    bundle.extend(rows);
                    reports.push(self.report(height, &state_root, task, started_at, status, info));
                }
                Err(e) => {
                    tracing::warn!(height, task = task.name(), error = %e, "task failed");
                    reports.push(self.report(
                        height,
                        &state_root,
                        task,
                        started_at,
                        ReportStatus::Error,
                        Some(e.to_string()),
                    ));
                }
            }
        }
        for task in pending {
            reports.push(self.report(
                height,
                &state_root,
                task,
                Utc::now(),
                ReportStatus::Error,
                Some("task aborted".into()),
            ));
        }
        (bundle, reports)
    }

    /// Indexes the pair and persists the rows and reports atomically.
    pub async fn index(
        &self,
        current: &Tipset,
        executed: &Tipset,
        tasks: &[Task],
        cancel: &CancellationToken,
    ) -> Result<TipsetReport, storage::Error> {
        let (mut bundle, reports) = self.process(current, executed, tasks, cancel).await;
        bundle.push_rows(reports.iter().cloned());
        self.storage.persist_batch(bundle).await?;
        let report = TipsetReport {
            height: current.epoch(),
            reports,
        };
        debug!(
            height = report.height,
            ok = report.count(ReportStatus::Ok),
            errors = report.count(ReportStatus::Error),
            "indexed tipset"
        );
        Ok(report)
    }

    /// Persists the null rounds between `executed` and `current` that fall in `heights` without
    /// touching the rows of either tipset.
    pub async fn index_null_rounds(
        &self,
        current: &Tipset,
        executed: &Tipset,
        heights: HeightRange,
        tasks: &[Task],
    ) -> Result<TipsetReport, storage::Error> {
        let reports = self.null_round_reports(current, executed, heights, tasks);
        let mut bundle = TipsetBundle::default();
        if tasks.contains(&Task::ChainConsensus) {
            bundle.push_rows(null_round_rows(current, executed, heights));
        }
        bundle.push_rows(reports.iter().cloned());
        if !bundle.is_empty() {
            self.storage.persist_batch(bundle).await?;
        }
        debug!(
            heights = %heights,
            reports = reports.len(),
            "indexed null rounds"
        );
        Ok(TipsetReport {
            height: heights.max.min(current.epoch() - 1),
            reports,
        })
    }

    /// Persists a report with `status` for every task at the height of `ts`, for work that was
    /// shed or reverted rather than indexed.
    pub async fn record(
        &self,
        ts: &Tipset,
        tasks: &[Task],
        status: ReportStatus,
        information: &str,
    ) -> Result<(), storage::Error> {
        let state_root = ts.parent_state().to_string();
        let reports: Vec<_> = tasks
            .iter()
            .map(|task| {
                self.report(
                    ts.epoch(),
                    &state_root,
                    *task,
                    Utc::now(),
                    status,
                    Some(information.to_owned()),
                )
            })
            .collect();
        let mut bundle = TipsetBundle::default();
        bundle.push_rows(reports);
        self.storage.persist_batch(bundle).await
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".into())
}

#[cfg(test)]
mod tests;
