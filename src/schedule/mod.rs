// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The job scheduler.
//!
//! Jobs are long-running [`Runnable`]s (watchers, walkers, gap fillers, ...) registered under a
//! monotonic [`JobId`]. The scheduler supervises each running job on its own task with a
//! dedicated cancellation token and applies the job's restart policy when the runnable returns.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt as _;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

pub type JobId = u64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unknown job {0}")]
    UnknownJob(JobId),
    #[error("job {0} is already running")]
    AlreadyRunning(JobId),
    #[error("scheduler is shutting down")]
    ShuttingDown,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobState {
    Created,
    Running,
    Completed,
    Failed,
    Stopped,
}

/// Work the scheduler can supervise. `run` may be invoked again after it returns when the job's
/// restart policy asks for it, and must return promptly once `cancel` fires.
#[async_trait]
pub trait Runnable: Send + Sync {
    async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()>;
}

/// Identity and restart policy of a job.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobConfig {
    pub name: String,
    #[serde(rename = "Type")]
    pub kind: String,
    pub tasks: Vec<String>,
    pub params: BTreeMap<String, String>,
    pub restart_on_failure: bool,
    pub restart_on_completion: bool,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub restart_delay: Duration,
}

/// What a submission returns to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobSubmitResult {
    #[serde(rename = "ID")]
    pub id: JobId,
    pub name: String,
    #[serde(rename = "Type")]
    pub kind: String,
    pub tasks: Vec<String>,
    pub params: BTreeMap<String, String>,
}

/// A snapshot of a job, as listed.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobListResult {
    #[serde(rename = "ID")]
    pub id: JobId,
    pub name: String,
    #[serde(rename = "Type")]
    pub kind: String,
    pub tasks: Vec<String>,
    pub params: BTreeMap<String, String>,
    pub state: JobState,
    pub restart_on_failure: bool,
    pub restart_on_completion: bool,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub restart_delay: Duration,
    pub runs: u32,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

struct JobHandle {
    config: JobConfig,
    runnable: Arc<dyn Runnable>,
    state: watch::Sender<JobState>,
    cancel: Option<CancellationToken>,
    runs: u32,
    error: Option<String>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl JobHandle {
    fn snapshot(&self, id: JobId) -> JobListResult {
        JobListResult {
            id,
            name: self.config.name.clone(),
            kind: self.config.kind.clone(),
            tasks: self.config.tasks.clone(),
            params: self.config.params.clone(),
            state: *self.state.borrow(),
            restart_on_failure: self.config.restart_on_failure,
            restart_on_completion: self.config.restart_on_completion,
            restart_delay: self.config.restart_delay,
            runs: self.runs,
            error: self.error.clone(),
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }
}

struct Inner {
    jobs: Mutex<BTreeMap<JobId, JobHandle>>,
    next_id: AtomicU64,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

/// A cheaply cloneable handle to the scheduler.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs: Mutex::new(BTreeMap::new()),
                next_id: AtomicU64::new(1),
                cancel: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
        }
    }

    /// Registers a job and starts it when `auto_start` is set.
    pub fn submit(
        &self,
        mut config: JobConfig,
        runnable: Arc<dyn Runnable>,
        auto_start: bool,
    ) -> Result<JobSubmitResult, Error> {
        if self.inner.cancel.is_cancelled() {
            return Err(Error::ShuttingDown);
        }
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        if config.name.is_empty() {
            config.name = format!("{}_{id}", config.kind);
        }
        let result = JobSubmitResult {
            id,
            name: config.name.clone(),
            kind: config.kind.clone(),
            tasks: config.tasks.clone(),
            params: config.params.clone(),
        };
        let (state, _) = watch::channel(JobState::Created);
        self.inner.jobs.lock().insert(
            id,
            JobHandle {
                config,
                runnable,
                state,
                cancel: None,
                runs: 0,
                error: None,
                started_at: None,
                ended_at: None,
            },
        );
        info!(job = id, name = %result.name, kind = %result.kind, "job submitted");
        if auto_start {
            self.start(id)?;
        }
        Ok(result)
    }

    pub fn start(&self, id: JobId) -> Result<(), Error> {
        if self.inner.cancel.is_cancelled() {
            return Err(Error::ShuttingDown);
        }
        let mut jobs = self.inner.jobs.lock();
        let job = jobs.get_mut(&id).ok_or(Error::UnknownJob(id))?;
        if *job.state.borrow() == JobState::Running {
            return Err(Error::AlreadyRunning(id));
        }
        let cancel = self.inner.cancel.child_token();
        job.cancel = Some(cancel.clone());
        job.error = None;
        job.started_at = Some(Utc::now());
        job.ended_at = None;
        job.state.send_replace(JobState::Running);
        let runnable = job.runnable.clone();
        let config = job.config.clone();
        let scheduler = self.clone();
        self.inner
            .tracker
            .spawn(async move { scheduler.supervise(id, runnable, config, cancel).await });
        info!(job = id, "job started");
        Ok(())
    }

    async fn supervise(
        &self,
        id: JobId,
        runnable: Arc<dyn Runnable>,
        config: JobConfig,
        cancel: CancellationToken,
    ) {
        loop {
            let outcome = match AssertUnwindSafe(runnable.run(cancel.clone()))
                .catch_unwind()
                .await
            {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(format!("{e:#}")),
                Err(_) => Err("job panicked".to_string()),
            };
            self.record_run(id, outcome.as_ref().err().cloned());
            if cancel.is_cancelled() {
                self.finish(id, JobState::Stopped);
                return;
            }
            let restart = match &outcome {
                Ok(()) => config.restart_on_completion,
                Err(e) => {
                    warn!(job = id, error = %e, "job failed");
                    config.restart_on_failure
                }
            };
            if !restart {
                let state = match outcome {
                    Ok(()) => JobState::Completed,
                    Err(_) => JobState::Failed,
                };
                self.finish(id, state);
                return;
            }
            info!(
                job = id,
                delay = %humantime::format_duration(config.restart_delay),
                "restarting job"
            );
            tokio::select! {
                _ = tokio::time::sleep(config.restart_delay) => {}
                _ = cancel.cancelled() => {
                    self.finish(id, JobState::Stopped);
                    return;
                }
            }
        }
    }

    fn record_run(&self, id: JobId, error: Option<String>) {
        if let Some(job) = self.inner.jobs.lock().get_mut(&id) {
            job.runs += 1;
            job.error = error;
        }
    }

    fn finish(&self, id: JobId, state: JobState) {
        if let Some(job) = self.inner.jobs.lock().get_mut(&id) {
            job.cancel = None;
            job.ended_at = Some(Utc::now());
            job.state.send_replace(state);
        }
        info!(job = id, %state, "job exited");
    }

    /// Cancels a running job and waits for its runnable to return.
    pub async fn stop(&self, id: JobId) -> Result<JobListResult, Error> {
        let cancel = {
            let mut jobs = self.inner.jobs.lock();
            let job = jobs.get_mut(&id).ok_or(Error::UnknownJob(id))?;
            if *job.state.borrow() == JobState::Created {
                job.state.send_replace(JobState::Stopped);
            }
            job.cancel.clone()
        };
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        self.wait(id).await
    }

    /// Waits until the job is no longer running.
    pub async fn wait(&self, id: JobId) -> Result<JobListResult, Error> {
        let mut rx = self
            .inner
            .jobs
            .lock()
            .get(&id)
            .ok_or(Error::UnknownJob(id))?
            .state
            .subscribe();
        // The sender lives in the job map, which never removes entries.
        let _ = rx.wait_for(|state| *state != JobState::Running).await;
        self.get(id)
    }

    pub fn get(&self, id: JobId) -> Result<JobListResult, Error> {
        self.inner
            .jobs
            .lock()
            .get(&id)
            .map(|job| job.snapshot(id))
            .ok_or(Error::UnknownJob(id))
    }

    pub fn list(&self) -> Vec<JobListResult> {
        self.inner
            .jobs
            .lock()
            .iter()
            .map(|(id, job)| job.snapshot(*id))
            .collect()
    }

    /// Cancels every job and waits for all of them to exit.
    pub async fn shutdown(&self) {
        info!("stopping all jobs");
        self.inner.cancel.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
    }

    /// Resolves once [`Scheduler::shutdown`] has been requested.
    pub async fn cancelled(&self) {
        self.inner.cancel.cancelled().await
    }
}
