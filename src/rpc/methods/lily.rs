// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Job submission and one-shot indexing.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::info;

use crate::blocks::{Tipset, TipsetKey};
use crate::chain::{HeightRange, ResolveNullTipset, tipset_by_height};
use crate::indexer::Indexer;
use crate::jobs::{
    Dispatcher, GapFiller, GapFinder, Notifier, Survey, TipsetWorker, Walker, WatchConfig,
    Watcher, executed_parent,
};
use crate::model::ReportStatus;
use crate::rpc::{Ctx, RpcMethod, RpcState, ServerError};
use crate::schedule::{JobConfig, JobSubmitResult, Runnable};
use crate::shim::clock::ChainEpoch;
use crate::tasks::{Task, parse_tasks, task_names};

macro_rules! for_each_method {
    ($callback:path) => {
        $callback!(crate::rpc::methods::lily::LilyWatch);
        $callback!(crate::rpc::methods::lily::LilyWalk);
        $callback!(crate::rpc::methods::lily::LilyIndex);
        $callback!(crate::rpc::methods::lily::LilyGapFind);
        $callback!(crate::rpc::methods::lily::LilyGapFill);
        $callback!(crate::rpc::methods::lily::LilySurvey);
        $callback!(crate::rpc::methods::lily::StartTipSetWorker);
    };
}
pub(crate) use for_each_method;

/// Fields every submission carries.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LilyJobConfig {
    /// Defaults to `<kind>_<id>`.
    pub name: String,
    /// Task and task set names. Empty selects every task.
    pub tasks: Vec<String>,
    /// Per-tipset deadline. Zero disables it.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub window: Duration,
    pub restart_on_failure: bool,
    pub restart_on_completion: bool,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub restart_delay: Duration,
    /// Named storage. Empty discards the output.
    pub storage: String,
}

impl LilyJobConfig {
    fn parse_tasks(&self) -> Result<Vec<Task>, ServerError> {
        Ok(parse_tasks(&self.tasks)?)
    }

    fn to_job(&self, kind: &str, tasks: Vec<String>, mut params: BTreeMap<String, String>) -> JobConfig {
        params.insert("storage".into(), self.storage.clone());
        params.insert(
            "window".into(),
            humantime::format_duration(self.window).to_string(),
        );
        JobConfig {
            name: self.name.clone(),
            kind: kind.to_owned(),
            tasks,
            params,
            restart_on_failure: self.restart_on_failure,
            restart_on_completion: self.restart_on_completion,
            restart_delay: self.restart_delay,
        }
    }
}

fn params<const N: usize>(entries: [(&str, String); N]) -> BTreeMap<String, String> {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect()
}

impl RpcState {
    async fn indexer(&self, job: &LilyJobConfig) -> Result<Arc<Indexer>, ServerError> {
        let storage = self.storages.connect(&job.storage).await?;
        Ok(Arc::new(
            Indexer::new(self.source.clone(), storage, self.reporter.clone())?
                .with_window(job.window),
        ))
    }

    /// Indexes in-process, or publishes to `queue` when one is named.
    async fn dispatcher(
        &self,
        job: &LilyJobConfig,
        queue: Option<&str>,
    ) -> Result<Arc<Dispatcher>, ServerError> {
        let indexer = self.indexer(job).await?;
        Ok(Arc::new(match queue.filter(|it| !it.is_empty()) {
            Some(name) => {
                let (queue, options) = self.queues.connect(name).await?;
                Dispatcher::notify(
                    indexer,
                    Notifier {
                        queue,
                        name: name.to_owned(),
                        options,
                    },
                )
            }
            None => Dispatcher::local(indexer),
        }))
    }

    fn submit(
        &self,
        job: JobConfig,
        runnable: impl Runnable + 'static,
    ) -> Result<JobSubmitResult, ServerError> {
        Ok(self.scheduler.submit(job, Arc::new(runnable), true)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, smart_default::SmartDefault)]
#[serde(rename_all = "PascalCase", default)]
pub struct LilyWatchConfig {
    #[serde(flatten)]
    pub job: LilyJobConfig,
    #[default(10)]
    pub confidence: usize,
    #[default(2)]
    pub workers: usize,
    #[default(5)]
    pub buffer_size: usize,
    pub watermark_skip: bool,
    /// Publish tipsets to this queue instead of indexing them.
    pub queue: Option<String>,
}

pub enum LilyWatch {}
impl RpcMethod<1> for LilyWatch {
    const NAME: &'static str = "Filecoin.LilyWatch";
    const PARAM_NAMES: [&'static str; 1] = ["config"];

    type Params = (LilyWatchConfig,);
    type Ok = JobSubmitResult;

    async fn handle(ctx: Ctx, (config,): Self::Params) -> Result<Self::Ok, ServerError> {
        let tasks = config.job.parse_tasks()?;
        let dispatcher = ctx.dispatcher(&config.job, config.queue.as_deref()).await?;
        let watcher = Watcher::new(
            ctx.source.clone(),
            dispatcher,
            &tasks,
            WatchConfig {
                confidence: config.confidence,
                workers: config.workers.max(1),
                buffer: config.buffer_size,
                watermark_skip: config.watermark_skip,
                ..Default::default()
            },
        );
        let job = config.job.to_job(
            "watch",
            task_names(&tasks),
            params([
                ("confidence", config.confidence.to_string()),
                ("workers", config.workers.to_string()),
                ("buffer", config.buffer_size.to_string()),
                ("queue", config.queue.clone().unwrap_or_default()),
            ]),
        );
        ctx.submit(job, watcher)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, smart_default::SmartDefault)]
#[serde(rename_all = "PascalCase", default)]
pub struct LilyWalkConfig {
    #[serde(flatten)]
    pub job: LilyJobConfig,
    pub from: ChainEpoch,
    pub to: ChainEpoch,
    #[default(1)]
    pub workers: usize,
    pub queue: Option<String>,
}

pub enum LilyWalk {}
impl RpcMethod<1> for LilyWalk {
    const NAME: &'static str = "Filecoin.LilyWalk";
    const PARAM_NAMES: [&'static str; 1] = ["config"];

    type Params = (LilyWalkConfig,);
    type Ok = JobSubmitResult;

    async fn handle(ctx: Ctx, (config,): Self::Params) -> Result<Self::Ok, ServerError> {
        let tasks = config.job.parse_tasks()?;
        let range = HeightRange::new(config.from, config.to)?;
        let dispatcher = ctx.dispatcher(&config.job, config.queue.as_deref()).await?;
        let walker = Walker::new(
            ctx.source.clone(),
            dispatcher,
            &tasks,
            range,
            config.workers.max(1),
        );
        let job = config.job.to_job(
            "walk",
            task_names(&tasks),
            params([
                ("minHeight", range.min.to_string()),
                ("maxHeight", range.max.to_string()),
                ("workers", config.workers.to_string()),
                ("queue", config.queue.clone().unwrap_or_default()),
            ]),
        );
        ctx.submit(job, walker)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LilyGapFindConfig {
    #[serde(flatten)]
    pub job: LilyJobConfig,
    pub from: ChainEpoch,
    pub to: ChainEpoch,
}

pub enum LilyGapFind {}
impl RpcMethod<1> for LilyGapFind {
    const NAME: &'static str = "Filecoin.LilyGapFind";
    const PARAM_NAMES: [&'static str; 1] = ["config"];

    type Params = (LilyGapFindConfig,);
    type Ok = JobSubmitResult;

    async fn handle(ctx: Ctx, (config,): Self::Params) -> Result<Self::Ok, ServerError> {
        let tasks = config.job.parse_tasks()?;
        let range = HeightRange::new(config.from, config.to)?;
        let storage = ctx.storages.connect(&config.job.storage).await?;
        let finder = GapFinder::new(
            ctx.source.clone(),
            storage,
            &tasks,
            range,
            ctx.reporter.clone(),
        );
        let job = config.job.to_job(
            "find",
            task_names(&tasks),
            params([
                ("minHeight", range.min.to_string()),
                ("maxHeight", range.max.to_string()),
            ]),
        );
        ctx.submit(job, finder)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, smart_default::SmartDefault)]
#[serde(rename_all = "PascalCase", default)]
pub struct LilyGapFillConfig {
    #[serde(flatten)]
    pub job: LilyJobConfig,
    pub from: ChainEpoch,
    pub to: ChainEpoch,
    #[default(1)]
    pub workers: usize,
    pub queue: Option<String>,
}

pub enum LilyGapFill {}
impl RpcMethod<1> for LilyGapFill {
    const NAME: &'static str = "Filecoin.LilyGapFill";
    const PARAM_NAMES: [&'static str; 1] = ["config"];

    type Params = (LilyGapFillConfig,);
    type Ok = JobSubmitResult;

    async fn handle(ctx: Ctx, (config,): Self::Params) -> Result<Self::Ok, ServerError> {
        let tasks = config.job.parse_tasks()?;
        let range = HeightRange::new(config.from, config.to)?;
        let dispatcher = ctx.dispatcher(&config.job, config.queue.as_deref()).await?;
        let filler = GapFiller::new(
            ctx.source.clone(),
            dispatcher,
            &tasks,
            range,
            config.workers.max(1),
            ctx.reporter.clone(),
        );
        let job = config.job.to_job(
            "fill",
            task_names(&tasks),
            params([
                ("minHeight", range.min.to_string()),
                ("maxHeight", range.max.to_string()),
                ("workers", config.workers.to_string()),
                ("queue", config.queue.clone().unwrap_or_default()),
            ]),
        );
        ctx.submit(job, filler)
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, smart_default::SmartDefault)]
#[serde(rename_all = "PascalCase", default)]
pub struct LilySurveyConfig {
    #[serde(flatten)]
    pub job: LilyJobConfig,
    #[default(Duration::from_secs(60 * 60))]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub interval: Duration,
}

pub enum LilySurvey {}
impl RpcMethod<1> for LilySurvey {
    const NAME: &'static str = "Filecoin.LilySurvey";
    const PARAM_NAMES: [&'static str; 1] = ["config"];

    type Params = (LilySurveyConfig,);
    type Ok = JobSubmitResult;

    async fn handle(ctx: Ctx, (config,): Self::Params) -> Result<Self::Ok, ServerError> {
        let storage = ctx.storages.connect(&config.job.storage).await?;
        let survey = Survey::new(ctx.node.clone(), storage, config.interval);
        let job = config.job.to_job(
            "survey",
            vec!["peer_agents".into()],
            params([(
                "interval",
                humantime::format_duration(config.interval).to_string(),
            )]),
        );
        ctx.submit(job, survey)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, smart_default::SmartDefault)]
#[serde(rename_all = "PascalCase", default)]
pub struct LilyTipSetWorkerConfig {
    #[serde(flatten)]
    pub job: LilyJobConfig,
    /// Queue to consume.
    pub queue: String,
    #[default(1)]
    pub concurrency: usize,
}

pub enum StartTipSetWorker {}
impl RpcMethod<1> for StartTipSetWorker {
    const NAME: &'static str = "Filecoin.StartTipSetWorker";
    const PARAM_NAMES: [&'static str; 1] = ["config"];

    type Params = (LilyTipSetWorkerConfig,);
    type Ok = JobSubmitResult;

    async fn handle(ctx: Ctx, (config,): Self::Params) -> Result<Self::Ok, ServerError> {
        let (queue, _) = ctx.queues.connect(&config.queue).await?;
        let indexer = ctx.indexer(&config.job).await?;
        let worker = TipsetWorker::new(
            ctx.source.clone(),
            indexer,
            queue,
            config.queue.clone(),
            config.concurrency.max(1),
        );
        // Tasks come with each request.
        let job = config.job.to_job(
            "tipset-worker",
            vec![],
            params([
                ("queue", config.queue.clone()),
                ("concurrency", config.concurrency.to_string()),
            ]),
        );
        ctx.submit(job, worker)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LilyIndexConfig {
    #[serde(flatten)]
    pub job: LilyJobConfig,
    /// The tipset to index. Takes precedence over `height`.
    pub tip_set: Option<TipsetKey>,
    pub height: Option<ChainEpoch>,
}

/// Outcome of one task of a one-shot index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskStatus {
    pub task: String,
    pub height: ChainEpoch,
    pub status: ReportStatus,
    pub information: Option<String>,
}

/// Indexes a single tipset and waits for the result.
pub enum LilyIndex {}
impl RpcMethod<1> for LilyIndex {
    const NAME: &'static str = "Filecoin.LilyIndex";
    const PARAM_NAMES: [&'static str; 1] = ["config"];

    type Params = (LilyIndexConfig,);
    type Ok = Vec<TaskStatus>;

    async fn handle(ctx: Ctx, (config,): Self::Params) -> Result<Self::Ok, ServerError> {
        let tasks = config.job.parse_tasks()?;
        let current = resolve(&ctx, &config).await?;
        let executed = executed_parent(ctx.source.as_ref(), &current).await?;
        let indexer = ctx.indexer(&config.job).await?;
        // A one-shot index is abandoned when the daemon shuts down.
        let report = indexer
            .index(&current, &executed, &tasks, &ctx.shutdown)
            .await?;
        info!(
            height = current.epoch(),
            complete = report.is_complete(),
            "indexed tipset on request"
        );
        Ok(report
            .reports
            .into_iter()
            .map(|r| TaskStatus {
                task: r.task,
                height: r.height,
                status: r.status,
                information: r.status_information,
            })
            .collect())
    }
}

async fn resolve(ctx: &RpcState, config: &LilyIndexConfig) -> Result<Tipset, ServerError> {
    if let Some(key) = &config.tip_set {
        return Ok(ctx.source.tipset(key).await?);
    }
    let Some(height) = config.height else {
        return Err(ServerError::invalid_params(
            "either a tipset or a height is required",
            None,
        ));
    };
    let head = ctx.source.chain_head().await?;
    if height > head.epoch() {
        return Err(ServerError::invalid_params(
            format!("height {height} is above the chain head at {}", head.epoch()),
            None,
        ));
    }
    let ts = tipset_by_height(ctx.source.as_ref(), height, &head, ResolveNullTipset::TakeOlder)
        .await?;
    if ts.epoch() != height {
        return Err(ServerError::invalid_params(
            format!("height {height} is a null round"),
            None,
        ));
    }
    Ok(ts)
}
