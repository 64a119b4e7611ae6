// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::time::Duration;

use clap::Subcommand;
use tabled::{builder::Builder, settings::Style};

use super::print_json;
use crate::rpc::methods::job::{LilyJobList, LilyJobStart, LilyJobStop, LilyJobWait};
use crate::rpc::methods::lily::{
    LilyGapFill, LilyGapFillConfig, LilyGapFind, LilyGapFindConfig, LilyJobConfig, LilySurvey,
    LilySurveyConfig, LilyTipSetWorkerConfig, LilyWalk, LilyWalkConfig, LilyWatch,
    LilyWatchConfig, StartTipSetWorker,
};
use crate::rpc::{self, RpcMethodExt as _};
use crate::schedule::{JobId, JobListResult};
use crate::shim::clock::ChainEpoch;

/// Flags every job submission takes.
#[derive(Debug, Clone, clap::Args)]
pub struct JobFlags {
    /// Comma separated task and task set names. Defaults to every task
    #[arg(long, value_delimiter = ',', env = "LILY_JOB_TASKS")]
    pub tasks: Vec<String>,
    /// Storage to write to, by its name in the configuration. Empty discards the output
    #[arg(long, default_value = "", env = "LILY_STORAGE")]
    pub storage: String,
    /// Job name. Defaults to `<type>_<id>`
    #[arg(long, default_value = "", env = "LILY_JOB_NAME")]
    pub name: String,
    /// Time allowed to index a single tipset. Zero disables the limit
    #[arg(long, default_value = "30s", value_parser = humantime::parse_duration, env = "LILY_JOB_WINDOW")]
    pub window: Duration,
    /// Restart the job after it fails
    #[arg(long, env = "LILY_JOB_RESTART_FAILURE")]
    pub restart_on_failure: bool,
    /// Restart the job after it completes
    #[arg(long, env = "LILY_JOB_RESTART_COMPLETION")]
    pub restart_on_completion: bool,
    /// Pause between restarts
    #[arg(long, default_value = "0s", value_parser = humantime::parse_duration, env = "LILY_JOB_RESTART_DELAY")]
    pub restart_delay: Duration,
}

impl JobFlags {
    pub fn to_config(&self) -> LilyJobConfig {
        LilyJobConfig {
            name: self.name.clone(),
            tasks: self.tasks.clone(),
            window: self.window,
            restart_on_failure: self.restart_on_failure,
            restart_on_completion: self.restart_on_completion,
            restart_delay: self.restart_delay,
            storage: self.storage.clone(),
        }
    }
}

/// An inclusive height range.
#[derive(Debug, Clone, Copy, clap::Args)]
pub struct RangeArgs {
    /// Lowest height to process
    #[arg(long)]
    pub from: ChainEpoch,
    /// Highest height to process
    #[arg(long)]
    pub to: ChainEpoch,
}

#[derive(Debug, Subcommand)]
pub enum RunCommands {
    /// Index every tipset in a height range
    Walk {
        #[command(flatten)]
        range: RangeArgs,
        /// Tipsets indexed concurrently
        #[arg(long, default_value_t = 1)]
        workers: usize,
        /// Publish tipsets to this queue instead of indexing them
        #[arg(long)]
        queue: Option<String>,
    },
    /// Follow the chain head and index tipsets once they are final enough
    Watch {
        /// Tipsets kept back from the head before indexing
        #[arg(long, default_value_t = 10)]
        confidence: usize,
        /// Tipsets indexed concurrently
        #[arg(long, default_value_t = 2)]
        workers: usize,
        /// Head events buffered while workers are busy
        #[arg(long, default_value_t = 5)]
        buffer_size: usize,
        /// Skip tipsets at or below the highest height already indexed
        #[arg(long)]
        watermark_skip: bool,
        /// Publish tipsets to this queue instead of indexing them
        #[arg(long)]
        queue: Option<String>,
    },
    /// Index the gaps recorded by `find`
    Fill {
        #[command(flatten)]
        range: RangeArgs,
        /// Tipsets indexed concurrently
        #[arg(long, default_value_t = 1)]
        workers: usize,
        /// Publish tipsets to this queue instead of indexing them
        #[arg(long)]
        queue: Option<String>,
    },
    /// Record heights whose tasks have not been indexed
    Find {
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Periodically record the node's peers and their agents
    Survey {
        /// Time between samples
        #[arg(long, default_value = "1h", value_parser = humantime::parse_duration)]
        interval: Duration,
    },
    /// Index tipsets published to a queue
    TipsetWorker {
        /// Queue to consume, by its name in the configuration
        #[arg(long)]
        queue: String,
        /// Tipsets indexed concurrently
        #[arg(long, default_value_t = 1)]
        concurrency: usize,
    },
}

#[derive(Debug, Subcommand)]
pub enum JobCommands {
    /// Submit a job
    Run {
        #[command(flatten)]
        flags: JobFlags,
        #[command(subcommand)]
        kind: RunCommands,
    },
    /// Start a stopped job
    Start {
        /// Job ID
        id: JobId,
    },
    /// Stop a running job
    Stop {
        /// Job ID
        id: JobId,
    },
    /// Wait for a job to finish and print its final state
    Wait {
        /// Job ID
        id: JobId,
    },
    /// List the daemon's jobs
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

impl JobCommands {
    pub async fn run(self, client: rpc::Client) -> anyhow::Result<()> {
        match self {
            Self::Run { flags, kind } => {
                let submitted = kind.submit(&client, flags.to_config()).await?;
                print_json(&submitted)
            }
            Self::Start { id } => {
                LilyJobStart::call(&client, (id,)).await?;
                println!("Started job {id}");
                Ok(())
            }
            Self::Stop { id } => print_json(&LilyJobStop::call(&client, (id,)).await?),
            Self::Wait { id } => print_json(&LilyJobWait::call(&client, (id,)).await?),
            Self::List { json } => {
                let jobs = LilyJobList::call(&client, ()).await?;
                if json {
                    print_json(&jobs)
                } else {
                    println!("{}", jobs_table(&jobs));
                    Ok(())
                }
            }
        }
    }
}

impl RunCommands {
    pub async fn submit(
        self,
        client: &rpc::Client,
        job: LilyJobConfig,
    ) -> anyhow::Result<crate::schedule::JobSubmitResult> {
        let submitted = match self {
            Self::Walk {
                range,
                workers,
                queue,
            } => {
                let config = LilyWalkConfig {
                    job,
                    from: range.from,
                    to: range.to,
                    workers,
                    queue,
                };
                LilyWalk::call(client, (config,)).await?
            }
            Self::Watch {
                confidence,
                workers,
                buffer_size,
                watermark_skip,
                queue,
            } => {
                let config = LilyWatchConfig {
                    job,
                    confidence,
                    workers,
                    buffer_size,
                    watermark_skip,
                    queue,
                };
                LilyWatch::call(client, (config,)).await?
            }
            Self::Fill {
                range,
                workers,
                queue,
            } => {
                let config = LilyGapFillConfig {
                    job,
                    from: range.from,
                    to: range.to,
                    workers,
                    queue,
                };
                LilyGapFill::call(client, (config,)).await?
            }
            Self::Find { range } => {
                let config = LilyGapFindConfig {
                    job,
                    from: range.from,
                    to: range.to,
                };
                LilyGapFind::call(client, (config,)).await?
            }
            Self::Survey { interval } => {
                LilySurvey::call(client, (LilySurveyConfig { job, interval },)).await?
            }
            Self::TipsetWorker { queue, concurrency } => {
                let config = LilyTipSetWorkerConfig {
                    job,
                    queue,
                    concurrency,
                };
                StartTipSetWorker::call(client, (config,)).await?
            }
        };
        Ok(submitted)
    }
}

fn jobs_table(jobs: &[JobListResult]) -> String {
    let mut builder = Builder::default();
    builder.push_record([
        "ID", "Name", "Type", "State", "Runs", "Tasks", "Started", "Ended", "Error",
    ]);
    let time = |t: Option<chrono::DateTime<chrono::Utc>>| {
        t.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default()
    };
    for job in jobs {
        builder.push_record([
            job.id.to_string(),
            job.name.clone(),
            job.kind.clone(),
            job.state.to_string(),
            job.runs.to_string(),
            job.tasks.join(","),
            time(job.started_at),
            time(job.ended_at),
            job.error.clone().unwrap_or_default(),
        ]);
    }
    builder.build().with(Style::sharp()).to_string()
}
