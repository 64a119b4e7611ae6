// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::time::Duration;

use clap::Subcommand;
use tabled::{builder::Builder, settings::Style};

use crate::blocks::TipsetKey;
use crate::model::ReportStatus;
use crate::rpc::methods::lily::{LilyIndex, LilyIndexConfig, LilyJobConfig, TaskStatus};
use crate::rpc::{self, RpcMethodExt as _};
use crate::shim::clock::ChainEpoch;

#[derive(Debug, Clone, clap::Args)]
pub struct IndexFlags {
    /// Comma separated task and task set names. Defaults to every task
    #[arg(long, value_delimiter = ',', env = "LILY_JOB_TASKS")]
    pub tasks: Vec<String>,
    /// Storage to write to, by its name in the configuration. Empty discards the output
    #[arg(long, default_value = "", env = "LILY_STORAGE")]
    pub storage: String,
    /// Time allowed to index the tipset. Zero disables the limit
    #[arg(long, default_value = "30s", value_parser = humantime::parse_duration, env = "LILY_JOB_WINDOW")]
    pub window: Duration,
}

#[derive(Debug, Subcommand)]
pub enum IndexCommands {
    /// Index the tipset with the given key, such as `{bafy..,bafy..}`
    Tipset {
        key: TipsetKey,
        #[command(flatten)]
        flags: IndexFlags,
    },
    /// Index the tipset at a height
    Height {
        height: ChainEpoch,
        #[command(flatten)]
        flags: IndexFlags,
    },
}

impl IndexCommands {
    pub async fn run(self, client: rpc::Client) -> anyhow::Result<()> {
        let (flags, tip_set, height) = match self {
            Self::Tipset { key, flags } => (flags, Some(key), None),
            Self::Height { height, flags } => (flags, None, Some(height)),
        };
        let config = LilyIndexConfig {
            job: LilyJobConfig {
                tasks: flags.tasks,
                window: flags.window,
                storage: flags.storage,
                ..Default::default()
            },
            tip_set,
            height,
        };
        let statuses = LilyIndex::call(&client, (config,)).await?;
        println!("{}", status_table(&statuses));
        let failed = statuses
            .iter()
            .filter(|s| s.status == ReportStatus::Error)
            .count();
        anyhow::ensure!(failed == 0, "{failed} task(s) failed");
        Ok(())
    }
}

fn status_table(statuses: &[TaskStatus]) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Task", "Height", "Status", "Information"]);
    for status in statuses {
        builder.push_record([
            status.task.clone(),
            status.height.to_string(),
            status.status.to_string(),
            status.information.clone().unwrap_or_default(),
        ]);
    }
    builder.build().with(Style::sharp()).to_string()
}
