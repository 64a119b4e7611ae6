// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use clap::Subcommand;

use super::job_cmd::{JobFlags, RangeArgs, RunCommands};
use super::print_json;
use crate::rpc;

#[derive(Debug, Subcommand)]
pub enum GapCommands {
    /// Record heights in a range whose tasks have not been indexed
    Find {
        #[command(flatten)]
        flags: JobFlags,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Index the recorded gaps in a range
    Fill {
        #[command(flatten)]
        flags: JobFlags,
        #[command(flatten)]
        range: RangeArgs,
        /// Tipsets indexed concurrently
        #[arg(long, default_value_t = 1)]
        workers: usize,
        /// Publish tipsets to this queue instead of indexing them
        #[arg(long)]
        queue: Option<String>,
    },
}

impl GapCommands {
    pub async fn run(self, client: rpc::Client) -> anyhow::Result<()> {
        let (flags, run) = match self {
            Self::Find { flags, range } => (flags, RunCommands::Find { range }),
            Self::Fill {
                flags,
                range,
                workers,
                queue,
            } => (
                flags,
                RunCommands::Fill {
                    range,
                    workers,
                    queue,
                },
            ),
        };
        print_json(&run.submit(&client, flags.to_config()).await?)
    }
}
