// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use clap::Subcommand;

use crate::rpc::methods::common::{LogList, LogSetLevel, LogSetLevelRegex};
use crate::rpc::{self, RpcMethodExt as _};

#[derive(Debug, Subcommand)]
pub enum LogCommands {
    /// List the daemon's active log directives
    List,
    /// Set the level of one log target, such as `lily::jobs`
    SetLevel {
        target: String,
        /// One of `off`, `error`, `warn`, `info`, `debug`, `trace`
        level: String,
    },
    /// Set the level of every known log target matching a regular expression
    SetLevelRegex { regex: String, level: String },
}

impl LogCommands {
    pub async fn run(self, client: rpc::Client) -> anyhow::Result<()> {
        match self {
            Self::List => {
                for directive in LogList::call(&client, ()).await? {
                    println!("{directive}");
                }
            }
            Self::SetLevel { target, level } => {
                LogSetLevel::call(&client, (target, level)).await?;
            }
            Self::SetLevelRegex { regex, level } => {
                let changed = LogSetLevelRegex::call(&client, (regex, level)).await?;
                println!("{changed} target(s) changed");
            }
        }
        Ok(())
    }
}
