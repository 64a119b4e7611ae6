// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod chain_cmd;
mod config_cmd;
mod gap_cmd;
mod index_cmd;
mod init_cmd;
mod job_cmd;
mod log_cmd;
mod migrate_cmd;
mod net_cmd;
mod shutdown_cmd;
mod sync_cmd;

use serde::Serialize;

pub(super) use self::{
    chain_cmd::ChainCommands, config_cmd::ConfigCommands, gap_cmd::GapCommands,
    index_cmd::IndexCommands, init_cmd::InitCommand, job_cmd::JobCommands, log_cmd::LogCommands,
    migrate_cmd::MigrateCommand, net_cmd::NetCommands, shutdown_cmd::ShutdownCommand,
    sync_cmd::SyncCommands,
};
#[cfg(test)]
pub(super) use self::job_cmd::RunCommands;

/// Prints a JSON-RPC response the way the daemon sent it.
pub(super) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
