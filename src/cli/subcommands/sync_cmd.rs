// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::time::Duration;

use anyhow::Context as _;
use clap::Subcommand;

use super::print_json;
use crate::blocks::Tipset;
use crate::rpc::methods::chain::ChainHead;
use crate::rpc::methods::net::SyncState;
use crate::rpc::{self, RpcMethodExt as _};
use crate::shim::clock::{ChainEpoch, EPOCH_DURATION_SECONDS};

#[derive(Debug, Subcommand)]
pub enum SyncCommands {
    /// Print the node's sync state and how far its head lags behind the wall clock
    Status,
    /// Wait until the node's head is close to the wall clock
    Wait {
        /// Epochs the head may lag behind
        #[arg(long, default_value_t = 2)]
        threshold: ChainEpoch,
        /// Time between checks
        #[arg(long, default_value = "3s", value_parser = humantime::parse_duration)]
        interval: Duration,
    },
}

impl SyncCommands {
    pub async fn run(self, client: rpc::Client) -> anyhow::Result<()> {
        match self {
            Self::Status => {
                print_json(&SyncState::call(&client, ()).await?)?;
                let head = ChainHead::call(&client, ()).await?;
                println!(
                    "Head: epoch {} ({} epochs behind)",
                    head.epoch(),
                    epochs_behind(&head, now())
                );
                Ok(())
            }
            Self::Wait {
                threshold,
                interval,
            } => {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    ticker.tick().await;
                    let head = ChainHead::call(&client, ())
                        .await
                        .context("failed to get the chain head")?;
                    let behind = epochs_behind(&head, now());
                    println!("Head: epoch {} ({behind} epochs behind)", head.epoch());
                    if behind <= threshold {
                        println!("Sync complete!");
                        return Ok(());
                    }
                }
            }
        }
    }
}

fn now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

/// Epochs elapsed between the head's timestamp and `now`, in seconds since the Unix epoch.
fn epochs_behind(head: &Tipset, now: u64) -> ChainEpoch {
    let elapsed = i64::try_from(now.saturating_sub(head.min_timestamp())).unwrap_or(i64::MAX);
    elapsed / EPOCH_DURATION_SECONDS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::memory::ChainBuilder;

    #[test]
    fn lag_counts_whole_epochs() {
        let mut builder = ChainBuilder::new();
        let head = builder.extend_to(3);
        let ts = head.min_timestamp();
        assert_eq!(epochs_behind(&head, ts), 0);
        assert_eq!(epochs_behind(&head, ts + 29), 0);
        assert_eq!(epochs_behind(&head, ts + 95), 3);
        // A clock behind the head is not a lag.
        assert_eq!(epochs_behind(&head, ts.saturating_sub(60)), 0);
    }
}
