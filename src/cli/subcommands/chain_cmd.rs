// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use clap::Subcommand;
use itertools::Itertools as _;

use super::print_json;
use crate::blocks::{Tipset, TipsetKey};
use crate::rpc::methods::chain::{
    ChainGetBlock, ChainGetTipSet, ChainGetTipSetByHeight, ChainHead, ChainSetHead, CidJson,
};
use crate::rpc::{self, RpcMethodExt as _};
use crate::shim::clock::ChainEpoch;

#[derive(Debug, Subcommand)]
pub enum ChainCommands {
    /// Print the CIDs of the node's head
    Head,
    /// Print a block header
    Getblock {
        /// Block CID
        cid: Cid,
    },
    /// List tipsets walking back from the head or from a height
    List {
        /// Start at this height instead of the head
        #[arg(long)]
        height: Option<ChainEpoch>,
        /// Tipsets to list
        #[arg(long, default_value_t = 30)]
        count: usize,
    },
    /// Move the node's head to the given tipset
    Sethead {
        /// Tipset key, such as `{bafy..,bafy..}`
        key: TipsetKey,
    },
}

impl ChainCommands {
    pub async fn run(self, client: rpc::Client) -> anyhow::Result<()> {
        match self {
            Self::Head => {
                let head = ChainHead::call(&client, ()).await?;
                for cid in head.cids() {
                    println!("{cid}");
                }
                Ok(())
            }
            Self::Getblock { cid } => {
                print_json(&ChainGetBlock::call(&client, (CidJson(cid),)).await?)
            }
            Self::List { height, count } => {
                let mut ts = match height {
                    Some(height) => {
                        ChainGetTipSetByHeight::call(&client, (height, TipsetKey::default()))
                            .await?
                    }
                    None => ChainHead::call(&client, ()).await?,
                };
                let mut lines = Vec::with_capacity(count);
                for _ in 0..count {
                    lines.push(describe(&ts));
                    if ts.epoch() == 0 {
                        break;
                    }
                    ts = ChainGetTipSet::call(&client, (ts.parents().clone(),)).await?;
                }
                // Oldest first.
                for line in lines.iter().rev() {
                    println!("{line}");
                }
                Ok(())
            }
            Self::Sethead { key } => {
                ChainSetHead::call(&client, (key.clone(),)).await?;
                println!("Head set to {key}");
                Ok(())
            }
        }
    }
}

fn describe(ts: &Tipset) -> String {
    format!(
        "{}: ({}) [ {} ]",
        ts.epoch(),
        ts.min_timestamp(),
        ts.cids().iter().join(", ")
    )
}
