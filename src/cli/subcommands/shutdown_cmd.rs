// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::rpc::methods::common::LilyShutdown;
use crate::rpc::{self, RpcMethodExt as _};

#[derive(Debug, clap::Args)]
pub struct ShutdownCommand {}

impl ShutdownCommand {
    pub async fn run(self, client: rpc::Client) -> anyhow::Result<()> {
        println!("Shutting down lily");
        LilyShutdown::call(&client, ()).await?;
        Ok(())
    }
}
