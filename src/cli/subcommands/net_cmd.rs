// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use clap::Subcommand;

use crate::rpc::methods::net::{NetAgentVersion, NetId, NetPeers};
use crate::rpc::{self, RpcMethodExt as _};

#[derive(Debug, Subcommand)]
pub enum NetCommands {
    /// Print the node's peer ID
    Id,
    /// List the node's peers
    Peers {
        /// Print agent name
        #[arg(short, long)]
        agent: bool,
    },
    /// Print the agent a peer runs
    Agent {
        /// Peer ID
        peer: String,
    },
}

impl NetCommands {
    pub async fn run(self, client: rpc::Client) -> anyhow::Result<()> {
        match self {
            Self::Id => {
                println!("{}", NetId::call(&client, ()).await?);
                Ok(())
            }
            Self::Peers { agent } => {
                let peers = NetPeers::call(&client, ()).await?;
                let agents = if agent {
                    futures::future::join_all(
                        peers
                            .iter()
                            .map(|p| NetAgentVersion::call(&client, (p.id.clone(),))),
                    )
                    .await
                    .into_iter()
                    .map(|it| it.unwrap_or_else(|_| "<agent unknown>".to_owned()))
                    .map(Some)
                    .collect()
                } else {
                    vec![None; peers.len()]
                };
                for (peer, agent) in peers.iter().zip(agents) {
                    let mut line = format!("{}, [{}]", peer.id, peer.addrs.join(", "));
                    if let Some(agent) = agent {
                        line.push_str(", ");
                        line.push_str(&agent);
                    }
                    println!("{line}");
                }
                Ok(())
            }
            Self::Agent { peer } => {
                println!("{}", NetAgentVersion::call(&client, (peer,)).await?);
                Ok(())
            }
        }
    }
}
