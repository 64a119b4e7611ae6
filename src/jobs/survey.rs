// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::datasource::NodeInfo;
use crate::model::{PeerAgentRow, TipsetBundle};
use crate::schedule::Runnable;
use crate::storage::Storage;

/// Strips build metadata from an agent string: `lotus-1.23.0+mainnet+git.1a2b3c` becomes
/// `lotus-1.23.0`.
pub fn normalize_agent(agent: &str) -> String {
    let agent = agent.trim();
    agent
        .split_once('+')
        .map_or(agent, |(base, _)| base)
        .to_owned()
}

/// Periodically counts the agent versions of the node's peers.
pub struct Survey {
    node: Arc<dyn NodeInfo>,
    storage: Arc<dyn Storage>,
    interval: Duration,
}

impl Survey {
    pub fn new(node: Arc<dyn NodeInfo>, storage: Arc<dyn Storage>, interval: Duration) -> Self {
        Self {
            node,
            storage,
            interval,
        }
    }

    /// Takes one sample and returns the number of peers observed.
    pub async fn sample(&self) -> anyhow::Result<usize> {
        let surveyer = self.node.net_id().await?;
        let peers = self.node.net_peers().await?;
        let mut agents: BTreeMap<String, i64> = BTreeMap::new();
        for peer in &peers {
            match self.node.net_agent_version(&peer.id).await {
                Ok(agent) => *agents.entry(agent).or_default() += 1,
                Err(e) => debug!(peer = %peer.id, error = %e, "no agent version"),
            }
        }
        let observed_at = Utc::now();
        let mut bundle = TipsetBundle::default();
        bundle.push_rows(agents.into_iter().map(|(raw_agent, count)| PeerAgentRow {
            surveyer_peer_id: surveyer.clone(),
            observed_at,
            normalized_agent: normalize_agent(&raw_agent),
            raw_agent,
            count,
        }));
        self.storage.persist_batch(bundle).await?;
        info!(peers = peers.len(), "peer agent survey recorded");
        Ok(peers.len())
    }
}

#[async_trait]
impl Runnable for Survey {
    async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        loop {
            if let Err(e) = self.sample().await {
                warn!(error = %e, "peer agent survey failed");
            }
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = cancel.cancelled() => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::memory::ChainBuilder;
    use crate::model::Value;
    use crate::storage::memory::MemoryStorage;

    #[test]
    fn agents_are_normalized() {
        assert_eq!(normalize_agent("lotus-1.23.0+mainnet+git.1a2b3c"), "lotus-1.23.0");
        assert_eq!(normalize_agent(" forest-0.20.0 "), "forest-0.20.0");
    }

    #[tokio::test]
    async fn counts_agents() {
        let builder = ChainBuilder::new();
        let source = builder.source();
        source.add_peer("peer-a", "lotus-1.23.0+mainnet");
        source.add_peer("peer-b", "lotus-1.23.0+mainnet");
        source.add_peer("peer-c", "forest-0.20.0");
        let storage = Arc::new(MemoryStorage::new(false));
        let survey = Survey::new(source, storage.clone(), Duration::from_secs(60));

        assert_eq!(survey.sample().await.unwrap(), 3);
        let rows = storage.rows("peer_agents");
        assert_eq!(rows.len(), 2);
        let count = crate::model::PEER_AGENTS.index_of("count").unwrap();
        let mut counts: Vec<_> = rows.iter().map(|r| r[count].clone()).collect();
        counts.sort_by_key(|v| v.as_int());
        assert_eq!(counts, vec![Value::Int(Some(1)), Value::Int(Some(2))]);
    }
}
