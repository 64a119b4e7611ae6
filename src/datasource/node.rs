// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable as _};
use base64::{Engine as _, prelude::BASE64_STANDARD};
use cid::Cid;
use futures::{StreamExt as _, TryStreamExt as _, stream};
use jsonrpsee::core::ClientError;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use super::{ActorStateView, DataSource, Error, NodeInfo, PeerInfo};
use crate::blocks::{Tipset, TipsetKey};
use crate::lotus_json;
use crate::message::{
    ActorEvent, BlockMessages, ExecutedMessage, ExecutionTrace, InvocResult, Message, Receipt,
};
use crate::networks::ChainConfig;
use crate::rpc::Client;
use crate::shim::{
    address::Address, clock::ChainEpoch, state_tree::ActorState,
    version::NetworkVersion,
};

/// Concurrent actor lookups while resolving message executions.
const ACTOR_LOOKUP_CONCURRENCY: usize = 16;

#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
struct CidParam(#[serde(with = "lotus_json::cid")] Cid);

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParentMessage {
    #[serde(with = "lotus_json::cid")]
    cid: Cid,
    message: Message,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReadState {
    #[serde(default)]
    state: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ComputeStateOutput {
    #[serde(with = "lotus_json::nullable_vec", default)]
    trace: Vec<InvocResult>,
}

/// A [`DataSource`] backed by a Lotus-compatible node's JSON-RPC API.
#[derive(Clone)]
pub struct NodeDataSource {
    client: Client,
    chain_config: ChainConfig,
    retries: usize,
}

impl NodeDataSource {
    pub fn new(client: Client, chain_config: ChainConfig, retries: usize) -> Self {
        Self {
            client,
            chain_config,
            retries,
        }
    }

    pub fn chain_config(&self) -> &ChainConfig {
        &self.chain_config
    }

    /// Calls a node method, retrying while the node is unavailable.
    async fn call<P, R>(&self, method: &'static str, params: P) -> Result<R, Error>
    where
        P: Serialize + Clone + Send + Sync,
        R: DeserializeOwned,
    {
        (|| async {
            self.client
                .call(method, params.clone())
                .await
                .map_err(|e| map_client_error(method, e))
        })
        .retry(
            ExponentialBuilder::default()
                .with_min_delay(Duration::from_millis(200))
                .with_max_times(self.retries),
        )
        .when(Error::is_retryable)
        .notify(|err, after| warn!(method, %err, "node call failed, retrying in {after:?}"))
        .await
    }

    /// Identifiers of every message included in the tipset's blocks.
    async fn included_messages(&self, ts: &Tipset) -> Result<HashSet<Cid>, Error> {
        let mut out = HashSet::new();
        for block in ts.cids() {
            let msgs = self.block_messages(block).await?;
            out.extend(msgs.all().into_iter().map(|(cid, _)| cid));
        }
        Ok(out)
    }

    async fn actor_codes(
        &self,
        addresses: HashSet<Address>,
        key: &TipsetKey,
    ) -> Result<BTreeMap<Address, Cid>, Error> {
        stream::iter(addresses)
            .map(|address| async move {
                match self.actor(&address, key).await {
                    Ok(actor) => Ok(Some((address, actor.code))),
                    Err(e) if e.is_not_found() => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .buffer_unordered(ACTOR_LOOKUP_CONCURRENCY)
            .try_filter_map(|it| async move { Ok(it) })
            .try_collect()
            .await
    }
}

fn map_client_error(method: &str, e: ClientError) -> Error {
    match e {
        ClientError::Call(obj) => {
            let message = obj.message().to_lowercase();
            if message.contains("not found")
                || message.contains("resolution lookup failed")
                || message.contains("no such")
            {
                Error::NotFound(format!("{method}: {}", obj.message()))
            } else {
                Error::Other(format!("{method}: {}", obj.message()))
            }
        }
        ClientError::Transport(_)
        | ClientError::RequestTimeout
        | ClientError::RestartNeeded(_) => Error::ChainUnavailable(format!("{method}: {e}")),
        other => Error::Other(format!("{method}: {other}")),
    }
}

#[async_trait]
impl DataSource for NodeDataSource {
    async fn chain_head(&self) -> Result<Tipset, Error> {
        self.call("Filecoin.ChainHead", ()).await
    }

    async fn tipset(&self, key: &TipsetKey) -> Result<Tipset, Error> {
        self.call("Filecoin.ChainGetTipSet", (key.clone(),)).await
    }

    async fn tipset_by_height(
        &self,
        height: ChainEpoch,
        from: &TipsetKey,
    ) -> Result<Tipset, Error> {
        self.call("Filecoin.ChainGetTipSetByHeight", (height, from.clone()))
            .await
    }

    async fn block_messages(&self, block: &Cid) -> Result<BlockMessages, Error> {
        self.call("Filecoin.ChainGetBlockMessages", (CidParam(*block),))
            .await
    }

    async fn parent_receipts(&self, block: &Cid) -> Result<Vec<Receipt>, Error> {
        let receipts: Option<Vec<Receipt>> = self
            .call("Filecoin.ChainGetParentReceipts", (CidParam(*block),))
            .await?;
        Ok(receipts.unwrap_or_default())
    }

    async fn parent_messages(&self, block: &Cid) -> Result<Vec<(Cid, Message)>, Error> {
        let msgs: Option<Vec<ParentMessage>> = self
            .call("Filecoin.ChainGetParentMessages", (CidParam(*block),))
            .await?;
        Ok(msgs
            .unwrap_or_default()
            .into_iter()
            .map(|m| (m.cid, m.message))
            .collect())
    }

    async fn actor(&self, address: &Address, key: &TipsetKey) -> Result<ActorState, Error> {
        let actor: Option<ActorState> = self
            .call("Filecoin.StateGetActor", (address.clone(), key.clone()))
            .await?;
        actor.ok_or_else(|| Error::NotFound(format!("actor {address} at {key}")))
    }

    async fn actor_state(&self, address: &Address, ts: &Tipset) -> Result<ActorStateView, Error> {
        let actor = self.actor(address, ts.key()).await?;
        let read: ReadState = self
            .call("Filecoin.StateReadState", (address.clone(), ts.key().clone()))
            .await?;
        Ok(ActorStateView {
            actor,
            state: read.state,
        })
    }

    async fn changed_actors(
        &self,
        old_root: &Cid,
        new_root: &Cid,
    ) -> Result<BTreeMap<Address, ActorState>, Error> {
        let changed: Option<BTreeMap<Address, ActorState>> = self
            .call(
                "Filecoin.StateChangedActors",
                (CidParam(*old_root), CidParam(*new_root)),
            )
            .await?;
        Ok(changed.unwrap_or_default())
    }

    async fn message_executions(
        &self,
        current: &Tipset,
        executed: &Tipset,
    ) -> Result<Vec<ExecutedMessage>, Error> {
        let output: ComputeStateOutput = self
            .call(
                "Filecoin.StateCompute",
                (executed.epoch(), (), executed.key().clone()),
            )
            .await?;
        let included = self.included_messages(executed).await?;
        let addresses = output
            .trace
            .iter()
            .flat_map(|it| [it.msg.from.clone(), it.msg.to.clone()])
            .collect();
        let codes = self.actor_codes(addresses, current.key()).await?;
        debug!(
            height = current.epoch(),
            messages = output.trace.len(),
            "computed message executions"
        );

        Ok(output
            .trace
            .into_iter()
            .map(|it| {
                let receipt = it.msg_rct.unwrap_or_default();
                let trace = it
                    .execution_trace
                    .unwrap_or_else(|| ExecutionTrace::leaf(&it.msg, receipt.exit_code));
                ExecutedMessage {
                    cid: it.msg_cid,
                    implicit: !included.contains(&it.msg_cid),
                    from_actor_code: codes.get(&it.msg.from).copied(),
                    to_actor_code: codes.get(&it.msg.to).copied(),
                    error: (!it.error.is_empty()).then_some(it.error),
                    message: it.msg,
                    receipt,
                    gas_cost: it.gas_cost,
                    trace,
                }
            })
            .collect())
    }

    async fn events(&self, events_root: &Cid) -> Result<Vec<ActorEvent>, Error> {
        let events: Option<Vec<ActorEvent>> = self
            .call("Filecoin.ChainGetEvents", (CidParam(*events_root),))
            .await?;
        Ok(events.unwrap_or_default())
    }

    async fn decode_params(
        &self,
        to: &Address,
        method: u64,
        params: &[u8],
        key: &TipsetKey,
    ) -> Result<serde_json::Value, Error> {
        self.call(
            "Filecoin.StateDecodeParams",
            (to.clone(), method, BASE64_STANDARD.encode(params), key.clone()),
        )
        .await
    }

    async fn actor_code_cids(
        &self,
        version: NetworkVersion,
    ) -> Result<BTreeMap<String, Cid>, Error> {
        let codes: BTreeMap<String, CidJson> = self
            .call("Filecoin.StateActorCodeCIDs", (version,))
            .await?;
        Ok(codes.into_iter().map(|(k, v)| (k, v.0)).collect())
    }

    fn network_version(&self, height: ChainEpoch) -> NetworkVersion {
        self.chain_config.network_version(height)
    }
}

#[derive(Deserialize)]
#[serde(transparent)]
struct CidJson(#[serde(with = "lotus_json::cid")] Cid);

#[async_trait]
impl NodeInfo for NodeDataSource {
    async fn net_id(&self) -> Result<String, Error> {
        self.call("Filecoin.ID", ()).await
    }

    async fn net_peers(&self) -> Result<Vec<PeerInfo>, Error> {
        let peers: Option<Vec<PeerInfo>> = self.call("Filecoin.NetPeers", ()).await?;
        Ok(peers.unwrap_or_default())
    }

    async fn net_agent_version(&self, peer: &str) -> Result<String, Error> {
        self.call("Filecoin.NetAgentVersion", (peer.to_owned(),))
            .await
    }

    async fn sync_state(&self) -> Result<serde_json::Value, Error> {
        self.call("Filecoin.SyncState", ()).await
    }
}
