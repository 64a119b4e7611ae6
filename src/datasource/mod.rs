// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Read-only access to chain data.
//!
//! Everything above this module reads the chain through [`DataSource`], so the same indexing
//! pipeline runs against a live node ([`NodeDataSource`]) or an in-process chain
//! (`memory::MemoryDataSource`, in tests).

#[cfg(test)]
pub mod memory;
pub mod node;

pub use node::NodeDataSource;

use std::collections::BTreeMap;

use async_trait::async_trait;
use cid::Cid;
use serde::{Deserialize, Serialize};

use crate::blocks::{Tipset, TipsetKey};
use crate::message::{ActorEvent, BlockMessages, ExecutedMessage, Message, Receipt};
use crate::shim::{
    address::Address, clock::ChainEpoch, state_tree::ActorState, version::NetworkVersion,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The node could not be reached or failed to answer. Retryable.
    #[error("chain unavailable: {0}")]
    ChainUnavailable(String),
    /// The requested object does not exist at the requested root. Terminal for that query.
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ChainUnavailable(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// The decoded state of an actor alongside the actor itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorStateView {
    pub actor: ActorState,
    pub state: serde_json::Value,
}

/// Read-only capability set over a chain.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn chain_head(&self) -> Result<Tipset, Error>;

    async fn tipset(&self, key: &TipsetKey) -> Result<Tipset, Error>;

    /// Returns the tipset at `height` on the chain ending at `from`, or the nearest tipset below
    /// it when `height` is a null round. Callers compare heights to detect null rounds.
    async fn tipset_by_height(&self, height: ChainEpoch, from: &TipsetKey)
    -> Result<Tipset, Error>;

    /// Messages included in a block.
    async fn block_messages(&self, block: &Cid) -> Result<BlockMessages, Error>;

    /// Receipts of the parent tipset's messages, in execution order, as committed by `block`.
    async fn parent_receipts(&self, block: &Cid) -> Result<Vec<Receipt>, Error>;

    /// The deduplicated messages of the parent tipset, in execution order.
    async fn parent_messages(&self, block: &Cid) -> Result<Vec<(Cid, Message)>, Error>;

    async fn actor(&self, address: &Address, key: &TipsetKey) -> Result<ActorState, Error>;

    async fn actor_state(&self, address: &Address, ts: &Tipset) -> Result<ActorStateView, Error>;

    /// Actors whose state differs between two state roots, keyed by address.
    async fn changed_actors(
        &self,
        old_root: &Cid,
        new_root: &Cid,
    ) -> Result<BTreeMap<Address, ActorState>, Error>;

    /// Every message applied while producing `current` from `executed`, with its execution trace.
    async fn message_executions(
        &self,
        current: &Tipset,
        executed: &Tipset,
    ) -> Result<Vec<ExecutedMessage>, Error>;

    /// Events stored under a receipt's events root.
    async fn events(&self, events_root: &Cid) -> Result<Vec<ActorEvent>, Error>;

    /// Decodes method parameters into JSON, when the node knows the actor's interface.
    async fn decode_params(
        &self,
        to: &Address,
        method: u64,
        params: &[u8],
        key: &TipsetKey,
    ) -> Result<serde_json::Value, Error>;

    /// Builtin actor code CIDs by name, for actors versions bundled since network version 16.
    async fn actor_code_cids(&self, version: NetworkVersion) -> Result<BTreeMap<String, Cid>, Error>;

    fn network_version(&self, height: ChainEpoch) -> NetworkVersion;
}

/// A peer connected to the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PeerInfo {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(with = "crate::lotus_json::nullable_vec", default)]
    pub addrs: Vec<String>,
}

/// Node state that is not part of the chain: networking and sync progress.
#[async_trait]
pub trait NodeInfo: Send + Sync {
    async fn net_id(&self) -> Result<String, Error>;

    async fn net_peers(&self) -> Result<Vec<PeerInfo>, Error>;

    async fn net_agent_version(&self, peer: &str) -> Result<String, Error>;

    /// Raw sync status as reported by the node.
    async fn sync_state(&self) -> Result<serde_json::Value, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_classification() {
        assert!(Error::ChainUnavailable("timeout".into()).is_retryable());
        assert!(!Error::NotFound("actor".into()).is_retryable());
        assert!(Error::NotFound("actor".into()).is_not_found());
    }
}
