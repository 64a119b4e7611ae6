// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! An in-process chain, assembled with [`ChainBuilder`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, prelude::BASE64_STANDARD};
use cid::Cid;
use multihash_codetable::{Code, MultihashDigest as _};
use num_bigint::BigInt;
use parking_lot::RwLock;
use serde_json::json;

use super::{ActorStateView, DataSource, Error, NodeInfo, PeerInfo};
use crate::actors::{BuiltinActor, legacy_code};
use crate::blocks::{BeaconEntry, BlockHeader, DAG_CBOR, ElectionProof, Ticket, Tipset, TipsetKey};
use crate::message::{
    ActorEvent, BlockMessages, EventEntry, ExecutedMessage, ExecutionTrace, GasCost, Message,
    Receipt, SignedMessage, compute_gas_outputs,
};
use crate::networks::ChainConfig;
use crate::shim::{
    address::Address, clock::ChainEpoch, econ::TokenAmount, error::ExitCode,
    state_tree::ActorState, version::NetworkVersion,
};

/// Actors version whose code CIDs the in-memory chain reports.
pub const MEMORY_ACTORS_VERSION: u64 = 16;

/// Calls that can be made to fail at a given height, to exercise error paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    /// `block_messages` for blocks at the height.
    BlockMessages,
    /// `parent_receipts` and `parent_messages` for blocks at the height.
    ParentReceipts,
    /// `changed_actors` into the state root of the tipset at the height.
    ChangedActors,
    /// `message_executions` with `current` at the height.
    MessageExecutions,
}

#[derive(Default)]
struct MemoryChain {
    tipsets: HashMap<TipsetKey, Tipset>,
    head: Option<TipsetKey>,
    block_heights: HashMap<Cid, ChainEpoch>,
    block_messages: HashMap<Cid, BlockMessages>,
    parent_receipts: HashMap<Cid, Vec<Receipt>>,
    parent_messages: HashMap<Cid, Vec<(Cid, Message)>>,
    /// Complete actor sets by state root.
    states: HashMap<Cid, BTreeMap<Address, ActorState>>,
    executions: HashMap<TipsetKey, Vec<ExecutedMessage>>,
    events: HashMap<Cid, Vec<ActorEvent>>,
    failures: HashSet<(FailurePoint, ChainEpoch)>,
    delays: HashMap<(FailurePoint, ChainEpoch), Duration>,
    peers: Vec<(PeerInfo, String)>,
}

/// A [`DataSource`] over an in-memory chain.
pub struct MemoryDataSource {
    inner: RwLock<MemoryChain>,
    chain_config: ChainConfig,
}

impl MemoryDataSource {
    pub fn new(chain_config: ChainConfig) -> Self {
        Self {
            inner: RwLock::new(MemoryChain::default()),
            chain_config,
        }
    }

    /// Makes a call fail with [`Error::Other`] at `height` until cleared.
    pub fn inject_failure(&self, point: FailurePoint, height: ChainEpoch) {
        self.inner.write().failures.insert((point, height));
    }

    /// Makes a call sleep for `delay` at `height` before answering.
    pub fn inject_delay(&self, point: FailurePoint, height: ChainEpoch, delay: Duration) {
        self.inner.write().delays.insert((point, height), delay);
    }

    pub fn clear_failures(&self) {
        let mut inner = self.inner.write();
        inner.failures.clear();
        inner.delays.clear();
    }

    pub fn set_head(&self, ts: &Tipset) {
        self.inner.write().head = Some(ts.key().clone());
    }

    pub fn add_peer(&self, id: impl Into<String>, agent: impl Into<String>) {
        self.inner.write().peers.push((
            PeerInfo {
                id: id.into(),
                addrs: vec!["/ip4/127.0.0.1/tcp/1347".into()],
            },
            agent.into(),
        ));
    }

    async fn stall(&self, point: FailurePoint, height: ChainEpoch) {
        let delay = self.inner.read().delays.get(&(point, height)).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check(&self, point: FailurePoint, height: ChainEpoch) -> Result<(), Error> {
        if self.inner.read().failures.contains(&(point, height)) {
            return Err(Error::Other(format!("injected {point:?} failure at {height}")));
        }
        Ok(())
    }

    fn block_height(&self, block: &Cid) -> Result<ChainEpoch, Error> {
        self.inner
            .read()
            .block_heights
            .get(block)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("block {block}")))
    }
}

#[async_trait]
impl DataSource for MemoryDataSource {
    async fn chain_head(&self) -> Result<Tipset, Error> {
        let inner = self.inner.read();
        inner
            .head
            .as_ref()
            .and_then(|key| inner.tipsets.get(key))
            .cloned()
            .ok_or_else(|| Error::ChainUnavailable("no head".into()))
    }

    async fn tipset(&self, key: &TipsetKey) -> Result<Tipset, Error> {
        self.inner
            .read()
            .tipsets
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("tipset {key}")))
    }

    async fn tipset_by_height(
        &self,
        height: ChainEpoch,
        from: &TipsetKey,
    ) -> Result<Tipset, Error> {
        let inner = self.inner.read();
        let mut ts = inner
            .tipsets
            .get(from)
            .ok_or_else(|| Error::NotFound(format!("tipset {from}")))?;
        if height > ts.epoch() {
            return Err(Error::Other(format!(
                "looking for tipset with height greater than start point: {height} > {}",
                ts.epoch()
            )));
        }
        while ts.epoch() > height {
            ts = inner
                .tipsets
                .get(ts.parents())
                .ok_or_else(|| Error::NotFound(format!("tipset {}", ts.parents())))?;
        }
        Ok(ts.clone())
    }

    async fn block_messages(&self, block: &Cid) -> Result<BlockMessages, Error> {
        self.check(FailurePoint::BlockMessages, self.block_height(block)?)?;
        Ok(self
            .inner
            .read()
            .block_messages
            .get(block)
            .cloned()
            .unwrap_or_default())
    }

    async fn parent_receipts(&self, block: &Cid) -> Result<Vec<Receipt>, Error> {
        self.check(FailurePoint::ParentReceipts, self.block_height(block)?)?;
        Ok(self
            .inner
            .read()
            .parent_receipts
            .get(block)
            .cloned()
            .unwrap_or_default())
    }

    async fn parent_messages(&self, block: &Cid) -> Result<Vec<(Cid, Message)>, Error> {
        self.check(FailurePoint::ParentReceipts, self.block_height(block)?)?;
        Ok(self
            .inner
            .read()
            .parent_messages
            .get(block)
            .cloned()
            .unwrap_or_default())
    }

    async fn actor(&self, address: &Address, key: &TipsetKey) -> Result<ActorState, Error> {
        let inner = self.inner.read();
        let ts = inner
            .tipsets
            .get(key)
            .ok_or_else(|| Error::NotFound(format!("tipset {key}")))?;
        inner
            .states
            .get(ts.parent_state())
            .and_then(|actors| actors.get(address))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("actor {address} at {key}")))
    }

    async fn actor_state(&self, address: &Address, ts: &Tipset) -> Result<ActorStateView, Error> {
        let actor = self.actor(address, ts.key()).await?;
        let state = json!({
            "Address": address.to_string(),
            "Nonce": actor.nonce,
            "Head": actor.head.to_string(),
        });
        Ok(ActorStateView { actor, state })
    }

    async fn changed_actors(
        &self,
        old_root: &Cid,
        new_root: &Cid,
    ) -> Result<BTreeMap<Address, ActorState>, Error> {
        let inner = self.inner.read();
        if let Some(height) = inner
            .tipsets
            .values()
            .find(|ts| ts.parent_state() == new_root)
            .map(Tipset::epoch)
            && inner.failures.contains(&(FailurePoint::ChangedActors, height))
        {
            return Err(Error::Other(format!(
                "injected ChangedActors failure at {height}"
            )));
        }
        let empty = BTreeMap::new();
        let old = inner.states.get(old_root).unwrap_or(&empty);
        let new = inner
            .states
            .get(new_root)
            .ok_or_else(|| Error::NotFound(format!("state root {new_root}")))?;
        Ok(new
            .iter()
            .filter(|(address, actor)| old.get(*address) != Some(*actor))
            .map(|(address, actor)| (address.clone(), actor.clone()))
            .collect())
    }

    async fn message_executions(
        &self,
        current: &Tipset,
        executed: &Tipset,
    ) -> Result<Vec<ExecutedMessage>, Error> {
        self.stall(FailurePoint::MessageExecutions, current.epoch()).await;
        self.check(FailurePoint::MessageExecutions, current.epoch())?;
        let inner = self.inner.read();
        if !current.is_child_of(executed) && current != executed {
            return Err(Error::Other(format!(
                "{current} is not a child of {executed}"
            )));
        }
        Ok(inner
            .executions
            .get(executed.key())
            .cloned()
            .unwrap_or_default())
    }

    async fn events(&self, events_root: &Cid) -> Result<Vec<ActorEvent>, Error> {
        Ok(self
            .inner
            .read()
            .events
            .get(events_root)
            .cloned()
            .unwrap_or_default())
    }

    async fn decode_params(
        &self,
        _to: &Address,
        _method: u64,
        params: &[u8],
        _key: &TipsetKey,
    ) -> Result<serde_json::Value, Error> {
        if params.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(json!({ "Raw": BASE64_STANDARD.encode(params) }))
    }

    async fn actor_code_cids(
        &self,
        _version: NetworkVersion,
    ) -> Result<BTreeMap<String, Cid>, Error> {
        <BuiltinActor as strum::IntoEnumIterator>::iter()
            .map(|family| {
                legacy_code(family, MEMORY_ACTORS_VERSION)
                    .map(|cid| (family.to_string(), cid))
                    .map_err(|e| Error::Other(e.to_string()))
            })
            .collect()
    }

    fn network_version(&self, height: ChainEpoch) -> NetworkVersion {
        self.chain_config.network_version(height)
    }
}

#[async_trait]
impl NodeInfo for MemoryDataSource {
    async fn net_id(&self) -> Result<String, Error> {
        Ok("12D3KooWMemoryNode".into())
    }

    async fn net_peers(&self) -> Result<Vec<PeerInfo>, Error> {
        Ok(self
            .inner
            .read()
            .peers
            .iter()
            .map(|(peer, _)| peer.clone())
            .collect())
    }

    async fn net_agent_version(&self, peer: &str) -> Result<String, Error> {
        self.inner
            .read()
            .peers
            .iter()
            .find(|(info, _)| info.id == peer)
            .map(|(_, agent)| agent.clone())
            .ok_or_else(|| Error::NotFound(format!("peer {peer}")))
    }

    async fn sync_state(&self) -> Result<serde_json::Value, Error> {
        let head = self.chain_head().await?;
        Ok(json!({ "ActiveSyncs": [{ "Height": head.epoch(), "Stage": 5 }] }))
    }
}

/// A deterministic identifier for synthetic chain objects.
pub fn synthetic_cid(tag: &str) -> Cid {
    Cid::new_v1(DAG_CBOR, Code::Blake2b256.digest(tag.as_bytes()))
}

const ACCOUNTS: u64 = 5;
const FIRST_ACCOUNT: u64 = 100;
const BASE_FEE: i64 = 100;
const GAS_LIMIT: u64 = 10_000_000;

/// Shape of a tipset appended by [`ChainBuilder`].
#[derive(Debug, Clone, Copy)]
pub struct TipsetShape {
    pub blocks: usize,
    pub messages_per_block: usize,
}

impl Default for TipsetShape {
    fn default() -> Self {
        Self {
            blocks: 2,
            messages_per_block: 2,
        }
    }
}

/// Assembles a synthetic chain inside a [`MemoryDataSource`].
///
/// Every tipset commits the execution results of its parent: the parent's deduplicated messages
/// get receipts, traces, events and actor changes, and the child's parent state root names the
/// resulting actor set. Each tipset also runs an implicit cron tick.
pub struct ChainBuilder {
    source: Arc<MemoryDataSource>,
    genesis: Tipset,
    prefix: char,
    nonces: HashMap<Address, u64>,
    salt: u64,
}

impl ChainBuilder {
    pub fn new() -> Self {
        Self::with_config(ChainConfig::devnet("memory"))
    }

    pub fn with_config(chain_config: ChainConfig) -> Self {
        let source = Arc::new(MemoryDataSource::new(chain_config));
        let prefix = 'f';
        let genesis_root = synthetic_cid("state:genesis");
        let mut actors = BTreeMap::new();
        let builtins = [
            (0, BuiltinActor::System),
            (1, BuiltinActor::Init),
            (2, BuiltinActor::Reward),
            (3, BuiltinActor::Cron),
            (4, BuiltinActor::Power),
            (5, BuiltinActor::Market),
            (6, BuiltinActor::VerifiedRegistry),
            (99, BuiltinActor::Account),
        ];
        let accounts = (FIRST_ACCOUNT..FIRST_ACCOUNT + ACCOUNTS).map(|id| (id, BuiltinActor::Account));
        for (id, family) in builtins.into_iter().chain(accounts) {
            let address = Address::new_id(prefix, id);
            let code = legacy_code(family, MEMORY_ACTORS_VERSION).unwrap();
            let head = synthetic_cid(&format!("head:{address}:genesis"));
            actors.insert(
                address,
                ActorState::new(code, head, TokenAmount::from_whole(1000), 0),
            );
        }

        let header = BlockHeader {
            miner: Address::new_id(prefix, 0),
            parent_state_root: genesis_root,
            parent_message_receipts: synthetic_cid("receipts:genesis"),
            messages: synthetic_cid("messages:genesis"),
            timestamp: source.chain_config.genesis_timestamp,
            parent_base_fee: TokenAmount::from(BASE_FEE),
            ..Default::default()
        };
        let genesis = Tipset::from_headers(vec![header]).unwrap();
        {
            let mut inner = source.inner.write();
            inner.states.insert(genesis_root, actors);
            inner.block_heights.insert(genesis.cids()[0], 0);
            inner.tipsets.insert(genesis.key().clone(), genesis.clone());
            inner.head = Some(genesis.key().clone());
        }
        Self {
            source,
            genesis,
            prefix,
            nonces: HashMap::new(),
            salt: 0,
        }
    }

    pub fn source(&self) -> Arc<MemoryDataSource> {
        self.source.clone()
    }

    pub fn genesis(&self) -> &Tipset {
        &self.genesis
    }

    /// Appends tipsets at consecutive heights on top of the current head up to `height`.
    pub fn extend_to(&mut self, height: ChainEpoch) -> Tipset {
        let mut head = self.head();
        while head.epoch() < height {
            head = self.append(&head, head.epoch() + 1, TipsetShape::default());
        }
        head
    }

    /// Appends a tipset at `height` on top of the current head. Heights skipped between the head
    /// and `height` are null rounds.
    pub fn push(&mut self, height: ChainEpoch) -> Tipset {
        let head = self.head();
        self.append(&head, height, TipsetShape::default())
    }

    pub fn head(&self) -> Tipset {
        let inner = self.source.inner.read();
        inner
            .head
            .as_ref()
            .and_then(|key| inner.tipsets.get(key))
            .cloned()
            .unwrap_or_else(|| self.genesis.clone())
    }

    /// Appends a tipset at `height` on top of `parent` and makes it the head. Appending to a
    /// tipset other than the head creates a fork.
    pub fn append(&mut self, parent: &Tipset, height: ChainEpoch, shape: TipsetShape) -> Tipset {
        assert!(height > parent.epoch(), "tipsets must increase in height");
        self.salt += 1;
        let salt = self.salt;

        let parent_messages = self.parent_messages(parent);
        let (state_root, receipts, executions, events) =
            self.execute(parent, height, &parent_messages);

        let mut blocks = Vec::with_capacity(shape.blocks);
        let mut block_messages = Vec::with_capacity(shape.blocks);
        for i in 0..shape.blocks.max(1) {
            let miner = Address::new_id(self.prefix, 1000 + i as u64);
            let msgs = self.new_block_messages(i, shape.messages_per_block, &block_messages);
            blocks.push(BlockHeader {
                miner,
                ticket: Some(Ticket {
                    vrfproof: vec![i as u8, salt as u8],
                }),
                election_proof: Some(ElectionProof {
                    win_count: 1,
                    vrfproof: vec![1],
                }),
                beacon_entries: vec![BeaconEntry {
                    round: height as u64 + 1000,
                    data: vec![0xbe, 0xac],
                }],
                parents: parent.key().clone(),
                parent_weight: BigInt::from(parent.epoch() * 10),
                height,
                parent_state_root: state_root,
                parent_message_receipts: synthetic_cid(&format!("receipts:{state_root}")),
                messages: synthetic_cid(&format!("messages:{height}:{salt}:{i}")),
                timestamp: self.source.chain_config.genesis_timestamp + 30 * height as u64,
                parent_base_fee: TokenAmount::from(BASE_FEE),
                ..Default::default()
            });
            block_messages.push(msgs);
        }
        let ts = Tipset::from_headers(blocks).unwrap();

        let mut inner = self.source.inner.write();
        for (cid, msgs) in ts.cids().iter().zip(block_messages) {
            inner.block_heights.insert(*cid, height);
            inner.block_messages.insert(*cid, msgs);
            inner.parent_receipts.insert(*cid, receipts.clone());
            inner.parent_messages.insert(*cid, parent_messages.clone());
        }
        inner.executions.insert(parent.key().clone(), executions);
        inner.events.extend(events);
        inner.tipsets.insert(ts.key().clone(), ts.clone());
        inner.head = Some(ts.key().clone());
        ts
    }

    fn new_block_messages(
        &mut self,
        block: usize,
        count: usize,
        previous_blocks: &[BlockMessages],
    ) -> BlockMessages {
        let mut out = BlockMessages::default();
        // The second block re-includes the first message of the first block.
        if block == 1
            && let Some(first) = previous_blocks.first().and_then(|b| b.bls_messages.first())
        {
            out.bls_messages.push(first.clone());
        }
        for i in 0..count {
            let from_id = FIRST_ACCOUNT + ((block + i) as u64 % ACCOUNTS);
            let to_id = FIRST_ACCOUNT + ((block + i + 1) as u64 % ACCOUNTS);
            let from = Address::new_id(self.prefix, from_id);
            let nonce = self.nonces.entry(from.clone()).or_default();
            let message = Message {
                version: 0,
                to: Address::new_id(self.prefix, to_id),
                from,
                nonce: *nonce,
                value: TokenAmount::from(1000),
                gas_limit: GAS_LIMIT,
                gas_fee_cap: TokenAmount::from(200),
                gas_premium: TokenAmount::from(10),
                method: if i % 2 == 0 { 0 } else { 2 },
                params: if i % 2 == 0 { vec![] } else { vec![0x82, 0x01] },
                cid: None,
            };
            *nonce += 1;
            if i % 2 == 0 {
                out.bls_messages.push(message);
            } else {
                out.secp_messages
                    .push(SignedMessage::new_unchecked(message, Default::default()));
            }
        }
        out
    }

    /// The deduplicated messages of `ts`, in block order.
    fn parent_messages(&self, ts: &Tipset) -> Vec<(Cid, Message)> {
        let inner = self.source.inner.read();
        let mut seen = HashSet::new();
        let mut out = vec![];
        for block in ts.cids() {
            if let Some(msgs) = inner.block_messages.get(block) {
                for (cid, msg) in msgs.all() {
                    if seen.insert(cid) {
                        out.push((cid, msg.clone()));
                    }
                }
            }
        }
        out
    }

    /// Applies `messages` of `executed` on its parent state and records the outcome.
    #[allow(clippy::type_complexity)]
    fn execute(
        &self,
        executed: &Tipset,
        child_height: ChainEpoch,
        messages: &[(Cid, Message)],
    ) -> (
        Cid,
        Vec<Receipt>,
        Vec<ExecutedMessage>,
        Vec<(Cid, Vec<ActorEvent>)>,
    ) {
        let inner = self.source.inner.read();
        let mut actors = inner
            .states
            .get(executed.parent_state())
            .cloned()
            .unwrap_or_default();
        drop(inner);

        let state_root = synthetic_cid(&format!("state:{}:{child_height}", executed.key()));
        let base_fee = executed.parent_base_fee().clone();
        let mut receipts = vec![];
        let mut executions = vec![];
        let mut events = vec![];
        let market = Address::new_id(self.prefix, 5);

        for (cid, msg) in messages {
            let gas_used = GAS_LIMIT / 2;
            let mut trace = ExecutionTrace::leaf(msg, ExitCode::OK);
            let mut events_root = None;
            if msg.method != 0 {
                let sub = Message {
                    from: msg.to.clone(),
                    to: market.clone(),
                    method: 2,
                    value: TokenAmount::from(10),
                    ..Default::default()
                };
                trace.subcalls.push(ExecutionTrace::leaf(&sub, ExitCode::OK));
                let root = synthetic_cid(&format!("events:{cid}"));
                events.push((
                    root,
                    vec![ActorEvent {
                        emitter: msg.to.id().unwrap_or_default(),
                        entries: vec![EventEntry {
                            flags: 3,
                            key: "t1".into(),
                            codec: 0x55,
                            value: vec![1, 2, 3],
                        }],
                    }],
                ));
                events_root = Some(root);
            }
            let receipt = Receipt {
                exit_code: ExitCode::OK,
                r#return: vec![],
                gas_used,
                events_root,
            };
            let outputs = compute_gas_outputs(
                gas_used as i64,
                msg.gas_limit as i64,
                &base_fee,
                &msg.gas_fee_cap,
                &msg.gas_premium,
                true,
            );
            let gas_cost = GasCost {
                message: Some(*cid),
                gas_used: TokenAmount::from(gas_used as i64),
                total_cost: outputs.base_fee_burn.clone()
                    + outputs.over_estimation_burn.clone()
                    + outputs.miner_tip.clone(),
                base_fee_burn: outputs.base_fee_burn,
                over_estimation_burn: outputs.over_estimation_burn,
                miner_penalty: outputs.miner_penalty,
                miner_tip: outputs.miner_tip,
                refund: outputs.refund,
            };
            for (address, nonce_bump, delta) in [
                (&msg.from, 1, -1000),
                (&msg.to, 0, 1000),
            ] {
                if let Some(actor) = actors.get_mut(address) {
                    actor.nonce += nonce_bump;
                    actor.balance = actor.balance.clone() + TokenAmount::from(delta);
                    actor.head = synthetic_cid(&format!("head:{address}:{child_height}"));
                }
            }
            let codes = |a: &Address| actors.get(a).map(|it| it.code);
            executions.push(ExecutedMessage {
                cid: *cid,
                message: msg.clone(),
                receipt: receipt.clone(),
                gas_cost,
                trace,
                implicit: false,
                from_actor_code: codes(&msg.from),
                to_actor_code: codes(&msg.to),
                error: None,
            });
            receipts.push(receipt);
        }

        // Cron tick, applied by the system after the explicit messages.
        let system = Address::new_id(self.prefix, 0);
        let cron = Address::new_id(self.prefix, 3);
        let tick = Message {
            from: system.clone(),
            to: cron.clone(),
            nonce: executed.epoch() as u64,
            method: 2,
            gas_limit: 1 << 63,
            ..Default::default()
        };
        if let Some(actor) = actors.get_mut(&cron) {
            actor.head = synthetic_cid(&format!("head:{cron}:{child_height}"));
        }
        executions.push(ExecutedMessage {
            cid: tick.cid(),
            trace: ExecutionTrace::leaf(&tick, ExitCode::OK),
            receipt: Receipt::default(),
            gas_cost: GasCost::default(),
            implicit: true,
            from_actor_code: actors.get(&system).map(|it| it.code),
            to_actor_code: actors.get(&cron).map(|it| it.code),
            error: None,
            message: tick,
        });

        self.source.inner.write().states.insert(state_root, actors);
        (state_root, receipts, executions, events)
    }
}

impl Default for ChainBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_rounds_resolve_to_previous_tipset() {
        let mut builder = ChainBuilder::new();
        builder.extend_to(3);
        let ts6 = builder.push(6);
        let source = builder.source();

        let found = source.tipset_by_height(5, ts6.key()).await.unwrap();
        assert_eq!(found.epoch(), 3);
        let found = source.tipset_by_height(6, ts6.key()).await.unwrap();
        assert_eq!(found, ts6);
        assert!(source.tipset_by_height(7, ts6.key()).await.is_err());
    }

    #[tokio::test]
    async fn parent_messages_are_deduplicated() {
        let mut builder = ChainBuilder::new();
        let ts1 = builder.extend_to(1);
        let ts2 = builder.extend_to(2);
        let source = builder.source();

        let included: usize = {
            let mut n = 0;
            for block in ts1.cids() {
                n += source.block_messages(block).await.unwrap().len();
            }
            n
        };
        let parent_msgs = source.parent_messages(&ts2.cids()[0]).await.unwrap();
        let receipts = source.parent_receipts(&ts2.cids()[0]).await.unwrap();
        assert_eq!(included, 5);
        assert_eq!(parent_msgs.len(), 4);
        assert_eq!(receipts.len(), parent_msgs.len());

        let executions = source.message_executions(&ts2, &ts1).await.unwrap();
        assert_eq!(executions.len(), 5);
        assert_eq!(executions.iter().filter(|e| e.implicit).count(), 1);
    }

    #[tokio::test]
    async fn changed_actors_between_roots() {
        let mut builder = ChainBuilder::new();
        let ts1 = builder.extend_to(1);
        let ts2 = builder.extend_to(2);
        let source = builder.source();
        let changed = source
            .changed_actors(ts1.parent_state(), ts2.parent_state())
            .await
            .unwrap();
        // Four accounts send or receive, plus the cron tick.
        assert_eq!(changed.len(), 5);
    }

    #[tokio::test]
    async fn injected_failures() {
        let mut builder = ChainBuilder::new();
        let ts = builder.extend_to(2);
        let source = builder.source();
        source.inject_failure(FailurePoint::BlockMessages, 2);
        assert!(source.block_messages(&ts.cids()[0]).await.is_err());
        source.clear_failures();
        assert!(source.block_messages(&ts.cids()[0]).await.is_ok());
    }

    #[tokio::test]
    async fn forks_share_history() {
        let mut builder = ChainBuilder::new();
        let ts1 = builder.extend_to(1);
        let a = builder.append(&ts1, 2, TipsetShape::default());
        let b = builder.append(&ts1, 2, TipsetShape::default());
        assert_ne!(a.key(), b.key());
        assert_eq!(a.parents(), b.parents());
        assert_eq!(builder.source().chain_head().await.unwrap(), b);
    }
}
