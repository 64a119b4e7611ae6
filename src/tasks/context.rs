// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::HashSet;
use cid::Cid;
use tokio::sync::{Mutex, OnceCell};

use super::TaskError;
use crate::actors::{ActorCode, ActorRegistry, BuiltinActorManifest, actors_version};
use crate::blocks::Tipset;
use crate::datasource::{self, DataSource};
use crate::message::{ExecutedMessage, Message, Receipt};
use crate::shim::{address::Address, state_tree::ActorState, version::NetworkVersion};

/// First network version whose actor code CIDs are published by the node.
const BUNDLED_ACTORS: NetworkVersion = NetworkVersion::V16;

/// Maps actor code CIDs to builtin actor families, loading bundled manifests from the node on
/// first sight of a network version.
pub struct CodeResolver {
    registry: ActorRegistry,
    loaded: Mutex<HashSet<NetworkVersion>>,
}

impl CodeResolver {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            registry: ActorRegistry::with_legacy_codes()?,
            loaded: Mutex::new(HashSet::default()),
        })
    }

    pub async fn resolve(
        &self,
        source: &dyn DataSource,
        version: NetworkVersion,
        code: &Cid,
    ) -> Result<Option<ActorCode>, datasource::Error> {
        if let Some(found) = self.registry.lookup(code) {
            return Ok(Some(found));
        }
        if version < BUNDLED_ACTORS {
            return Ok(None);
        }
        let mut loaded = self.loaded.lock().await;
        if !loaded.contains(&version) {
            let list = source.actor_code_cids(version).await?;
            let manifest = BuiltinActorManifest::from_actor_list(list)
                .map_err(|e| datasource::Error::Other(format!("{e:#}")))?;
            self.registry
                .register(actors_version(version), &manifest);
            tracing::debug!(%version, actors = manifest.builtin_actors().len(), "loaded actor manifest");
            loaded.insert(version);
        }
        Ok(self.registry.lookup(code))
    }
}

/// Messages included in the blocks of a tipset.
#[derive(Debug, Default)]
pub struct IncludedMessages {
    /// Message identifiers per block, in block order.
    pub by_block: Vec<(Cid, Vec<Cid>)>,
    /// Each distinct message once, in first inclusion order.
    pub unique: Vec<(Cid, Message)>,
    /// Gas limit summed over every inclusion, duplicates counted.
    pub total_gas_limit: u64,
}

/// A message executed in the parent tipset together with its receipt.
#[derive(Debug, Clone)]
pub struct ExecutedReceipt {
    pub cid: Cid,
    pub message: Message,
    pub receipt: Receipt,
    /// Position in the execution order.
    pub index: usize,
}

/// Inputs shared by every task indexing one `(current, executed)` pair.
pub struct TipsetContext {
    source: Arc<dyn DataSource>,
    codes: Arc<CodeResolver>,
    pub current: Tipset,
    pub executed: Tipset,
    pub network_version: NetworkVersion,
    included: OnceCell<IncludedMessages>,
    receipts: OnceCell<Vec<ExecutedReceipt>>,
    executions: OnceCell<Vec<ExecutedMessage>>,
    changed_actors: OnceCell<BTreeMap<Address, ActorState>>,
}

impl TipsetContext {
    pub fn new(
        source: Arc<dyn DataSource>,
        codes: Arc<CodeResolver>,
        current: Tipset,
        executed: Tipset,
    ) -> Self {
        let network_version = source.network_version(current.epoch());
        Self {
            source,
            codes,
            current,
            executed,
            network_version,
            included: OnceCell::new(),
            receipts: OnceCell::new(),
            executions: OnceCell::new(),
            changed_actors: OnceCell::new(),
        }
    }

    pub fn source(&self) -> &dyn DataSource {
        self.source.as_ref()
    }

    /// Genesis is indexed as its own parent.
    pub fn is_genesis(&self) -> bool {
        self.current == self.executed
    }

    /// State root produced by executing `executed`; the root every execution-derived row refers
    /// to.
    pub fn state_root(&self) -> String {
        self.current.parent_state().to_string()
    }

    pub async fn actor_code(&self, code: &Cid) -> Result<Option<ActorCode>, TaskError> {
        Ok(self
            .codes
            .resolve(self.source.as_ref(), self.network_version, code)
            .await?)
    }

    pub async fn included_messages(&self) -> Result<&IncludedMessages, TaskError> {
        self.included
            .get_or_try_init(|| async {
                let mut out = IncludedMessages::default();
                let mut seen = HashSet::default();
                for block in self.executed.cids() {
                    let msgs = self.source.block_messages(block).await?;
                    let mut ids = Vec::with_capacity(msgs.len());
                    for (cid, msg) in msgs.all() {
                        out.total_gas_limit = out.total_gas_limit.saturating_add(msg.gas_limit);
                        if seen.insert(cid) {
                            out.unique.push((cid, msg.clone()));
                        }
                        ids.push(cid);
                    }
                    out.by_block.push((*block, ids));
                }
                Ok(out)
            })
            .await
    }

    /// Receipts of the messages executed in `executed`, as committed by `current`.
    pub async fn executed_receipts(&self) -> Result<&[ExecutedReceipt], TaskError> {
        self.receipts
            .get_or_try_init(|| async {
                let Some(block) = self.current.cids().first() else {
                    return Ok(vec![]);
                };
                let messages = self.source.parent_messages(block).await?;
                let receipts = self.source.parent_receipts(block).await?;
                if messages.len() != receipts.len() {
                    return Err(TaskError::Inconsistent(format!(
                        "{} parent messages but {} receipts in {}",
                        messages.len(),
                        receipts.len(),
                        self.current
                    )));
                }
                Ok(messages
                    .into_iter()
                    .zip(receipts)
                    .enumerate()
                    .map(|(index, ((cid, message), receipt))| ExecutedReceipt {
                        cid,
                        message,
                        receipt,
                        index,
                    })
                    .collect())
            })
            .await
            .map(Vec::as_slice)
    }

    pub async fn executions(&self) -> Result<&[ExecutedMessage], TaskError> {
        self.executions
            .get_or_try_init(|| async {
                Ok::<_, TaskError>(
                    self.source
                        .message_executions(&self.current, &self.executed)
                        .await?,
                )
            })
            .await
            .map(Vec::as_slice)
    }

    /// Actors changed by executing `executed`. For genesis, every actor in the genesis state.
    pub async fn changed_actors(&self) -> Result<&BTreeMap<Address, ActorState>, TaskError> {
        self.changed_actors
            .get_or_try_init(|| async {
                let old_root = if self.is_genesis() {
                    Cid::default()
                } else {
                    *self.executed.parent_state()
                };
                Ok::<_, TaskError>(
                    self.source
                        .changed_actors(&old_root, self.current.parent_state())
                        .await?,
                )
            })
            .await
    }
}
