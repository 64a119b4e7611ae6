// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use serde::{Deserialize, Serialize};

use crate::lotus_json;
use crate::shim::{address::Address, econ::TokenAmount};

/// State of an actor at a particular state root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActorState {
    /// Link to the code of the actor.
    #[serde(with = "lotus_json::cid")]
    pub code: Cid,
    /// Link to the state of the actor.
    #[serde(with = "lotus_json::cid")]
    pub head: Cid,
    /// Sequence of the actor.
    pub nonce: u64,
    /// Tokens available to the actor.
    pub balance: TokenAmount,
    /// The actor's "delegated" address, if assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegated_address: Option<Address>,
}

impl ActorState {
    pub fn new(code: Cid, head: Cid, balance: TokenAmount, nonce: u64) -> Self {
        Self {
            code,
            head,
            nonce,
            balance,
            delegated_address: None,
        }
    }
}
