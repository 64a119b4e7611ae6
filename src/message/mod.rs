// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod event;
mod execution;
mod gas;
mod receipt;
mod signed_message;

use cid::Cid;
use multihash_codetable::{Code, MultihashDigest as _};
use serde::{Deserialize, Serialize};

pub use event::ActorEvent;
#[cfg(test)]
pub use event::EventEntry;
pub use execution::{ExecutedMessage, ExecutionTrace, InvocResult};
#[cfg(test)]
pub use execution::GasCost;
pub use gas::compute_gas_outputs;
pub use receipt::Receipt;
pub use signed_message::SignedMessage;

use crate::blocks::DAG_CBOR;
use crate::lotus_json::{base64_bytes, cid_opt, nullable_vec};
use crate::shim::{address::Address, econ::TokenAmount};

/// Method number of a plain value transfer.
pub const METHOD_SEND: u64 = 0;

/// An unsigned message, in the shape the node reports it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Message {
    #[serde(default)]
    pub version: u64,
    pub to: Address,
    pub from: Address,
    pub nonce: u64,
    pub value: TokenAmount,
    pub gas_limit: u64,
    pub gas_fee_cap: TokenAmount,
    pub gas_premium: TokenAmount,
    pub method: u64,
    #[serde(with = "base64_bytes", default)]
    pub params: Vec<u8>,
    #[serde(
        rename = "CID",
        with = "cid_opt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cid: Option<Cid>,
}

impl Message {
    /// The identifier reported by the node, or one derived locally for messages built in-process.
    pub fn cid(&self) -> Cid {
        self.cid.unwrap_or_else(|| {
            let data = serde_json::to_vec(self).unwrap_or_default();
            Cid::new_v1(DAG_CBOR, Code::Blake2b256.digest(&data))
        })
    }

    /// Funds the sender must hold to cover the worst-case gas charge.
    pub fn required_funds(&self) -> TokenAmount {
        self.gas_fee_cap.clone() * i64::try_from(self.gas_limit).unwrap_or(i64::MAX)
    }

    /// Size of the serialized message, used by the gas economy and message rows.
    pub fn size_bytes(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or_default()
    }
}

impl Default for Message {
    fn default() -> Self {
        Self {
            version: 0,
            to: Address::new_id('f', 0),
            from: Address::new_id('f', 0),
            nonce: 0,
            value: TokenAmount::zero(),
            gas_limit: 0,
            gas_fee_cap: TokenAmount::zero(),
            gas_premium: TokenAmount::zero(),
            method: METHOD_SEND,
            params: vec![],
            cid: None,
        }
    }
}

/// Messages included in a single block, as returned by `ChainGetBlockMessages`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMessages {
    #[serde(rename = "BlsMessages", with = "nullable_vec", default)]
    pub bls_messages: Vec<Message>,
    #[serde(rename = "SecpkMessages", with = "nullable_vec", default)]
    pub secp_messages: Vec<SignedMessage>,
}

impl BlockMessages {
    /// Every message in the block with its identifier, BLS messages first.
    pub fn all(&self) -> Vec<(Cid, &Message)> {
        self.bls_messages
            .iter()
            .map(|m| (m.cid(), m))
            .chain(self.secp_messages.iter().map(|s| (s.cid(), &s.message)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.bls_messages.len() + self.secp_messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
