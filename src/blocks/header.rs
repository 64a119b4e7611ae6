// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use multihash_codetable::{Code, MultihashDigest as _};
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use super::{BeaconEntry, ElectionProof, PoStProof, Signature, Ticket, TipsetKey};
use crate::lotus_json::{cid as cid_json, nullable_vec, stringify};
use crate::shim::{address::Address, clock::ChainEpoch, econ::TokenAmount};

/// Multicodec code of DAG-CBOR, the encoding of chain objects.
pub const DAG_CBOR: u64 = 0x71;

/// Header of a block, in the shape the node reports it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlockHeader {
    /// The address of the miner actor that mined this block
    pub miner: Address,
    #[serde(default)]
    pub ticket: Option<Ticket>,
    #[serde(default)]
    pub election_proof: Option<ElectionProof>,
    /// The verifiable oracle randomness used to elect this block's author leader
    #[serde(with = "nullable_vec", default)]
    pub beacon_entries: Vec<BeaconEntry>,
    #[serde(rename = "WinPoStProof", with = "nullable_vec", default)]
    pub winning_post_proof: Vec<PoStProof>,
    /// The set of parents this block was based on.
    pub parents: TipsetKey,
    /// The aggregate chain weight of the parent set
    #[serde(with = "stringify")]
    pub parent_weight: BigInt,
    pub height: ChainEpoch,
    /// The CID of the parent state root after calculating parent tipset.
    #[serde(with = "cid_json")]
    pub parent_state_root: Cid,
    /// The CID of the root of an array of receipts for the parent tipset's messages
    #[serde(with = "cid_json")]
    pub parent_message_receipts: Cid,
    /// The CID of the Merkle links for `bls_messages` and `secp_messages`
    #[serde(with = "cid_json")]
    pub messages: Cid,
    #[serde(rename = "BLSAggregate", default)]
    pub bls_aggregate: Option<Signature>,
    /// Block creation time, in seconds since the Unix epoch
    pub timestamp: u64,
    #[serde(default)]
    pub block_sig: Option<Signature>,
    #[serde(default)]
    pub fork_signaling: u64,
    /// The base fee of the parent block
    pub parent_base_fee: TokenAmount,
}

impl BlockHeader {
    /// Content identifier derived from the header's JSON encoding.
    ///
    /// Blocks received from a node carry their canonical identifiers in the tipset key. This is
    /// only used for chains assembled locally, where a stable unique identifier per header is all
    /// that is required.
    pub fn local_cid(&self) -> Cid {
        // Serializing a plain data struct into a `Vec` cannot fail.
        let data = serde_json::to_vec(self).unwrap_or_default();
        Cid::new_v1(DAG_CBOR, Code::Blake2b256.digest(&data))
    }

    /// Number of winning tickets for this block, zero when the proof is absent.
    pub fn win_count(&self) -> i64 {
        self.election_proof
            .as_ref()
            .map(|proof| proof.win_count)
            .unwrap_or_default()
    }
}

impl Default for BlockHeader {
    fn default() -> Self {
        Self {
            miner: Address::new_id('f', 0),
            ticket: None,
            election_proof: None,
            beacon_entries: vec![],
            winning_post_proof: vec![],
            parents: TipsetKey::default(),
            parent_weight: BigInt::default(),
            height: 0,
            parent_state_root: Cid::default(),
            parent_message_receipts: Cid::default(),
            messages: Cid::default(),
            bls_aggregate: None,
            timestamp: 0,
            block_sig: None,
            fork_signaling: 0,
            parent_base_fee: TokenAmount::default(),
        }
    }
}
