// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::fmt;

use cid::Cid;
use itertools::Itertools as _;
use serde::{Deserialize, Deserializer, Serialize};

use super::{BlockHeader, Error};
use crate::lotus_json::cid_vec;
use crate::shim::{clock::ChainEpoch, econ::TokenAmount};

/// A set of CIDs forming a unique key for a tipset.
///
/// Equal keys have equivalent iteration order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TipsetKey(#[serde(with = "cid_vec")] Vec<Cid>);

impl TipsetKey {
    pub fn cids(&self) -> &[Cid] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Cid>> for TipsetKey {
    fn from(cids: Vec<Cid>) -> Self {
        Self(cids)
    }
}

impl fmt::Display for TipsetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.0.iter().join(","))
    }
}

impl std::str::FromStr for TipsetKey {
    type Err = cid::Error;

    /// Parses the [`Display`](fmt::Display) form. The braces are optional.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s
            .strip_prefix('{')
            .and_then(|it| it.strip_suffix('}'))
            .unwrap_or(s);
        s.split(',')
            .map(str::trim)
            .filter(|it| !it.is_empty())
            .map(Cid::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

/// An immutable set of blocks at the same height with the same parent set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tipset {
    cids: TipsetKey,
    blocks: Vec<BlockHeader>,
    height: ChainEpoch,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawTipset {
    cids: TipsetKey,
    #[serde(with = "crate::lotus_json::nullable_vec")]
    blocks: Vec<BlockHeader>,
}

impl<'de> Deserialize<'de> for Tipset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let RawTipset { cids, blocks } = RawTipset::deserialize(deserializer)?;
        Self::new(cids, blocks).map_err(serde::de::Error::custom)
    }
}

impl Tipset {
    /// Builds a tipset from headers and the identifiers the node reported for them.
    ///
    /// The headers must be non-empty, share a height, parents and parent state root, and the key
    /// must name one CID per header.
    pub fn new(key: TipsetKey, blocks: Vec<BlockHeader>) -> Result<Self, Error> {
        let first = blocks.first().ok_or(Error::NoBlocks)?;
        if key.len() != blocks.len() {
            return Err(Error::InvalidTipset(format!(
                "key has {} cids for {} blocks",
                key.len(),
                blocks.len()
            )));
        }
        for block in &blocks[1..] {
            if block.height != first.height {
                return Err(Error::InvalidTipset("heights are not equal".into()));
            }
            if block.parents != first.parents {
                return Err(Error::InvalidTipset("parent cids are not equal".into()));
            }
            if block.parent_state_root != first.parent_state_root {
                return Err(Error::InvalidTipset("state roots are not equal".into()));
            }
        }
        let height = first.height;
        Ok(Self {
            cids: key,
            blocks,
            height,
        })
    }

    /// Builds a tipset from locally assembled headers, keyed by [`BlockHeader::local_cid`].
    pub fn from_headers(blocks: Vec<BlockHeader>) -> Result<Self, Error> {
        let key = TipsetKey(blocks.iter().map(BlockHeader::local_cid).collect());
        Self::new(key, blocks)
    }

    pub fn key(&self) -> &TipsetKey {
        &self.cids
    }

    pub fn cids(&self) -> &[Cid] {
        self.cids.cids()
    }

    pub fn blocks(&self) -> &[BlockHeader] {
        &self.blocks
    }

    /// Pairs of block CID and header.
    pub fn block_entries(&self) -> impl Iterator<Item = (&Cid, &BlockHeader)> {
        self.cids.cids().iter().zip(self.blocks.iter())
    }

    pub fn epoch(&self) -> ChainEpoch {
        self.height
    }

    pub fn parents(&self) -> &TipsetKey {
        &self.min_block().parents
    }

    pub fn parent_state(&self) -> &Cid {
        &self.min_block().parent_state_root
    }

    pub fn parent_message_receipts(&self) -> &Cid {
        &self.min_block().parent_message_receipts
    }

    pub fn parent_base_fee(&self) -> &TokenAmount {
        &self.min_block().parent_base_fee
    }

    pub fn min_timestamp(&self) -> u64 {
        self.blocks
            .iter()
            .map(|block| block.timestamp)
            .min()
            .unwrap_or_default()
    }

    /// Returns `true` if `other` is this tipset's parent.
    pub fn is_child_of(&self, other: &Tipset) -> bool {
        self.parents() == other.key()
    }

    fn min_block(&self) -> &BlockHeader {
        // Non-empty on construction.
        &self.blocks[0]
    }
}

impl fmt::Display for Tipset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.cids, self.height)
    }
}
