// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{TaskOutput, TipsetContext};
use crate::blocks::Tipset;
use crate::chain::HeightRange;
use crate::model::{ChainConsensusRow, TipsetBundle};

/// Rows for the null rounds strictly between `executed` and `current` that fall in `heights`.
///
/// Null rounds share the parent tipset and parent state of the next tipset that exists.
pub fn null_round_rows(
    current: &Tipset,
    executed: &Tipset,
    heights: HeightRange,
) -> Vec<ChainConsensusRow> {
    let from = (executed.epoch() + 1).max(heights.min);
    let to = (current.epoch() - 1).min(heights.max);
    (from..=to)
        .map(|height| ChainConsensusRow {
            height,
            parent_state_root: current.parent_state().to_string(),
            parent_tipset: current.parents().to_string(),
            tipset: None,
        })
        .collect()
}

/// One row for `current` and one per null round between `executed` and `current`.
pub fn chain_consensus(ctx: &TipsetContext) -> TaskOutput {
    let mut rows = null_round_rows(&ctx.current, &ctx.executed, HeightRange::FULL);
    rows.push(ChainConsensusRow {
        height: ctx.current.epoch(),
        parent_state_root: ctx.current.parent_state().to_string(),
        parent_tipset: ctx.current.parents().to_string(),
        tipset: Some(ctx.current.key().to_string()),
    });
    let mut bundle = TipsetBundle::default();
    bundle.push_rows(rows);
    TaskOutput::rows(bundle)
}
