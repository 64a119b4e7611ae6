// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{TaskError, TaskOutput, TipsetContext};
use crate::model::{BlockHeaderRow, BlockParentRow, DrandBlockEntryRow, TipsetBundle};

pub fn block_headers(ctx: &TipsetContext) -> Result<TaskOutput, TaskError> {
    let height = ctx.current.epoch();
    let rows = ctx.current.block_entries().map(|(cid, header)| BlockHeaderRow {
        height,
        cid: cid.to_string(),
        miner: header.miner.to_string(),
        parent_weight: header.parent_weight.clone(),
        parent_state_root: header.parent_state_root.to_string(),
        parent_base_fee: header.parent_base_fee.clone(),
        timestamp: header.timestamp as i64,
        win_count: header.election_proof.as_ref().map(|p| p.win_count),
        fork_signaling: header.fork_signaling as i64,
    });
    let mut bundle = TipsetBundle::default();
    bundle.push_rows(rows);
    Ok(TaskOutput::rows(bundle))
}

pub fn block_parents(ctx: &TipsetContext) -> Result<TaskOutput, TaskError> {
    let height = ctx.current.epoch();
    let mut rows = vec![];
    for (cid, header) in ctx.current.block_entries() {
        for parent in header.parents.cids() {
            rows.push(BlockParentRow {
                height,
                block: cid.to_string(),
                parent: parent.to_string(),
            });
        }
    }
    let mut bundle = TipsetBundle::default();
    bundle.push_rows(rows);
    Ok(TaskOutput::rows(bundle))
}

pub fn drand_block_entries(ctx: &TipsetContext) -> Result<TaskOutput, TaskError> {
    let mut rows = vec![];
    for (cid, header) in ctx.current.block_entries() {
        for entry in &header.beacon_entries {
            rows.push(DrandBlockEntryRow {
                round: entry.round as i64,
                block: cid.to_string(),
            });
        }
    }
    let mut bundle = TipsetBundle::default();
    bundle.push_rows(rows);
    Ok(TaskOutput::rows(bundle))
}
