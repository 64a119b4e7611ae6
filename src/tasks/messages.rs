// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use ahash::HashMap;
use cid::Cid;
use num_traits::ToPrimitive as _;

use super::{TaskError, TaskOutput, TipsetContext};
use crate::actors::{ActorCode, method_name};
use crate::message::{ExecutedMessage, compute_gas_outputs};
use crate::model::{
    BlockMessageRow, DerivedGasOutputsRow, MessageGasEconomyRow, MessageRow, ParsedMessageRow,
    ReceiptRow, TipsetBundle,
};
use crate::shim::econ::TokenAmount;

/// Maximum gas a single block may consume.
pub const BLOCK_GAS_LIMIT: u64 = 10_000_000_000;
/// Gas per block the base fee adjusts towards.
pub const BLOCK_GAS_TARGET: u64 = BLOCK_GAS_LIMIT / 2;
/// Largest base fee change between two epochs is one eighth.
const BASE_FEE_MAX_CHANGE: f64 = 1.125;

pub async fn messages(ctx: &TipsetContext) -> Result<TaskOutput, TaskError> {
    let height = ctx.executed.epoch();
    let included = ctx.included_messages().await?;
    let rows = included.unique.iter().map(|(cid, msg)| MessageRow {
        height,
        cid: cid.to_string(),
        from: msg.from.to_string(),
        to: msg.to.to_string(),
        value: msg.value.clone(),
        gas_fee_cap: msg.gas_fee_cap.clone(),
        gas_premium: msg.gas_premium.clone(),
        gas_limit: msg.gas_limit as i64,
        size_bytes: msg.size_bytes() as i64,
        nonce: msg.nonce as i64,
        method: msg.method as i64,
    });
    let mut bundle = TipsetBundle::default();
    bundle.push_rows(rows);
    Ok(TaskOutput::rows(bundle))
}

pub async fn block_messages(ctx: &TipsetContext) -> Result<TaskOutput, TaskError> {
    let height = ctx.executed.epoch();
    let included = ctx.included_messages().await?;
    let rows = included.by_block.iter().flat_map(|(block, msgs)| {
        msgs.iter().map(move |msg| BlockMessageRow {
            height,
            block: block.to_string(),
            message: msg.to_string(),
        })
    });
    let mut bundle = TipsetBundle::default();
    bundle.push_rows(rows);
    Ok(TaskOutput::rows(bundle))
}

pub async fn receipts(ctx: &TipsetContext) -> Result<TaskOutput, TaskError> {
    let height = ctx.executed.epoch();
    let state_root = ctx.state_root();
    let rows = ctx
        .executed_receipts()
        .await?
        .iter()
        .map(|r| ReceiptRow {
            height,
            message: r.cid.to_string(),
            state_root: state_root.clone(),
            idx: r.index as i64,
            exit_code: r.receipt.exit_code.value(),
            gas_used: r.receipt.gas_used as i64,
            events_root: r.receipt.events_root.map(|c| c.to_string()),
        });
    let mut bundle = TipsetBundle::default();
    bundle.push_rows(rows);
    Ok(TaskOutput::rows(bundle))
}

/// Family of the receiving actor of each explicit message, by message identifier.
async fn receiver_codes(
    ctx: &TipsetContext,
) -> Result<HashMap<Cid, Option<ActorCode>>, TaskError> {
    let mut out = HashMap::default();
    for exec in ctx.executions().await?.iter().filter(|e| !e.implicit) {
        let code = match &exec.to_actor_code {
            Some(code) => ctx.actor_code(code).await?,
            None => None,
        };
        out.insert(exec.cid, code);
    }
    Ok(out)
}

fn method_label(code: Option<&ActorCode>, method: u64) -> String {
    code.and_then(|c| method_name(c.family, method))
        .map(str::to_owned)
        .unwrap_or_else(|| format!("Unknown({method})"))
}

pub async fn parsed_messages(ctx: &TipsetContext) -> Result<TaskOutput, TaskError> {
    let height = ctx.executed.epoch();
    let included = ctx.included_messages().await?;
    let codes = receiver_codes(ctx).await?;
    let mut rows = Vec::with_capacity(included.unique.len());
    for (cid, msg) in &included.unique {
        let params = if msg.params.is_empty() {
            None
        } else {
            match ctx
                .source()
                .decode_params(&msg.to, msg.method, &msg.params, ctx.executed.key())
                .await
            {
                Ok(value) => Some(value),
                Err(e) if !e.is_retryable() => {
                    tracing::debug!(%cid, error = %e, "leaving message params undecoded");
                    None
                }
                Err(e) => return Err(e.into()),
            }
        };
        rows.push(ParsedMessageRow {
            height,
            cid: cid.to_string(),
            from: msg.from.to_string(),
            to: msg.to.to_string(),
            value: msg.value.clone(),
            method: method_label(codes.get(cid).and_then(Option::as_ref), msg.method),
            params,
        });
    }
    let mut bundle = TipsetBundle::default();
    bundle.push_rows(rows);
    Ok(TaskOutput::rows(bundle))
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    numerator as f64 / denominator as f64
}

pub async fn gas_economy(ctx: &TipsetContext) -> Result<TaskOutput, TaskError> {
    let included = ctx.included_messages().await?;
    let unique_limit: u64 = included.unique.iter().map(|(_, m)| m.gas_limit).sum();
    let blocks = ctx.executed.blocks().len() as u64;

    let base_fee = ctx.current.parent_base_fee();
    let previous = ctx.executed.parent_base_fee();
    let base_fee_change_log = match (base_fee.atto().to_f64(), previous.atto().to_f64()) {
        (Some(new), Some(old)) if new > 0.0 && old > 0.0 => {
            (new / old).ln() / BASE_FEE_MAX_CHANGE.ln()
        }
        _ => 0.0,
    };

    let row = MessageGasEconomyRow {
        height: ctx.executed.epoch(),
        state_root: ctx.state_root(),
        gas_limit_total: TokenAmount::from_atto(included.total_gas_limit),
        gas_limit_unique_total: TokenAmount::from_atto(unique_limit),
        base_fee: base_fee.clone(),
        base_fee_change_log,
        gas_fill_ratio: ratio(unique_limit, BLOCK_GAS_TARGET * blocks),
        gas_capacity_ratio: ratio(unique_limit, BLOCK_GAS_LIMIT * blocks),
        gas_waste_ratio: ratio(
            included.total_gas_limit.saturating_sub(unique_limit),
            BLOCK_GAS_LIMIT * blocks,
        ),
    };
    let mut bundle = TipsetBundle::default();
    bundle.push_rows([row]);
    Ok(TaskOutput::rows(bundle))
}

fn derived_row(
    ctx: &TipsetContext,
    exec: &ExecutedMessage,
    code: Option<&ActorCode>,
) -> DerivedGasOutputsRow {
    let msg = &exec.message;
    let base_fee = ctx.executed.parent_base_fee();
    let outputs = compute_gas_outputs(
        exec.receipt.gas_used as i64,
        msg.gas_limit as i64,
        base_fee,
        &msg.gas_fee_cap,
        &msg.gas_premium,
        true,
    );
    DerivedGasOutputsRow {
        height: ctx.executed.epoch(),
        cid: exec.cid.to_string(),
        state_root: ctx.state_root(),
        from: msg.from.to_string(),
        to: msg.to.to_string(),
        value: msg.value.clone(),
        gas_fee_cap: msg.gas_fee_cap.clone(),
        gas_premium: msg.gas_premium.clone(),
        gas_limit: msg.gas_limit as i64,
        size_bytes: msg.size_bytes() as i64,
        nonce: msg.nonce as i64,
        method: msg.method as i64,
        actor_name: code.map(ActorCode::path).unwrap_or_default(),
        actor_family: code.map(|c| c.family.to_string()).unwrap_or_default(),
        exit_code: exec.receipt.exit_code.value(),
        gas_used: exec.receipt.gas_used as i64,
        parent_base_fee: base_fee.clone(),
        base_fee_burn: outputs.base_fee_burn,
        over_estimation_burn: outputs.over_estimation_burn,
        miner_penalty: outputs.miner_penalty,
        miner_tip: outputs.miner_tip,
        refund: outputs.refund,
        gas_refund: outputs.gas_refund,
        gas_burned: outputs.gas_burned,
    }
}

pub async fn derived_gas_outputs(ctx: &TipsetContext) -> Result<TaskOutput, TaskError> {
    let codes = receiver_codes(ctx).await?;
    let rows: Vec<_> = ctx
        .executions()
        .await?
        .iter()
        .filter(|e| !e.implicit)
        .map(|exec| derived_row(ctx, exec, codes.get(&exec.cid).and_then(Option::as_ref)))
        .collect();
    let mut bundle = TipsetBundle::default();
    bundle.push_rows(rows);
    Ok(TaskOutput::rows(bundle))
}
