// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;

use super::{TaskError, TaskOutput, TipsetContext};
use crate::actors::{BuiltinActor, EVM_INVOKE_CONTRACT, method_name};
use crate::message::{ExecutedMessage, ExecutionTrace, Message};
use crate::model::{ActorEventRow, FevmTraceRow, TipsetBundle, VmMessageRow};
use crate::shim::address::Address;

fn hex_or_none(bytes: &[u8]) -> Option<String> {
    (!bytes.is_empty()).then(|| hex::encode(bytes))
}

/// Identifier of an internal call, derived from its message fields since internal calls are never
/// put on chain.
fn call_cid(call: &ExecutionTrace) -> Cid {
    Message {
        from: call.msg.from.clone(),
        to: call.msg.to.clone(),
        value: call.msg.value.clone(),
        method: call.msg.method,
        params: call.msg.params.clone(),
        gas_limit: call.msg.gas_limit,
        ..Default::default()
    }
    .cid()
}

fn invoked_code(call: &ExecutionTrace) -> Option<Cid> {
    call.invoked_actor.as_ref().map(|a| a.state.code)
}

pub async fn vm_messages(ctx: &TipsetContext) -> Result<TaskOutput, TaskError> {
    let height = ctx.executed.epoch();
    let state_root = ctx.state_root();
    let mut rows = vec![];
    for exec in ctx.executions().await? {
        for (index, parent_index, call) in exec.trace.subcalls_depth_first() {
            rows.push(VmMessageRow {
                height,
                state_root: state_root.clone(),
                cid: call_cid(call).to_string(),
                source: exec.cid.to_string(),
                index: index as i64,
                parent_index: parent_index.map(|p| p as i64),
                from: call.msg.from.to_string(),
                to: call.msg.to.to_string(),
                value: call.msg.value.clone(),
                method: call.msg.method as i64,
                actor_code: invoked_code(call).map(|c| c.to_string()),
                exit_code: call.msg_rct.exit_code.value(),
                gas_limit: call.msg.gas_limit as i64,
                params: hex_or_none(&call.msg.params),
                returns: hex_or_none(&call.msg_rct.r#return),
            });
        }
    }
    let mut bundle = TipsetBundle::default();
    bundle.push_rows(rows);
    Ok(TaskOutput::rows(bundle))
}

pub async fn actor_events(ctx: &TipsetContext) -> Result<TaskOutput, TaskError> {
    let height = ctx.executed.epoch();
    let state_root = ctx.state_root();
    let mut rows = vec![];
    for exec in ctx.executions().await? {
        let Some(root) = exec.receipt.events_root else {
            continue;
        };
        let events = ctx.source().events(&root).await?;
        for (event_index, event) in events.iter().enumerate() {
            for (entry_index, entry) in event.entries.iter().enumerate() {
                rows.push(ActorEventRow {
                    height,
                    state_root: state_root.clone(),
                    message_cid: exec.cid.to_string(),
                    event_index: event_index as i64,
                    entry_index: entry_index as i64,
                    emitter: Address::new_id('f', event.emitter).to_string(),
                    flags: entry.flags as i64,
                    codec: entry.codec as i64,
                    key: entry.key.clone(),
                    value: hex::encode(&entry.value),
                });
            }
        }
    }
    let mut bundle = TipsetBundle::default();
    bundle.push_rows(rows);
    Ok(TaskOutput::rows(bundle))
}

fn is_evm_family(family: BuiltinActor) -> bool {
    matches!(
        family,
        BuiltinActor::Evm | BuiltinActor::Eam | BuiltinActor::EthAccount | BuiltinActor::Placeholder
    )
}

async fn touches_evm(ctx: &TipsetContext, exec: &ExecutedMessage) -> Result<bool, TaskError> {
    if exec.message.method == EVM_INVOKE_CONTRACT {
        return Ok(true);
    }
    for code in [&exec.to_actor_code, &exec.from_actor_code].into_iter().flatten() {
        if let Some(resolved) = ctx.actor_code(code).await?
            && is_evm_family(resolved.family)
        {
            return Ok(true);
        }
    }
    Ok(false)
}

async fn parsed_method(
    ctx: &TipsetContext,
    code: Option<Cid>,
    method: u64,
) -> Result<Option<String>, TaskError> {
    let Some(code) = code else {
        return Ok(None);
    };
    Ok(ctx
        .actor_code(&code)
        .await?
        .and_then(|c| method_name(c.family, method))
        .map(str::to_owned))
}

/// Traces of messages that involve EVM actors, the top level call at index 0 followed by its
/// sub-calls depth first.
pub async fn fevm_traces(ctx: &TipsetContext) -> Result<TaskOutput, TaskError> {
    let height = ctx.executed.epoch();
    let state_root = ctx.state_root();
    let mut rows = vec![];
    for exec in ctx.executions().await? {
        if exec.implicit || !touches_evm(ctx, exec).await? {
            continue;
        }
        let subcalls = exec.trace.subcalls_depth_first();
        let mut calls = vec![(
            0,
            &exec.trace,
            exec.from_actor_code,
            exec.to_actor_code.or(invoked_code(&exec.trace)),
        )];
        for (index, parent, call) in &subcalls {
            let caller = match parent {
                Some(p) => subcalls.get(*p).and_then(|(_, _, c)| invoked_code(c)),
                None => exec.to_actor_code,
            };
            calls.push((index + 1, *call, caller, invoked_code(call)));
        }
        for (index, call, from_code, to_code) in calls {
            rows.push(FevmTraceRow {
                height,
                state_root: state_root.clone(),
                message_cid: exec.cid.to_string(),
                index: index as i64,
                from: call.msg.from.to_string(),
                to: call.msg.to.to_string(),
                value: call.msg.value.clone(),
                method: call.msg.method as i64,
                parsed_method: parsed_method(ctx, to_code, call.msg.method).await?,
                from_actor_code: from_code.map(|c| c.to_string()),
                to_actor_code: to_code.map(|c| c.to_string()),
                exit_code: call.msg_rct.exit_code.value(),
                params: hex_or_none(&call.msg.params),
                returns: hex_or_none(&call.msg_rct.r#return),
            });
        }
    }
    let mut bundle = TipsetBundle::default();
    bundle.push_rows(rows);
    Ok(TaskOutput::rows(bundle))
}
