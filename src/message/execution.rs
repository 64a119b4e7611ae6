// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use serde::{Deserialize, Serialize};

use super::{Message, Receipt};
use crate::lotus_json::{base64_bytes, cid as cid_json, cid_opt, nullable_vec};
use crate::shim::{address::Address, econ::TokenAmount, error::ExitCode, state_tree::ActorState};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GasCost {
    #[serde(with = "cid_opt", default)]
    pub message: Option<Cid>,
    pub gas_used: TokenAmount,
    pub base_fee_burn: TokenAmount,
    pub over_estimation_burn: TokenAmount,
    pub miner_penalty: TokenAmount,
    pub miner_tip: TokenAmount,
    pub refund: TokenAmount,
    pub total_cost: TokenAmount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageTrace {
    pub from: Address,
    pub to: Address,
    pub value: TokenAmount,
    pub method: u64,
    #[serde(with = "base64_bytes", default)]
    pub params: Vec<u8>,
    #[serde(default)]
    pub params_codec: u64,
    #[serde(default)]
    pub gas_limit: u64,
    #[serde(default)]
    pub read_only: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReturnTrace {
    pub exit_code: ExitCode,
    #[serde(with = "base64_bytes", default)]
    pub r#return: Vec<u8>,
    #[serde(default)]
    pub return_codec: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InvokedActor {
    pub id: u64,
    pub state: ActorState,
}

/// A call and, recursively, every sub-call it made.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecutionTrace {
    pub msg: MessageTrace,
    pub msg_rct: ReturnTrace,
    #[serde(default)]
    pub invoked_actor: Option<InvokedActor>,
    #[serde(with = "nullable_vec", default)]
    pub subcalls: Vec<ExecutionTrace>,
}

impl ExecutionTrace {
    /// A trace of a single call without sub-calls.
    pub fn leaf(msg: &Message, exit_code: ExitCode) -> Self {
        Self {
            msg: MessageTrace {
                from: msg.from.clone(),
                to: msg.to.clone(),
                value: msg.value.clone(),
                method: msg.method,
                params: msg.params.clone(),
                params_codec: 0,
                gas_limit: msg.gas_limit,
                read_only: false,
            },
            msg_rct: ReturnTrace {
                exit_code,
                ..Default::default()
            },
            invoked_actor: None,
            subcalls: vec![],
        }
    }

    /// Sub-calls in depth-first order, each with its index within that order and the index of its
    /// parent. The root call has no index; its direct children name `None` as parent.
    pub fn subcalls_depth_first(&self) -> Vec<(usize, Option<usize>, &ExecutionTrace)> {
        let mut out = Vec::new();
        let mut stack: Vec<(Option<usize>, &ExecutionTrace)> =
            self.subcalls.iter().rev().map(|c| (None, c)).collect();
        while let Some((parent, call)) = stack.pop() {
            let index = out.len();
            out.push((index, parent, call));
            stack.extend(call.subcalls.iter().rev().map(|c| (Some(index), c)));
        }
        out
    }
}

/// Per-message entry of the node's `StateCompute` output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InvocResult {
    #[serde(with = "cid_json")]
    pub msg_cid: Cid,
    pub msg: Message,
    pub msg_rct: Option<Receipt>,
    #[serde(default)]
    pub gas_cost: GasCost,
    pub execution_trace: Option<ExecutionTrace>,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub duration: u64,
}

/// A message applied while producing a tipset from its parent, with everything that happened
/// during its execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutedMessage {
    pub cid: Cid,
    pub message: Message,
    pub receipt: Receipt,
    pub gas_cost: GasCost,
    pub trace: ExecutionTrace,
    /// Messages applied by the system itself (cron, rewards) rather than included in a block.
    pub implicit: bool,
    pub from_actor_code: Option<Cid>,
    pub to_actor_code: Option<Cid>,
    pub error: Option<String>,
}
