// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{TaskError, TaskOutput, TipsetContext};
use crate::model::{ActorRow, ActorStateRow, TipsetBundle};

pub async fn actors(ctx: &TipsetContext) -> Result<TaskOutput, TaskError> {
    let height = ctx.current.epoch();
    let state_root = ctx.state_root();
    let rows = ctx
        .changed_actors()
        .await?
        .iter()
        .map(|(address, actor)| ActorRow {
            height,
            id: address.to_string(),
            code: actor.code.to_string(),
            head: actor.head.to_string(),
            nonce: actor.nonce as i64,
            balance: actor.balance.clone(),
            state_root: state_root.clone(),
        });
    let mut bundle = TipsetBundle::default();
    bundle.push_rows(rows);
    Ok(TaskOutput::rows(bundle))
}

pub async fn actor_states(ctx: &TipsetContext) -> Result<TaskOutput, TaskError> {
    let height = ctx.current.epoch();
    let changed = ctx.changed_actors().await?;
    let mut rows = Vec::with_capacity(changed.len());
    let mut missing = 0;
    for (address, actor) in changed {
        match ctx.source().actor_state(address, &ctx.current).await {
            Ok(view) => rows.push(ActorStateRow {
                height,
                head: actor.head.to_string(),
                code: actor.code.to_string(),
                state: view.state,
            }),
            // Deleted by the state transition.
            Err(e) if e.is_not_found() => missing += 1,
            Err(e) => return Err(e.into()),
        }
    }
    let mut bundle = TipsetBundle::default();
    bundle.push_rows(rows);
    Ok(TaskOutput {
        bundle,
        info: (missing > 0).then(|| format!("{missing} changed actors no longer exist")),
    })
}
