// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::rpc::{Ctx, RpcMethod, ServerError};
use crate::schedule::{JobId, JobListResult};

macro_rules! for_each_method {
    ($callback:path) => {
        $callback!(crate::rpc::methods::job::LilyJobStart);
        $callback!(crate::rpc::methods::job::LilyJobStop);
        $callback!(crate::rpc::methods::job::LilyJobWait);
        $callback!(crate::rpc::methods::job::LilyJobList);
    };
}
pub(crate) use for_each_method;

/// Starts a stopped, failed or completed job again.
pub enum LilyJobStart {}
impl RpcMethod<1> for LilyJobStart {
    const NAME: &'static str = "Filecoin.LilyJobStart";
    const PARAM_NAMES: [&'static str; 1] = ["id"];

    type Params = (JobId,);
    type Ok = ();

    async fn handle(ctx: Ctx, (id,): Self::Params) -> Result<Self::Ok, ServerError> {
        Ok(ctx.scheduler.start(id)?)
    }
}

/// Cancels a job and returns once it has stopped.
pub enum LilyJobStop {}
impl RpcMethod<1> for LilyJobStop {
    const NAME: &'static str = "Filecoin.LilyJobStop";
    const PARAM_NAMES: [&'static str; 1] = ["id"];

    type Params = (JobId,);
    type Ok = JobListResult;

    async fn handle(ctx: Ctx, (id,): Self::Params) -> Result<Self::Ok, ServerError> {
        Ok(ctx.scheduler.stop(id).await?)
    }
}

/// Blocks until a job is no longer running.
pub enum LilyJobWait {}
impl RpcMethod<1> for LilyJobWait {
    const NAME: &'static str = "Filecoin.LilyJobWait";
    const PARAM_NAMES: [&'static str; 1] = ["id"];

    type Params = (JobId,);
    type Ok = JobListResult;

    async fn handle(ctx: Ctx, (id,): Self::Params) -> Result<Self::Ok, ServerError> {
        Ok(ctx.scheduler.wait(id).await?)
    }
}

pub enum LilyJobList {}
impl RpcMethod<0> for LilyJobList {
    const NAME: &'static str = "Filecoin.LilyJobList";
    const PARAM_NAMES: [&'static str; 0] = [];

    type Params = ();
    type Ok = Vec<JobListResult>;

    async fn handle(ctx: Ctx, (): Self::Params) -> Result<Self::Ok, ServerError> {
        Ok(ctx.scheduler.list())
    }
}
