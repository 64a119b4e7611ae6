// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use tracing::info;

use crate::rpc::{Ctx, RpcMethod, ServerError};

macro_rules! for_each_method {
    ($callback:path) => {
        $callback!(crate::rpc::methods::common::LilyShutdown);
        $callback!(crate::rpc::methods::common::LogList);
        $callback!(crate::rpc::methods::common::LogSetLevel);
        $callback!(crate::rpc::methods::common::LogSetLevelRegex);
    };
}
pub(crate) use for_each_method;

/// Stops every job and then the daemon.
pub enum LilyShutdown {}
impl RpcMethod<0> for LilyShutdown {
    const NAME: &'static str = "Filecoin.LilyShutdown";
    const PARAM_NAMES: [&'static str; 0] = [];

    type Params = ();
    type Ok = ();

    async fn handle(ctx: Ctx, (): Self::Params) -> Result<Self::Ok, ServerError> {
        info!("shutdown requested");
        ctx.shutdown.cancel();
        Ok(())
    }
}

/// Active log directives.
pub enum LogList {}
impl RpcMethod<0> for LogList {
    const NAME: &'static str = "Filecoin.LogList";
    const PARAM_NAMES: [&'static str; 0] = [];

    type Params = ();
    type Ok = Vec<String>;

    async fn handle(ctx: Ctx, (): Self::Params) -> Result<Self::Ok, ServerError> {
        Ok(ctx.log.list())
    }
}

pub enum LogSetLevel {}
impl RpcMethod<2> for LogSetLevel {
    const NAME: &'static str = "Filecoin.LogSetLevel";
    const PARAM_NAMES: [&'static str; 2] = ["target", "level"];

    type Params = (String, String);
    type Ok = ();

    async fn handle(ctx: Ctx, (target, level): Self::Params) -> Result<Self::Ok, ServerError> {
        ctx.log.set_level(&target, &level)?;
        info!(%target, %level, "log level changed");
        Ok(())
    }
}

/// Applies a level to every known target matching a regular expression and returns how many
/// targets changed.
pub enum LogSetLevelRegex {}
impl RpcMethod<2> for LogSetLevelRegex {
    const NAME: &'static str = "Filecoin.LogSetLevelRegex";
    const PARAM_NAMES: [&'static str; 2] = ["regex", "level"];

    type Params = (String, String);
    type Ok = usize;

    async fn handle(ctx: Ctx, (regex, level): Self::Params) -> Result<Self::Ok, ServerError> {
        Ok(ctx.log.set_level_regex(&regex, &level)?)
    }
}
