// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Chain reads answered from the node the daemon indexes.

use cid::Cid;
use serde::{Deserialize, Serialize};

use crate::blocks::{BlockHeader, Tipset, TipsetKey};
use crate::rpc::{Ctx, RpcMethod, ServerError};
use crate::shim::clock::ChainEpoch;

macro_rules! for_each_method {
    ($callback:path) => {
        $callback!(crate::rpc::methods::chain::ChainHead);
        $callback!(crate::rpc::methods::chain::ChainGetTipSet);
        $callback!(crate::rpc::methods::chain::ChainGetTipSetByHeight);
        $callback!(crate::rpc::methods::chain::ChainGetBlock);
        $callback!(crate::rpc::methods::chain::ChainSetHead);
    };
}
pub(crate) use for_each_method;

/// A CID in the node's `{"/": ...}` encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CidJson(#[serde(with = "crate::lotus_json::cid")] pub Cid);

pub enum ChainHead {}
impl RpcMethod<0> for ChainHead {
    const NAME: &'static str = "Filecoin.ChainHead";
    const PARAM_NAMES: [&'static str; 0] = [];

    type Params = ();
    type Ok = Tipset;

    async fn handle(ctx: Ctx, (): Self::Params) -> Result<Self::Ok, ServerError> {
        Ok(ctx.source.chain_head().await?)
    }
}

pub enum ChainGetTipSet {}
impl RpcMethod<1> for ChainGetTipSet {
    const NAME: &'static str = "Filecoin.ChainGetTipSet";
    const PARAM_NAMES: [&'static str; 1] = ["tipsetKey"];

    type Params = (TipsetKey,);
    type Ok = Tipset;

    async fn handle(ctx: Ctx, (key,): Self::Params) -> Result<Self::Ok, ServerError> {
        if key.is_empty() {
            return Ok(ctx.source.chain_head().await?);
        }
        Ok(ctx.source.tipset(&key).await?)
    }
}

/// The tipset at a height, or the nearest one below it when the height is a null round.
pub enum ChainGetTipSetByHeight {}
impl RpcMethod<2> for ChainGetTipSetByHeight {
    const NAME: &'static str = "Filecoin.ChainGetTipSetByHeight";
    const PARAM_NAMES: [&'static str; 2] = ["height", "tipsetKey"];

    type Params = (ChainEpoch, TipsetKey);
    type Ok = Tipset;

    async fn handle(ctx: Ctx, (height, key): Self::Params) -> Result<Self::Ok, ServerError> {
        let key = if key.is_empty() {
            ctx.source.chain_head().await?.key().clone()
        } else {
            key
        };
        Ok(ctx.source.tipset_by_height(height, &key).await?)
    }
}

pub enum ChainGetBlock {}
impl RpcMethod<1> for ChainGetBlock {
    const NAME: &'static str = "Filecoin.ChainGetBlock";
    const PARAM_NAMES: [&'static str; 1] = ["blockCid"];

    type Params = (CidJson,);
    type Ok = BlockHeader;

    async fn handle(ctx: Ctx, (cid,): Self::Params) -> Result<Self::Ok, ServerError> {
        Ok(ctx.node_client()?.call(Self::NAME, (cid,)).await?)
    }
}

/// Forcibly sets the node's head. The node validates the request.
pub enum ChainSetHead {}
impl RpcMethod<1> for ChainSetHead {
    const NAME: &'static str = "Filecoin.ChainSetHead";
    const PARAM_NAMES: [&'static str; 1] = ["tipsetKey"];

    type Params = (TipsetKey,);
    type Ok = ();

    async fn handle(ctx: Ctx, (key,): Self::Params) -> Result<Self::Ok, ServerError> {
        ctx.node_client()?
            .call::<_, Option<serde_json::Value>>(Self::NAME, (key,))
            .await?;
        Ok(())
    }
}
