// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::datasource::PeerInfo;
use crate::rpc::{Ctx, RpcMethod, ServerError};

macro_rules! for_each_method {
    ($callback:path) => {
        $callback!(crate::rpc::methods::net::NetId);
        $callback!(crate::rpc::methods::net::NetPeers);
        $callback!(crate::rpc::methods::net::NetAgentVersion);
        $callback!(crate::rpc::methods::net::SyncState);
    };
}
pub(crate) use for_each_method;

pub enum NetId {}
impl RpcMethod<0> for NetId {
    const NAME: &'static str = "Filecoin.ID";
    const PARAM_NAMES: [&'static str; 0] = [];

    type Params = ();
    type Ok = String;

    async fn handle(ctx: Ctx, (): Self::Params) -> Result<Self::Ok, ServerError> {
        Ok(ctx.node.net_id().await?)
    }
}

pub enum NetPeers {}
impl RpcMethod<0> for NetPeers {
    const NAME: &'static str = "Filecoin.NetPeers";
    const PARAM_NAMES: [&'static str; 0] = [];

    type Params = ();
    type Ok = Vec<PeerInfo>;

    async fn handle(ctx: Ctx, (): Self::Params) -> Result<Self::Ok, ServerError> {
        Ok(ctx.node.net_peers().await?)
    }
}

pub enum NetAgentVersion {}
impl RpcMethod<1> for NetAgentVersion {
    const NAME: &'static str = "Filecoin.NetAgentVersion";
    const PARAM_NAMES: [&'static str; 1] = ["peerId"];

    type Params = (String,);
    type Ok = String;

    async fn handle(ctx: Ctx, (peer,): Self::Params) -> Result<Self::Ok, ServerError> {
        Ok(ctx.node.net_agent_version(&peer).await?)
    }
}

/// Sync progress as the node reports it.
pub enum SyncState {}
impl RpcMethod<0> for SyncState {
    const NAME: &'static str = "Filecoin.SyncState";
    const PARAM_NAMES: [&'static str; 0] = [];

    type Params = ();
    type Ok = serde_json::Value;

    async fn handle(ctx: Ctx, (): Self::Params) -> Result<Self::Ok, ServerError> {
        Ok(ctx.node.sync_state().await?)
    }
}
