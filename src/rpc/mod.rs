// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The daemon's JSON-RPC interface.
//!
//! Methods are typed [`RpcMethod`] definitions grouped under [`methods`]. The daemon serves them
//! over HTTP, and the command line calls them through [`Client`].

mod client;
mod error;
pub mod methods;
mod reflect;


use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::RpcModule;
use jsonrpsee::server::{Server, ServerConfig, ServerHandle};
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use self::client::{Client, DEFAULT_REQUEST_TIMEOUT};
pub use self::error::ServerError;
pub use self::reflect::{RpcMethod, RpcMethodExt};
use crate::cli_shared::logger::LogHandle;
use crate::datasource::{DataSource, NodeInfo};
use crate::queue::QueueCatalog;
use crate::schedule::Scheduler;
use crate::storage::Catalog;

/// Job submissions carry whole configurations; keep well above the default.
const MAX_REQUEST_BODY_SIZE: u32 = 16 * 1024 * 1024;
/// Tipsets with many blocks and state dumps need more than the default 10 MiB.
const MAX_RESPONSE_BODY_SIZE: u32 = 128 * 1024 * 1024;

pub type Ctx = Arc<RpcState>;

/// Everything a method handler can reach.
pub struct RpcState {
    pub scheduler: Scheduler,
    pub storages: Arc<Catalog>,
    pub queues: Arc<QueueCatalog>,
    pub source: Arc<dyn DataSource>,
    pub node: Arc<dyn NodeInfo>,
    /// Raw connection to the node, for methods the data source does not model.
    pub node_client: Option<Client>,
    /// Identifies this daemon in the reports it writes.
    pub reporter: String,
    pub log: LogHandle,
    /// Cancelled to stop the daemon.
    pub shutdown: CancellationToken,
}

impl RpcState {
    pub fn node_client(&self) -> Result<&Client, ServerError> {
        self.node_client
            .as_ref()
            .ok_or_else(ServerError::unsupported_method)
    }
}

pub fn create_module(state: RpcState) -> anyhow::Result<RpcModule<RpcState>> {
    let mut module = RpcModule::new(state);
    macro_rules! register {
        ($ty:ty) => {
            <$ty>::register(&mut module)?;
        };
    }
    methods::chain::for_each_method!(register);
    methods::common::for_each_method!(register);
    methods::job::for_each_method!(register);
    methods::lily::for_each_method!(register);
    methods::net::for_each_method!(register);
    Ok(module)
}

/// A running server.
pub struct RpcServer {
    local_addr: SocketAddr,
    handle: ServerHandle,
}

impl RpcServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn stop(self) {
        // Stopping twice is harmless.
        let _ = self.handle.stop();
        self.handle.stopped().await;
    }
}

pub async fn start_rpc(state: RpcState, rpc_endpoint: SocketAddr) -> anyhow::Result<RpcServer> {
    let module = create_module(state)?;
    let server = Server::builder()
        .set_config(
            ServerConfig::builder()
                .max_request_body_size(MAX_REQUEST_BODY_SIZE)
                .max_response_body_size(MAX_RESPONSE_BODY_SIZE)
                .build(),
        )
        .build(rpc_endpoint)
        .await?;
    let local_addr = server.local_addr()?;
    info!("JSON-RPC endpoint started at {local_addr}");
    Ok(RpcServer {
        local_addr,
        handle: server.start(module),
    })
}
