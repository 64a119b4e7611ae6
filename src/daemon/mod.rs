// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The long-running indexer: a job scheduler behind a JSON-RPC endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use crate::cli_shared::cli::{CliOpts, Config, ConfigPath};
use crate::cli_shared::logger::{self, LogHandle};
use crate::datasource::NodeDataSource;
use crate::networks::ChainConfig;
use crate::queue::QueueCatalog;
use crate::rpc::{Client, RpcState, start_rpc};
use crate::schedule::Scheduler;
use crate::storage::Catalog;

/// Flags of `lily daemon`, each overriding its configuration counterpart.
#[derive(Debug, Default, Clone, clap::Args)]
pub struct DaemonOpts {
    /// Address the JSON-RPC endpoint listens on
    #[arg(long, env = "LILY_DAEMON_API")]
    pub listen: Option<SocketAddr>,
    /// JSON-RPC endpoint of the Filecoin node to index
    #[arg(long, env = "LILY_NODE_API")]
    pub node_api: Option<Url>,
    /// Token for the node's JSON-RPC endpoint
    #[arg(long, env = "LILY_NODE_TOKEN")]
    pub node_token: Option<String>,
}

impl DaemonOpts {
    fn apply(&self, config: &mut Config) {
        if let Some(listen) = self.listen {
            config.api.address = listen;
        }
        if let Some(api) = &self.node_api {
            config.node.api = api.to_string();
        }
        if let Some(token) = &self.node_token {
            config.node.token = Some(token.clone());
        }
    }
}

/// The name reports are written under.
fn reporter_name() -> String {
    gethostname::gethostname().to_string_lossy().into_owned()
}

pub async fn start(
    opts: &CliOpts,
    daemon_opts: &DaemonOpts,
    config_path: Option<ConfigPath>,
    mut config: Config,
) -> anyhow::Result<()> {
    daemon_opts.apply(&mut config);
    let log = logger::setup_logger(opts.color, opts.log_dir.as_deref(), &config.log);
    match &config_path {
        Some(ConfigPath::Cli(path)) => info!("config loaded: {}", path.display()),
        Some(ConfigPath::Repo(path)) => info!("repository config loaded: {}", path.display()),
        None => info!("using the default {} config", config.node.network),
    }

    let shutdown = CancellationToken::new();
    let (scheduler, server) = start_services(&config, log, shutdown.clone()).await?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for ctrl-c")?;
            info!("received ctrl-c, shutting down");
        }
        _ = shutdown.cancelled() => info!("shutdown requested"),
    }
    scheduler.shutdown().await;
    server.stop().await;
    info!("lily stopped");
    Ok(())
}

async fn start_services(
    config: &Config,
    log: LogHandle,
    shutdown: CancellationToken,
) -> anyhow::Result<(Scheduler, crate::rpc::RpcServer)> {
    let node_url = Url::parse(&config.node.api)
        .with_context(|| format!("invalid node endpoint {}", config.node.api))?;
    let client = Client::from_url(&node_url, config.node.token.as_deref(), config.node.timeout)
        .context("failed to create the node client")?;
    info!(node = %node_url, network = %config.node.network, "connecting to node");

    let source = Arc::new(NodeDataSource::new(
        client.clone(),
        ChainConfig::from_chain(&config.node.network),
        config.node.retries,
    ));
    let storages = Catalog::new(config.storage.clone());
    if storages.names().is_empty() {
        warn!("no storage configured, only the empty storage name is usable");
    }
    let scheduler = Scheduler::new();
    let state = RpcState {
        scheduler: scheduler.clone(),
        storages: Arc::new(storages),
        queues: Arc::new(QueueCatalog::new(config.queue.clone())),
        source: source.clone(),
        node: source,
        node_client: Some(client),
        reporter: reporter_name(),
        log,
        shutdown,
    };
    let server = start_rpc(state, config.api.address)
        .await
        .with_context(|| format!("failed to listen on {}", config.api.address))?;
    Ok((scheduler, server))
}
