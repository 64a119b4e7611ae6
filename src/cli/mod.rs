// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The `lily` command line: the daemon, local maintenance commands, and clients of a running
//! daemon's JSON-RPC endpoint.

mod subcommands;

use std::ffi::OsString;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser;
use jsonrpsee::core::ClientError;
use url::Url;

use self::subcommands::*;
use crate::cli_shared::cli::{CliOpts, Config};
use crate::cli_shared::{logger, read_config};
use crate::daemon::{self, DaemonOpts};
use crate::rpc::{self, ServerError};

/// Exit status of a command the caller got wrong: bad flags, bad config, unknown ids.
const USER_ERROR: u8 = 1;
/// Exit status of everything else.
const INTERNAL_ERROR: u8 = 2;

/// A mistake on the caller's side, reported with exit status 1.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct UsageError(pub String);

/// Filecoin chain indexer
#[derive(Parser)]
#[command(name = "lily", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub opts: CliOpts,
    /// JSON-RPC endpoint of the lily daemon. Defaults to the `[api]` address of the configuration
    #[arg(long, global = true, env = "LILY_API")]
    pub api: Option<Url>,
    /// Token for the daemon's JSON-RPC endpoint
    #[arg(long, global = true, env = "LILY_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,
    #[command(subcommand)]
    pub cmd: Subcommand,
}

#[derive(clap::Subcommand)]
pub enum Subcommand {
    /// Start the indexer daemon
    Daemon(DaemonOpts),
    /// Create a repository with a default configuration
    Init(InitCommand),
    /// Inspect the configuration
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Show or change the schema version of a Postgres storage
    Migrate(MigrateCommand),
    /// Submit and manage indexing jobs
    #[command(subcommand)]
    Job(JobCommands),
    /// Index a single tipset and wait for the result
    #[command(subcommand)]
    Index(IndexCommands),
    /// Find and fill unindexed heights
    #[command(subcommand)]
    Gap(GapCommands),
    /// Inspect the node's sync progress
    #[command(subcommand)]
    Sync(SyncCommands),
    /// Interact with the node's chain
    #[command(subcommand)]
    Chain(ChainCommands),
    /// Inspect the node's peer-to-peer network
    #[command(subcommand)]
    Net(NetCommands),
    /// Inspect and change daemon log levels
    #[command(subcommand)]
    Log(LogCommands),
    /// Stop the daemon
    Shutdown(ShutdownCommand),
}

pub async fn lily_main<A>(args: impl IntoIterator<Item = A>) -> ExitCode
where
    A: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // Help and version requests are not errors.
            return if e.exit_code() == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(USER_ERROR)
            };
        }
    };
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_status(&e))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        opts,
        api,
        api_token,
        cmd,
    } = cli;
    let repo = opts.repo_dir();
    let (config_path, config) = read_config(opts.config.as_ref(), &repo)
        .map_err(|e| UsageError(format!("{e:#}")))?;

    if !matches!(cmd, Subcommand::Daemon(_)) {
        logger::setup_minimal_logger();
    }
    let client = || daemon_client(api.as_ref(), api_token.as_deref(), &config);
    match cmd {
        Subcommand::Daemon(daemon_opts) => {
            daemon::start(&opts, &daemon_opts, config_path, config.clone()).await
        }
        Subcommand::Init(cmd) => cmd.run(&repo),
        Subcommand::Config(cmd) => cmd.run(&config, &mut std::io::stdout()),
        Subcommand::Migrate(cmd) => cmd.run(&config).await,
        Subcommand::Job(cmd) => cmd.run(client()?).await,
        Subcommand::Index(cmd) => cmd.run(client()?).await,
        Subcommand::Gap(cmd) => cmd.run(client()?).await,
        Subcommand::Sync(cmd) => cmd.run(client()?).await,
        Subcommand::Chain(cmd) => cmd.run(client()?).await,
        Subcommand::Net(cmd) => cmd.run(client()?).await,
        Subcommand::Log(cmd) => cmd.run(client()?).await,
        Subcommand::Shutdown(cmd) => cmd.run(client()?).await,
    }
}

/// Connects to `api`, or to the `[api]` address of the configuration.
fn daemon_client(
    api: Option<&Url>,
    token: Option<&str>,
    config: &Config,
) -> anyhow::Result<rpc::Client> {
    let url = match api {
        Some(url) => url.clone(),
        None => Url::parse(&format!("http://{}", config.api.address))
            .context("invalid [api] address")?,
    };
    rpc::Client::from_url(&url, token, config.node.timeout)
        .map_err(|e| UsageError(format!("invalid daemon endpoint {url}: {e}")).into())
}

/// Maps an error to the process exit status.
fn exit_status(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if cause.is::<UsageError>() {
            return USER_ERROR;
        }
        if let Some(ClientError::Call(obj)) = cause.downcast_ref::<ClientError>()
            && ServerError::is_user_error(obj.code())
        {
            return USER_ERROR;
        }
    }
    INTERNAL_ERROR
}
