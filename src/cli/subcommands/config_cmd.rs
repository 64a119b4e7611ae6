// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::io::Write;

use anyhow::Context as _;
use clap::Subcommand;

use crate::cli_shared::cli::Config;

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the default configuration
    Default,
    /// Print the configuration in effect, defaults included
    Dump,
}

impl ConfigCommands {
    pub fn run<W: Write>(self, config: &Config, sink: &mut W) -> anyhow::Result<()> {
        let toml = match self {
            Self::Default => Config::default().to_toml()?,
            Self::Dump => config.to_toml()?,
        };
        writeln!(sink, "{toml}").context("failed to write the configuration")
    }
}
