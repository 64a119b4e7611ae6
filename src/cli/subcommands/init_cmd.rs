// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::path::Path;

use anyhow::Context as _;

use crate::cli::UsageError;
use crate::cli_shared::cli::{CONFIG_FILE_NAME, Config};

#[derive(Debug, clap::Args)]
pub struct InitCommand {
    /// Overwrite an existing configuration
    #[arg(long)]
    force: bool,
}

impl InitCommand {
    pub fn run(self, repo: &Path) -> anyhow::Result<()> {
        let path = repo.join(CONFIG_FILE_NAME);
        if path.exists() && !self.force {
            return Err(UsageError(format!(
                "{} already exists, pass --force to overwrite it",
                path.display()
            ))
            .into());
        }
        std::fs::create_dir_all(repo)
            .with_context(|| format!("failed to create {}", repo.display()))?;
        std::fs::write(&path, Config::default().to_toml()?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Initialized lily repository at {}", repo.display());
        Ok(())
    }
}
