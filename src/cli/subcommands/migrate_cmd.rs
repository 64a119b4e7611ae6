// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use anyhow::Context as _;
use tracing::info;

use crate::cli::UsageError;
use crate::cli_shared::cli::Config;
use crate::storage::migrations::latest_version;
use crate::storage::postgres::{connect_pool, migrate, schema_version};

#[derive(Debug, clap::Args)]
pub struct MigrateCommand {
    /// Postgres storage to migrate, by its name in the configuration
    #[arg(long, env = "LILY_STORAGE")]
    storage: String,
    /// Move the schema to this version, forwards or backwards
    #[arg(long, conflicts_with = "latest")]
    to: Option<u32>,
    /// Move the schema to the latest version
    #[arg(long)]
    latest: bool,
}

impl MigrateCommand {
    /// The version to move to, or `None` to only print the current one.
    fn target(&self) -> Option<u32> {
        if self.latest {
            Some(latest_version())
        } else {
            self.to
        }
    }

    pub async fn run(self, config: &Config) -> anyhow::Result<()> {
        let Some(pg) = config.storage.postgresql.get(&self.storage) else {
            return Err(UsageError(format!(
                "no postgres storage named {:?} in the configuration",
                self.storage
            ))
            .into());
        };
        let pool = connect_pool(&pg.url, &pg.schema, &pg.application_name, 1)
            .await
            .with_context(|| format!("failed to connect to storage {}", self.storage))?;
        let current = schema_version(&pool).await?;
        let Some(to) = self.target() else {
            println!("current schema version: {current}");
            println!("latest schema version: {}", latest_version());
            return Ok(());
        };
        if to > latest_version() {
            return Err(UsageError(format!(
                "unknown schema version {to}, the latest is {}",
                latest_version()
            ))
            .into());
        }
        if to == current {
            println!("schema is already at version {current}");
            return Ok(());
        }
        info!(storage = %self.storage, from = current, to, "migrating schema");
        let version = migrate(&pool, &pg.schema, to).await?;
        println!("schema migrated from version {current} to {version}");
        Ok(())
    }
}
