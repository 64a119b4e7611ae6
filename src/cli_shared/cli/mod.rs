// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod config;

use std::path::PathBuf;

pub use self::config::*;
use crate::utils::misc::LoggingColor;

/// Name of the configuration file inside the repository directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Options shared by every command.
#[derive(Debug, Default, Clone, clap::Args)]
pub struct CliOpts {
    /// A TOML file containing relevant configurations
    #[arg(long, global = true, env = "LILY_CONFIG")]
    pub config: Option<PathBuf>,
    /// Directory holding the configuration and logs. Defaults to `~/.lily`
    #[arg(long, global = true, env = "LILY_REPO")]
    pub repo: Option<PathBuf>,
    /// Enable or disable colored logging in `stdout`
    #[arg(long, global = true, default_value = "auto")]
    pub color: LoggingColor,
    /// Write hourly rolling log files into this directory
    #[arg(long, global = true, env = "LILY_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

impl CliOpts {
    pub fn repo_dir(&self) -> PathBuf {
        self.repo.clone().unwrap_or_else(default_repo_dir)
    }
}

/// Where the configuration was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigPath {
    /// `--config` or `LILY_CONFIG`.
    Cli(PathBuf),
    /// `config.toml` in the repository.
    Repo(PathBuf),
}

impl ConfigPath {
    pub fn to_path_buf(&self) -> &PathBuf {
        match self {
            ConfigPath::Cli(path) | ConfigPath::Repo(path) => path,
        }
    }
}

pub fn default_repo_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".lily"))
        .unwrap_or_else(|| PathBuf::from(".lily"))
}

/// An explicit path always wins, even when the file is missing, so that typos surface as errors.
pub fn find_config_path(explicit: Option<&PathBuf>, repo: &std::path::Path) -> Option<ConfigPath> {
    if let Some(path) = explicit {
        return Some(ConfigPath::Cli(path.clone()));
    }
    let path = repo.join(CONFIG_FILE_NAME);
    path.is_file().then_some(ConfigPath::Repo(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "").unwrap();
        let explicit = PathBuf::from("/nonexistent/lily.toml");
        assert_eq!(
            find_config_path(Some(&explicit), dir.path()),
            Some(ConfigPath::Cli(explicit))
        );
        assert_eq!(
            find_config_path(None, dir.path()),
            Some(ConfigPath::Repo(dir.path().join(CONFIG_FILE_NAME)))
        );
        let empty = tempfile::tempdir().unwrap();
        assert_eq!(find_config_path(None, empty.path()), None);
    }
}
