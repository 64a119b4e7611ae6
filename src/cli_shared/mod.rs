// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod cli;
pub mod logger;

use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::cli_shared::cli::{Config, ConfigPath, find_config_path};

pub fn read_config(
    config_path_opt: Option<&PathBuf>,
    repo: &Path,
) -> anyhow::Result<(Option<ConfigPath>, Config)> {
    let (path, config) = match find_config_path(config_path_opt, repo) {
        Some(path) => {
            let toml = std::fs::read_to_string(path.to_path_buf()).with_context(|| {
                format!("failed to read config at {}", path.to_path_buf().display())
            })?;
            let config = toml::from_str(&toml).with_context(|| {
                format!("invalid config at {}", path.to_path_buf().display())
            })?;
            (Some(path), config)
        }
        None => (None, Config::default()),
    };
    Ok((path, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networks::NetworkChain;

    #[test]
    fn read_config_default() {
        let repo = tempfile::tempdir().unwrap();
        let (config_path, config) = read_config(None, repo.path()).unwrap();

        assert!(config_path.is_none());
        assert_eq!(config.node.network, NetworkChain::Mainnet);
    }

    #[test]
    fn read_config_with_path() {
        let repo = tempfile::tempdir().unwrap();
        let mut default_config = Config::default();
        default_config.node.network = NetworkChain::Calibnet;
        let path = repo.path().join("custom.toml");
        std::fs::write(&path, default_config.to_toml().unwrap()).unwrap();

        let (config_path, config) = read_config(Some(&path), repo.path()).unwrap();

        assert_eq!(config_path.unwrap(), ConfigPath::Cli(path));
        assert_eq!(config, default_config);
    }

    #[test]
    fn missing_explicit_config_fails() {
        let repo = tempfile::tempdir().unwrap();
        let path = repo.path().join("missing.toml");
        assert!(read_config(Some(&path), repo.path()).is_err());
    }

    #[test]
    fn malformed_config_fails() {
        let repo = tempfile::tempdir().unwrap();
        std::fs::write(repo.path().join("config.toml"), "[api\naddress = 1").unwrap();
        assert!(read_config(None, repo.path()).is_err());
    }
}
