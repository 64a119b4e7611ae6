// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, DurationSeconds, serde_as};
use tracing_subscriber::filter::LevelFilter;

use crate::networks::NetworkChain;
use crate::queue::QueueConfig;
use crate::rpc::DEFAULT_REQUEST_TIMEOUT;
use crate::storage::StorageConfig;

pub const DEFAULT_API_PORT: u16 = 1231;

/// The daemon's own JSON-RPC endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, smart_default::SmartDefault)]
#[serde(default)]
pub struct ApiConfig {
    #[default(SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_API_PORT)))]
    pub address: SocketAddr,
}

/// The Filecoin node the indexer reads the chain from.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, smart_default::SmartDefault)]
#[serde(default)]
pub struct NodeConfig {
    #[default("http://127.0.0.1:1234/rpc/v1".into())]
    pub api: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[default(DEFAULT_REQUEST_TIMEOUT)]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub timeout: Duration,
    /// Attempts per call while the node is unreachable.
    #[default(5)]
    pub retries: usize,
    pub network: NetworkChain,
}

#[serde_as]
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LogValue {
    pub module: String,
    #[serde_as(as = "DisplayFromStr")]
    pub level: LevelFilter,
}

impl LogValue {
    pub fn new(module: &str, level: LevelFilter) -> Self {
        Self {
            module: module.to_string(),
            level,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
#[serde(default)]
pub struct LogConfig {
    pub filters: Vec<LogValue>,
}

impl LogConfig {
    pub fn to_filter_string(&self) -> String {
        self.filters
            .iter()
            .map(|f| format!("{}={}", f.module, f.level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filters: vec![
                LogValue::new("jsonrpsee", LevelFilter::WARN),
                LogValue::new("sqlx", LevelFilter::WARN),
                LogValue::new("hyper", LevelFilter::WARN),
            ],
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Default, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub node: NodeConfig,
    pub storage: StorageConfig,
    pub queue: QueueConfig,
    pub log: LogConfig,
}

impl Config {
    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod test {
    use quickcheck::Arbitrary;
    use quickcheck_macros::quickcheck;
    use tracing_subscriber::EnvFilter;

    use super::*;
    use crate::storage::{MemoryStorageConfig, PostgresConfig};

    #[derive(Clone, Debug)]
    struct ConfigPartial {
        ip: Ipv4Addr,
        port: u16,
        token: Option<String>,
        retries: u8,
        network: String,
        storages: Vec<bool>,
    }

    impl Arbitrary for ConfigPartial {
        fn arbitrary(g: &mut quickcheck::Gen) -> Self {
            ConfigPartial {
                ip: Ipv4Addr::arbitrary(g),
                port: u16::arbitrary(g),
                token: Option::arbitrary(g),
                retries: u8::arbitrary(g),
                network: g.choose(&["mainnet", "calibnet", "devnet"]).unwrap().to_string(),
                storages: Vec::arbitrary(g),
            }
        }
    }

    impl From<ConfigPartial> for Config {
        fn from(val: ConfigPartial) -> Self {
            let mut config = Config::default();
            config.api.address = SocketAddr::from((val.ip, val.port));
            config.node.token = val.token;
            config.node.retries = val.retries.into();
            config.node.network = val.network.into();
            for (i, upsert) in val.storages.into_iter().enumerate() {
                let name = format!("db{i}");
                config.storage.memory.insert(
                    name.clone(),
                    MemoryStorageConfig {
                        allow_upsert: upsert,
                    },
                );
                config.storage.postgresql.insert(
                    name,
                    PostgresConfig {
                        allow_upsert: upsert,
                        ..Default::default()
                    },
                );
            }
            config
        }
    }

    #[quickcheck]
    fn config_round_trips_through_toml(config: ConfigPartial) {
        let config = Config::from(config);
        let serialized = config.to_toml().expect("could not serialize the configuration");
        assert_eq!(
            serialized
                .trim_start()
                .chars()
                .next()
                .expect("configuration empty"),
            '['
        );
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn sections_are_optional() {
        let config: Config = toml::from_str(
            r#"
            [node]
            api = "ws://node:1234/rpc/v1"

            [storage.postgresql.db]
            url = "postgres://db"
            "#,
        )
        .unwrap();
        assert_eq!(config.api.address.port(), DEFAULT_API_PORT);
        assert_eq!(config.node.retries, 5);
        assert_eq!(config.node.timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(config.storage.postgresql["db"].pool_size, 20);
        assert_eq!(config.log, LogConfig::default());
    }

    #[test]
    fn test_default_log_filters() {
        let config = LogConfig::default();
        EnvFilter::builder()
            .parse(config.to_filter_string())
            .unwrap();
    }

    #[test]
    fn log_levels_are_case_insensitive() {
        let config: LogConfig = toml::from_str(
            r#"
            [[filters]]
            module = "lily::jobs"
            level = "DEBUG"
            "#,
        )
        .unwrap();
        assert_eq!(config.filters[0].level, LevelFilter::DEBUG);
        assert_eq!(config.to_filter_string(), "lily::jobs=debug");
    }
}
