// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::shim::clock::{ChainEpoch, EPOCH_DURATION_SECONDS};
use crate::shim::version::NetworkVersion;

pub mod calibnet;
pub mod mainnet;

/// Builtin `filecoin` network chains. Any other name is treated as a devnet where every upgrade
/// is active from genesis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum NetworkChain {
    Mainnet,
    Calibnet,
    Devnet(String),
}

impl FromStr for NetworkChain {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "mainnet" => NetworkChain::Mainnet,
            "calibnet" | "calibrationnet" => NetworkChain::Calibnet,
            name => NetworkChain::Devnet(name.to_owned()),
        })
    }
}

impl From<String> for NetworkChain {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(chain) => chain,
            Err(never) => match never {},
        }
    }
}

impl From<NetworkChain> for String {
    fn from(chain: NetworkChain) -> Self {
        chain.to_string()
    }
}

impl Display for NetworkChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkChain::Mainnet => write!(f, "mainnet"),
            NetworkChain::Calibnet => write!(f, "calibnet"),
            NetworkChain::Devnet(name) => write!(f, "{name}"),
        }
    }
}

impl Default for NetworkChain {
    fn default() -> Self {
        Self::Mainnet
    }
}

/// Defines the meaningful heights of the protocol.
#[derive(Debug, Display, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Height {
    Breeze,
    Smoke,
    Ignition,
    ActorsV2,
    Tape,
    Kumquat,
    Calico,
    Persian,
    Orange,
    Trust,
    Norwegian,
    Turbo,
    Hyperdrive,
    Chocolate,
    OhSnap,
    Skyr,
    Shark,
    Hygge,
    Lightning,
    Thunder,
    Watermelon,
    Dragon,
    Waffle,
    TukTuk,
    Teep,
    Tock,
    GoldenWeek,
}

impl From<Height> for NetworkVersion {
    fn from(height: Height) -> NetworkVersion {
        match height {
            Height::Breeze => NetworkVersion::V1,
            Height::Smoke => NetworkVersion::V2,
            Height::Ignition => NetworkVersion::V3,
            Height::ActorsV2 => NetworkVersion::V4,
            Height::Tape => NetworkVersion::V5,
            Height::Kumquat => NetworkVersion::V6,
            Height::Calico => NetworkVersion::V7,
            Height::Persian => NetworkVersion::V8,
            Height::Orange => NetworkVersion::V9,
            Height::Trust => NetworkVersion::V10,
            Height::Norwegian => NetworkVersion::V11,
            Height::Turbo => NetworkVersion::V12,
            Height::Hyperdrive => NetworkVersion::V13,
            Height::Chocolate => NetworkVersion::V14,
            Height::OhSnap => NetworkVersion::V15,
            Height::Skyr => NetworkVersion::V16,
            Height::Shark => NetworkVersion::V17,
            Height::Hygge => NetworkVersion::V18,
            Height::Lightning => NetworkVersion::V19,
            Height::Thunder => NetworkVersion::V20,
            Height::Watermelon => NetworkVersion::V21,
            Height::Dragon => NetworkVersion::V22,
            Height::Waffle => NetworkVersion::V23,
            Height::TukTuk => NetworkVersion::V24,
            Height::Teep => NetworkVersion::V25,
            Height::Tock => NetworkVersion::V26,
            Height::GoldenWeek => NetworkVersion::V27,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightInfo {
    pub height: Height,
    pub epoch: ChainEpoch,
}

/// One step of the upgrade schedule: every epoch up to and including `at_or_below` (and above the
/// previous step) runs `version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VersionSpec {
    at_or_below: ChainEpoch,
    version: NetworkVersion,
}

/// Resolves the network version active at a given height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeSchedule {
    specs: Vec<VersionSpec>,
    latest: NetworkVersion,
}

impl UpgradeSchedule {
    /// Builds the schedule from upgrade heights. The upgrade epoch itself still runs the previous
    /// version; the new version applies from the following epoch. Negative epochs mark upgrades
    /// already active at genesis.
    pub fn new(genesis_version: NetworkVersion, infos: &[HeightInfo]) -> Self {
        let mut infos = infos.to_vec();
        infos.sort_by_key(|info| (NetworkVersion::from(info.height), info.epoch));
        let mut specs = Vec::with_capacity(infos.len());
        let mut last = genesis_version;
        for info in infos {
            let version = NetworkVersion::from(info.height);
            if info.epoch >= 0 {
                specs.push(VersionSpec {
                    at_or_below: info.epoch,
                    version: last,
                });
            }
            last = version;
        }
        Self {
            specs,
            latest: last,
        }
    }

    /// Every upgrade active from genesis.
    pub fn devnet() -> Self {
        Self {
            specs: vec![],
            latest: NetworkVersion::MAX,
        }
    }

    pub fn network_version(&self, height: ChainEpoch) -> NetworkVersion {
        self.specs
            .iter()
            .find(|spec| height <= spec.at_or_below)
            .map(|spec| spec.version)
            .unwrap_or(self.latest)
    }

    pub fn latest(&self) -> NetworkVersion {
        self.latest
    }
}

/// Static parameters of a network that the indexer needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub network: NetworkChain,
    /// Seconds since the Unix epoch of the genesis block.
    pub genesis_timestamp: u64,
    pub block_delay_secs: u32,
    pub schedule: UpgradeSchedule,
}

impl ChainConfig {
    pub fn mainnet() -> Self {
        Self {
            network: NetworkChain::Mainnet,
            genesis_timestamp: mainnet::GENESIS_TIMESTAMP,
            block_delay_secs: EPOCH_DURATION_SECONDS as u32,
            schedule: UpgradeSchedule::new(NetworkVersion::V0, &mainnet::HEIGHT_INFOS),
        }
    }

    pub fn calibnet() -> Self {
        Self {
            network: NetworkChain::Calibnet,
            genesis_timestamp: calibnet::GENESIS_TIMESTAMP,
            block_delay_secs: EPOCH_DURATION_SECONDS as u32,
            schedule: UpgradeSchedule::new(NetworkVersion::V0, &calibnet::HEIGHT_INFOS),
        }
    }

    pub fn devnet(name: impl Into<String>) -> Self {
        Self {
            network: NetworkChain::Devnet(name.into()),
            genesis_timestamp: 0,
            block_delay_secs: EPOCH_DURATION_SECONDS as u32,
            schedule: UpgradeSchedule::devnet(),
        }
    }

    pub fn from_chain(chain: &NetworkChain) -> Self {
        match chain {
            NetworkChain::Mainnet => Self::mainnet(),
            NetworkChain::Calibnet => Self::calibnet(),
            NetworkChain::Devnet(name) => Self::devnet(name.clone()),
        }
    }

    pub fn network_version(&self, epoch: ChainEpoch) -> NetworkVersion {
        self.schedule.network_version(epoch)
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self::mainnet()
    }
}
