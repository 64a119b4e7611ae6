// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Builtin actor code identifiers.
//!
//! Actors are identified on chain by their code CID. Since actors v8 the code CIDs are published
//! by the node per network version as a manifest of `(name, cid)` pairs; earlier versions use
//! identity-hashed CIDs of `fil/<version>/<name>` strings, which are computed here.

mod methods;

use std::collections::BTreeMap;

use ahash::HashMap;
use anyhow::{Context as _, ensure};
use cid::{Cid, multihash::Multihash};
use itertools::Itertools as _;
use parking_lot::RwLock;

use crate::shim::version::NetworkVersion;

pub use methods::{EVM_INVOKE_CONTRACT, method_name};

/// Multicodec code of raw bytes.
const RAW: u64 = 0x55;
/// Multihash code of the identity hash.
const IDENTITY: u64 = 0x00;

/// The builtin actor families.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum BuiltinActor {
    System,
    Init,
    Cron,
    Account,
    #[strum(serialize = "storagepower")]
    Power,
    #[strum(serialize = "storageminer")]
    Miner,
    #[strum(serialize = "storagemarket")]
    Market,
    #[strum(serialize = "paymentchannel")]
    PaymentChannel,
    Multisig,
    Reward,
    #[strum(serialize = "verifiedregistry")]
    VerifiedRegistry,
    #[strum(serialize = "datacap")]
    DataCap,
    Placeholder,
    #[strum(serialize = "evm")]
    Evm,
    #[strum(serialize = "eam")]
    Eam,
    #[strum(serialize = "ethaccount")]
    EthAccount,
}

impl BuiltinActor {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Families that exist before actors v8, when codes were not bundled.
    fn legacy(&self) -> bool {
        !matches!(
            self,
            Self::DataCap | Self::Placeholder | Self::Evm | Self::Eam | Self::EthAccount
        )
    }
}

/// The family and actors version a code CID belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActorCode {
    pub family: BuiltinActor,
    pub version: u64,
}

impl ActorCode {
    /// Human readable name, e.g. `fil/12/storageminer`.
    pub fn path(&self) -> String {
        format!("fil/{}/{}", self.version, self.family)
    }
}

/// Code CID of a pre-bundle actor, the identity hash of its `fil/<version>/<name>` path.
pub fn legacy_code(family: BuiltinActor, version: u64) -> anyhow::Result<Cid> {
    let path = ActorCode { family, version }.path();
    let hash = Multihash::<64>::wrap(IDENTITY, path.as_bytes())?;
    Ok(Cid::new_v1(RAW, hash))
}

/// A list of [`BuiltinActor`]s to their CIDs for one actors version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuiltinActorManifest {
    builtin2cid: BTreeMap<BuiltinActor, Cid>,
}

impl BuiltinActorManifest {
    const MANDATORY_BUILTINS: &[BuiltinActor] = &[BuiltinActor::Init, BuiltinActor::System];

    /// Builds a manifest from the `(name, cid)` list the node reports.
    pub fn from_actor_list(actor_list: impl IntoIterator<Item = (String, Cid)>) -> anyhow::Result<Self> {
        let mut name2cid: BTreeMap<String, Cid> = actor_list.into_iter().collect();
        let mut builtin2cid = BTreeMap::new();
        for builtin in <BuiltinActor as strum::IntoEnumIterator>::iter() {
            if let Some(cid) = name2cid.remove(builtin.name()) {
                builtin2cid.insert(builtin, cid);
            }
        }
        for mandatory_builtin in Self::MANDATORY_BUILTINS {
            ensure!(
                builtin2cid.contains_key(mandatory_builtin),
                "actor list does not contain mandatory actor {}",
                mandatory_builtin.name()
            )
        }
        if !name2cid.is_empty() {
            tracing::warn!("unknown actors in list: [{}]", name2cid.keys().join(", "))
        }
        Ok(Self { builtin2cid })
    }

    /// The manifest of a pre-bundle actors version.
    pub fn legacy(version: u64) -> anyhow::Result<Self> {
        let mut builtin2cid = BTreeMap::new();
        for builtin in <BuiltinActor as strum::IntoEnumIterator>::iter().filter(BuiltinActor::legacy) {
            builtin2cid.insert(builtin, legacy_code(builtin, version)?);
        }
        Ok(Self { builtin2cid })
    }

    pub fn get(&self, builtin: BuiltinActor) -> anyhow::Result<Cid> {
        self.builtin2cid
            .get(&builtin)
            .copied()
            .with_context(|| format!("builtin actor {} is not in the manifest", builtin.name()))
    }

    pub fn builtin_actors(&self) -> impl ExactSizeIterator<Item = (BuiltinActor, Cid)> + '_ {
        self.builtin2cid.iter().map(|(k, v)| (*k, *v))
    }
}

/// Actors version shipped with a network version.
pub fn actors_version(nv: NetworkVersion) -> u64 {
    match nv.0 {
        0..=3 => 0,
        4..=9 => 2,
        10..=11 => 3,
        12 => 4,
        13 => 5,
        14 => 6,
        15 => 7,
        16 => 8,
        17 => 9,
        18 => 10,
        19..=20 => 11,
        21 => 12,
        22 => 13,
        23 => 14,
        24 => 15,
        25..=26 => 16,
        _ => 17,
    }
}

/// Resolves code CIDs to actor families across every actors version seen so far.
#[derive(Debug, Default)]
pub struct ActorRegistry {
    codes: RwLock<HashMap<Cid, ActorCode>>,
}

/// Pre-bundle actors versions. The genesis actors are labelled `fil/1`.
const LEGACY_VERSIONS: std::ops::RangeInclusive<u64> = 1..=7;

impl ActorRegistry {
    /// A registry that already knows every pre-bundle code.
    pub fn with_legacy_codes() -> anyhow::Result<Self> {
        let registry = Self::default();
        for version in LEGACY_VERSIONS {
            registry.register(version, &BuiltinActorManifest::legacy(version)?);
        }
        Ok(registry)
    }

    pub fn register(&self, version: u64, manifest: &BuiltinActorManifest) {
        let mut codes = self.codes.write();
        for (family, cid) in manifest.builtin_actors() {
            codes.insert(cid, ActorCode { family, version });
        }
    }

    pub fn lookup(&self, code: &Cid) -> Option<ActorCode> {
        self.codes.read().get(code).copied()
    }

    pub fn is_known(&self, code: &Cid) -> bool {
        self.codes.read().contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.codes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_names() {
        assert_eq!(BuiltinActor::Miner.to_string(), "storageminer");
        assert_eq!("paymentchannel".parse::<BuiltinActor>().unwrap(), BuiltinActor::PaymentChannel);
        assert_eq!(BuiltinActor::Evm.name(), "evm");
    }

    #[test]
    fn legacy_codes_resolve() {
        let registry = ActorRegistry::with_legacy_codes().unwrap();
        let code = legacy_code(BuiltinActor::Account, 2).unwrap();
        assert_eq!(
            registry.lookup(&code),
            Some(ActorCode {
                family: BuiltinActor::Account,
                version: 2
            })
        );
        assert!(registry.lookup(&legacy_code(BuiltinActor::Evm, 2).unwrap()).is_none());
    }

    #[test]
    fn manifest_requires_system_and_init() {
        let code = legacy_code(BuiltinActor::System, 9).unwrap();
        assert!(BuiltinActorManifest::from_actor_list([("system".to_owned(), code)]).is_err());

        let init = legacy_code(BuiltinActor::Init, 9).unwrap();
        let manifest = BuiltinActorManifest::from_actor_list([
            ("system".to_owned(), code),
            ("init".to_owned(), init),
            ("unknown".to_owned(), Cid::default()),
        ])
        .unwrap();
        assert_eq!(manifest.get(BuiltinActor::Init).unwrap(), init);
        assert!(manifest.get(BuiltinActor::Miner).is_err());
    }

    #[test]
    fn actors_versions_follow_upgrades() {
        assert_eq!(actors_version(NetworkVersion::V0), 0);
        assert_eq!(actors_version(NetworkVersion::V16), 8);
        assert_eq!(actors_version(NetworkVersion::V18), 10);
        assert_eq!(actors_version(NetworkVersion::V20), 11);
        assert_eq!(actors_version(NetworkVersion::V27), 17);
    }

    #[test]
    fn registered_manifest_resolves() {
        let registry = ActorRegistry::default();
        let system = legacy_code(BuiltinActor::System, 12).unwrap();
        let init = legacy_code(BuiltinActor::Init, 12).unwrap();
        let manifest = BuiltinActorManifest::from_actor_list([
            ("system".to_owned(), system),
            ("init".to_owned(), init),
        ])
        .unwrap();
        registry.register(12, &manifest);
        assert_eq!(registry.lookup(&init).map(|c| c.path()), Some("fil/12/init".into()));
        assert_eq!(registry.len(), 2);
    }
}
