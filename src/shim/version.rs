// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use serde::{Deserialize, Serialize};

/// Specifies the network version
#[derive(
    Debug,
    Default,
    Eq,
    PartialEq,
    Clone,
    Copy,
    Ord,
    PartialOrd,
    Hash,
    Serialize,
    Deserialize,
    derive_more::From,
    derive_more::Into,
    derive_more::Display,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct NetworkVersion(pub u32);

/// Defines public constants V0, V1, ... for [`NetworkVersion`].
macro_rules! define_network_versions {
    ($($name:ident = $version:literal),+ $(,)?) => {
        impl NetworkVersion {
            $(
                pub const $name: Self = Self($version);
            )+
        }
    }
}

define_network_versions!(
    V0 = 0,
    V1 = 1,
    V2 = 2,
    V3 = 3,
    V4 = 4,
    V5 = 5,
    V6 = 6,
    V7 = 7,
    V8 = 8,
    V9 = 9,
    V10 = 10,
    V11 = 11,
    V12 = 12,
    V13 = 13,
    V14 = 14,
    V15 = 15,
    V16 = 16,
    V17 = 17,
    V18 = 18,
    V19 = 19,
    V20 = 20,
    V21 = 21,
    V22 = 22,
    V23 = 23,
    V24 = 24,
    V25 = 25,
    V26 = 26,
    V27 = 27,
);

impl NetworkVersion {
    /// Oldest version known to this crate.
    pub const MIN: Self = Self::V0;
    /// Newest version known to this crate.
    pub const MAX: Self = Self::V27;
}
