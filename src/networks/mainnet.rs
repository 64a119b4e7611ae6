// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{Height, HeightInfo};

// The rollover period is the duration between nv19 and nv20 which both old
// proofs (v1) and the new proofs (v1_1) proofs will be accepted by the
// network.
const LIGHTNING_ROLLOVER_PERIOD: i64 = 2880 * 21;

/// Timestamp of the mainnet genesis block.
pub const GENESIS_TIMESTAMP: u64 = 1598306400;

/// Height epochs.
pub const HEIGHT_INFOS: [HeightInfo; 27] = [
    HeightInfo {
        height: Height::Breeze,
        epoch: 41_280,
    },
    HeightInfo {
        height: Height::Smoke,
        epoch: 51_000,
    },
    HeightInfo {
        height: Height::Ignition,
        epoch: 94_000,
    },
    HeightInfo {
        height: Height::ActorsV2,
        epoch: 138_720,
    },
    HeightInfo {
        height: Height::Tape,
        epoch: 140_760,
    },
    HeightInfo {
        height: Height::Kumquat,
        epoch: 170_000,
    },
    HeightInfo {
        height: Height::Calico,
        epoch: 265_200,
    },
    HeightInfo {
        height: Height::Persian,
        epoch: 272_400,
    },
    HeightInfo {
        height: Height::Orange,
        epoch: 336_458,
    },
    HeightInfo {
        height: Height::Trust,
        epoch: 550_321,
    },
    HeightInfo {
        height: Height::Norwegian,
        epoch: 665_280,
    },
    HeightInfo {
        height: Height::Turbo,
        epoch: 712_320,
    },
    HeightInfo {
        height: Height::Hyperdrive,
        epoch: 892_800,
    },
    HeightInfo {
        height: Height::Chocolate,
        epoch: 1_231_620,
    },
    HeightInfo {
        height: Height::OhSnap,
        epoch: 1_594_680,
    },
    HeightInfo {
        height: Height::Skyr,
        epoch: 1_960_320,
    },
    HeightInfo {
        height: Height::Shark,
        epoch: 2_383_680,
    },
    HeightInfo {
        height: Height::Hygge,
        epoch: 2_683_348,
    },
    HeightInfo {
        height: Height::Lightning,
        epoch: 2_809_800,
    },
    HeightInfo {
        height: Height::Thunder,
        epoch: 2_809_800 + LIGHTNING_ROLLOVER_PERIOD,
    },
    HeightInfo {
        height: Height::Watermelon,
        epoch: 3_469_380,
    },
    HeightInfo {
        height: Height::Dragon,
        epoch: 3_855_360,
    },
    HeightInfo {
        height: Height::Waffle,
        epoch: 4_154_640,
    },
    HeightInfo {
        height: Height::TukTuk,
        epoch: 4_461_240,
    },
    HeightInfo {
        height: Height::Teep,
        epoch: 4_878_840,
    },
    HeightInfo {
        height: Height::Tock,
        epoch: 4_878_840 + 2880 * 90,
    },
    HeightInfo {
        height: Height::GoldenWeek,
        epoch: 5_348_280,
    },
];
