// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{Height, HeightInfo};

/// Timestamp of the calibration network genesis block.
pub const GENESIS_TIMESTAMP: u64 = 1667326380;

/// Height epochs.
pub const HEIGHT_INFOS: [HeightInfo; 27] = [
    HeightInfo {
        height: Height::Breeze,
        epoch: -1,
    },
    HeightInfo {
        height: Height::Smoke,
        epoch: -2,
    },
    HeightInfo {
        height: Height::Ignition,
        epoch: -3,
    },
    HeightInfo {
        height: Height::ActorsV2,
        epoch: 30,
    },
    HeightInfo {
        height: Height::Tape,
        epoch: 60,
    },
    HeightInfo {
        height: Height::Kumquat,
        epoch: 90,
    },
    HeightInfo {
        height: Height::Calico,
        epoch: 120,
    },
    HeightInfo {
        height: Height::Persian,
        epoch: 130,
    },
    HeightInfo {
        height: Height::Orange,
        epoch: 300,
    },
    HeightInfo {
        height: Height::Trust,
        epoch: 330,
    },
    HeightInfo {
        height: Height::Norwegian,
        epoch: 360,
    },
    HeightInfo {
        height: Height::Turbo,
        epoch: 390,
    },
    HeightInfo {
        height: Height::Hyperdrive,
        epoch: 420,
    },
    HeightInfo {
        height: Height::Chocolate,
        epoch: 450,
    },
    HeightInfo {
        height: Height::OhSnap,
        epoch: 480,
    },
    HeightInfo {
        height: Height::Skyr,
        epoch: 510,
    },
    HeightInfo {
        height: Height::Shark,
        epoch: 16_800,
    },
    HeightInfo {
        height: Height::Hygge,
        epoch: 322_354,
    },
    HeightInfo {
        height: Height::Lightning,
        epoch: 489_094,
    },
    HeightInfo {
        height: Height::Thunder,
        epoch: 489_094 + 3120,
    },
    HeightInfo {
        height: Height::Watermelon,
        epoch: 1_013_134,
    },
    HeightInfo {
        height: Height::Dragon,
        epoch: 1_427_974,
    },
    HeightInfo {
        height: Height::Waffle,
        epoch: 1_779_094,
    },
    HeightInfo {
        height: Height::TukTuk,
        epoch: 2_078_794,
    },
    HeightInfo {
        height: Height::Teep,
        epoch: 2_523_454,
    },
    HeightInfo {
        height: Height::Tock,
        epoch: 2_558_014,
    },
    HeightInfo {
        height: Height::GoldenWeek,
        epoch: 3_007_294,
    },
];
