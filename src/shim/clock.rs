// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

/// Epoch number of a chain. This acts as a proxy for time within the VM.
pub type ChainEpoch = i64;

/// Disambiguate the type to signify that we are expecting a delta and not an actual epoch/height
/// while maintaining the same type.
pub type ChainEpochDelta = ChainEpoch;

/// Duration of each tipset epoch.
pub const EPOCH_DURATION_SECONDS: i64 = 30;

/// Number of epochs per day of chain time.
pub const EPOCHS_IN_DAY: ChainEpoch = 24 * 60 * 60 / EPOCH_DURATION_SECONDS;

/// Number of epochs in a week, the unit of height based table partitioning.
pub const EPOCHS_IN_WEEK: ChainEpoch = 7 * EPOCHS_IN_DAY;

/// Returns the epoch expected at wall-clock `now` for a chain that started at `genesis_timestamp`.
pub fn expected_epoch(genesis_timestamp: u64, now: u64) -> ChainEpoch {
    (now.saturating_sub(genesis_timestamp) as i64) / EPOCH_DURATION_SECONDS
}
