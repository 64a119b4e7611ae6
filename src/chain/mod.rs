// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod head_notifier;
mod height_range;
mod tipset_cache;

pub use head_notifier::{HeadEvent, HeadNotifier};
pub use height_range::{HeightRange, HeightRangeError};
pub use tipset_cache::{RevertOutcome, TipsetCache};

use crate::blocks::Tipset;
use crate::datasource::{DataSource, Error};
use crate::shim::clock::ChainEpoch;

/// Which tipset to return when the requested height is a null round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveNullTipset {
    /// The nearest tipset above the null round.
    TakeNewer,
    /// The nearest tipset below the null round.
    TakeOlder,
}

/// Looks up the tipset at height `to` on the chain ending at `from`.
///
/// Requesting a null round returns the nearest tipset below it with
/// [`ResolveNullTipset::TakeOlder`] and the nearest one above it with
/// [`ResolveNullTipset::TakeNewer`].
pub async fn tipset_by_height(
    source: &dyn DataSource,
    to: ChainEpoch,
    from: &Tipset,
    resolve: ResolveNullTipset,
) -> Result<Tipset, Error> {
    if to > from.epoch() {
        return Err(Error::Other(format!(
            "looking for tipset with height greater than start point: {to} > {}",
            from.epoch()
        )));
    }
    let found = source.tipset_by_height(to, from.key()).await?;
    if found.epoch() == to || resolve == ResolveNullTipset::TakeOlder {
        return Ok(found);
    }
    // Walk down from `from` to find the child of the tipset below the null round.
    let mut child = from.clone();
    while child.parents() != found.key() {
        child = source.tipset(child.parents()).await?;
    }
    Ok(child)
}
