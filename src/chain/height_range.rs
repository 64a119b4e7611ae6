// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shim::clock::ChainEpoch;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeightRangeError {
    #[error("invalid height range [{min}, {max}]")]
    Invalid { min: ChainEpoch, max: ChainEpoch },
    #[error("cannot divide a height range into zero pieces")]
    ZeroPieces,
}

/// A closed range of heights, `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeightRange {
    pub min: ChainEpoch,
    pub max: ChainEpoch,
}

impl HeightRange {
    /// Every height, `[0, i64::MAX]`.
    pub const FULL: HeightRange = HeightRange {
        min: 0,
        max: ChainEpoch::MAX,
    };

    pub fn new(min: ChainEpoch, max: ChainEpoch) -> Result<Self, HeightRangeError> {
        if min < 0 || max < min {
            return Err(HeightRangeError::Invalid { min, max });
        }
        Ok(Self { min, max })
    }

    /// Number of heights in the range, saturating at `i64::MAX`.
    pub fn len(&self) -> i64 {
        (self.max - self.min).saturating_add(1)
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, height: ChainEpoch) -> bool {
        (self.min..=self.max).contains(&height)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = ChainEpoch> {
        self.min..=self.max
    }

    /// Splits the range into `n` contiguous pieces in ascending order that together cover it
    /// exactly once.
    ///
    /// Each piece holds `len / n` heights, with the remainder spread one per piece over the
    /// trailing pieces. When the length of the range does not fit an `i64` (the full
    /// `[0, i64::MAX]` range), `max - min` is divided instead and the last piece extends to
    /// `max`. Asking for more pieces than heights yields one piece per height.
    pub fn divide(&self, n: usize) -> Result<Vec<HeightRange>, HeightRangeError> {
        if n == 0 {
            return Err(HeightRangeError::ZeroPieces);
        }
        let len = (self.max - self.min).checked_add(1);
        let span = len.unwrap_or(self.max - self.min);
        let n = i64::try_from(n).unwrap_or(i64::MAX).min(span.max(1));
        let size = span / n;
        let remainder = span % n;

        let mut out = Vec::with_capacity(n as usize);
        let mut start = self.min;
        for i in 0..n {
            let extra = i64::from(i >= n - remainder);
            let end = start + size + extra - 1;
            out.push(HeightRange { min: start, max: end });
            start = end + 1;
        }
        if let Some(last) = out.last_mut() {
            last.max = self.max;
        }
        Ok(out)
    }
}

impl fmt::Display for HeightRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}
