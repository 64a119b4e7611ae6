// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::VecDeque;

use crate::blocks::{Tipset, TipsetKey};
use crate::shim::clock::ChainEpoch;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("tipset at height {height} is not above the cache head at {head}")]
    OutOfOrder { height: ChainEpoch, head: ChainEpoch },
    #[error("tipset at height {height} does not extend the cache head {head}")]
    ParentMismatch { height: ChainEpoch, head: TipsetKey },
    #[error("reverted tipset {reverted} is not the cache head {head}")]
    RevertMismatch { reverted: TipsetKey, head: TipsetKey },
}

/// What a successful revert removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertOutcome {
    /// The tipset was still in the cache and was never delivered.
    Unconfirmed,
    /// The cache is empty: the tipset had already been delivered.
    AlreadyConfirmed,
}

/// A bounded stack of the most recent tipsets.
///
/// Tipsets are delivered once they are `confidence` tipsets deep, which makes delivery safe
/// against reorgs of up to that depth. Entries have strictly increasing heights and each one is
/// the parent of the next.
#[derive(Debug, Clone)]
pub struct TipsetCache {
    buffer: VecDeque<Tipset>,
    confidence: usize,
}

impl TipsetCache {
    pub fn new(confidence: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(confidence + 1),
            confidence,
        }
    }

    pub fn confidence(&self) -> usize {
        self.confidence
    }

    /// Pushes `ts` and returns the tipset it pushed out of the cache, if any. With a confidence
    /// of zero `ts` is returned immediately.
    pub fn add(&mut self, ts: Tipset) -> Result<Option<Tipset>, CacheError> {
        if let Some(head) = self.buffer.back() {
            if ts.epoch() <= head.epoch() {
                return Err(CacheError::OutOfOrder {
                    height: ts.epoch(),
                    head: head.epoch(),
                });
            }
            if ts.parents() != head.key() {
                return Err(CacheError::ParentMismatch {
                    height: ts.epoch(),
                    head: head.key().clone(),
                });
            }
        }
        if self.confidence == 0 {
            return Ok(Some(ts));
        }
        self.buffer.push_back(ts);
        if self.buffer.len() > self.confidence {
            return Ok(self.buffer.pop_front());
        }
        Ok(None)
    }

    /// Pops `ts`, which must be the most recent tipset.
    pub fn revert(&mut self, ts: &Tipset) -> Result<RevertOutcome, CacheError> {
        let Some(head) = self.buffer.back() else {
            return Ok(RevertOutcome::AlreadyConfirmed);
        };
        if head.key() != ts.key() {
            return Err(CacheError::RevertMismatch {
                reverted: ts.key().clone(),
                head: head.key().clone(),
            });
        }
        self.buffer.pop_back();
        Ok(RevertOutcome::Unconfirmed)
    }

    /// Resets the cache so that `ts` is its only entry.
    pub fn set_current(&mut self, ts: Tipset) {
        self.buffer.clear();
        if self.confidence > 0 {
            self.buffer.push_back(ts);
        }
    }

    /// Removes and returns every cached tipset, oldest first.
    pub fn drain(&mut self) -> Vec<Tipset> {
        self.buffer.drain(..).collect()
    }

    pub fn head(&self) -> Option<&Tipset> {
        self.buffer.back()
    }

    pub fn tail(&self) -> Option<&Tipset> {
        self.buffer.front()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::BlockHeader;
    use crate::shim::address::Address;
    use quickcheck_macros::quickcheck;

    fn tipset(height: ChainEpoch, miner: u64, parents: TipsetKey) -> Tipset {
        Tipset::from_headers(vec![BlockHeader {
            miner: Address::new_id('f', miner),
            parents,
            height,
            ..Default::default()
        }])
        .unwrap()
    }

    fn root(height: ChainEpoch) -> Tipset {
        tipset(height, 0, TipsetKey::default())
    }

    fn child(parent: &Tipset, height: ChainEpoch) -> Tipset {
        tipset(height, 0, parent.key().clone())
    }

    fn sibling(parent: &Tipset, height: ChainEpoch) -> Tipset {
        tipset(height, 1, parent.key().clone())
    }

    #[test]
    fn confirms_at_depth() {
        let mut cache = TipsetCache::new(2);
        let mut confirmed = vec![];
        let mut last = root(99);
        for height in 100..=110 {
            let next = child(&last, height);
            if let Some(ts) = cache.add(next.clone()).unwrap() {
                confirmed.push(ts.epoch());
            }
            last = next;
        }
        assert_eq!(confirmed, (100..=108).collect::<Vec<_>>());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.tail().unwrap().epoch(), 109);
        assert_eq!(cache.head().unwrap().epoch(), 110);
    }

    #[test]
    fn rejects_out_of_order() {
        let mut cache = TipsetCache::new(3);
        let a = root(10);
        cache.add(a.clone()).unwrap();
        assert_eq!(
            cache.add(sibling(&a, 10)),
            Err(CacheError::OutOfOrder {
                height: 10,
                head: 10
            })
        );
        assert!(cache.add(child(&a, 9)).is_err());
    }

    #[test]
    fn rejects_tipsets_off_the_head() {
        let mut cache = TipsetCache::new(3);
        let a = root(10);
        let b = child(&a, 11);
        cache.add(a.clone()).unwrap();
        cache.add(b.clone()).unwrap();
        assert_eq!(
            cache.add(sibling(&a, 12)),
            Err(CacheError::ParentMismatch {
                height: 12,
                head: b.key().clone(),
            })
        );
        // Skipped heights are null rounds, which are fine as long as the link holds.
        assert_eq!(cache.add(child(&b, 15)), Ok(None));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn revert_of_non_head_is_rejected() {
        let mut cache = TipsetCache::new(3);
        let a = root(10);
        let b = child(&a, 11);
        cache.add(a.clone()).unwrap();
        cache.add(b.clone()).unwrap();
        assert!(matches!(
            cache.revert(&a),
            Err(CacheError::RevertMismatch { .. })
        ));
        assert_eq!(cache.revert(&b), Ok(RevertOutcome::Unconfirmed));
        assert_eq!(cache.revert(&a), Ok(RevertOutcome::Unconfirmed));
        assert_eq!(cache.revert(&a), Ok(RevertOutcome::AlreadyConfirmed));
    }

    #[test]
    fn reorg_never_confirms_reverted_tipset() {
        let mut cache = TipsetCache::new(1);
        let a = root(10);
        let b = child(&a, 11);
        let b_prime = sibling(&a, 11);
        let c = child(&b_prime, 12);
        let mut confirmed = vec![];
        confirmed.extend(cache.add(a.clone()).unwrap());
        confirmed.extend(cache.add(b.clone()).unwrap());
        cache.revert(&b).unwrap();
        confirmed.extend(cache.add(b_prime.clone()).unwrap());
        confirmed.extend(cache.add(c).unwrap());
        assert_eq!(confirmed, vec![a, b_prime]);
    }

    #[test]
    fn zero_confidence_passes_through() {
        let mut cache = TipsetCache::new(0);
        let a = root(10);
        let b = child(&a, 11);
        let c = sibling(&a, 11);
        let mut confirmed = vec![];
        confirmed.extend(cache.add(a.clone()).unwrap());
        confirmed.extend(cache.add(b.clone()).unwrap());
        assert_eq!(cache.revert(&b), Ok(RevertOutcome::AlreadyConfirmed));
        confirmed.extend(cache.add(c.clone()).unwrap());
        assert_eq!(confirmed, vec![a, b, c]);
        assert!(cache.is_empty());
    }

    #[test]
    fn set_current_resets() {
        let mut cache = TipsetCache::new(2);
        let a = root(10);
        cache.add(a.clone()).unwrap();
        cache.add(child(&a, 11)).unwrap();
        cache.set_current(root(5));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.head().unwrap().epoch(), 5);
        assert_eq!(cache.drain().len(), 1);
    }

    /// Confirmed heights are strictly increasing for any sequence of adds and head reverts.
    #[quickcheck]
    fn confirmed_heights_increase(ops: Vec<(bool, u8)>, confidence: u8) -> bool {
        let mut cache = TipsetCache::new(usize::from(confidence % 5));
        let mut height = 0;
        let mut confirmed = vec![];
        for (revert, step) in ops {
            if revert {
                if let Some(head) = cache.head().cloned() {
                    cache.revert(&head).unwrap();
                }
            } else {
                height += ChainEpoch::from(step % 3) + 1;
                let next = match cache.head() {
                    Some(head) => child(head, height),
                    None => root(height),
                };
                if let Ok(Some(ts)) = cache.add(next) {
                    confirmed.push(ts.epoch());
                }
            }
        }
        confirmed.windows(2).all(|w| w[0] < w[1])
    }
}
