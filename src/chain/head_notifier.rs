// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::blocks::Tipset;
use crate::datasource::{DataSource, Error};

/// A change of the chain head, in the order the observer must apply it.
#[derive(Debug, Clone, PartialEq, Eq, strum::Display)]
pub enum HeadEvent {
    /// The head observers should resynchronise to.
    #[strum(to_string = "current")]
    Current(Tipset),
    #[strum(to_string = "apply")]
    Apply(Tipset),
    #[strum(to_string = "revert")]
    Revert(Tipset),
}

impl HeadEvent {
    pub fn tipset(&self) -> &Tipset {
        match self {
            Self::Current(ts) | Self::Apply(ts) | Self::Revert(ts) => ts,
        }
    }
}

/// Computes the events that move observers from `old` to `new` through their common ancestor:
/// reverts newest first, then applies oldest first.
///
/// Returns `None` when more than `max_depth` tipsets would change, in which case observers should
/// resynchronise with a [`HeadEvent::Current`].
pub async fn head_change(
    source: &dyn DataSource,
    old: &Tipset,
    new: &Tipset,
    max_depth: usize,
) -> Result<Option<Vec<HeadEvent>>, Error> {
    let mut reverts = vec![];
    let mut applies = vec![];
    let mut a = old.clone();
    let mut b = new.clone();
    while a.key() != b.key() {
        if reverts.len() + applies.len() > max_depth {
            return Ok(None);
        }
        if a.epoch() >= b.epoch() {
            let parent = source.tipset(a.parents()).await?;
            reverts.push(HeadEvent::Revert(std::mem::replace(&mut a, parent)));
        } else {
            let parent = source.tipset(b.parents()).await?;
            applies.push(HeadEvent::Apply(std::mem::replace(&mut b, parent)));
        }
    }
    if reverts.len() + applies.len() > max_depth {
        return Ok(None);
    }
    applies.reverse();
    reverts.extend(applies);
    Ok(Some(reverts))
}

/// Turns the node's head into a stream of [`HeadEvent`]s by polling it.
pub struct HeadNotifier {
    source: Arc<dyn DataSource>,
    interval: Duration,
    max_reorg_depth: usize,
}

impl HeadNotifier {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
    pub const DEFAULT_MAX_REORG_DEPTH: usize = 900;

    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self {
            source,
            interval: Self::DEFAULT_INTERVAL,
            max_reorg_depth: Self::DEFAULT_MAX_REORG_DEPTH,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_reorg_depth(mut self, depth: usize) -> Self {
        self.max_reorg_depth = depth;
        self
    }

    /// Sends events to `tx` until cancelled or until the receiver is dropped. The first event is
    /// always [`HeadEvent::Current`]. Sends block when the receiver lags behind, which stops
    /// polling until it catches up.
    pub async fn run(
        self,
        tx: flume::Sender<HeadEvent>,
        cancel: CancellationToken,
    ) -> Result<(), Error> {
        let mut last: Option<Tipset> = None;
        loop {
            match self.source.chain_head().await {
                Ok(head) => {
                    let events = match &last {
                        None => vec![HeadEvent::Current(head.clone())],
                        Some(prev) if prev.key() == head.key() => vec![],
                        Some(prev) => match head_change(
                            self.source.as_ref(),
                            prev,
                            &head,
                            self.max_reorg_depth,
                        )
                        .await
                        {
                            Ok(Some(events)) => events,
                            Ok(None) => {
                                info!(
                                    height = head.epoch(),
                                    max_depth = self.max_reorg_depth,
                                    "reorg too deep, resynchronising"
                                );
                                vec![HeadEvent::Current(head.clone())]
                            }
                            Err(e) => {
                                warn!(%e, "failed to compute head change");
                                vec![]
                            }
                        },
                    };
                    if !events.is_empty() {
                        last = Some(head);
                    }
                    for event in events {
                        debug!(kind = %event, height = event.tipset().epoch(), "head event");
                        tokio::select! {
                            sent = tx.send_async(event) => {
                                if sent.is_err() {
                                    return Ok(());
                                }
                            }
                            _ = cancel.cancelled() => return Ok(()),
                        }
                    }
                }
                Err(e) if e.is_retryable() => warn!(%e, "failed to poll chain head"),
                Err(e) => return Err(e),
            }
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = cancel.cancelled() => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::memory::{ChainBuilder, TipsetShape};

    #[tokio::test]
    async fn linear_advance_applies_in_order() {
        let mut builder = ChainBuilder::new();
        let old = builder.extend_to(2);
        let new = builder.extend_to(5);
        let source = builder.source();
        let events = head_change(source.as_ref(), &old, &new, 10)
            .await
            .unwrap()
            .unwrap();
        let heights: Vec<_> = events
            .iter()
            .map(|e| match e {
                HeadEvent::Apply(ts) => ts.epoch(),
                _ => panic!("unexpected {e:?}"),
            })
            .collect();
        assert_eq!(heights, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn reorg_reverts_then_applies() {
        let mut builder = ChainBuilder::new();
        let base = builder.extend_to(2);
        let a3 = builder.append(&base, 3, TipsetShape::default());
        let a4 = builder.append(&a3, 4, TipsetShape::default());
        let b3 = builder.append(&base, 3, TipsetShape::default());
        let b5 = builder.append(&b3, 5, TipsetShape::default());
        let source = builder.source();

        let events = head_change(source.as_ref(), &a4, &b5, 10)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            events,
            vec![
                HeadEvent::Revert(a4.clone()),
                HeadEvent::Revert(a3),
                HeadEvent::Apply(b3),
                HeadEvent::Apply(b5.clone()),
            ]
        );
        assert_eq!(head_change(source.as_ref(), &a4, &b5, 2).await.unwrap(), None);
    }

    #[tokio::test]
    async fn notifier_starts_with_current() {
        let mut builder = ChainBuilder::new();
        builder.extend_to(3);
        let source: Arc<dyn DataSource> = builder.source();
        let (tx, rx) = flume::bounded(4);
        let cancel = CancellationToken::new();
        let notifier = HeadNotifier::new(source).with_interval(Duration::from_millis(10));
        let task = tokio::spawn(notifier.run(tx, cancel.clone()));

        let first = rx.recv_async().await.unwrap();
        assert!(matches!(first, HeadEvent::Current(ref ts) if ts.epoch() == 3));
        builder.extend_to(5);
        let heights = [
            rx.recv_async().await.unwrap(),
            rx.recv_async().await.unwrap(),
        ]
        .map(|e| match e {
            HeadEvent::Apply(ts) => ts.epoch(),
            other => panic!("unexpected {other:?}"),
        });
        // Polling may observe height 4 and 5 separately or together; the order is fixed.
        assert_eq!(heights, [4, 5]);
        cancel.cancel();
        task.await.unwrap().unwrap();
    }
}
