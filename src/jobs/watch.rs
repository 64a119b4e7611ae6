// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{Dispatcher, Watermark, WorkItem, executed_parent, join_workers, spawn_workers};
use crate::chain::{HeadEvent, HeadNotifier, RevertOutcome, TipsetCache};
use crate::datasource::DataSource;
use crate::model::ReportStatus;
use crate::schedule::Runnable;
use crate::tasks::Task;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Depth a tipset must reach before it is indexed.
    pub confidence: usize,
    pub workers: usize,
    /// Capacity of the queue between the head stream and the workers.
    pub buffer: usize,
    /// Record tipsets more than `workers * buffer` epochs behind the head as skipped instead of
    /// indexing them.
    pub watermark_skip: bool,
    pub poll_interval: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            confidence: 10,
            workers: 2,
            buffer: 5,
            watermark_skip: false,
            poll_interval: HeadNotifier::DEFAULT_INTERVAL,
        }
    }
}

/// Follows the chain head and indexes tipsets once they are `confidence` deep.
pub struct Watcher {
    source: Arc<dyn DataSource>,
    dispatcher: Arc<Dispatcher>,
    tasks: Arc<[Task]>,
    config: WatchConfig,
}

impl Watcher {
    pub fn new(
        source: Arc<dyn DataSource>,
        dispatcher: Arc<Dispatcher>,
        tasks: &[Task],
        config: WatchConfig,
    ) -> Self {
        Self {
            source,
            dispatcher,
            tasks: tasks.into(),
            config,
        }
    }

    /// Consumes head events until the stream ends or `cancel` fires, then drains the workers.
    pub(crate) async fn follow(
        &self,
        events: flume::Receiver<HeadEvent>,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        let stop = cancel.child_token();
        let (tx, rx) = flume::bounded(self.config.buffer.max(1));
        let watermark = self.config.watermark_skip.then(|| {
            Watermark::new(
                i64::try_from(self.config.workers * self.config.buffer).unwrap_or(i64::MAX),
            )
        });
        let workers = spawn_workers(
            self.config.workers,
            rx,
            self.dispatcher.clone(),
            self.tasks.clone(),
            watermark.clone(),
            stop.clone(),
        );
        let mut cache = TipsetCache::new(self.config.confidence);
        let driven = self.drive(&mut cache, events, tx, watermark, &stop).await;
        if driven.is_err() {
            stop.cancel();
        }
        let joined = join_workers(workers).await;
        driven.and(joined)
    }

    async fn drive(
        &self,
        cache: &mut TipsetCache,
        events: flume::Receiver<HeadEvent>,
        tx: flume::Sender<WorkItem>,
        watermark: Option<Watermark>,
        stop: &CancellationToken,
    ) -> anyhow::Result<()> {
        loop {
            let event = tokio::select! {
                event = events.recv_async() => match event {
                    Ok(event) => event,
                    Err(_) => return Ok(()),
                },
                _ = stop.cancelled() => return Ok(()),
            };
            debug!(kind = %event, height = event.tipset().epoch(), "watcher received head event");
            if let Some(watermark) = &watermark {
                watermark.observe(event.tipset().epoch());
            }
            let confirmed = match event {
                HeadEvent::Current(ts) if cache.confidence() == 0 => Some(ts),
                HeadEvent::Current(ts) => {
                    cache.set_current(ts);
                    None
                }
                HeadEvent::Apply(ts) => cache.add(ts)?,
                HeadEvent::Revert(ts) => {
                    if cache.revert(&ts)? == RevertOutcome::AlreadyConfirmed {
                        info!(height = ts.epoch(), "reverting confirmed tipset");
                        self.dispatcher
                            .record(&ts, &self.tasks, ReportStatus::Reverted, "reverted by reorg")
                            .await?;
                    }
                    None
                }
            };
            let Some(current) = confirmed else {
                continue;
            };
            let executed = executed_parent(self.source.as_ref(), &current).await?;
            tokio::select! {
                sent = tx.send_async(WorkItem { current, executed }) => {
                    if sent.is_err() {
                        return Ok(());
                    }
                }
                _ = stop.cancelled() => return Ok(()),
            }
        }
    }
}

#[async_trait]
impl Runnable for Watcher {
    async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        let (tx, rx) = flume::bounded(self.config.buffer.max(1));
        let notifier_cancel = cancel.child_token();
        let notifier = tokio::spawn(
            HeadNotifier::new(self.source.clone())
                .with_interval(self.config.poll_interval)
                .run(tx, notifier_cancel.clone()),
        );
        let followed = self.follow(rx, cancel).await;
        notifier_cancel.cancel();
        notifier.await??;
        followed
    }
}
