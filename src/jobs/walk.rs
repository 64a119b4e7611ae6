// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{Dispatcher, WorkItem, executed_parent, join_workers, spawn_workers};
use crate::chain::{HeightRange, ResolveNullTipset, tipset_by_height};
use crate::datasource::DataSource;
use crate::schedule::Runnable;
use crate::tasks::Task;

/// Indexes every tipset in a height range, walking parent links down from the top of the range.
pub struct Walker {
    source: Arc<dyn DataSource>,
    dispatcher: Arc<Dispatcher>,
    tasks: Arc<[Task]>,
    range: HeightRange,
    workers: usize,
}

impl Walker {
    pub fn new(
        source: Arc<dyn DataSource>,
        dispatcher: Arc<Dispatcher>,
        tasks: &[Task],
        range: HeightRange,
        workers: usize,
    ) -> Self {
        Self {
            source,
            dispatcher,
            tasks: tasks.into(),
            range,
            workers,
        }
    }

    async fn walk(
        &self,
        tx: flume::Sender<WorkItem>,
        stop: &CancellationToken,
    ) -> anyhow::Result<usize> {
        let head = self.source.chain_head().await.context("failed to read chain head")?;
        anyhow::ensure!(
            self.range.min <= head.epoch(),
            "cannot walk {} beyond the chain head at {}",
            self.range,
            head.epoch()
        );
        let top = self.range.max.min(head.epoch());
        let mut current = tipset_by_height(
            self.source.as_ref(),
            top,
            &head,
            ResolveNullTipset::TakeOlder,
        )
        .await
        .with_context(|| format!("failed to resolve tipset at {top}"))?;

        // The top of the range falls in null rounds, which only the newer tipset can describe.
        if current.epoch() < top {
            let newer = tipset_by_height(
                self.source.as_ref(),
                top,
                &head,
                ResolveNullTipset::TakeNewer,
            )
            .await
            .with_context(|| format!("failed to resolve tipset after {top}"))?;
            let heights = HeightRange::new((current.epoch() + 1).max(self.range.min), top)?;
            self.dispatcher
                .deliver_null_rounds(&newer, &current, heights, &self.tasks)
                .await?;
        }

        let mut visited = 0;
        while current.epoch() >= self.range.min {
            let executed = executed_parent(self.source.as_ref(), &current).await?;
            let is_genesis = executed == current;
            let item = WorkItem {
                current,
                executed: executed.clone(),
            };
            tokio::select! {
                sent = tx.send_async(item) => {
                    if sent.is_err() {
                        break;
                    }
                }
                _ = stop.cancelled() => break,
            }
            visited += 1;
            if is_genesis {
                break;
            }
            current = executed;
        }
        Ok(visited)
    }
}

#[async_trait]
impl Runnable for Walker {
    async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        info!(range = %self.range, workers = self.workers, "walking chain");
        let stop = cancel.child_token();
        let (tx, rx) = flume::bounded(self.workers.max(1));
        let workers = spawn_workers(
            self.workers,
            rx,
            self.dispatcher.clone(),
            self.tasks.clone(),
            None,
            stop.clone(),
        );
        let walked = self.walk(tx, &stop).await;
        if walked.is_err() {
            stop.cancel();
        }
        let joined = join_workers(workers).await;
        let visited = walked?;
        joined?;
        info!(range = %self.range, tipsets = visited, "walk complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::super::testing::dispatcher;
    use super::*;
    use crate::datasource::memory::{ChainBuilder, FailurePoint};
    use crate::model::ReportStatus;
    use crate::storage::memory::MemoryStorage;

    fn range(min: i64, max: i64) -> HeightRange {
        HeightRange::new(min, max).unwrap()
    }

    fn ledger(storage: &MemoryStorage) -> Vec<(i64, String, ReportStatus)> {
        let mut ledger: Vec<_> = storage
            .reports()
            .unwrap()
            .into_iter()
            .map(|r| (r.height, r.task, r.status))
            .collect();
        ledger.sort();
        ledger
    }

    #[tokio::test]
    async fn walks_every_height() {
        let mut builder = ChainBuilder::new();
        builder.extend_to(10);
        let (dispatcher, storage) = dispatcher(&builder);
        let tasks = [Task::BlockHeader, Task::Message, Task::ChainConsensus];
        let walker = Walker::new(builder.source(), dispatcher, &tasks, range(0, 10), 3);
        walker.run(CancellationToken::new()).await.unwrap();

        let ledger = ledger(&storage);
        // Genesis has no parent execution, so `message` is informational there.
        assert_eq!(ledger.len(), 11 * tasks.len());
        assert!(ledger.iter().all(|(_, _, s)| s.is_complete()));
        for height in 0..=10 {
            let blocks = if height == 0 { 1 } else { 2 };
            assert_eq!(storage.count_at("block_headers", height), blocks);
            assert_eq!(storage.count_at("chain_consensus", height), 1);
        }
    }

    #[tokio::test]
    async fn walking_twice_is_idempotent() {
        let mut builder = ChainBuilder::new();
        builder.extend_to(5);
        let (dispatcher, storage) = dispatcher(&builder);
        let walker = Walker::new(
            builder.source(),
            dispatcher,
            &[Task::BlockHeader, Task::Receipt],
            range(1, 5),
            2,
        );
        walker.run(CancellationToken::new()).await.unwrap();
        let headers = storage.count("block_headers");
        let receipts = storage.count("receipts");
        walker.run(CancellationToken::new()).await.unwrap();
        assert_eq!(storage.count("block_headers"), headers);
        assert_eq!(storage.count("receipts"), receipts);
        assert_eq!(storage.count("processing_reports"), 10);
    }

    #[tokio::test]
    async fn null_rounds_are_covered() {
        let mut builder = ChainBuilder::new();
        builder.extend_to(3);
        builder.push(6);
        builder.extend_to(8);
        let (dispatcher, storage) = dispatcher(&builder);
        let walker = Walker::new(
            builder.source(),
            dispatcher,
            &[Task::ChainConsensus],
            range(2, 8),
            2,
        );
        walker.run(CancellationToken::new()).await.unwrap();

        let heights: Vec<_> = ledger(&storage).into_iter().map(|(h, _, _)| h).collect();
        assert_eq!(heights, (2..=8).collect::<Vec<_>>());
        for height in 2..=8 {
            assert_eq!(storage.count_at("chain_consensus", height), 1);
        }
    }

    #[tokio::test]
    async fn range_ending_in_null_rounds_is_covered() {
        let mut builder = ChainBuilder::new();
        builder.extend_to(3);
        builder.push(6);
        builder.extend_to(8);
        let (dispatcher, storage) = dispatcher(&builder);
        let walker = Walker::new(
            builder.source(),
            dispatcher,
            &[Task::ChainConsensus],
            range(2, 4),
            2,
        );
        walker.run(CancellationToken::new()).await.unwrap();

        let heights: Vec<_> = ledger(&storage).into_iter().map(|(h, _, _)| h).collect();
        assert_eq!(heights, vec![2, 3, 4]);
        for height in 2..=4 {
            assert_eq!(storage.count_at("chain_consensus", height), 1);
        }
        // The tipset at 6 lies outside the range and is left alone.
        assert_eq!(storage.count_at("chain_consensus", 5), 0);
        assert_eq!(storage.count_at("chain_consensus", 6), 0);
    }

    #[tokio::test]
    async fn range_inside_null_rounds_is_covered() {
        let mut builder = ChainBuilder::new();
        builder.extend_to(3);
        builder.push(7);
        let (dispatcher, storage) = dispatcher(&builder);
        let walker = Walker::new(
            builder.source(),
            dispatcher,
            &[Task::ChainConsensus, Task::BlockHeader],
            range(5, 6),
            1,
        );
        walker.run(CancellationToken::new()).await.unwrap();

        let ledger = ledger(&storage);
        assert_eq!(ledger.len(), 4);
        assert!(ledger.iter().all(|(_, _, s)| *s == ReportStatus::Info));
        assert_eq!(storage.count("chain_consensus"), 2);
        assert_eq!(storage.count("block_headers"), 0);
    }

    #[tokio::test]
    async fn failing_task_does_not_stop_the_walk() {
        let mut builder = ChainBuilder::new();
        builder.extend_to(10);
        builder
            .source()
            .inject_failure(FailurePoint::BlockMessages, 4);
        let (dispatcher, storage) = dispatcher(&builder);
        let tasks = [Task::BlockHeader, Task::Message];
        let walker = Walker::new(builder.source(), dispatcher, &tasks, range(0, 10), 4);
        walker.run(CancellationToken::new()).await.unwrap();

        let errors: Vec<_> = ledger(&storage)
            .into_iter()
            .filter(|(_, _, s)| *s == ReportStatus::Error)
            .collect();
        // Messages of the blocks at height 4 are read when indexing height 5.
        assert_eq!(errors, vec![(5, "message".to_owned(), ReportStatus::Error)]);
        assert_eq!(storage.count_at("messages", 4), 0);
        assert_eq!(storage.count_at("messages", 3), 4);
        assert_eq!(storage.count("processing_reports"), 22);
    }

    #[tokio::test]
    async fn rejects_ranges_above_the_head() {
        let mut builder = ChainBuilder::new();
        builder.extend_to(3);
        let (dispatcher, _) = dispatcher(&builder);
        let walker = Walker::new(builder.source(), dispatcher, &[Task::BlockHeader], range(5, 9), 1);
        assert!(walker.run(CancellationToken::new()).await.is_err());
    }
}
