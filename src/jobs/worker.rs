// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::executed_parent;
use crate::datasource::DataSource;
use crate::indexer::Indexer;
use crate::model::ReportStatus;
use crate::queue::{Handler, IndexTipset, Queue, consume};
use crate::schedule::Runnable;
use crate::tasks::parse_tasks;

/// Indexes tipsets published to a queue by notify-mode jobs.
pub struct TipsetWorker {
    queue: Arc<dyn Queue>,
    name: String,
    concurrency: usize,
    handler: Arc<IndexHandler>,
}

impl TipsetWorker {
    pub fn new(
        source: Arc<dyn DataSource>,
        indexer: Arc<Indexer>,
        queue: Arc<dyn Queue>,
        name: impl Into<String>,
        concurrency: usize,
    ) -> Self {
        Self {
            queue,
            name: name.into(),
            concurrency,
            handler: Arc::new(IndexHandler { source, indexer }),
        }
    }
}

struct IndexHandler {
    source: Arc<dyn DataSource>,
    indexer: Arc<Indexer>,
}

#[async_trait]
impl Handler for IndexHandler {
    async fn handle(&self, payload: IndexTipset, cancel: &CancellationToken) -> anyhow::Result<()> {
        let tasks = parse_tasks(&payload.tasks)?;
        let current = self
            .source
            .tipset(&payload.tipset)
            .await
            .with_context(|| format!("failed to load tipset at {}", payload.height))?;
        let executed = executed_parent(self.source.as_ref(), &current).await?;
        let report = self
            .indexer
            .index(&current, &executed, &tasks, cancel)
            .await?;
        let errors = report.count(ReportStatus::Error);
        // Failed tasks are retried through the queue; the report rows record each attempt.
        anyhow::ensure!(
            errors == 0,
            "{errors} tasks failed at height {}",
            payload.height
        );
        Ok(())
    }
}

#[async_trait]
impl Runnable for TipsetWorker {
    async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        info!(queue = %self.name, concurrency = self.concurrency, "tipset worker started");
        consume(
            self.queue.clone(),
            &self.name,
            self.concurrency,
            self.handler.clone(),
            cancel,
        )
        .await;
        Ok(())
    }
}
