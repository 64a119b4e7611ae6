// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::{Delivery, Error, IndexTipset, PublishOptions, Queue, Rejection, retry_delay};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Pending,
    Running,
    Done,
    Dead,
}

#[derive(Debug, Clone)]
struct Entry {
    queue: String,
    payload: IndexTipset,
    fingerprint: Option<String>,
    state: State,
    attempts: u32,
    max_retry: u32,
    last_error: Option<String>,
    available_at: Instant,
    expires_at: Option<Instant>,
}

/// An in-process queue with the same delivery rules as the Postgres queue.
pub struct MemoryQueue {
    entries: Mutex<BTreeMap<i64, Entry>>,
    poll_interval: Duration,
    retry_delay: Option<Duration>,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            poll_interval: Duration::from_millis(100),
            retry_delay: None,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Overrides the growing retry delay with a fixed one.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Requests waiting to be claimed in `queue`.
    pub fn pending(&self, queue: &str) -> usize {
        self.count(queue, State::Pending)
    }

    /// Requests in `queue` that exhausted their retries.
    pub fn dead_lettered(&self, queue: &str) -> Vec<(IndexTipset, Option<String>)> {
        self.entries
            .lock()
            .values()
            .filter(|e| e.queue == queue && e.state == State::Dead)
            .map(|e| (e.payload.clone(), e.last_error.clone()))
            .collect()
    }

    fn count(&self, queue: &str, state: State) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|e| e.queue == queue && e.state == state)
            .count()
    }
}

#[async_trait]
impl Queue for MemoryQueue {
    async fn publish(
        &self,
        queue: &str,
        payload: &IndexTipset,
        opts: &PublishOptions,
    ) -> Result<bool, Error> {
        let fingerprint = opts.unique.then(|| payload.fingerprint());
        let mut entries = self.entries.lock();
        if fingerprint.is_some()
            && entries.values().any(|e| {
                e.queue == queue
                    && e.fingerprint == fingerprint
                    && matches!(e.state, State::Pending | State::Running)
            })
        {
            return Ok(false);
        }
        let id = entries.last_key_value().map_or(1, |(id, _)| id + 1);
        let now = Instant::now();
        entries.insert(
            id,
            Entry {
                queue: queue.to_owned(),
                payload: payload.clone(),
                fingerprint,
                state: State::Pending,
                attempts: 0,
                max_retry: opts.max_retry.max(1),
                last_error: None,
                available_at: now,
                expires_at: opts.ttl.map(|ttl| now + ttl),
            },
        );
        Ok(true)
    }

    async fn claim(&self, queue: &str) -> Result<Option<Delivery>, Error> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let claimed = entries.iter_mut().find(|(_, e)| {
            e.queue == queue
                && e.state == State::Pending
                && e.available_at <= now
                && e.expires_at.is_none_or(|at| at > now)
        });
        Ok(claimed.map(|(id, entry)| {
            entry.state = State::Running;
            entry.attempts += 1;
            Delivery {
                id: *id,
                payload: entry.payload.clone(),
                attempt: entry.attempts,
                max_retry: entry.max_retry,
            }
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), Error> {
        if let Some(entry) = self.entries.lock().get_mut(&delivery.id) {
            entry.state = State::Done;
        }
        Ok(())
    }

    async fn reject(&self, delivery: &Delivery, error: &str) -> Result<Rejection, Error> {
        let delay = self
            .retry_delay
            .unwrap_or_else(|| retry_delay(delivery.attempt));
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(&delivery.id) else {
            return Ok(Rejection::DeadLettered);
        };
        entry.last_error = Some(error.to_owned());
        if entry.attempts >= entry.max_retry {
            entry.state = State::Dead;
            return Ok(Rejection::DeadLettered);
        }
        entry.state = State::Pending;
        entry.available_at = Instant::now() + delay;
        Ok(Rejection::Requeued)
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::memory::ChainBuilder;
    use crate::tasks::Task;

    fn payload(height: i64) -> IndexTipset {
        let mut builder = ChainBuilder::new();
        IndexTipset::new(&builder.extend_to(height), &[Task::BlockHeader], "test")
    }

    #[tokio::test]
    async fn deduplicates_outstanding_work() {
        let queue = MemoryQueue::new();
        let opts = PublishOptions::default();
        assert!(queue.publish("q", &payload(1), &opts).await.unwrap());
        assert!(!queue.publish("q", &payload(1), &opts).await.unwrap());
        assert!(queue.publish("other", &payload(1), &opts).await.unwrap());
        assert_eq!(queue.pending("q"), 1);

        let delivery = queue.claim("q").await.unwrap().unwrap();
        assert!(!queue.publish("q", &payload(1), &opts).await.unwrap());
        queue.ack(&delivery).await.unwrap();
        assert!(queue.publish("q", &payload(1), &opts).await.unwrap());
    }

    #[tokio::test]
    async fn dead_letters_after_retries() {
        let queue = MemoryQueue::new().with_retry_delay(Duration::ZERO);
        let opts = PublishOptions {
            max_retry: 2,
            ..Default::default()
        };
        queue.publish("q", &payload(1), &opts).await.unwrap();

        let first = queue.claim("q").await.unwrap().unwrap();
        assert_eq!(first.attempt, 1);
        assert!(queue.claim("q").await.unwrap().is_none());
        assert_eq!(queue.reject(&first, "boom").await.unwrap(), Rejection::Requeued);

        let second = queue.claim("q").await.unwrap().unwrap();
        assert!(second.is_last_attempt());
        assert_eq!(
            queue.reject(&second, "boom again").await.unwrap(),
            Rejection::DeadLettered
        );
        assert!(queue.claim("q").await.unwrap().is_none());
        let dead = queue.dead_lettered("q");
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].1.as_deref(), Some("boom again"));
    }

    #[tokio::test]
    async fn expired_work_is_not_claimed() {
        let queue = MemoryQueue::new();
        let opts = PublishOptions {
            ttl: Some(Duration::from_millis(10)),
            ..Default::default()
        };
        queue.publish("q", &payload(1), &opts).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(queue.claim("q").await.unwrap().is_none());
    }
}
