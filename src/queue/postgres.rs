// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;

use super::{
    Delivery, Error, IndexTipset, PostgresQueueConfig, PublishOptions, Queue, Rejection,
    retry_delay,
};
use crate::storage;
use crate::storage::migrations::QUEUE_TABLE;
use crate::storage::postgres::{connect_pool, schema_version};

/// Schema version that introduced the queue table.
const QUEUE_SCHEMA_VERSION: u32 = 3;

/// A queue stored in the indexer's database. Consumers claim rows with `FOR UPDATE SKIP LOCKED`
/// so any number of workers can share a queue.
pub struct PostgresQueue {
    pool: PgPool,
    poll_interval: Duration,
}

fn to_i32(n: u32) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

impl PostgresQueue {
    pub async fn connect(config: &PostgresQueueConfig) -> Result<Self, Error> {
        let pool = connect_pool(&config.url, &config.schema, "lily-queue", 4).await?;
        let current = schema_version(&pool).await?;
        if current < QUEUE_SCHEMA_VERSION {
            return Err(storage::Error::SchemaVersion {
                current,
                required: QUEUE_SCHEMA_VERSION,
            }
            .into());
        }
        Ok(Self {
            pool,
            poll_interval: config.poll_interval,
        })
    }
}

#[async_trait]
impl Queue for PostgresQueue {
    async fn publish(
        &self,
        queue: &str,
        payload: &IndexTipset,
        opts: &PublishOptions,
    ) -> Result<bool, Error> {
        let ttl = opts
            .ttl
            .map(|ttl| i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX));
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO {QUEUE_TABLE} (queue, payload, fingerprint, max_retry, expires_at)
            VALUES ($1, $2, $3, $4, CASE WHEN $5::bigint IS NULL THEN NULL ELSE now() + make_interval(secs => $5::bigint) END)
            ON CONFLICT (queue, fingerprint) WHERE state IN ('pending', 'running') DO NOTHING
            "#
        ))
        .bind(queue)
        .bind(Json(payload))
        .bind(opts.unique.then(|| payload.fingerprint()))
        .bind(to_i32(opts.max_retry.max(1)))
        .bind(ttl)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn claim(&self, queue: &str) -> Result<Option<Delivery>, Error> {
        let row: Option<(i64, Json<IndexTipset>, i32, i32)> = sqlx::query_as(&format!(
            r#"
            UPDATE {QUEUE_TABLE} SET state = 'running', attempts = attempts + 1
            WHERE id = (
                SELECT id FROM {QUEUE_TABLE}
                WHERE queue = $1
                  AND state = 'pending'
                  AND available_at <= now()
                  AND (expires_at IS NULL OR expires_at > now())
                ORDER BY id
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING id, payload, attempts, max_retry
            "#
        ))
        .bind(queue)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, Json(payload), attempts, max_retry)| Delivery {
            id,
            payload,
            attempt: u32::try_from(attempts).unwrap_or_default(),
            max_retry: u32::try_from(max_retry).unwrap_or_default(),
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), Error> {
        sqlx::query(&format!(
            "UPDATE {QUEUE_TABLE} SET state = 'done' WHERE id = $1"
        ))
        .bind(delivery.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reject(&self, delivery: &Delivery, error: &str) -> Result<Rejection, Error> {
        let delay = i64::try_from(retry_delay(delivery.attempt).as_secs()).unwrap_or(i64::MAX);
        let state: Option<String> = sqlx::query_scalar(&format!(
            r#"
            UPDATE {QUEUE_TABLE}
            SET state = CASE WHEN attempts >= max_retry THEN 'dead' ELSE 'pending' END,
                available_at = now() + make_interval(secs => $2::bigint),
                last_error = $3
            WHERE id = $1
            RETURNING state
            "#
        ))
        .bind(delivery.id)
        .bind(delay)
        .bind(error)
        .fetch_optional(&self.pool)
        .await?;
        Ok(match state.as_deref() {
            Some("pending") => Rejection::Requeued,
            _ => Rejection::DeadLettered,
        })
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}
