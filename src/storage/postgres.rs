// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::str::FromStr as _;
use std::time::Instant;

use ahash::HashSet;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use itertools::Itertools as _;
use parking_lot::Mutex;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::query_builder::Separated;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use super::migrations::{self, latest_version};
use super::{Cell, Error, PostgresConfig, RangeLock, Storage, dedup_rows, upserts};
use crate::chain::HeightRange;
use crate::model::{ModelBatch, Table, TipsetBundle, Value};
use crate::shim::clock::{ChainEpoch, EPOCHS_IN_WEEK};

/// Postgres accepts at most this many bind parameters per statement.
const MAX_BIND_PARAMS: usize = u16::MAX as usize;
/// Advisory lock serializing partition creation across writers.
const PARTITION_LOCK: i64 = 0x6c69_6c79_0001;
/// Advisory lock class of gap jobs. Keys within it are week partition indices.
const GAP_LOCK_CLASS: i32 = 0x6c69_6c79;
/// Widest range, in partitions, a gap job may claim at once.
const MAX_LOCKED_PARTITIONS: i64 = 4096;

/// Connects a pool the way every Postgres consumer in the crate does.
pub async fn connect_pool(
    url: &str,
    schema: &str,
    application_name: &str,
    pool_size: u32,
) -> Result<PgPool, Error> {
    let options = PgConnectOptions::from_str(url)?
        .application_name(application_name)
        .options([("search_path", schema)]);
    Ok(PgPoolOptions::new()
        .max_connections(pool_size)
        .connect_with(options)
        .await?)
}

/// Reads the applied schema version; zero for an empty database.
pub async fn schema_version(pool: &PgPool) -> Result<u32, Error> {
    let exists: bool = sqlx::query_scalar("SELECT to_regclass('_meta') IS NOT NULL")
        .fetch_one(pool)
        .await?;
    if !exists {
        return Ok(0);
    }
    let version: Option<i32> = sqlx::query_scalar("SELECT max(version) FROM _meta")
        .fetch_one(pool)
        .await?;
    Ok(version.and_then(|v| u32::try_from(v).ok()).unwrap_or_default())
}

/// Moves the schema to version `to`, forwards or backwards, one migration per transaction.
pub async fn migrate(pool: &PgPool, schema: &str, to: u32) -> Result<u32, Error> {
    if to > latest_version() {
        return Err(Error::Other(format!(
            "unknown schema version {to}, the latest is {}",
            latest_version()
        )));
    }
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS \"{schema}\""))
        .execute(pool)
        .await?;
    sqlx::query("CREATE TABLE IF NOT EXISTS _meta (version integer PRIMARY KEY, applied_at timestamptz NOT NULL DEFAULT now())")
        .execute(pool)
        .await?;
    let from = schema_version(pool).await?;
    for (version, statements) in migrations::plan(from, to) {
        let now = Instant::now();
        let mut tx = pool.begin().await?;
        for statement in statements {
            sqlx::query(&statement).execute(tx.as_mut()).await?;
        }
        sqlx::query("DELETE FROM _meta WHERE version > $1")
            .bind(version as i32)
            .execute(tx.as_mut())
            .await?;
        if version > 0 {
            sqlx::query("INSERT INTO _meta (version) VALUES ($1) ON CONFLICT DO NOTHING")
                .bind(version as i32)
                .execute(tx.as_mut())
                .await?;
        }
        tx.commit().await?;
        tracing::info!(
            "Migrated database schema to version {version} in {}",
            humantime::format_duration(now.elapsed())
        );
    }
    Ok(to)
}

/// Postgres backed [`Storage`].
pub struct PostgresStorage {
    pool: PgPool,
    allow_upsert: bool,
    /// Partitions known to exist, as `(table, index)`.
    partitions: Mutex<HashSet<(&'static str, i64)>>,
}

impl PostgresStorage {
    /// Connects and checks the schema version, migrating first if allowed.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, Error> {
        let pool = connect_pool(
            &config.url,
            &config.schema,
            &config.application_name,
            config.pool_size,
        )
        .await?;
        let current = schema_version(&pool).await?;
        let required = latest_version();
        if current < required {
            if !config.allow_migrations {
                return Err(Error::SchemaVersion { current, required });
            }
            migrate(&pool, &config.schema, required).await?;
        }
        Ok(Self {
            pool,
            allow_upsert: config.allow_upsert,
            partitions: Mutex::new(HashSet::default()),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ensure_partitions(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        bundle: &TipsetBundle,
    ) -> Result<Vec<(&'static str, i64)>, Error> {
        let needed: Vec<(&'static str, i64)> = {
            let known = self.partitions.lock();
            bundle
                .batches
                .iter()
                .filter(|b| b.table.partitioned)
                .flat_map(|b| partition_indices(b).into_iter().map(|i| (b.table.name, i)))
                .filter(|p| !known.contains(p))
                .unique()
                .collect()
        };
        if needed.is_empty() {
            return Ok(needed);
        }
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(PARTITION_LOCK)
            .execute(tx.as_mut())
            .await?;
        for (table, index) in &needed {
            let from = index * EPOCHS_IN_WEEK;
            sqlx::query(&format!(
                "CREATE TABLE IF NOT EXISTS \"{table}_p{index}\" PARTITION OF \"{table}\" FOR VALUES FROM ({from}) TO ({})",
                from + EPOCHS_IN_WEEK
            ))
            .execute(tx.as_mut())
            .await?;
        }
        Ok(needed)
    }
}

/// Partitions spanned by the heights of a batch.
fn partition_indices(batch: &ModelBatch) -> Vec<i64> {
    let Some(column) = batch.table.index_of("height") else {
        return vec![];
    };
    batch
        .rows
        .iter()
        .filter_map(|row| row.get(column).and_then(Value::as_int))
        .map(|height| height.div_euclid(EPOCHS_IN_WEEK))
        .unique()
        .collect()
}

/// Gap lock keys covering `range`, one per week partition, ascending. Ranges that share a
/// partition contend even when their heights do not overlap.
fn gap_lock_keys(range: HeightRange) -> Result<Vec<i32>, Error> {
    let first = range.min.div_euclid(EPOCHS_IN_WEEK);
    let last = range.max.div_euclid(EPOCHS_IN_WEEK);
    if last - first >= MAX_LOCKED_PARTITIONS {
        return Err(Error::Other(format!(
            "heights {range} span more than {MAX_LOCKED_PARTITIONS} partitions"
        )));
    }
    Ok((first..=last)
        .map(|partition| i32::try_from(partition).unwrap_or(i32::MAX))
        .dedup()
        .collect())
}

fn push_value(builder: &mut Separated<'_, '_, Postgres, &'static str>, value: &Value) {
    match value {
        Value::Text(v) => {
            builder.push_bind(v.clone());
        }
        Value::Int(v) => {
            builder.push_bind(*v);
        }
        Value::Numeric(v) => {
            builder.push_bind(v.clone().map(|n| BigDecimal::new(n, 0)));
        }
        Value::Double(v) => {
            builder.push_bind(*v);
        }
        Value::Bool(v) => {
            builder.push_bind(*v);
        }
        Value::Json(v) => {
            builder.push_bind(v.clone());
        }
        Value::Timestamp(v) => {
            builder.push_bind(*v);
        }
    }
}

fn conflict_clause(table: &Table, upsert: bool) -> String {
    let key = table.primary_key.iter().map(|c| format!("\"{c}\"")).join(", ");
    let updates = table
        .column_names()
        .filter(|c| !table.is_key(c))
        .map(|c| format!("\"{c}\" = EXCLUDED.\"{c}\""))
        .join(", ");
    if upsert && !updates.is_empty() {
        format!(" ON CONFLICT ({key}) DO UPDATE SET {updates}")
    } else {
        format!(" ON CONFLICT ({key}) DO NOTHING")
    }
}

async fn insert_batch(
    tx: &mut Transaction<'_, Postgres>,
    batch: &ModelBatch,
    upsert: bool,
) -> Result<(), Error> {
    let table = batch.table;
    let columns = table.column_names().map(|c| format!("\"{c}\"")).join(", ");
    let conflict = conflict_clause(table, upsert);
    let rows_per_statement = (MAX_BIND_PARAMS / table.columns.len().max(1)).max(1);
    let rows = dedup_rows(table, &batch.rows, upsert)?;
    for chunk in rows.chunks(rows_per_statement) {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("INSERT INTO \"{}\" ({columns}) ", table.name));
        builder.push_values(chunk, |mut b, row| {
            for value in row.iter() {
                push_value(&mut b, value);
            }
        });
        builder.push(&conflict);
        builder.build().execute(tx.as_mut()).await?;
    }
    Ok(())
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn persist_batch(&self, bundle: TipsetBundle) -> Result<(), Error> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await?;
        let created = self.ensure_partitions(&mut tx, &bundle).await?;
        for batch in &bundle.batches {
            insert_batch(&mut tx, batch, upserts(batch.table, self.allow_upsert)).await?;
        }
        tx.commit().await?;
        self.partitions.lock().extend(created);
        tracing::debug!(
            rows = bundle.total_rows(),
            tables = bundle.batches.len(),
            elapsed = %humantime::format_duration(start.elapsed()),
            "persisted batch"
        );
        Ok(())
    }

    async fn find_gaps(&self, range: HeightRange, tasks: &[String]) -> Result<Vec<Cell>, Error> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            r#"
            WITH cells AS (
                SELECT h AS height, t AS task
                FROM generate_series($1::bigint, $2::bigint) AS h
                CROSS JOIN unnest($3::text[]) AS t
            ), latest AS (
                SELECT DISTINCT ON (height, task) height, task, status
                FROM processing_reports
                WHERE height BETWEEN $1 AND $2 AND task = ANY($3)
                ORDER BY height, task, completed_at DESC
            )
            SELECT c.height, c.task
            FROM cells c
            LEFT JOIN latest l USING (height, task)
            WHERE l.status IS NULL OR l.status NOT IN ('OK', 'INFO')
            ORDER BY c.height, c.task
            "#,
        )
        .bind(range.min)
        .bind(range.max)
        .bind(tasks)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn open_gaps(&self, range: HeightRange, tasks: &[String]) -> Result<Vec<Cell>, Error> {
        let rows: Vec<(ChainEpoch, String)> = sqlx::query_as(
            r#"
            SELECT height, task
            FROM gap_reports
            WHERE status = 'GAP'
              AND height BETWEEN $1 AND $2
              AND (cardinality($3::text[]) = 0 OR task = ANY($3))
            ORDER BY height, task
            "#,
        )
        .bind(range.min)
        .bind(range.max)
        .bind(tasks)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn lock_range(&self, range: HeightRange) -> Result<Box<dyn RangeLock>, Error> {
        let keys = gap_lock_keys(range)?;
        let conn = self.pool.acquire().await?;
        let mut lock = PostgresRangeLock {
            conn: Some(conn),
            keys: Vec::with_capacity(keys.len()),
        };
        for key in keys {
            let Some(conn) = lock.conn.as_mut() else {
                break;
            };
            let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1, $2)")
                .bind(GAP_LOCK_CLASS)
                .bind(key)
                .fetch_one(conn.as_mut())
                .await?;
            if !acquired {
                Box::new(lock).release().await?;
                return Err(Error::Locked(range));
            }
            lock.keys.push(key);
        }
        Ok(Box::new(lock))
    }
}

/// Session level advisory locks, held by keeping their connection out of the pool.
struct PostgresRangeLock {
    conn: Option<PoolConnection<Postgres>>,
    keys: Vec<i32>,
}

#[async_trait]
impl RangeLock for PostgresRangeLock {
    async fn release(mut self: Box<Self>) -> Result<(), Error> {
        if let Some(mut conn) = self.conn.take() {
            for key in self.keys.drain(..) {
                sqlx::query("SELECT pg_advisory_unlock($1, $2)")
                    .bind(GAP_LOCK_CLASS)
                    .bind(key)
                    .execute(conn.as_mut())
                    .await?;
            }
        }
        Ok(())
    }
}

impl Drop for PostgresRangeLock {
    fn drop(&mut self) {
        // Closing the session releases its advisory locks.
        if let Some(conn) = self.conn.take() {
            drop(conn.detach());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BLOCK_PARENTS, BlockParentRow, PROCESSING_REPORTS};

    #[test]
    fn conflict_clauses() {
        assert_eq!(
            conflict_clause(&BLOCK_PARENTS, true),
            " ON CONFLICT (\"height\", \"block\", \"parent\") DO NOTHING"
        );
        let upsert = conflict_clause(&PROCESSING_REPORTS, true);
        assert!(upsert.starts_with(" ON CONFLICT (\"height\", \"state_root\", \"task\") DO UPDATE SET"));
        assert!(upsert.contains("\"status\" = EXCLUDED.\"status\""));
        assert!(!upsert.contains("\"task\" = EXCLUDED"));
    }

    #[test]
    fn gap_locks_follow_partitions() {
        let range = |min, max| HeightRange::new(min, max).unwrap();
        assert_eq!(gap_lock_keys(range(0, 100)).unwrap(), vec![0]);
        assert_eq!(gap_lock_keys(range(20100, 40400)).unwrap(), vec![0, 1, 2]);

        let low = gap_lock_keys(range(0, 20159)).unwrap();
        let high = gap_lock_keys(range(20160, 50000)).unwrap();
        assert!(low.iter().all(|key| !high.contains(key)));

        let overlapping = gap_lock_keys(range(20000, 30000)).unwrap();
        assert!(overlapping.contains(&low[0]));
        assert!(overlapping.contains(&high[0]));

        assert!(gap_lock_keys(HeightRange::FULL).is_err());
    }

    #[test]
    fn partitions_by_week() {
        let batch = ModelBatch::from_rows([0, 20159, 20160, 50000].map(|height| BlockParentRow {
            height,
            block: "b".into(),
            parent: "p".into(),
        }));
        assert_eq!(partition_indices(&batch), vec![0, 1, 2]);
    }
}
