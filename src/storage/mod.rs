// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Where indexed rows go.
//!
//! A [`Storage`] persists one [`TipsetBundle`] per call, atomically, and answers the read queries
//! gap detection needs. [`postgres::PostgresStorage`] is the production backend;
//! [`memory::MemoryStorage`] keeps everything in process.

mod catalog;
pub mod memory;
pub mod migrations;
pub mod postgres;

use std::collections::hash_map::Entry;

use ahash::HashMap;
use async_trait::async_trait;

pub use catalog::{Catalog, MemoryStorageConfig, PostgresConfig, StorageConfig};

use crate::chain::HeightRange;
use crate::model::{GAP_REPORTS, PROCESSING_REPORTS, Table, TipsetBundle, Value};
use crate::shim::clock::ChainEpoch;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(
        "database schema is at version {current} but version {required} is required; run `lily migrate --latest` or set allow_migrations"
    )]
    SchemaVersion { current: u32, required: u32 },
    #[error("heights {0} are locked by another gap job")]
    Locked(HeightRange),
    #[error("no storage named {0:?} is configured")]
    UnknownStorage(String),
    #[error("invalid row for table {table}: {reason}")]
    InvalidRow { table: &'static str, reason: String },
    #[error("{0}")]
    Other(String),
}

/// A `(height, task)` cell of the report ledger.
pub type Cell = (ChainEpoch, String);

/// Exclusive claim on a height range for gap finding and filling.
#[async_trait]
pub trait RangeLock: Send {
    async fn release(self: Box<Self>) -> Result<(), Error>;
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Writes every row of the bundle in a single transaction.
    async fn persist_batch(&self, bundle: TipsetBundle) -> Result<(), Error>;

    /// Cells in `range × tasks` whose most recent report is missing or does not count as indexed.
    async fn find_gaps(&self, range: HeightRange, tasks: &[String]) -> Result<Vec<Cell>, Error>;

    /// Cells with an open `GAP` row in `range`, limited to `tasks` unless it is empty.
    async fn open_gaps(&self, range: HeightRange, tasks: &[String]) -> Result<Vec<Cell>, Error>;

    /// Claims `range` for gap work. Fails with [`Error::Locked`] if another claim holds it.
    async fn lock_range(&self, range: HeightRange) -> Result<Box<dyn RangeLock>, Error>;
}

/// Report tables always take the latest row; data tables keep the first unless upserts are
/// enabled.
fn upserts(table: &Table, allow_upsert: bool) -> bool {
    allow_upsert || *table == PROCESSING_REPORTS || *table == GAP_REPORTS
}

fn column(table: &Table, name: &str) -> Result<usize, Error> {
    table.index_of(name).ok_or_else(|| Error::InvalidRow {
        table: table.name,
        reason: format!("no column {name}"),
    })
}

/// The primary key values of `row`, rendered so equal keys compare equal.
fn row_key(table: &Table, row: &[Value]) -> Result<String, Error> {
    let mut key = Vec::with_capacity(table.primary_key.len());
    for name in table.primary_key {
        let value = row.get(column(table, name)?).ok_or_else(|| Error::InvalidRow {
            table: table.name,
            reason: format!("missing value for {name}"),
        })?;
        key.push(format!("{value:?}"));
    }
    Ok(key.join("/"))
}

/// Collapses rows that share a primary key to one, the last of them when `keep_last` is set and
/// the first otherwise. Rows keep the position their key was first seen at.
///
/// Postgres rejects an `ON CONFLICT DO UPDATE` statement that touches the same key twice.
fn dedup_rows<'a>(
    table: &Table,
    rows: &'a [Vec<Value>],
    keep_last: bool,
) -> Result<Vec<&'a [Value]>, Error> {
    let mut slots: HashMap<String, usize> = HashMap::default();
    let mut kept: Vec<&'a [Value]> = Vec::with_capacity(rows.len());
    for row in rows {
        match slots.entry(row_key(table, row)?) {
            Entry::Occupied(slot) => {
                if keep_last {
                    kept[*slot.get()] = row.as_slice();
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(kept.len());
                kept.push(row.as_slice());
            }
        }
    }
    Ok(kept)
}
