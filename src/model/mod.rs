// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Persistable rows and the descriptors of the tables they land in.

mod report;
pub mod tables;
mod value;

use std::fmt;

pub use report::{GapStatus, ReportStatus};
pub use tables::*;
pub use value::{ColumnType, ColumnValue, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnType,
}

/// Static description of a table.
#[derive(Debug, PartialEq, Eq)]
pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub primary_key: &'static [&'static str],
    /// Range partitioned by `height`.
    pub partitioned: bool,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Position of a column within [`Table::columns`].
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }

    pub fn is_key(&self, column: &str) -> bool {
        self.primary_key.contains(&column)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A typed row of a known table.
pub trait Row: Sized {
    const TABLE: &'static Table;

    /// Cell values in [`Table::columns`] order.
    fn into_values(self) -> Vec<Value>;
}

/// Rows destined for a single table.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelBatch {
    pub table: &'static Table,
    pub rows: Vec<Vec<Value>>,
}

impl ModelBatch {
    pub fn from_rows<R: Row>(rows: impl IntoIterator<Item = R>) -> Self {
        Self {
            table: R::TABLE,
            rows: rows.into_iter().map(Row::into_values).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Everything produced for one tipset: data rows grouped by table, plus the report ledger rows.
///
/// A bundle is the unit of atomic persistence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TipsetBundle {
    pub batches: Vec<ModelBatch>,
}

impl TipsetBundle {
    pub fn push(&mut self, batch: ModelBatch) {
        if batch.is_empty() {
            return;
        }
        match self.batches.iter_mut().find(|b| b.table == batch.table) {
            Some(existing) => existing.rows.extend(batch.rows),
            None => self.batches.push(batch),
        }
    }

    pub fn push_rows<R: Row>(&mut self, rows: impl IntoIterator<Item = R>) {
        self.push(ModelBatch::from_rows(rows));
    }

    pub fn extend(&mut self, other: TipsetBundle) {
        for batch in other.batches {
            self.push(batch);
        }
    }

    /// Number of rows destined for `table`.
    pub fn count(&self, table: &str) -> usize {
        self.batches
            .iter()
            .filter(|b| b.table.name == table)
            .map(ModelBatch::len)
            .sum()
    }

    pub fn total_rows(&self) -> usize {
        self.batches.iter().map(ModelBatch::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}
