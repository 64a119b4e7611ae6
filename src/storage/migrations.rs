// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The schema, as an ordered list of reversible migrations.
//!
//! Table DDL is generated from the table descriptors in [`crate::model`]. The applied version is
//! recorded in `_meta`, one row per applied migration.

use itertools::Itertools as _;

use crate::model::{ALL_TABLES, Table};

pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    up: fn() -> Vec<String>,
    down: fn() -> Vec<String>,
}

impl Migration {
    pub fn up(&self) -> Vec<String> {
        (self.up)()
    }

    pub fn down(&self) -> Vec<String> {
        (self.down)()
    }
}

/// Name of the job queue table.
pub const QUEUE_TABLE: &str = "lily_queue";

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create model tables",
        up: || ALL_TABLES.iter().map(|t| create_table(t)).collect(),
        down: || {
            ALL_TABLES
                .iter()
                .rev()
                .map(|t| format!("DROP TABLE IF EXISTS \"{}\" CASCADE", t.name))
                .collect()
        },
    },
    Migration {
        version: 2,
        description: "index report ledgers by task",
        up: || {
            vec![
                "CREATE INDEX IF NOT EXISTS processing_reports_task_height_idx ON processing_reports (task, height)".into(),
                "CREATE INDEX IF NOT EXISTS gap_reports_status_height_idx ON gap_reports (status, height)".into(),
            ]
        },
        down: || {
            vec![
                "DROP INDEX IF EXISTS gap_reports_status_height_idx".into(),
                "DROP INDEX IF EXISTS processing_reports_task_height_idx".into(),
            ]
        },
    },
    Migration {
        version: 3,
        description: "create job queue",
        up: || {
            vec![
                format!(
                    "CREATE TABLE IF NOT EXISTS {QUEUE_TABLE} (
                        id bigserial PRIMARY KEY,
                        queue text NOT NULL,
                        payload jsonb NOT NULL,
                        fingerprint text,
                        state text NOT NULL DEFAULT 'pending',
                        attempts integer NOT NULL DEFAULT 0,
                        max_retry integer NOT NULL,
                        last_error text,
                        available_at timestamptz NOT NULL DEFAULT now(),
                        expires_at timestamptz,
                        created_at timestamptz NOT NULL DEFAULT now()
                    )"
                ),
                format!(
                    "CREATE UNIQUE INDEX IF NOT EXISTS {QUEUE_TABLE}_fingerprint_idx ON {QUEUE_TABLE} (queue, fingerprint) WHERE state IN ('pending', 'running')"
                ),
                format!(
                    "CREATE INDEX IF NOT EXISTS {QUEUE_TABLE}_pending_idx ON {QUEUE_TABLE} (queue, available_at) WHERE state = 'pending'"
                ),
            ]
        },
        down: || vec![format!("DROP TABLE IF EXISTS {QUEUE_TABLE}")],
    },
];

/// Version the code expects.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

pub fn create_table(table: &Table) -> String {
    let columns = table
        .columns
        .iter()
        .map(|c| {
            let not_null = if table.is_key(c.name) { " NOT NULL" } else { "" };
            format!("\"{}\" {}{not_null}", c.name, c.kind)
        })
        .join(", ");
    let key = table.primary_key.iter().map(|c| format!("\"{c}\"")).join(", ");
    let partition = if table.partitioned {
        " PARTITION BY RANGE (height)"
    } else {
        ""
    };
    format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" ({columns}, PRIMARY KEY ({key})){partition}",
        table.name
    )
}

/// Statements moving the schema from `from` to `to`, with the version each step lands on.
pub fn plan(from: u32, to: u32) -> Vec<(u32, Vec<String>)> {
    if to >= from {
        MIGRATIONS
            .iter()
            .filter(|m| m.version > from && m.version <= to)
            .map(|m| (m.version, m.up()))
            .collect()
    } else {
        MIGRATIONS
            .iter()
            .rev()
            .filter(|m| m.version <= from && m.version > to)
            .map(|m| (m.version - 1, m.down()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BLOCK_PARENTS, DRAND_BLOCK_ENTRIES};

    #[test]
    fn versions_are_sequential() {
        for (i, m) in MIGRATIONS.iter().enumerate() {
            assert_eq!(m.version as usize, i + 1, "{}", m.description);
        }
        assert_eq!(latest_version(), 3);
    }

    #[test]
    fn ddl_from_descriptors() {
        assert_eq!(
            create_table(&BLOCK_PARENTS),
            "CREATE TABLE IF NOT EXISTS \"block_parents\" (\"height\" bigint NOT NULL, \"block\" text NOT NULL, \"parent\" text NOT NULL, PRIMARY KEY (\"height\", \"block\", \"parent\")) PARTITION BY RANGE (height)"
        );
        assert!(!create_table(&DRAND_BLOCK_ENTRIES).contains("PARTITION"));
    }

    #[test]
    fn plans_run_both_ways() {
        let up: Vec<_> = plan(0, 3).into_iter().map(|(v, _)| v).collect();
        assert_eq!(up, vec![1, 2, 3]);
        let down: Vec<_> = plan(3, 1).into_iter().map(|(v, _)| v).collect();
        assert_eq!(down, vec![2, 1]);
        assert!(plan(2, 2).is_empty());
    }
}
