// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Row types of every table the indexer writes.
//!
//! Each row struct is declared once through [`define_tables!`], which derives the table
//! descriptor (column names and types, primary key) from the struct fields so the schema and
//! the insert statements can never drift apart.

use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use serde::Serialize;

use super::report::{GapStatus, ReportStatus};
use super::{Column, ColumnValue, Row, Table, Value};
use crate::shim::econ::TokenAmount;

macro_rules! define_tables {
    ($(
        $(#[$meta:meta])*
        $row:ident => $table:ident($name:literal)
            primary_key($($pk:ident),+ $(,)?)
            partitioned($partitioned:literal)
        {
            $($(#[$fmeta:meta])* $field:ident: $ty:ty),+ $(,)?
        }
    )+) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, PartialEq, Serialize)]
            pub struct $row {
                $($(#[$fmeta])* pub $field: $ty),+
            }

            pub const $table: Table = Table {
                name: $name,
                columns: &[$(Column {
                    name: stringify!($field),
                    kind: <$ty as ColumnValue>::KIND,
                }),+],
                primary_key: &[$(stringify!($pk)),+],
                partitioned: $partitioned,
            };

            impl Row for $row {
                const TABLE: &'static Table = &$table;

                fn into_values(self) -> Vec<Value> {
                    vec![$(ColumnValue::into_value(self.$field)),+]
                }
            }
        )+

        /// Every table, in creation order.
        pub const ALL_TABLES: &[&Table] = &[$(&$table),+];
    };
}

define_tables! {
    BlockHeaderRow => BLOCK_HEADERS("block_headers")
        primary_key(height, cid)
        partitioned(true)
    {
        height: i64,
        cid: String,
        miner: String,
        parent_weight: BigInt,
        parent_state_root: String,
        parent_base_fee: TokenAmount,
        timestamp: i64,
        win_count: Option<i64>,
        fork_signaling: i64,
    }

    BlockParentRow => BLOCK_PARENTS("block_parents")
        primary_key(height, block, parent)
        partitioned(true)
    {
        height: i64,
        block: String,
        parent: String,
    }

    DrandBlockEntryRow => DRAND_BLOCK_ENTRIES("drand_block_entries")
        primary_key(round, block)
        partitioned(false)
    {
        round: i64,
        block: String,
    }

    MessageRow => MESSAGES("messages")
        primary_key(height, cid)
        partitioned(true)
    {
        height: i64,
        cid: String,
        from: String,
        to: String,
        value: TokenAmount,
        gas_fee_cap: TokenAmount,
        gas_premium: TokenAmount,
        gas_limit: i64,
        size_bytes: i64,
        nonce: i64,
        method: i64,
    }

    BlockMessageRow => BLOCK_MESSAGES("block_messages")
        primary_key(height, block, message)
        partitioned(true)
    {
        height: i64,
        block: String,
        message: String,
    }

    ReceiptRow => RECEIPTS("receipts")
        primary_key(height, message, state_root)
        partitioned(true)
    {
        height: i64,
        message: String,
        state_root: String,
        idx: i64,
        exit_code: i64,
        gas_used: i64,
        events_root: Option<String>,
    }

    ParsedMessageRow => PARSED_MESSAGES("parsed_messages")
        primary_key(height, cid)
        partitioned(true)
    {
        height: i64,
        cid: String,
        from: String,
        to: String,
        value: TokenAmount,
        method: String,
        params: Option<serde_json::Value>,
    }

    MessageGasEconomyRow => MESSAGE_GAS_ECONOMY("message_gas_economy")
        primary_key(height, state_root)
        partitioned(true)
    {
        height: i64,
        state_root: String,
        gas_limit_total: TokenAmount,
        gas_limit_unique_total: TokenAmount,
        base_fee: TokenAmount,
        base_fee_change_log: f64,
        gas_fill_ratio: f64,
        gas_capacity_ratio: f64,
        gas_waste_ratio: f64,
    }

    DerivedGasOutputsRow => DERIVED_GAS_OUTPUTS("derived_gas_outputs")
        primary_key(height, cid, state_root)
        partitioned(true)
    {
        height: i64,
        cid: String,
        state_root: String,
        from: String,
        to: String,
        value: TokenAmount,
        gas_fee_cap: TokenAmount,
        gas_premium: TokenAmount,
        gas_limit: i64,
        size_bytes: i64,
        nonce: i64,
        method: i64,
        actor_name: String,
        actor_family: String,
        exit_code: i64,
        gas_used: i64,
        parent_base_fee: TokenAmount,
        base_fee_burn: TokenAmount,
        over_estimation_burn: TokenAmount,
        miner_penalty: TokenAmount,
        miner_tip: TokenAmount,
        refund: TokenAmount,
        gas_refund: i64,
        gas_burned: i64,
    }

    /// One row per epoch. Null rounds have no `tipset`.
    ChainConsensusRow => CHAIN_CONSENSUS("chain_consensus")
        primary_key(height, parent_state_root)
        partitioned(true)
    {
        height: i64,
        parent_state_root: String,
        parent_tipset: String,
        tipset: Option<String>,
    }

    ActorRow => ACTORS("actors")
        primary_key(height, id, state_root)
        partitioned(true)
    {
        height: i64,
        id: String,
        code: String,
        head: String,
        nonce: i64,
        balance: TokenAmount,
        state_root: String,
    }

    ActorStateRow => ACTOR_STATES("actor_states")
        primary_key(height, head, code)
        partitioned(true)
    {
        height: i64,
        head: String,
        code: String,
        state: serde_json::Value,
    }

    /// Internal sub-calls found in execution traces.
    VmMessageRow => VM_MESSAGES("vm_messages")
        primary_key(height, state_root, cid, source, index)
        partitioned(true)
    {
        height: i64,
        state_root: String,
        cid: String,
        source: String,
        index: i64,
        parent_index: Option<i64>,
        from: String,
        to: String,
        value: TokenAmount,
        method: i64,
        actor_code: Option<String>,
        exit_code: i64,
        gas_limit: i64,
        params: Option<String>,
        returns: Option<String>,
    }

    ActorEventRow => ACTOR_EVENTS("actor_events")
        primary_key(height, state_root, message_cid, event_index, entry_index)
        partitioned(true)
    {
        height: i64,
        state_root: String,
        message_cid: String,
        event_index: i64,
        entry_index: i64,
        emitter: String,
        flags: i64,
        codec: i64,
        key: String,
        value: String,
    }

    FevmTraceRow => FEVM_TRACES("fevm_traces")
        primary_key(height, state_root, message_cid, index)
        partitioned(true)
    {
        height: i64,
        state_root: String,
        message_cid: String,
        index: i64,
        from: String,
        to: String,
        value: TokenAmount,
        method: i64,
        parsed_method: Option<String>,
        from_actor_code: Option<String>,
        to_actor_code: Option<String>,
        exit_code: i64,
        params: Option<String>,
        returns: Option<String>,
    }

    PeerAgentRow => PEER_AGENTS("peer_agents")
        primary_key(surveyer_peer_id, observed_at, raw_agent)
        partitioned(false)
    {
        surveyer_peer_id: String,
        observed_at: DateTime<Utc>,
        raw_agent: String,
        normalized_agent: String,
        count: i64,
    }

    /// The report ledger. One row per `(height, state_root, task)`; later reports replace
    /// earlier ones.
    ProcessingReportRow => PROCESSING_REPORTS("processing_reports")
        primary_key(height, state_root, task)
        partitioned(false)
    {
        height: i64,
        state_root: String,
        reporter: String,
        task: String,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        status: ReportStatus,
        status_information: Option<String>,
        errors_detected: Option<serde_json::Value>,
    }

    GapReportRow => GAP_REPORTS("gap_reports")
        primary_key(height, task)
        partitioned(false)
    {
        height: i64,
        task: String,
        status: GapStatus,
        reporter: String,
        reported_at: DateTime<Utc>,
    }
}

/// Looks up a table descriptor by name.
pub fn table(name: &str) -> Option<&'static Table> {
    ALL_TABLES.iter().copied().find(|t| t.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ColumnType;

    #[test]
    fn primary_keys_are_columns() {
        for table in ALL_TABLES {
            for pk in table.primary_key {
                assert!(
                    table.column(pk).is_some(),
                    "{}: primary key column {pk} is not a column",
                    table.name
                );
            }
            if table.partitioned {
                assert!(table.primary_key.contains(&"height"), "{}", table.name);
            }
        }
    }

    #[test]
    fn descriptors_follow_field_types() {
        let receipts = table("receipts").unwrap();
        assert_eq!(receipts.column("exit_code").unwrap().kind, ColumnType::BigInt);
        assert_eq!(receipts.column("events_root").unwrap().kind, ColumnType::Text);
        assert_eq!(
            BLOCK_HEADERS.column("parent_base_fee").unwrap().kind,
            ColumnType::Numeric
        );
        assert!(table("no_such_table").is_none());
    }

    #[test]
    fn values_are_in_column_order() {
        let row = BlockParentRow {
            height: 3,
            block: "b".into(),
            parent: "p".into(),
        };
        assert_eq!(
            row.into_values(),
            vec![
                Value::Int(Some(3)),
                Value::Text(Some("b".into())),
                Value::Text(Some("p".into()))
            ]
        );
        assert_eq!(BLOCK_PARENTS.columns.len(), 3);
    }
}
