// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The extraction task registry and processors.
//!
//! A [`Task`] turns a `(current, executed)` tipset pair into rows of one or more tables. Every
//! task reads the chain through a shared [`TipsetContext`], which memoizes the expensive node
//! calls so that tasks running in parallel on the same pair fetch each input once.

mod actors;
mod blocks;
mod consensus;
mod context;
mod messages;
mod vm;

use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use std::str::FromStr;

use itertools::Itertools as _;
use serde::{Deserialize, Serialize};

pub use consensus::null_round_rows;
pub use context::{CodeResolver, TipsetContext};

use crate::datasource;
use crate::model::{self, Table, TipsetBundle};
use crate::shim::version::NetworkVersion;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error(transparent)]
    DataSource(#[from] datasource::Error),
    #[error("indexing window of {} exceeded", humantime::format_duration(*.0))]
    WindowExceeded(std::time::Duration),
    #[error("inconsistent chain data: {0}")]
    Inconsistent(String),
    #[error("task panicked: {0}")]
    Panicked(String),
    #[error("indexing cancelled")]
    Cancelled,
}

/// Rows produced by a successful task, with an optional note that turns the report into `INFO`.
#[derive(Debug, Default)]
pub struct TaskOutput {
    pub bundle: TipsetBundle,
    pub info: Option<String>,
}

impl TaskOutput {
    pub fn rows(bundle: TipsetBundle) -> Self {
        Self { bundle, info: None }
    }

    pub fn info(info: impl Into<String>) -> Self {
        Self {
            bundle: TipsetBundle::default(),
            info: Some(info.into()),
        }
    }
}

/// The extraction tasks, named after the table they fill.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Task {
    BlockHeader,
    BlockParent,
    DrandBlockEntrie,
    Message,
    BlockMessage,
    Receipt,
    ParsedMessage,
    MessageGasEconomy,
    DerivedGasOutputs,
    #[strum(to_string = "chain_consensus", serialize = "consensus")]
    ChainConsensus,
    Actor,
    ActorState,
    VmMessages,
    ActorEvent,
    FevmTrace,
}

impl Task {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn all() -> Vec<Task> {
        <Task as strum::IntoEnumIterator>::iter().collect()
    }

    /// Tables written by this task.
    pub fn tables(&self) -> &'static [&'static Table] {
        match self {
            Task::BlockHeader => &[&model::BLOCK_HEADERS],
            Task::BlockParent => &[&model::BLOCK_PARENTS],
            Task::DrandBlockEntrie => &[&model::DRAND_BLOCK_ENTRIES],
            Task::Message => &[&model::MESSAGES],
            Task::BlockMessage => &[&model::BLOCK_MESSAGES],
            Task::Receipt => &[&model::RECEIPTS],
            Task::ParsedMessage => &[&model::PARSED_MESSAGES],
            Task::MessageGasEconomy => &[&model::MESSAGE_GAS_ECONOMY],
            Task::DerivedGasOutputs => &[&model::DERIVED_GAS_OUTPUTS],
            Task::ChainConsensus => &[&model::CHAIN_CONSENSUS],
            Task::Actor => &[&model::ACTORS],
            Task::ActorState => &[&model::ACTOR_STATES],
            Task::VmMessages => &[&model::VM_MESSAGES],
            Task::ActorEvent => &[&model::ACTOR_EVENTS],
            Task::FevmTrace => &[&model::FEVM_TRACES],
        }
    }

    /// Network versions whose chain data this task understands.
    pub fn versions(&self) -> RangeInclusive<NetworkVersion> {
        match self {
            // Events and the EVM arrived with FEVM.
            Task::ActorEvent | Task::FevmTrace => NetworkVersion::V18..=NetworkVersion::MAX,
            _ => NetworkVersion::MIN..=NetworkVersion::MAX,
        }
    }

    pub fn supports(&self, version: NetworkVersion) -> bool {
        self.versions().contains(&version)
    }

    /// Whether the task reads the execution of the parent tipset, which genesis does not have.
    pub fn needs_parent(&self) -> bool {
        !matches!(
            self,
            Task::BlockHeader
                | Task::BlockParent
                | Task::DrandBlockEntrie
                | Task::ChainConsensus
                | Task::Actor
                | Task::ActorState
        )
    }

    /// Runs the task against a tipset pair.
    pub async fn run(self, ctx: &TipsetContext) -> Result<TaskOutput, TaskError> {
        match self {
            Task::BlockHeader => blocks::block_headers(ctx),
            Task::BlockParent => blocks::block_parents(ctx),
            Task::DrandBlockEntrie => blocks::drand_block_entries(ctx),
            Task::Message => messages::messages(ctx).await,
            Task::BlockMessage => messages::block_messages(ctx).await,
            Task::Receipt => messages::receipts(ctx).await,
            Task::ParsedMessage => messages::parsed_messages(ctx).await,
            Task::MessageGasEconomy => messages::gas_economy(ctx).await,
            Task::DerivedGasOutputs => messages::derived_gas_outputs(ctx).await,
            Task::ChainConsensus => Ok(consensus::chain_consensus(ctx)),
            Task::Actor => actors::actors(ctx).await,
            Task::ActorState => actors::actor_states(ctx).await,
            Task::VmMessages => vm::vm_messages(ctx).await,
            Task::ActorEvent => vm::actor_events(ctx).await,
            Task::FevmTrace => vm::fevm_traces(ctx).await,
        }
    }
}

/// Named groups of tasks accepted wherever task names are.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum TaskSet {
    Blocks,
    Messages,
    ActorStatesRaw,
    Fevm,
}

impl TaskSet {
    pub fn tasks(&self) -> &'static [Task] {
        match self {
            TaskSet::Blocks => &[Task::BlockHeader, Task::BlockParent, Task::DrandBlockEntrie],
            TaskSet::Messages => &[
                Task::Message,
                Task::BlockMessage,
                Task::Receipt,
                Task::ParsedMessage,
                Task::MessageGasEconomy,
                Task::DerivedGasOutputs,
            ],
            TaskSet::ActorStatesRaw => &[Task::Actor, Task::ActorState],
            TaskSet::Fevm => &[Task::FevmTrace, Task::ActorEvent],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task {0:?}")]
pub struct UnknownTask(pub String);

/// Expands task and task set names into a sorted, duplicate free task list. An empty list
/// selects every task.
pub fn parse_tasks<S: AsRef<str>>(names: &[S]) -> Result<Vec<Task>, UnknownTask> {
    let names: Vec<&str> = names
        .iter()
        .flat_map(|n| n.as_ref().split(','))
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .collect();
    if names.is_empty() {
        return Ok(Task::all());
    }
    let mut tasks = BTreeSet::new();
    for name in names {
        if let Ok(set) = TaskSet::from_str(name) {
            tasks.extend(set.tasks().iter().copied());
        } else {
            tasks.insert(Task::from_str(name).map_err(|_| UnknownTask(name.to_owned()))?);
        }
    }
    Ok(tasks.into_iter().collect())
}

/// Task names as persisted in reports.
pub fn task_names(tasks: &[Task]) -> Vec<String> {
    tasks.iter().map(|t| t.name().to_owned()).collect()
}

/// One line per task for `lily help tasks`-style listings.
pub fn describe() -> String {
    Task::all()
        .into_iter()
        .map(|task| {
            format!(
                "{:<22} {}",
                task.name(),
                task.tables().iter().map(|t| t.name).join(", ")
            )
        })
        .join("\n")
}
