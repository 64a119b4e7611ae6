// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod actors;
mod blocks;
mod chain;
mod cli;
mod cli_shared;
mod daemon;
mod datasource;
mod indexer;
mod jobs;
mod lotus_json;
mod message;
mod model;
mod networks;
mod queue;
mod rpc;
mod schedule;
mod shim;
mod storage;
mod tasks;
mod utils;

pub use cli::lily_main;
