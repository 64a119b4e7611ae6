// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod chain;
pub mod common;
pub mod job;
pub mod lily;
pub mod net;
