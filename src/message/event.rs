// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use serde::{Deserialize, Serialize};

use crate::lotus_json::{base64_bytes, nullable_vec};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventEntry {
    pub flags: u64,
    pub key: String,
    pub codec: u64,
    #[serde(with = "base64_bytes", default)]
    pub value: Vec<u8>,
}

/// An event emitted by an actor during message execution, as stored under a receipt's events
/// root.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActorEvent {
    /// ID of the emitting actor.
    pub emitter: u64,
    #[serde(with = "nullable_vec", default)]
    pub entries: Vec<EventEntry>,
}
