// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use serde::{Deserialize, Serialize};

use crate::lotus_json::{base64_bytes, cid_opt};
use crate::shim::error::ExitCode;

/// Result of a state transition from a message.
#[derive(PartialEq, Clone, Debug, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Receipt {
    pub exit_code: ExitCode,
    #[serde(with = "base64_bytes", default)]
    pub r#return: Vec<u8>,
    pub gas_used: u64,
    #[serde(with = "cid_opt", default)]
    pub events_root: Option<Cid>,
}
