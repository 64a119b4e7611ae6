// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use serde::{Deserialize, Serialize};

use super::Message;
use crate::blocks::Signature;
use crate::lotus_json::cid_opt;

/// Represents a wrapped message with signature bytes.
#[derive(PartialEq, Clone, Debug, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SignedMessage {
    pub message: Message,
    pub signature: Signature,
    #[serde(
        rename = "CID",
        with = "cid_opt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cid: Option<Cid>,
}

impl SignedMessage {
    /// Wraps a message and a signature without verifying it.
    pub fn new_unchecked(message: Message, signature: Signature) -> Self {
        Self {
            message,
            signature,
            cid: None,
        }
    }

    /// BLS messages are identified by their unsigned form, all others by the signed envelope.
    pub fn cid(&self) -> Cid {
        self.cid.unwrap_or_else(|| self.message.cid())
    }
}
