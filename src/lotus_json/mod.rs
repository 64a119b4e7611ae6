// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Leaf adapters for the JSON encoding used by Filecoin nodes (the "lotus JSON").
//!
//! Domain structs in [`crate::blocks`] and [`crate::message`] derive
//! [`serde::Serialize`]/[`serde::Deserialize`] directly in their lotus JSON shape, and use the
//! modules here with `#[serde(with = ...)]` for leaf types whose JSON form differs from their
//! natural serde form:
//! - CIDs are objects with a single `/` key: `{ "/": "baeaaaaa" }`.
//! - Byte strings are base64.
//! - Lists are frequently `null` instead of `[]`.
//!
//! Malformed JSON never panics; every conversion surfaces a [`serde::de::Error`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Serialize, Deserialize)]
struct CidLotusJson {
    #[serde(rename = "/")]
    slash: String,
}

fn parse_cid<E: serde::de::Error>(s: &str) -> Result<::cid::Cid, E> {
    s.parse::<::cid::Cid>()
        .map_err(|e| E::custom(format!("invalid CID {s:?}: {e}")))
}

/// `{ "/": "<cid>" }`
pub mod cid {
    use super::*;

    pub fn serialize<S: Serializer>(cid: &::cid::Cid, serializer: S) -> Result<S::Ok, S::Error> {
        CidLotusJson {
            slash: cid.to_string(),
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<::cid::Cid, D::Error> {
        let CidLotusJson { slash } = CidLotusJson::deserialize(deserializer)?;
        parse_cid(&slash)
    }
}

/// `null` or `{ "/": "<cid>" }`
pub mod cid_opt {
    use super::*;

    pub fn serialize<S: Serializer>(
        cid: &Option<::cid::Cid>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        cid.map(|cid| CidLotusJson {
            slash: cid.to_string(),
        })
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<::cid::Cid>, D::Error> {
        Option::<CidLotusJson>::deserialize(deserializer)?
            .map(|CidLotusJson { slash }| parse_cid(&slash))
            .transpose()
    }
}

/// `null` or `[{ "/": "<cid>" }, ..]`
pub mod cid_vec {
    use super::*;

    pub fn serialize<S: Serializer>(cids: &[::cid::Cid], serializer: S) -> Result<S::Ok, S::Error> {
        cids.iter()
            .map(|cid| CidLotusJson {
                slash: cid.to_string(),
            })
            .collect::<Vec<_>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<::cid::Cid>, D::Error> {
        Option::<Vec<CidLotusJson>>::deserialize(deserializer)?
            .unwrap_or_default()
            .into_iter()
            .map(|CidLotusJson { slash }| parse_cid(&slash))
            .collect()
    }
}

/// Base64 byte strings, `null` decodes as empty.
pub mod base64_bytes {
    use super::*;
    use base64::{Engine as _, prelude::BASE64_STANDARD};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        if bytes.is_empty() {
            serializer.serialize_none()
        } else {
            serializer.serialize_str(&BASE64_STANDARD.encode(bytes))
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(s) => BASE64_STANDARD
                .decode(s.as_bytes())
                .map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}

/// Big integers and other [`std::fmt::Display`]/[`std::str::FromStr`] types encoded as strings.
pub mod stringify {
    use super::*;
    use std::{fmt::Display, str::FromStr};

    pub fn serialize<S: Serializer, T: Display>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: FromStr,
        T::Err: Display,
    {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

/// Lists that the node may encode as `null`.
pub mod nullable_vec {
    use super::*;

    pub fn serialize<S: Serializer, T: Serialize>(
        items: &[T],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        items.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>, T: Deserialize<'de>>(
        deserializer: D,
    ) -> Result<Vec<T>, D::Error> {
        Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
    }
}
