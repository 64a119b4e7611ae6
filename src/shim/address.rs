// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Address protocols, as encoded in the second character of the textual form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Protocol {
    #[strum(to_string = "ID")]
    Id,
    Secp256k1,
    Actor,
    #[strum(to_string = "BLS")]
    Bls,
    Delegated,
}

impl Protocol {
    fn from_digit(c: char) -> Option<Self> {
        match c {
            '0' => Some(Self::Id),
            '1' => Some(Self::Secp256k1),
            '2' => Some(Self::Actor),
            '3' => Some(Self::Bls),
            '4' => Some(Self::Delegated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("address is too short: {0:?}")]
    TooShort(String),
    #[error("unknown network prefix in address {0:?}")]
    UnknownNetwork(String),
    #[error("unknown protocol in address {0:?}")]
    UnknownProtocol(String),
    #[error("invalid ID address payload in {0:?}")]
    InvalidId(String),
}

/// A chain address in its textual form, e.g. `f01234` or `t3...`.
///
/// The indexer never signs or verifies with addresses; it validates the
/// envelope (network prefix and protocol) and keeps the text as reported by
/// the node so it can be persisted verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Builds an ID address on the network identified by `prefix` (`f` or `t`).
    pub fn new_id(prefix: char, id: u64) -> Self {
        Self(format!("{prefix}0{id}"))
    }

    pub fn protocol(&self) -> Protocol {
        // Validated on construction.
        self.0
            .chars()
            .nth(1)
            .and_then(Protocol::from_digit)
            .unwrap_or(Protocol::Id)
    }

    /// Returns the actor ID for ID addresses.
    pub fn id(&self) -> Option<u64> {
        match self.protocol() {
            Protocol::Id => self.0[2..].parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let (Some(network), Some(protocol)) = (chars.next(), chars.next()) else {
            return Err(Error::TooShort(s.into()));
        };
        if s.len() < 3 {
            return Err(Error::TooShort(s.into()));
        }
        if !matches!(network, 'f' | 't') {
            return Err(Error::UnknownNetwork(s.into()));
        }
        match Protocol::from_digit(protocol) {
            Some(Protocol::Id) => {
                s[2..]
                    .parse::<u64>()
                    .map_err(|_| Error::InvalidId(s.into()))?;
            }
            Some(_) => {}
            None => return Err(Error::UnknownProtocol(s.into())),
        }
        Ok(Self(s.to_owned()))
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_address() {
        let addr: Address = "f01234".parse().unwrap();
        assert_eq!(addr.protocol(), Protocol::Id);
        assert_eq!(addr.id(), Some(1234));
        assert_eq!(addr, Address::new_id('f', 1234));
    }

    #[test]
    fn parse_other_protocols() {
        let addr: Address = "t3vvmn62lofvhjd2ugzca6sof2j2ubwok6cj4xxbfzz4yuxfkgobpihhd2thlanmsh3w2ptld2gqkn2jvlss4a"
            .parse()
            .unwrap();
        assert_eq!(addr.protocol(), Protocol::Bls);
        assert_eq!(addr.id(), None);
    }

    #[test]
    fn reject_malformed() {
        assert!("x01".parse::<Address>().is_err());
        assert!("f9abc".parse::<Address>().is_err());
        assert!("f0abc".parse::<Address>().is_err());
        assert!("f".parse::<Address>().is_err());
    }

    #[test]
    fn serde_as_string() {
        let addr = Address::new_id('t', 7);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"t07\"");
        assert_eq!(serde_json::from_str::<Address>(&json).unwrap(), addr);
    }
}
