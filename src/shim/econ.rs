// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::{
    fmt,
    ops::{Add, AddAssign, Mul, Sub},
    str::FromStr,
};

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::{Signed as _, Zero as _};
use serde::{Deserialize, Serialize};

/// Number of atto units in one whole token.
pub const ATTO_PER_TOKEN: u64 = 1_000_000_000_000_000_000;

/// An amount of tokens, in atto units.
///
/// Serialized as a decimal string, which is how the node encodes big
/// integers over JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenAmount(BigInt);

impl TokenAmount {
    pub fn zero() -> Self {
        Self(BigInt::zero())
    }

    pub fn from_atto(atto: impl Into<BigInt>) -> Self {
        Self(atto.into())
    }

    pub fn from_whole(tokens: i64) -> Self {
        Self(BigInt::from(tokens) * BigInt::from(ATTO_PER_TOKEN))
    }

    pub fn atto(&self) -> &BigInt {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    /// Integer division that truncates towards zero.
    pub fn div_floor(&self, rhs: i64) -> Self {
        Self(&self.0 / BigInt::from(rhs))
    }

    /// Lossless conversion for `NUMERIC` columns.
    pub fn to_decimal(&self) -> BigDecimal {
        BigDecimal::new(self.0.clone(), 0)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TokenAmount {
    type Err = num_bigint::ParseBigIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl From<i64> for TokenAmount {
    fn from(value: i64) -> Self {
        Self(value.into())
    }
}

impl From<BigInt> for TokenAmount {
    fn from(value: BigInt) -> Self {
        Self(value)
    }
}

impl Add for &TokenAmount {
    type Output = TokenAmount;

    fn add(self, rhs: Self) -> TokenAmount {
        TokenAmount(&self.0 + &rhs.0)
    }
}

impl Add for TokenAmount {
    type Output = TokenAmount;

    fn add(self, rhs: Self) -> TokenAmount {
        TokenAmount(self.0 + rhs.0)
    }
}

impl AddAssign<&TokenAmount> for TokenAmount {
    fn add_assign(&mut self, rhs: &TokenAmount) {
        self.0 += &rhs.0;
    }
}

impl Sub for &TokenAmount {
    type Output = TokenAmount;

    fn sub(self, rhs: Self) -> TokenAmount {
        TokenAmount(&self.0 - &rhs.0)
    }
}

impl Sub for TokenAmount {
    type Output = TokenAmount;

    fn sub(self, rhs: Self) -> TokenAmount {
        TokenAmount(self.0 - rhs.0)
    }
}

impl Mul<i64> for &TokenAmount {
    type Output = TokenAmount;

    fn mul(self, rhs: i64) -> TokenAmount {
        TokenAmount(&self.0 * BigInt::from(rhs))
    }
}

impl Mul<i64> for TokenAmount {
    type Output = TokenAmount;

    fn mul(self, rhs: i64) -> TokenAmount {
        TokenAmount(self.0 * BigInt::from(rhs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_is_a_decimal_string() {
        let amount = TokenAmount::from_whole(2);
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"2000000000000000000\"");
        assert_eq!(serde_json::from_str::<TokenAmount>(&json).unwrap(), amount);
    }

    #[test]
    fn arithmetic() {
        let a = TokenAmount::from(10);
        let b = TokenAmount::from(4);
        assert_eq!(&a - &b, TokenAmount::from(6));
        assert_eq!(&a + &b, TokenAmount::from(14));
        assert_eq!(&a * 3, TokenAmount::from(30));
        assert_eq!(a.div_floor(3), TokenAmount::from(3));
        assert!((&b - &a).is_negative());
    }

    #[test]
    fn decimal_conversion() {
        let amount: TokenAmount = "123456789012345678901234567890".parse().unwrap();
        assert_eq!(
            amount.to_decimal().to_string(),
            "123456789012345678901234567890"
        );
    }
}
