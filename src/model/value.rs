// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use chrono::{DateTime, Utc};
use num_bigint::BigInt;

use crate::shim::econ::TokenAmount;

/// SQL type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ColumnType {
    #[strum(to_string = "text")]
    Text,
    #[strum(to_string = "bigint")]
    BigInt,
    #[strum(to_string = "numeric")]
    Numeric,
    #[strum(to_string = "double precision")]
    Double,
    #[strum(to_string = "boolean")]
    Boolean,
    #[strum(to_string = "jsonb")]
    Jsonb,
    #[strum(to_string = "timestamptz")]
    Timestamp,
}

/// A single cell. `None` is SQL `NULL` of the column's type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(Option<String>),
    Int(Option<i64>),
    Numeric(Option<BigInt>),
    Double(Option<f64>),
    Bool(Option<bool>),
    Json(Option<serde_json::Value>),
    Timestamp(Option<DateTime<Utc>>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        match self {
            Value::Text(v) => v.is_none(),
            Value::Int(v) => v.is_none(),
            Value::Numeric(v) => v.is_none(),
            Value::Double(v) => v.is_none(),
            Value::Bool(v) => v.is_none(),
            Value::Json(v) => v.is_none(),
            Value::Timestamp(v) => v.is_none(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(Some(v)) => Some(v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => *v,
            _ => None,
        }
    }
}

/// Rust types that map onto a column type.
pub trait ColumnValue {
    const KIND: ColumnType;
    fn into_value(self) -> Value;
}

macro_rules! column_value {
    ($($ty:ty => $kind:ident, $variant:ident, |$v:ident| $conv:expr;)+) => {
        $(
            impl ColumnValue for $ty {
                const KIND: ColumnType = ColumnType::$kind;
                fn into_value(self) -> Value {
                    let $v = self;
                    Value::$variant(Some($conv))
                }
            }

            impl ColumnValue for Option<$ty> {
                const KIND: ColumnType = ColumnType::$kind;
                fn into_value(self) -> Value {
                    Value::$variant(self.map(|$v| $conv))
                }
            }
        )+
    };
}

column_value! {
    String => Text, Text, |v| v;
    i64 => BigInt, Int, |v| v;
    BigInt => Numeric, Numeric, |v| v;
    TokenAmount => Numeric, Numeric, |v| v.atto().clone();
    f64 => Double, Double, |v| v;
    bool => Boolean, Bool, |v| v;
    serde_json::Value => Jsonb, Json, |v| v;
    DateTime<Utc> => Timestamp, Timestamp, |v| v;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_map_to_typed_nulls() {
        assert_eq!(None::<String>.into_value(), Value::Text(None));
        assert!(None::<TokenAmount>.into_value().is_null());
        assert_eq!(
            TokenAmount::from(5).into_value(),
            Value::Numeric(Some(BigInt::from(5)))
        );
        assert_eq!(<Option<i64> as ColumnValue>::KIND, ColumnType::BigInt);
        assert_eq!(ColumnType::Timestamp.to_string(), "timestamptz");
    }
}
