// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use serde::{Deserialize, Serialize};

use super::{ColumnType, ColumnValue, Value};

/// Outcome of one task at one height.
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
    strum::IntoStaticStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum ReportStatus {
    Ok,
    Error,
    /// The task does not apply to this height, or work was shed under load.
    Skipped,
    /// The task ran but the data it reads is absent, e.g. a null round.
    Info,
    /// The tipset was reverted after being indexed.
    Reverted,
}

impl ReportStatus {
    /// Statuses that count as indexed when looking for gaps.
    pub fn is_complete(self) -> bool {
        matches!(self, Self::Ok | Self::Info)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum GapStatus {
    Gap,
    Filled,
}

macro_rules! text_column {
    ($($ty:ty),+) => {
        $(
            impl ColumnValue for $ty {
                const KIND: ColumnType = ColumnType::Text;
                fn into_value(self) -> Value {
                    Value::Text(Some(self.to_string()))
                }
            }
        )+
    };
}

text_column!(ReportStatus, GapStatus);

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use super::*;

    #[test]
    fn status_text() {
        assert_eq!(ReportStatus::Ok.to_string(), "OK");
        assert_eq!(ReportStatus::from_str("REVERTED").unwrap(), ReportStatus::Reverted);
        assert_eq!(GapStatus::Filled.into_value(), Value::Text(Some("FILLED".into())));
        assert!(ReportStatus::Info.is_complete());
        assert!(!ReportStatus::Skipped.is_complete());
    }
}
