// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::fmt;

use serde::{Deserialize, Serialize};

/// Exit code of a message execution, as reported in receipts and traces.
#[derive(
    PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ExitCode(i64);

impl ExitCode {
    pub const OK: Self = Self(0);
    pub const SYS_SENDER_INVALID: Self = Self(1);
    pub const SYS_SENDER_STATE_INVALID: Self = Self(2);
    pub const SYS_ILLEGAL_INSTRUCTION: Self = Self(4);
    pub const SYS_INVALID_RECEIVER: Self = Self(5);
    pub const SYS_INSUFFICIENT_FUNDS: Self = Self(6);
    pub const SYS_OUT_OF_GAS: Self = Self(7);
    pub const SYS_ILLEGAL_EXIT_CODE: Self = Self(9);
    pub const SYS_ASSERTION_FAILED: Self = Self(10);
    pub const SYS_MISSING_RETURN: Self = Self(11);
    pub const USR_ILLEGAL_ARGUMENT: Self = Self(16);
    pub const USR_NOT_FOUND: Self = Self(17);
    pub const USR_FORBIDDEN: Self = Self(18);
    pub const USR_INSUFFICIENT_FUNDS: Self = Self(19);
    pub const USR_ILLEGAL_STATE: Self = Self(20);
    pub const USR_SERIALIZATION: Self = Self(21);
    pub const USR_UNHANDLED_MESSAGE: Self = Self(22);
    pub const USR_UNSPECIFIED: Self = Self(23);
    pub const USR_ASSERTION_FAILED: Self = Self(24);
    pub const USR_READ_ONLY: Self = Self(25);
    pub const USR_NOT_PAYABLE: Self = Self(26);

    const FIRST_USER_EXIT_CODE: i64 = 16;

    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_success(&self) -> bool {
        self.0 == 0
    }

    fn name(&self) -> Option<&'static str> {
        Some(match *self {
            Self::OK => "Ok",
            Self::SYS_SENDER_INVALID => "SysErrSenderInvalid",
            Self::SYS_SENDER_STATE_INVALID => "SysErrSenderStateInvalid",
            Self::SYS_ILLEGAL_INSTRUCTION => "SysErrIllegalInstruction",
            Self::SYS_INVALID_RECEIVER => "SysErrInvalidReceiver",
            Self::SYS_INSUFFICIENT_FUNDS => "SysErrInsufficientFunds",
            Self::SYS_OUT_OF_GAS => "SysErrOutOfGas",
            Self::SYS_ILLEGAL_EXIT_CODE => "SysErrIllegalExitCode",
            Self::SYS_ASSERTION_FAILED => "SysFatal",
            Self::SYS_MISSING_RETURN => "SysErrMissingReturn",
            Self::USR_ILLEGAL_ARGUMENT => "ErrIllegalArgument",
            Self::USR_NOT_FOUND => "ErrNotFound",
            Self::USR_FORBIDDEN => "ErrForbidden",
            Self::USR_INSUFFICIENT_FUNDS => "ErrInsufficientFunds",
            Self::USR_ILLEGAL_STATE => "ErrIllegalState",
            Self::USR_SERIALIZATION => "ErrSerialization",
            Self::USR_UNHANDLED_MESSAGE => "ErrUnhandledMessage",
            Self::USR_UNSPECIFIED => "ErrUnspecified",
            Self::USR_ASSERTION_FAILED => "ErrAssertionFailed",
            Self::USR_READ_ONLY => "ErrReadOnly",
            Self::USR_NOT_PAYABLE => "ErrNotPayable",
            _ => return None,
        })
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}({})", name, self.0),
            None if self.0 > Self::SYS_MISSING_RETURN.0 && self.0 < Self::FIRST_USER_EXIT_CODE => {
                write!(f, "SysErrReserved{}({})", self.0 - Self::SYS_MISSING_RETURN.0, self.0)
            }
            None => write!(f, "{}", self.0),
        }
    }
}

impl From<i64> for ExitCode {
    fn from(value: i64) -> Self {
        Self(value)
    }
}
