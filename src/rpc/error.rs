// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::fmt::{self, Display};

use jsonrpsee::{
    core::ClientError,
    types::error::{self, ErrorCode, ErrorObjectOwned},
};

use crate::chain::HeightRangeError;
use crate::cli_shared::logger::LogError;
use crate::tasks::UnknownTask;
use crate::{datasource, queue, schedule, storage};

/// An error returned _by the server_, not due to e.g serialization errors, protocol errors, or
/// the connection failing.
#[derive(derive_more::From, derive_more::Into, Debug, PartialEq)]
pub struct ServerError {
    inner: ErrorObjectOwned,
}

/// Codes from -32000 to -32099 are reserved for implementation-defined server errors.
pub(crate) mod implementation_defined_errors {
    /// The daemon runs without a node connection that can serve this method.
    pub(crate) const UNSUPPORTED_METHOD: i32 = -32001;
    /// The node the daemon reads from is unreachable.
    pub(crate) const CHAIN_UNAVAILABLE: i32 = -32002;
}

impl ServerError {
    pub fn new(
        code: i32,
        message: impl Display,
        data: impl Into<Option<serde_json::Value>>,
    ) -> Self {
        Self {
            inner: ErrorObjectOwned::owned(code, message.to_string(), data.into()),
        }
    }
    pub fn message(&self) -> &str {
        self.inner.message()
    }
    pub fn known_code(&self) -> ErrorCode {
        self.inner.code().into()
    }

    pub fn unsupported_method() -> Self {
        Self::new(
            implementation_defined_errors::UNSUPPORTED_METHOD,
            "unsupported method",
            Some("This daemon is not connected to a node that serves this method".into()),
        )
    }

    /// Whether the caller, not the daemon, is at fault.
    pub fn is_user_error(code: i32) -> bool {
        matches!(
            ErrorCode::from(code),
            ErrorCode::InvalidParams | ErrorCode::MethodNotFound | ErrorCode::ParseError
        )
    }
}

impl Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JSON-RPC error:\n")?;
        f.write_fmt(format_args!("\tcode: {}\n", self.inner.code()))?;
        f.write_fmt(format_args!("\tmessage: {}\n", self.inner.message()))?;
        if let Some(data) = self.inner.data() {
            f.write_fmt(format_args!("\tdata: {data}\n"))?
        }
        Ok(())
    }
}

impl std::error::Error for ServerError {}

macro_rules! ctor {
    ($($ctor:ident { $code:expr })*) => {
        $(
            impl ServerError {
                pub fn $ctor(message: impl Display, data: impl Into<Option<serde_json::Value>>) -> Self {
                    Self::new($code, message, data)
                }
            }
        )*
    }
}

ctor! {
    parse_error { error::PARSE_ERROR_CODE }
    internal_error { error::INTERNAL_ERROR_CODE }
    invalid_params { error::INVALID_PARAMS_CODE }
    method_not_found { error::METHOD_NOT_FOUND_CODE }
}

macro_rules! from2internal {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ServerError {
                fn from(it: $ty) -> Self {
                    Self::internal_error(it, None)
                }
            }
        )*
    };
}

macro_rules! from2invalid_params {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ServerError {
                fn from(it: $ty) -> Self {
                    Self::invalid_params(it, None)
                }
            }
        )*
    };
}

from2internal! {
    String,
    anyhow::Error,
    serde_json::Error,
    tokio::task::JoinError,
}

from2invalid_params! {
    HeightRangeError,
    UnknownTask,
}

impl From<schedule::Error> for ServerError {
    fn from(e: schedule::Error) -> Self {
        match e {
            schedule::Error::UnknownJob(_) | schedule::Error::AlreadyRunning(_) => {
                Self::invalid_params(e, None)
            }
            schedule::Error::ShuttingDown => Self::internal_error(e, None),
        }
    }
}

impl From<storage::Error> for ServerError {
    fn from(e: storage::Error) -> Self {
        match e {
            storage::Error::UnknownStorage(_) | storage::Error::Locked(_) => {
                Self::invalid_params(e, None)
            }
            e => Self::internal_error(e, None),
        }
    }
}

impl From<queue::Error> for ServerError {
    fn from(e: queue::Error) -> Self {
        match e {
            queue::Error::UnknownQueue(_) => Self::invalid_params(e, None),
            queue::Error::Storage(e) => e.into(),
            e => Self::internal_error(e, None),
        }
    }
}

impl From<datasource::Error> for ServerError {
    fn from(e: datasource::Error) -> Self {
        match e {
            datasource::Error::ChainUnavailable(_) => Self::new(
                implementation_defined_errors::CHAIN_UNAVAILABLE,
                e,
                None,
            ),
            datasource::Error::NotFound(_) => Self::invalid_params(e, None),
            datasource::Error::Other(_) => Self::internal_error(e, None),
        }
    }
}

impl From<LogError> for ServerError {
    fn from(e: LogError) -> Self {
        match e {
            LogError::Reload(_) => Self::internal_error(e, None),
            e => Self::invalid_params(e, None),
        }
    }
}

/// Node errors are forwarded as the node reported them.
impl From<ClientError> for ServerError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Call(inner) => Self { inner },
            e => Self::new(implementation_defined_errors::CHAIN_UNAVAILABLE, e, None),
        }
    }
}

impl From<ServerError> for ClientError {
    fn from(value: ServerError) -> Self {
        Self::Call(value.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_mistakes_are_invalid_params() {
        let e = ServerError::from(schedule::Error::UnknownJob(7));
        assert_eq!(e.known_code(), ErrorCode::InvalidParams);
        assert_eq!(e.message(), "unknown job 7");
        let e = ServerError::from(storage::Error::UnknownStorage("db".into()));
        assert_eq!(e.known_code(), ErrorCode::InvalidParams);
        let e = ServerError::from(queue::Error::UnknownQueue("q".into()));
        assert_eq!(e.known_code(), ErrorCode::InvalidParams);
        assert!(ServerError::is_user_error(error::INVALID_PARAMS_CODE));
    }

    #[test]
    fn daemon_failures_are_internal() {
        let e = ServerError::from(schedule::Error::ShuttingDown);
        assert_eq!(e.known_code(), ErrorCode::InternalError);
        let e = ServerError::from(anyhow::anyhow!("boom"));
        assert_eq!(e.known_code(), ErrorCode::InternalError);
        assert!(!ServerError::is_user_error(error::INTERNAL_ERROR_CODE));
        let e = ServerError::from(datasource::Error::ChainUnavailable("down".into()));
        assert!(!ServerError::is_user_error(e.inner.code()));
    }

    #[test]
    fn node_errors_pass_through() {
        let e = ServerError::from(ClientError::Call(ErrorObjectOwned::owned(
            1,
            "block not found",
            None::<()>,
        )));
        assert_eq!(e.message(), "block not found");
        assert_eq!(e.known_code(), ErrorCode::ServerError(1));
    }
}
