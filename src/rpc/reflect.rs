// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Typed method definitions shared by the server and the client.
//!
//! A method is declared once as an [`RpcMethod`]: its name, its positional parameters and the
//! type it returns. [`RpcMethodExt`] registers the definition on a module and calls it through a
//! [`Client`], so both ends agree on the wire format by construction.

use jsonrpsee::RpcModule;
use jsonrpsee::core::{ClientError, RegisterMethodError};
use jsonrpsee::types::{ErrorObjectOwned, Params};
use serde::{Serialize, de::DeserializeOwned};

use super::{Client, Ctx, RpcState, ServerError};

pub trait RpcMethod<const ARITY: usize> {
    /// Method name.
    const NAME: &'static str;
    /// Name of each parameter, used when a caller passes parameters by name.
    const PARAM_NAMES: [&'static str; ARITY];
    /// A tuple of the positional parameters, `()` for none.
    type Params: Serialize + DeserializeOwned + Send + 'static;
    type Ok: Serialize + DeserializeOwned + Send + 'static;

    fn handle(
        ctx: Ctx,
        params: Self::Params,
    ) -> impl Future<Output = Result<Self::Ok, ServerError>> + Send;
}

pub trait RpcMethodExt<const ARITY: usize>: RpcMethod<ARITY> {
    fn register(module: &mut RpcModule<RpcState>) -> Result<(), RegisterMethodError>
    where
        Self: 'static,
    {
        module.register_async_method(Self::NAME, |params, ctx, _ext| async move {
            let params = parse_params::<ARITY, Self::Params>(params, &Self::PARAM_NAMES)?;
            let ok = Self::handle(ctx, params).await?;
            serde_json::to_value(ok).map_err(|e| ErrorObjectOwned::from(ServerError::from(e)))
        })?;
        Ok(())
    }

    fn call(
        client: &Client,
        params: Self::Params,
    ) -> impl Future<Output = Result<Self::Ok, ClientError>> + Send {
        async move { client.call(Self::NAME, params).await }
    }
}

impl<const ARITY: usize, T: RpcMethod<ARITY>> RpcMethodExt<ARITY> for T {}

/// Reads positional or named parameters into `P`.
fn parse_params<const ARITY: usize, P: DeserializeOwned>(
    params: Params<'_>,
    names: &[&'static str; ARITY],
) -> Result<P, ServerError> {
    let value: serde_json::Value = match params.as_str() {
        None => serde_json::Value::Null,
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| ServerError::parse_error(e, None))?,
    };
    let value = match value {
        _ if ARITY == 0 => serde_json::Value::Null,
        serde_json::Value::Object(mut by_name) => names
            .iter()
            .map(|name| by_name.remove(*name).unwrap_or_default())
            .collect(),
        value => value,
    };
    serde_json::from_value(value).map_err(|e| ServerError::invalid_params(e, None))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(raw: Option<&'static str>) -> Params<'static> {
        Params::new(raw)
    }

    #[test]
    fn positional_and_named_params() {
        let names = ["id", "verbose"];
        let by_position: (u64, bool) = parse_params(params(Some("[7, true]")), &names).unwrap();
        assert_eq!(by_position, (7, true));
        let by_name: (u64, bool) =
            parse_params(params(Some(r#"{"verbose": false, "id": 3}"#)), &names).unwrap();
        assert_eq!(by_name, (3, false));
    }

    #[test]
    fn empty_params() {
        let () = parse_params(params(None), &[]).unwrap();
        let () = parse_params(params(Some("[]")), &[]).unwrap();
    }

    #[test]
    fn malformed_params_are_invalid() {
        let err = parse_params::<1, (u64,)>(params(Some(r#"["seven"]"#)), &["id"]).unwrap_err();
        assert_eq!(
            err.known_code(),
            jsonrpsee::types::error::ErrorCode::InvalidParams
        );
    }
}
