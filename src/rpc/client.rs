// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::time::Duration;

use jsonrpsee::core::ClientError;
use jsonrpsee::core::client::ClientT as _;
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::http_client::{HeaderMap, HeaderValue, HttpClient, HttpClientBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

/// Default request timeout, generous enough for `StateCompute` on busy tipsets.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A JSON-RPC client over HTTP, authenticated with an optional bearer token.
#[derive(Clone, Debug)]
pub struct Client {
    inner: HttpClient,
    url: Url,
}

impl Client {
    pub fn from_url<'a>(
        url: &Url,
        token: impl Into<Option<&'a str>>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token.into().filter(|it| !it.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                ClientError::Custom(format!("Invalid authorization token: {e}"))
            })?;
            headers.insert("authorization", value);
        }
        let mut url = url.clone();
        // Nodes commonly advertise websocket endpoints, which serve plain HTTP requests too.
        let scheme = match url.scheme() {
            "ws" => "http",
            "wss" => "https",
            "http" | "https" => url.scheme(),
            it => return Err(ClientError::Custom(format!("Unsupported URL scheme: {it}"))),
        }
        .to_owned();
        url.set_scheme(&scheme)
            .map_err(|()| ClientError::Custom(format!("Invalid URL: {url}")))?;
        let inner = HttpClientBuilder::default()
            .set_headers(headers)
            .request_timeout(timeout)
            .max_response_size(u32::MAX)
            .build(url.as_str())?;
        Ok(Self { inner, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Calls `method` with positional parameters. `params` must serialize to a JSON array, or to
    /// `null` for methods without parameters.
    pub async fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R, ClientError> {
        self.inner.request(method, array_params(params)?).await
    }
}

pub(crate) fn array_params<P: Serialize>(params: P) -> Result<ArrayParams, ClientError> {
    let mut out = ArrayParams::new();
    match serde_json::to_value(params).map_err(ClientError::ParseError)? {
        serde_json::Value::Null => {}
        serde_json::Value::Array(values) => {
            for value in values {
                out.insert(value).map_err(ClientError::ParseError)?;
            }
        }
        value => out.insert(value).map_err(ClientError::ParseError)?,
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonrpsee::core::traits::ToRpcParams as _;

    #[test]
    fn tuples_become_positional_params() {
        let params = array_params((1, "two")).unwrap().to_rpc_params().unwrap();
        assert_eq!(params.unwrap().get(), r#"[1,"two"]"#);
        assert!(array_params(()).unwrap().to_rpc_params().unwrap().is_none());
    }

    #[test]
    fn rejects_unknown_schemes() {
        let url = Url::parse("ftp://localhost:1234").unwrap();
        assert!(Client::from_url(&url, None, DEFAULT_REQUEST_TIMEOUT).is_err());
    }

    #[tokio::test]
    async fn websocket_urls_are_served_over_http() {
        let url = Url::parse("ws://127.0.0.1:1234/rpc/v1").unwrap();
        let client = Client::from_url(&url, "token", DEFAULT_REQUEST_TIMEOUT).unwrap();
        assert_eq!(client.url().as_str(), "http://127.0.0.1:1234/rpc/v1");
    }
}
