use anyhow::{anyhow, bail, Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::trace;

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

/// HTTP client whose requests fail once `timeout` elapses.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("building HTTP client")
}

/// Minimal JSON-RPC 2.0 client over HTTP.
pub(crate) struct JsonRpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub(crate) fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Issue `method`. A `null` result deserializes into `R` as JSON null, so
    /// optional lookups use `R = Option<_>`.
    pub(crate) async fn call<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        trace!(method, id, url = %self.url, "JSON-RPC request");

        let response: RpcResponse = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("{} request to {} failed", method, self.url))?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("{} returned a malformed response", method))?;

        if let Some(err) = response.error {
            // Node error text is kept verbatim so callers can classify it.
            match err.data {
                Some(data) => bail!("{} (code {}, data {})", err.message, err.code, data),
                None => bail!("{} (code {})", err.message, err.code),
            }
        }

        serde_json::from_value(response.result.unwrap_or(Value::Null))
            .map_err(|e| anyhow!("{} result did not match the expected shape: {}", method, e))
    }
}
