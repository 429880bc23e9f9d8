//! # Chain JSON-RPC Client
//!
//! `ChainRpc` over HTTP JSON-RPC 2.0: `eth_getLogs` and `eth_blockNumber`.
//! Every failure, including timeouts, surfaces as `BlockchainConnection`.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use shared_types::{parse_quantity, to_quantity, RawLog};

use crate::domain::RegistryCacheError;
use crate::ports::ChainRpc;

#[derive(Serialize)]
struct JsonRpcRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    method: &'a str,
    params: P,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse<R> {
    result: Option<R>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// HTTP JSON-RPC chain client.
pub struct HttpChainRpc {
    client: Client,
    url: String,
    request_id: AtomicU64,
}

impl HttpChainRpc {
    /// Client for `url` with a per-request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RegistryCacheError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| RegistryCacheError::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
            request_id: AtomicU64::new(1),
        })
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn call<P: Serialize + Send + Sync, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R, RegistryCacheError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id(),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    "request timed out".to_string()
                } else if e.is_connect() {
                    format!("cannot connect to {}", self.url)
                } else {
                    e.to_string()
                };
                RegistryCacheError::BlockchainConnection(format!("{}: {}", method, reason))
            })?;

        let body: JsonRpcResponse<R> = response.json().await.map_err(|e| {
            RegistryCacheError::BlockchainConnection(format!("{}: bad response: {}", method, e))
        })?;
        into_result(method, body)
    }
}

fn into_result<R>(method: &str, body: JsonRpcResponse<R>) -> Result<R, RegistryCacheError> {
    if let Some(error) = body.error {
        return Err(RegistryCacheError::BlockchainConnection(format!(
            "{}: RPC error {}: {}",
            method, error.code, error.message
        )));
    }
    body.result.ok_or_else(|| {
        RegistryCacheError::BlockchainConnection(format!("{}: missing result", method))
    })
}

/// `eth_getLogs` filter object for a block range.
fn logs_filter(from_block: u64, to_block: u64) -> Value {
    json!([{
        "fromBlock": to_quantity(from_block),
        "toBlock": to_quantity(to_block),
    }])
}

#[async_trait]
impl ChainRpc for HttpChainRpc {
    async fn get_past_logs(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>, RegistryCacheError> {
        let logs: Vec<RawLog> = self
            .call("eth_getLogs", logs_filter(from_block, to_block))
            .await?;
        debug!(from_block, to_block, count = logs.len(), "Fetched logs");
        Ok(logs)
    }

    async fn get_block_number(&self) -> Result<u64, RegistryCacheError> {
        let head: String = self.call("eth_blockNumber", json!([])).await?;
        parse_quantity(&head).map_err(|e| RegistryCacheError::BlockchainConnection(e.to_string()))
    }
}
