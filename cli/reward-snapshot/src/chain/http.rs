//! HTTP implementation of `ChainClient`.
//!
//! Node reads go through an alloy provider; `Transfer` logs come from the
//! Etherscan-compatible API, which serves history without an archive node.

use std::future::{Future, IntoFuture};
use std::time::Duration;

use alloy::eips::BlockId;
use alloy::primitives::Bytes;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::timeout;
use tracing::debug;

use super::{ChainClient, TransferLog, TRANSFER_TOPIC};
use crate::common::hex_encode;
use crate::error::ChainError;
use crate::types::Address;

/// Endpoints and credentials for `HttpChainClient`.
#[derive(Debug, Clone)]
pub struct HttpChainConfig {
    /// Node JSON-RPC endpoint.
    pub rpc_url: String,
    /// Etherscan-compatible API base (e.g. `https://api.etherscan.io/v2/api`).
    pub logs_url: String,
    pub api_key: Option<String>,
    pub chain_id: u64,
    /// Per-request timeout.
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct LogApiResponse {
    status: String,
    message: String,
    result: Option<Value>,
}

pub struct HttpChainClient {
    provider: DynProvider,
    client: Client,
    config: HttpChainConfig,
}

impl HttpChainClient {
    pub fn new(config: HttpChainConfig) -> Result<Self, ChainError> {
        let rpc_url: Url = config
            .rpc_url
            .parse()
            .map_err(|e| ChainError::Transport(format!("invalid RPC url: {e}")))?;
        let provider = ProviderBuilder::new().connect_http(rpc_url).erased();
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            provider,
            client,
            config,
        })
    }

    /// Bounds one provider request by the configured timeout.
    async fn node<T, E, F>(&self, method: &str, request: F) -> Result<T, ChainError>
    where
        F: Future<Output = Result<T, E>>,
        ChainError: From<E>,
    {
        match timeout(self.config.timeout, request).await {
            Ok(result) => result.map_err(ChainError::from),
            Err(_) => Err(ChainError::Transport(format!(
                "{method} timed out after {:?}",
                self.config.timeout
            ))),
        }
    }
}

/// Interprets an Etherscan-style envelope.
fn parse_log_response(response: LogApiResponse) -> Result<Vec<TransferLog>, ChainError> {
    if response.status == "1" {
        let result = response.result.unwrap_or(Value::Array(Vec::new()));
        return serde_json::from_value(result)
            .map_err(|e| ChainError::Decode(format!("malformed log list: {e}")));
    }
    // status "0" is also used for an empty result set
    if response.message.starts_with("No records found") {
        return Ok(Vec::new());
    }
    let detail = match response.result {
        Some(Value::String(text)) => text,
        _ => String::new(),
    };
    Err(ChainError::Api(format!("{} {}", response.message, detail).trim().to_string()))
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn block_number(&self) -> Result<u64, ChainError> {
        self.node("eth_blockNumber", self.provider.get_block_number())
            .await
    }

    async fn transfer_logs(
        &self,
        token: Address,
        to_block: u64,
        page_size: usize,
    ) -> Result<Vec<TransferLog>, ChainError> {
        let mut query = vec![
            ("module", "logs".to_string()),
            ("action", "getLogs".to_string()),
            ("address", hex_encode(token.as_slice())),
            ("fromBlock", "0".to_string()),
            ("toBlock", to_block.to_string()),
            ("topic0", hex_encode(TRANSFER_TOPIC)),
            ("page", "1".to_string()),
            ("offset", page_size.to_string()),
            ("chainid", self.config.chain_id.to_string()),
        ];
        if let Some(key) = &self.config.api_key {
            query.push(("apikey", key.clone()));
        }

        debug!(%token, to_block, page_size, "fetching transfer logs");
        let response = self
            .client
            .get(&self.config.logs_url)
            .query(&query)
            .send()
            .await?
            .error_for_status()?;
        parse_log_response(response.json().await?)
    }

    async fn code_at(&self, address: Address, block: u64) -> Result<Vec<u8>, ChainError> {
        let request = self
            .provider
            .get_code_at(address)
            .block_id(BlockId::number(block));
        let code = self.node("eth_getCode", request.into_future()).await?;
        Ok(code.to_vec())
    }

    async fn call(&self, to: Address, data: &[u8], block: u64) -> Result<Vec<u8>, ChainError> {
        let tx = TransactionRequest::default()
            .to(to)
            .input(Bytes::copy_from_slice(data).into());
        let request = self.provider.call(tx).block(BlockId::number(block));
        let ret = self.node("eth_call", request.into_future()).await?;
        Ok(ret.to_vec())
    }
}
