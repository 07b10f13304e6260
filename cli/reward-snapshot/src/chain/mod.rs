//! Read access to the chain.
//!
//! Two upstreams are involved: an Etherscan-compatible log API for historical
//! `Transfer` events, and a node reached through an alloy provider for code,
//! `eth_call` and the head block. `ChainClient` hides both behind one trait:
//! - `HttpChainClient`: talks to real endpoints
//! - `MemoryChain`: scripted in-memory chain for tests

mod http;
mod memory;
mod reader;

pub use http::{HttpChainClient, HttpChainConfig};
pub use memory::MemoryChain;
pub use reader::Reader;

use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::bindings::IERC20;
use crate::common::hex_encode;
use crate::error::ChainError;
use crate::types::{Address, B256, U256};

/// `keccak256("Transfer(address,address,uint256)")`.
pub const TRANSFER_TOPIC: B256 = IERC20::Transfer::SIGNATURE_HASH;

/// One raw `Transfer` log as returned by the log API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferLog {
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: String,
}

impl TransferLog {
    /// Builds a well-formed log, mainly for scripted chains.
    pub fn new(from: Address, to: Address, value: U256, block: u64) -> Self {
        Self {
            topics: vec![
                hex_encode(TRANSFER_TOPIC),
                hex_encode(from.into_word()),
                hex_encode(to.into_word()),
            ],
            data: hex_encode(value.to_be_bytes::<32>()),
            block_number: format!("0x{block:x}"),
        }
    }

    /// Block number, accepting hex (`0x..`) or decimal.
    pub fn block(&self) -> Option<u64> {
        parse_quantity(&self.block_number)
    }
}

/// Parses a JSON-RPC quantity or a decimal string.
pub fn parse_quantity(text: &str) -> Option<u64> {
    match text.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

/// Narrow read interface to the chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Latest block number.
    async fn block_number(&self) -> Result<u64, ChainError>;

    /// `Transfer` logs of `token` from genesis through `to_block`, at most
    /// `page_size` of them.
    async fn transfer_logs(
        &self,
        token: Address,
        to_block: u64,
        page_size: usize,
    ) -> Result<Vec<TransferLog>, ChainError>;

    /// Deployed bytecode of `address` at `block`; empty for EOAs.
    async fn code_at(&self, address: Address, block: u64) -> Result<Vec<u8>, ChainError>;

    /// Read-only call against `to` at `block`.
    async fn call(&self, to: Address, data: &[u8], block: u64) -> Result<Vec<u8>, ChainError>;
}
