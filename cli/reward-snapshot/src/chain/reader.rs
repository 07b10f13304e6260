//! Rate-limited, retrying view over a `ChainClient`.

use std::sync::Arc;

use alloy::sol_types::SolCall;

use super::{ChainClient, TransferLog};
use crate::bindings::IERC20;
use crate::error::ChainError;
use crate::rate_limit::RateLimiter;
use crate::retry::{with_retry, RetryPolicy};
use crate::types::{Address, U256};

/// Every component reads the chain through one of these so that all calls
/// share the run's rate limiter and retry policy.
#[derive(Clone)]
pub struct Reader {
    chain: Arc<dyn ChainClient>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl Reader {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            chain,
            limiter,
            retry,
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub async fn block_number(&self) -> Result<u64, ChainError> {
        with_retry(&self.retry, "eth_blockNumber", move || {
            self.limiter.limited(self.chain.block_number())
        })
        .await
    }

    pub async fn transfer_logs(
        &self,
        token: Address,
        to_block: u64,
        page_size: usize,
    ) -> Result<Vec<TransferLog>, ChainError> {
        with_retry(&self.retry, "getLogs", move || {
            self.limiter
                .limited(self.chain.transfer_logs(token, to_block, page_size))
        })
        .await
    }

    pub async fn code_at(&self, address: Address, block: u64) -> Result<Vec<u8>, ChainError> {
        with_retry(&self.retry, "eth_getCode", move || {
            self.limiter.limited(self.chain.code_at(address, block))
        })
        .await
    }

    /// `eth_call` with retries on transient failures.
    pub async fn call(&self, to: Address, data: &[u8], block: u64) -> Result<Vec<u8>, ChainError> {
        with_retry(&self.retry, "eth_call", move || {
            self.limiter.limited(self.chain.call(to, data, block))
        })
        .await
    }

    /// Single-attempt `eth_call`, for speculative probing.
    pub async fn probe(&self, to: Address, data: &[u8], block: u64) -> Result<Vec<u8>, ChainError> {
        self.limiter.limited(self.chain.call(to, data, block)).await
    }

    /// Encodes `call`, runs it with retries and decodes the return value.
    pub async fn read<C: SolCall>(
        &self,
        to: Address,
        call: C,
        block: u64,
    ) -> Result<C::Return, ChainError> {
        let data = call.abi_encode();
        let ret = self.call(to, &data, block).await?;
        Ok(C::abi_decode_returns(&ret)?)
    }

    pub async fn balance_of(
        &self,
        token: Address,
        holder: Address,
        block: u64,
    ) -> Result<U256, ChainError> {
        self.read(token, IERC20::balanceOfCall { account: holder }, block)
            .await
    }

    pub async fn total_supply(&self, token: Address, block: u64) -> Result<U256, ChainError> {
        self.read(token, IERC20::totalSupplyCall {}, block).await
    }

    pub async fn decimals(&self, token: Address, block: u64) -> Result<u8, ChainError> {
        self.read(token, IERC20::decimalsCall {}, block).await
    }
}
