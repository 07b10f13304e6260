//! Scripted in-memory chain for tests and dry runs.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use alloy::sol_types::SolCall;
use async_trait::async_trait;

use super::{ChainClient, TransferLog};
use crate::bindings::IERC20;
use crate::error::ChainError;
use crate::types::{Address, U256};

type CallKey = (Address, Vec<u8>);

/// A fixed chain state. Calls that were not scripted revert.
///
/// Failure injection (`fail_logs`, `fail_code`, `fail_call`) uses interior
/// mutability so a test can flip it between two runs over the same `Arc`.
#[derive(Default)]
pub struct MemoryChain {
    head: u64,
    logs: HashMap<Address, Vec<TransferLog>>,
    code: HashMap<Address, Vec<u8>>,
    calls: HashMap<CallKey, Vec<u8>>,
    failing_logs: RwLock<HashSet<Address>>,
    failing_code: RwLock<HashSet<Address>>,
    failing_calls: RwLock<HashSet<CallKey>>,
    log_requests: AtomicUsize,
    code_requests: AtomicUsize,
    call_requests: AtomicUsize,
}

fn toggle<T: Eq + std::hash::Hash>(set: &RwLock<HashSet<T>>, item: T, failing: bool) {
    let mut set = set.write().unwrap_or_else(PoisonError::into_inner);
    if failing {
        set.insert(item);
    } else {
        set.remove(&item);
    }
}

fn is_failing<T: Eq + std::hash::Hash>(set: &RwLock<HashSet<T>>, item: &T) -> bool {
    set.read()
        .unwrap_or_else(PoisonError::into_inner)
        .contains(item)
}

impl MemoryChain {
    pub fn new(head: u64) -> Self {
        Self {
            head,
            ..Self::default()
        }
    }

    /// Records a transfer of `token` at `block`.
    pub fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        value: u64,
        block: u64,
    ) -> &mut Self {
        self.raw_log(token, TransferLog::new(from, to, U256::from(value), block))
    }

    /// Pushes a raw log, including malformed ones.
    pub fn raw_log(&mut self, token: Address, log: TransferLog) -> &mut Self {
        self.logs.entry(token).or_default().push(log);
        self
    }

    /// Gives `address` non-empty bytecode.
    pub fn deploy(&mut self, address: Address) -> &mut Self {
        self.code.insert(address, vec![0x60, 0x80, 0x60, 0x40, 0x52]);
        self
    }

    /// Scripts the decoded return value of `call` on `to`.
    pub fn respond<C: SolCall>(&mut self, to: Address, call: C, ret: C::Return) -> &mut Self {
        self.respond_raw(to, call, C::abi_encode_returns(&ret))
    }

    /// Scripts raw return bytes, including ones that do not decode.
    pub fn respond_raw<C: SolCall>(&mut self, to: Address, call: C, ret: Vec<u8>) -> &mut Self {
        self.calls.insert((to, call.abi_encode()), ret);
        self
    }

    /// Scripts `balanceOf(holder)` on `token`.
    pub fn balance(&mut self, token: Address, holder: Address, amount: u64) -> &mut Self {
        self.respond(
            token,
            IERC20::balanceOfCall { account: holder },
            U256::from(amount),
        )
    }

    /// Makes the log API fail with a transport error for `token`.
    pub fn fail_logs(&self, token: Address, failing: bool) {
        toggle(&self.failing_logs, token, failing);
    }

    /// Makes `eth_getCode` fail with a transport error for `address`.
    pub fn fail_code(&self, address: Address, failing: bool) {
        toggle(&self.failing_code, address, failing);
    }

    /// Makes one `eth_call` fail with a transport error.
    pub fn fail_call<C: SolCall>(&self, to: Address, call: C, failing: bool) {
        toggle(&self.failing_calls, (to, call.abi_encode()), failing);
    }

    pub fn log_requests(&self) -> usize {
        self.log_requests.load(Ordering::SeqCst)
    }

    pub fn code_requests(&self) -> usize {
        self.code_requests.load(Ordering::SeqCst)
    }

    pub fn call_requests(&self) -> usize {
        self.call_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainClient for MemoryChain {
    async fn block_number(&self) -> Result<u64, ChainError> {
        Ok(self.head)
    }

    async fn transfer_logs(
        &self,
        token: Address,
        to_block: u64,
        page_size: usize,
    ) -> Result<Vec<TransferLog>, ChainError> {
        self.log_requests.fetch_add(1, Ordering::SeqCst);
        if is_failing(&self.failing_logs, &token) {
            return Err(ChainError::Transport("connection reset".to_string()));
        }
        Ok(self
            .logs
            .get(&token)
            .map(|logs| {
                logs.iter()
                    .filter(|log| log.block().is_none_or(|block| block <= to_block))
                    .take(page_size)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn code_at(&self, address: Address, _block: u64) -> Result<Vec<u8>, ChainError> {
        self.code_requests.fetch_add(1, Ordering::SeqCst);
        if is_failing(&self.failing_code, &address) {
            return Err(ChainError::Transport("connection reset".to_string()));
        }
        Ok(self.code.get(&address).cloned().unwrap_or_default())
    }

    async fn call(&self, to: Address, data: &[u8], _block: u64) -> Result<Vec<u8>, ChainError> {
        self.call_requests.fetch_add(1, Ordering::SeqCst);
        let key = (to, data.to_vec());
        if is_failing(&self.failing_calls, &key) {
            return Err(ChainError::Transport("connection reset".to_string()));
        }
        self.calls
            .get(&key)
            .cloned()
            .ok_or_else(|| ChainError::Reverted("execution reverted".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logs_respect_block_and_page() {
        let token = Address::repeat_byte(1);
        let mut chain = MemoryChain::new(100);
        chain
            .transfer(token, Address::ZERO, Address::repeat_byte(2), 5, 10)
            .transfer(token, Address::repeat_byte(2), Address::repeat_byte(3), 1, 20)
            .transfer(token, Address::repeat_byte(3), Address::repeat_byte(4), 1, 30);

        assert_eq!(chain.transfer_logs(token, 20, 100).await.unwrap().len(), 2);
        assert_eq!(chain.transfer_logs(token, 100, 1).await.unwrap().len(), 1);
        assert_eq!(chain.log_requests(), 2);
    }

    #[tokio::test]
    async fn test_unscripted_call_reverts() {
        let chain = MemoryChain::new(1);
        let err = chain
            .call(Address::repeat_byte(1), &[1, 2, 3, 4], 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Reverted(_)));
    }

    #[tokio::test]
    async fn test_failure_injection_toggles() {
        let token = Address::repeat_byte(1);
        let holder = Address::repeat_byte(2);
        let mut chain = MemoryChain::new(1);
        chain.balance(token, holder, 7);
        let data = IERC20::balanceOfCall { account: holder }.abi_encode();

        chain.fail_logs(token, true);
        assert!(chain.transfer_logs(token, 1, 10).await.is_err());
        chain.fail_logs(token, false);
        assert!(chain.transfer_logs(token, 1, 10).await.unwrap().is_empty());

        chain.fail_call(token, IERC20::balanceOfCall { account: holder }, true);
        let err = chain.call(token, &data, 1).await.unwrap_err();
        assert!(err.is_transient());
        chain.fail_call(token, IERC20::balanceOfCall { account: holder }, false);
        let ret = chain.call(token, &data, 1).await.unwrap();
        assert_eq!(
            IERC20::balanceOfCall::abi_decode_returns(&ret).unwrap(),
            U256::from(7u64)
        );
    }
}
