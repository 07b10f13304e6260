//! Error types for the snapshot pipeline.

use alloy::transports::TransportError;
use thiserror::Error;

use crate::types::Address;

/// Errors raised while talking to the node or the transfer-log API.
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    /// Connection, timeout or HTTP status failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The log API answered with a non-success status (often a rate limit).
    #[error("upstream API error: {0}")]
    Api(String),

    /// JSON-RPC error object returned by the node.
    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The call executed and reverted.
    #[error("call reverted: {0}")]
    Reverted(String),

    /// The response could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The shared rate limiter was closed.
    #[error("rate limiter closed")]
    LimiterClosed,
}

impl ChainError {
    /// Whether retrying the same request can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ChainError::Transport(_) | ChainError::Api(_) => true,
            // -32005: limit exceeded, -32603: internal error (often a
            // load-balanced node timing out)
            ChainError::Rpc { code, .. } => matches!(*code, -32005 | -32603 | 429),
            ChainError::Reverted(_) | ChainError::Decode(_) | ChainError::LimiterClosed => false,
        }
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ChainError::Decode(e.to_string())
        } else {
            ChainError::Transport(e.to_string())
        }
    }
}

impl From<TransportError> for ChainError {
    fn from(e: TransportError) -> Self {
        match e.as_error_resp() {
            // 3: execution reverted (geth, erigon, most providers)
            Some(payload) if payload.code == 3 || payload.message.contains("revert") => {
                ChainError::Reverted(payload.message.to_string())
            }
            Some(payload) => ChainError::Rpc {
                code: payload.code,
                message: payload.message.to_string(),
            },
            None if e.is_ser_error() || e.is_deser_error() => ChainError::Decode(e.to_string()),
            None => ChainError::Transport(e.to_string()),
        }
    }
}

impl From<alloy::sol_types::Error> for ChainError {
    fn from(e: alloy::sol_types::Error) -> Self {
        ChainError::Decode(e.to_string())
    }
}

/// Errors from the distribution store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A distribution with this id already exists; nothing was written.
    #[error("distribution {0} already exists")]
    DuplicateId(u64),

    /// Stored data could not be interpreted.
    #[error("corrupt store entry: {0}")]
    Corrupt(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors loading static configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for a pipeline run.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Why a run produced no distribution.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// `getCurrentDistributionInfo` / `getExcludedAddresses` failed.
    #[error("distribution contract read failed: {0}")]
    DistributionContract(#[source] ChainError),

    /// The harvester returned nothing for the target token.
    #[error("no transfer data available for token {0}")]
    NoHolders(Address),

    /// A required chain read failed after retries.
    #[error("chain read failed: {0}")]
    Chain(#[from] ChainError),

    /// An amount no longer fits in 256 bits.
    #[error("arithmetic overflow while {0}")]
    Overflow(&'static str),

    /// Every balance rounded to a zero reward.
    #[error("distribution has no claims")]
    NoClaims,

    /// The finished distribution could not be stored.
    #[error("persistence failed: {0}")]
    Store(#[from] StoreError),
}
