//! Snapshot configuration.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::harvester::DEFAULT_PAGE_SIZE;
use crate::rate_limit::RateLimiter;
use crate::retry::RetryPolicy;
use crate::types::Address;

/// Static override lists, read from a JSON file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Overrides {
    /// Contracts treated as pools even if no probe matches.
    pub approved_pools: BTreeSet<Address>,
    /// Addresses never rewarded, on top of the contract's own list.
    pub excluded: BTreeSet<Address>,
}

impl Overrides {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Everything one pipeline run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// Token whose holders are rewarded.
    pub target_token: Address,

    /// Contract providing the reward rate and the excluded addresses.
    pub distribution_contract: Address,

    /// Block to snapshot at. Defaults to the chain head.
    pub snapshot_block: Option<u64>,

    /// Token decimals. Read from the token when unset.
    pub token_decimals: Option<u8>,

    /// Transfer events requested per token.
    pub page_size: usize,

    pub retry: RetryPolicy,

    /// Network calls in flight at once.
    pub max_concurrency: usize,

    /// Items per fan-out batch.
    pub batch_size: usize,

    /// Pause between fan-out batches.
    pub batch_delay: Duration,

    /// Per-call HTTP timeout.
    pub request_timeout: Duration,

    pub overrides: Overrides,
}

impl SnapshotConfig {
    pub fn new(target_token: Address, distribution_contract: Address) -> Self {
        Self {
            target_token,
            distribution_contract,
            ..Self::default()
        }
    }

    /// The run's shared limiter.
    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(self.max_concurrency, self.batch_size, self.batch_delay)
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            target_token: Address::ZERO,
            distribution_contract: Address::ZERO,
            snapshot_block: None,
            token_decimals: None,
            page_size: DEFAULT_PAGE_SIZE,
            retry: RetryPolicy::default(),
            max_concurrency: 8,
            batch_size: 25,
            batch_delay: Duration::from_millis(250),
            request_timeout: Duration::from_secs(30),
            overrides: Overrides::default(),
        }
    }
}
