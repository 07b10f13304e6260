pub mod balances;
pub mod bindings;
pub mod chain;
pub mod classifier;
pub mod common;
pub mod config;
pub mod contract;
pub mod error;
pub mod expander;
pub mod harvester;
pub mod merkle;
pub mod pipeline;
pub mod positions;
pub mod rate_limit;
pub mod retry;
pub mod rewards;
pub mod store;
pub mod types;

pub use common::{hex_encode, keccak256_hash, parse_address, parse_hash, write_file_atomic};
pub use config::{Overrides, SnapshotConfig};
pub use error::{ChainError, ConfigError, SnapshotError, SnapshotResult, StoreError};
pub use pipeline::{Pipeline, Snapshot};
pub use store::{DistributionStore, FileStore, MemoryStore};
pub use types::{Address, Claim, ClaimExport, Distribution, Hash, B256, U256};
