//! Core types shared by every stage of the snapshot pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use alloy::primitives::{Address, B256, U256};

/// A 32-byte keccak-256 digest.
pub type Hash = B256;

/// Liquidity pool families the classifier can recognise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    /// Uniswap V2 style `getReserves` pair.
    ConstantProduct,
    /// Aerodrome / Velodrome V2 style pair (volatile or stable).
    Aerodrome,
    /// Uniswap V3 style pool with positions instead of receipt tokens.
    ConcentratedLiquidity,
    /// Recognised as a pool, but no expansion rule applies.
    Unknown,
}

/// What an address turned out to be at snapshot time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// No deployed code.
    Eoa,
    /// Code present but no known pool interface.
    Contract,
    /// A liquidity pool of the given family.
    Pool(PoolKind),
}

impl Classification {
    pub fn pool_kind(&self) -> Option<PoolKind> {
        match self {
            Classification::Pool(kind) => Some(*kind),
            _ => None,
        }
    }
}

/// One entry of a distribution: what `account` may claim and how to prove it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub index: u64,
    pub account: Address,
    #[serde(with = "u256_dec")]
    pub amount: U256,
    pub proof: Vec<Hash>,
}

/// How a detected pool's balance was handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExpansionOutcome {
    /// The pool balance was split across this many providers.
    Redistributed { providers: usize },
    /// The pool kept its raw balance.
    Fallback { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolReport {
    pub address: Address,
    pub classification: Classification,
    #[serde(flatten)]
    pub outcome: ExpansionOutcome,
}

/// Descriptive data stored next to a distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionMetadata {
    /// Unix seconds at which the snapshot was generated.
    pub generated_at: u64,
    pub snapshot_block: u64,
    pub token: Address,
    pub token_decimals: u8,
    /// Id reported by the on-chain distribution contract for this cycle.
    #[serde(with = "u256_dec")]
    pub onchain_distribution_id: U256,
    #[serde(with = "u256_dec")]
    pub reward_per_token: U256,
    pub holder_count: usize,
    /// The transfer-log page came back full, so holders may be missing.
    pub holders_truncated: bool,
    pub excluded_count: usize,
    pub pools: Vec<PoolReport>,
}

/// A finished, immutable distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub id: u64,
    pub merkle_root: Hash,
    #[serde(with = "u256_dec")]
    pub total_rewards: U256,
    pub claims: BTreeMap<Address, Claim>,
    pub metadata: DistributionMetadata,
}

/// Everything a claimant needs to submit on-chain, as written by `claim`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimExport {
    pub distribution_id: u64,
    pub merkle_root: Hash,
    pub index: u64,
    pub account: Address,
    #[serde(with = "u256_dec")]
    pub amount: U256,
    pub proof: Vec<Hash>,
}

/// Amounts as decimal strings. JSON numbers cannot carry 256 bits and the
/// default `U256` encoding is hex.
pub(crate) mod u256_dec {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::U256;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let text = String::deserialize(deserializer)?;
        U256::from_str_radix(&text, 10).map_err(serde::de::Error::custom)
    }
}
