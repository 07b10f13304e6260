//! Holder discovery from historical `Transfer` events.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::chain::{Reader, TransferLog};
use crate::types::{Address, B256};

/// Default cap on events requested per token.
pub const DEFAULT_PAGE_SIZE: usize = 10_000;

/// Addresses that touched a token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Harvest {
    pub holders: BTreeSet<Address>,
    /// The single page came back full: older or newer holders may be missing.
    pub truncated: bool,
}

impl Harvest {
    /// "No data available", not "no holders".
    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }
}

/// Builds holder sets for a token. Purely a set-builder over network reads.
#[derive(Clone)]
pub struct TransferHarvester {
    reader: Reader,
    page_size: usize,
}

impl TransferHarvester {
    pub fn new(reader: Reader, page_size: usize) -> Self {
        Self {
            reader,
            page_size: page_size.max(1),
        }
    }

    /// Every sender or receiver of `token` up to and including `to_block`,
    /// without the zero address. Degrades to an empty harvest once retries
    /// are exhausted.
    pub async fn holders(&self, token: Address, to_block: u64) -> Harvest {
        let logs = match self.reader.transfer_logs(token, to_block, self.page_size).await {
            Ok(logs) => logs,
            Err(e) => {
                warn!(
                    %token,
                    to_block,
                    error = %e,
                    "transfer harvest failed; no holder data available"
                );
                return Harvest::default();
            }
        };

        let truncated = logs.len() >= self.page_size;
        if truncated {
            warn!(
                %token,
                page_size = self.page_size,
                "transfer log page is full; holder set is truncated"
            );
        }

        let holders = extract_holders(&logs, to_block);
        debug!(%token, events = logs.len(), holders = holders.len(), "harvested holders");
        Harvest { holders, truncated }
    }
}

/// Unique non-zero senders and receivers. Malformed logs and logs past
/// `to_block` are skipped.
pub fn extract_holders(logs: &[TransferLog], to_block: u64) -> BTreeSet<Address> {
    let mut holders = BTreeSet::new();

    for log in logs {
        if log.topics.len() < 3 {
            continue;
        }
        if log.block().is_some_and(|block| block > to_block) {
            continue;
        }
        for topic in &log.topics[1..3] {
            if let Some(address) = parse_topic_address(topic) {
                if !address.is_zero() {
                    holders.insert(address);
                }
            }
        }
    }

    holders
}

/// Address from an indexed 32-byte topic. The upper 12 bytes must be zero.
fn parse_topic_address(topic: &str) -> Option<Address> {
    let word: B256 = topic.parse().ok()?;
    if word[..12].iter().any(|byte| *byte != 0) {
        return None;
    }
    Some(Address::from_word(word))
}
