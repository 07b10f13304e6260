//! One snapshot run, end to end.
//!
//! harvest -> classify -> balances + pool expansion -> exclusions ->
//! rewards -> Merkle tree -> store. Nothing is written unless every fatal
//! step succeeded.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::balances::{self, BalanceMap};
use crate::chain::{ChainClient, Reader};
use crate::classifier::Classifier;
use crate::common::hex_encode;
use crate::config::SnapshotConfig;
use crate::contract::DistributionContract;
use crate::error::{SnapshotError, SnapshotResult};
use crate::expander::{Expansion, PoolExpander};
use crate::harvester::TransferHarvester;
use crate::merkle;
use crate::positions::PositionIndex;
use crate::rewards::RewardCalculator;
use crate::store::DistributionStore;
use crate::types::{
    Address, Claim, Classification, Distribution, DistributionMetadata, ExpansionOutcome, Hash,
    PoolReport, U256,
};

/// A computed but not yet numbered distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub merkle_root: Hash,
    #[serde(with = "crate::types::u256_dec")]
    pub total_rewards: U256,
    pub claims: BTreeMap<Address, Claim>,
    pub metadata: DistributionMetadata,
}

impl Snapshot {
    pub fn into_distribution(self, id: u64) -> Distribution {
        Distribution {
            id,
            merkle_root: self.merkle_root,
            total_rewards: self.total_rewards,
            claims: self.claims,
            metadata: self.metadata,
        }
    }
}

/// What one holder contributes to the balance map.
struct HolderResult {
    balances: BalanceMap,
    report: Option<PoolReport>,
}

pub struct Pipeline {
    config: SnapshotConfig,
    reader: Reader,
    harvester: TransferHarvester,
    classifier: Classifier,
    expander: PoolExpander,
    contract: DistributionContract,
    store: Arc<dyn DistributionStore>,
}

impl Pipeline {
    pub fn new(
        config: SnapshotConfig,
        chain: Arc<dyn ChainClient>,
        positions: Option<Arc<dyn PositionIndex>>,
        store: Arc<dyn DistributionStore>,
    ) -> Self {
        let limiter = Arc::new(config.rate_limiter());
        let reader = Reader::new(chain, limiter, config.retry);
        let harvester = TransferHarvester::new(reader.clone(), config.page_size);
        let classifier = Classifier::new(reader.clone(), config.overrides.approved_pools.clone());
        let expander = PoolExpander::new(reader.clone(), harvester.clone(), positions);
        let contract = DistributionContract::new(reader.clone(), config.distribution_contract);

        Self {
            config,
            reader,
            harvester,
            classifier,
            expander,
            contract,
            store,
        }
    }

    /// Computes and stores a distribution under the next free id.
    pub async fn run(&self) -> SnapshotResult<Distribution> {
        let snapshot = self.compute().await?;
        let id = self.store.next_id().await?;
        let distribution = snapshot.into_distribution(id);
        self.store.insert(&distribution).await?;

        info!(
            id,
            root = %hex_encode(distribution.merkle_root),
            claims = distribution.claims.len(),
            total_rewards = %distribution.total_rewards,
            "distribution published"
        );
        Ok(distribution)
    }

    /// Computes a snapshot without touching the store.
    pub async fn compute(&self) -> SnapshotResult<Snapshot> {
        let token = self.config.target_token;
        let block = match self.config.snapshot_block {
            Some(block) => block,
            None => self.reader.block_number().await?,
        };
        info!(%token, block, "starting snapshot");

        let info = self
            .contract
            .current_distribution_info(block)
            .await
            .map_err(SnapshotError::DistributionContract)?;
        let mut excluded = self
            .contract
            .excluded_addresses(block)
            .await
            .map_err(SnapshotError::DistributionContract)?;
        excluded.extend(self.config.overrides.excluded.iter().copied());

        let decimals = match self.config.token_decimals {
            Some(decimals) => decimals,
            None => self.reader.decimals(token, block).await?,
        };
        let calculator = RewardCalculator::new(info.reward_per_token, decimals)?;
        debug!(
            onchain_id = %info.id,
            reward_per_token = %info.reward_per_token,
            decimals,
            excluded = excluded.len(),
            "distribution parameters"
        );

        let harvest = self.harvester.holders(token, block).await;
        if harvest.is_empty() {
            return Err(SnapshotError::NoHolders(token));
        }
        let holder_count = harvest.holders.len();
        info!(holders = holder_count, truncated = harvest.truncated, "holders harvested");

        let classified = self.classify_all(harvest.holders, block).await;
        let pool_count = classified
            .iter()
            .filter(|(_, class)| class.pool_kind().is_some())
            .count();
        info!(pools = pool_count, "addresses classified");

        // Excluded pools are still expanded; exclusion only drops the pool's
        // own entry, so its providers keep their shares.
        let (mut balances, pools) = self.collect_balances(classified, block).await?;
        let removed = balances::apply_exclusions(&mut balances, &excluded);
        debug!(removed, remaining = balances.len(), "exclusions applied");

        let rewards = calculator.rewards(&balances)?;
        if rewards.is_empty() {
            return Err(SnapshotError::NoClaims);
        }
        let total_rewards = rewards.iter().try_fold(U256::ZERO, |acc, (_, reward)| {
            acc.checked_add(*reward)
                .ok_or(SnapshotError::Overflow("summing rewards"))
        })?;

        let (merkle_root, claims) = merkle::build_claims(&rewards);
        info!(claims = claims.len(), %total_rewards, "merkle tree built");

        Ok(Snapshot {
            merkle_root,
            total_rewards,
            claims,
            metadata: DistributionMetadata {
                generated_at: unix_now(),
                snapshot_block: block,
                token,
                token_decimals: decimals,
                onchain_distribution_id: info.id,
                reward_per_token: info.reward_per_token,
                holder_count,
                holders_truncated: harvest.truncated,
                excluded_count: excluded.len(),
                pools,
            },
        })
    }

    async fn classify_all(
        &self,
        holders: BTreeSet<Address>,
        block: u64,
    ) -> Vec<(Address, Classification)> {
        self.reader
            .limiter()
            .run_batched(holders, |address| async move {
                (address, self.classifier.classify(address, block).await)
            })
            .await
    }

    /// Direct balances, with detected pools replaced by their providers'
    /// shares where expansion succeeds.
    async fn collect_balances(
        &self,
        classified: Vec<(Address, Classification)>,
        block: u64,
    ) -> SnapshotResult<(BalanceMap, Vec<PoolReport>)> {
        let results = self
            .reader
            .limiter()
            .run_batched(classified, |(address, classification)| async move {
                self.holder_balances(address, classification, block).await
            })
            .await;

        let mut partials = Vec::with_capacity(results.len());
        let mut pools = Vec::new();
        for result in results {
            let HolderResult { balances, report } = result?;
            partials.push(balances);
            pools.extend(report);
        }
        Ok((balances::fold(partials)?, pools))
    }

    async fn holder_balances(
        &self,
        address: Address,
        classification: Classification,
        block: u64,
    ) -> SnapshotResult<HolderResult> {
        let token = self.config.target_token;
        let balance = self.reader.balance_of(token, address, block).await?;

        let mut partial = BalanceMap::new();
        let Some(kind) = classification.pool_kind() else {
            balances::credit(&mut partial, address, balance)?;
            return Ok(HolderResult {
                balances: partial,
                report: None,
            });
        };

        let outcome = match self.expander.expand(address, kind, token, block, balance).await {
            Expansion::Redistributed(shares) => {
                let providers = shares.len();
                balances::merge(&mut partial, shares)?;
                ExpansionOutcome::Redistributed { providers }
            }
            Expansion::Fallback(reason) => {
                if !balance.is_zero() {
                    warn!(pool = %address, %balance, "pool keeps its raw balance");
                }
                balances::credit(&mut partial, address, balance)?;
                ExpansionOutcome::Fallback { reason }
            }
        };

        Ok(HolderResult {
            balances: partial,
            report: Some(PoolReport {
                address,
                classification,
                outcome,
            }),
        })
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}
