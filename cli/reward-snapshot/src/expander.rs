//! Liquidity-pool expansion.
//!
//! A pool's holding of the target token is split among its liquidity
//! providers in proportion to their stake. Anything inconsistent about the
//! pool aborts that pool's expansion only: the pool then keeps its raw
//! balance.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::balances::{self, BalanceMap};
use crate::bindings::IUniswapV2Pair;
use crate::chain::Reader;
use crate::error::ChainError;
use crate::harvester::TransferHarvester;
use crate::positions::PositionIndex;
use crate::types::{Address, PoolKind, U256};

/// Result of expanding one pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    Redistributed(BalanceMap),
    Fallback(String),
}

#[derive(Error, Debug)]
pub enum ExpansionError {
    #[error("pool receipt token has zero total supply")]
    ZeroTotalSupply,

    #[error("pool positions have zero total liquidity")]
    ZeroTotalLiquidity,

    #[error("target token is not one of the pool's tokens")]
    TargetNotInPool,

    #[error("no liquidity providers found")]
    NoProviders,

    #[error("receipt balances {held} exceed total supply {supply}")]
    ReceiptOversubscribed { held: U256, supply: U256 },

    #[error("provider shares {assigned} exceed pool holding {available}")]
    SharesExceedReserve { assigned: U256, available: U256 },

    #[error("position index unavailable")]
    PositionsUnavailable,

    #[error("no expansion rule for {0:?} pools")]
    UnsupportedKind(PoolKind),

    #[error("arithmetic overflow")]
    Overflow,

    #[error(transparent)]
    Chain(#[from] ChainError),
}

#[derive(Clone)]
pub struct PoolExpander {
    reader: Reader,
    harvester: TransferHarvester,
    positions: Option<Arc<dyn PositionIndex>>,
}

impl PoolExpander {
    pub fn new(
        reader: Reader,
        harvester: TransferHarvester,
        positions: Option<Arc<dyn PositionIndex>>,
    ) -> Self {
        Self {
            reader,
            harvester,
            positions,
        }
    }

    /// Never fails: every error becomes a `Fallback`.
    pub async fn expand(
        &self,
        pool: Address,
        kind: PoolKind,
        target: Address,
        block: u64,
        pool_balance: U256,
    ) -> Expansion {
        let result = match kind {
            PoolKind::ConstantProduct | PoolKind::Aerodrome => {
                self.expand_reserves(pool, target, block).await
            }
            PoolKind::ConcentratedLiquidity => self.expand_positions(pool, pool_balance).await,
            PoolKind::Unknown => Err(ExpansionError::UnsupportedKind(kind)),
        };

        match result {
            Ok(shares) => {
                debug!(%pool, ?kind, providers = shares.len(), "pool expanded");
                Expansion::Redistributed(shares)
            }
            Err(e) => {
                warn!(%pool, ?kind, reason = %e, "pool expansion fell back to raw balance");
                Expansion::Fallback(e.to_string())
            }
        }
    }

    async fn expand_reserves(
        &self,
        pool: Address,
        target: Address,
        block: u64,
    ) -> Result<BalanceMap, ExpansionError> {
        let token0 = self.reader.read(pool, IUniswapV2Pair::token0Call {}, block).await?;
        let token1 = self.reader.read(pool, IUniswapV2Pair::token1Call {}, block).await?;
        if token0 != target && token1 != target {
            return Err(ExpansionError::TargetNotInPool);
        }

        let reserves = self
            .reader
            .read(pool, IUniswapV2Pair::getReservesCall {}, block)
            .await?;
        let reserve = if token0 == target {
            U256::from(reserves.reserve0)
        } else {
            U256::from(reserves.reserve1)
        };

        let supply = self.reader.total_supply(pool, block).await?;
        if supply.is_zero() {
            return Err(ExpansionError::ZeroTotalSupply);
        }

        let harvest = self.harvester.holders(pool, block).await;
        let providers: Vec<Address> = harvest
            .holders
            .into_iter()
            .filter(|holder| *holder != pool && !holder.is_zero())
            .collect();
        if providers.is_empty() {
            return Err(ExpansionError::NoProviders);
        }

        let reads = self
            .reader
            .limiter()
            .run_batched(providers, |holder| async move {
                let balance = self.reader.balance_of(pool, holder, block).await?;
                Ok::<_, ChainError>((holder, balance))
            })
            .await;
        let stakes = reads.into_iter().collect::<Result<Vec<_>, _>>()?;

        proportional_shares(&stakes, supply, reserve)
    }

    async fn expand_positions(
        &self,
        pool: Address,
        pool_balance: U256,
    ) -> Result<BalanceMap, ExpansionError> {
        let index = self
            .positions
            .as_ref()
            .ok_or(ExpansionError::PositionsUnavailable)?;
        let positions = index.positions(pool).await?;
        if positions.is_empty() {
            return Err(ExpansionError::NoProviders);
        }

        let mut liquidity: BTreeMap<Address, U256> = BTreeMap::new();
        for position in positions {
            if position.owner == pool || position.owner.is_zero() {
                continue;
            }
            balances::credit(&mut liquidity, position.owner, position.liquidity)
                .map_err(|_| ExpansionError::Overflow)?;
        }
        let stakes: Vec<(Address, U256)> = liquidity.into_iter().collect();

        let total = stakes.iter().try_fold(U256::ZERO, |acc, (_, l)| {
            acc.checked_add(*l).ok_or(ExpansionError::Overflow)
        })?;
        if total.is_zero() {
            return Err(ExpansionError::ZeroTotalLiquidity);
        }

        proportional_shares(&stakes, total, pool_balance)
    }
}

/// Splits `amount` over `stakes` as `floor(stake * amount / total)`.
///
/// Zero shares are dropped and the rounding remainder stays unassigned.
/// Fails if the stakes add up to more than `total` or the shares to more
/// than `amount`.
pub fn proportional_shares(
    stakes: &[(Address, U256)],
    total: U256,
    amount: U256,
) -> Result<BalanceMap, ExpansionError> {
    if total.is_zero() {
        return Err(ExpansionError::ZeroTotalSupply);
    }

    let mut held = U256::ZERO;
    let mut assigned = U256::ZERO;
    let mut shares = BalanceMap::new();

    for (holder, stake) in stakes {
        held = held.checked_add(*stake).ok_or(ExpansionError::Overflow)?;
        let share = stake.checked_mul(amount).ok_or(ExpansionError::Overflow)? / total;
        if share.is_zero() {
            continue;
        }
        assigned = assigned.checked_add(share).ok_or(ExpansionError::Overflow)?;
        balances::credit(&mut shares, *holder, share).map_err(|_| ExpansionError::Overflow)?;
    }

    if held > total {
        return Err(ExpansionError::ReceiptOversubscribed { held, supply: total });
    }
    if assigned > amount {
        return Err(ExpansionError::SharesExceedReserve {
            assigned,
            available: amount,
        });
    }
    if shares.is_empty() {
        return Err(ExpansionError::NoProviders);
    }
    Ok(shares)
}
