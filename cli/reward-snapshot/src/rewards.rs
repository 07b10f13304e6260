//! Balance to reward conversion.

use crate::balances::BalanceMap;
use crate::error::SnapshotError;
use crate::types::{Address, U256};

/// `reward = floor(balance * reward_per_token / 10^decimals)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardCalculator {
    reward_per_token: U256,
    scale: U256,
}

impl RewardCalculator {
    pub fn new(reward_per_token: U256, decimals: u8) -> Result<Self, SnapshotError> {
        let scale = U256::from(10u64)
            .checked_pow(U256::from(decimals))
            .ok_or(SnapshotError::Overflow("scaling token decimals"))?;
        Ok(Self {
            reward_per_token,
            scale,
        })
    }

    pub fn reward(&self, balance: U256) -> Result<U256, SnapshotError> {
        let scaled = balance
            .checked_mul(self.reward_per_token)
            .ok_or(SnapshotError::Overflow("computing rewards"))?;
        Ok(scaled / self.scale)
    }

    /// Rewards in balance-map order. Zero rewards are left out.
    pub fn rewards(&self, balances: &BalanceMap) -> Result<Vec<(Address, U256)>, SnapshotError> {
        let mut rewards = Vec::with_capacity(balances.len());
        for (address, balance) in balances {
            let reward = self.reward(*balance)?;
            if !reward.is_zero() {
                rewards.push((*address, reward));
            }
        }
        Ok(rewards)
    }
}
