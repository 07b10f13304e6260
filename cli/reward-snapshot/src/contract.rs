//! Read interface of the on-chain distribution contract.

use std::collections::BTreeSet;

use crate::bindings::IRewardDistributor;
use crate::chain::Reader;
use crate::error::ChainError;
use crate::types::{Address, U256};

/// `getCurrentDistributionInfo()` return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistributionInfo {
    pub id: U256,
    pub reward_per_token: U256,
    pub total_supply: U256,
    pub timestamp: U256,
}

impl From<IRewardDistributor::getCurrentDistributionInfoReturn> for DistributionInfo {
    fn from(ret: IRewardDistributor::getCurrentDistributionInfoReturn) -> Self {
        Self {
            id: ret.id,
            reward_per_token: ret.rewardPerToken,
            total_supply: ret.totalSupply,
            timestamp: ret.timestamp,
        }
    }
}

#[derive(Clone)]
pub struct DistributionContract {
    reader: Reader,
    address: Address,
}

impl DistributionContract {
    pub fn new(reader: Reader, address: Address) -> Self {
        Self { reader, address }
    }

    pub async fn excluded_addresses(&self, block: u64) -> Result<BTreeSet<Address>, ChainError> {
        let excluded = self
            .reader
            .read(self.address, IRewardDistributor::getExcludedAddressesCall {}, block)
            .await?;
        Ok(excluded.into_iter().collect())
    }

    pub async fn current_distribution_info(
        &self,
        block: u64,
    ) -> Result<DistributionInfo, ChainError> {
        let info = self
            .reader
            .read(self.address, IRewardDistributor::getCurrentDistributionInfoCall {}, block)
            .await?;
        Ok(info.into())
    }
}
