//! Shared fixtures for pipeline integration tests.
//!
//! The scripted world at `BLOCK`:
//!
//! | holder     | kind                       | token balance |
//! |------------|----------------------------|---------------|
//! | ALICE      | EOA                        | 1000          |
//! | BOB        | EOA                        | 600           |
//! | V2_POOL    | constant-product pool      | 400           |
//! | V3_POOL    | concentrated-liquidity     | 300           |
//! | EXCLUDED   | EOA, on the contract list  | 500           |
//! | VAULT      | generic contract           | 200           |
//!
//! V2 receipt holders: CAROL 60, BOB 40 of a supply of 100.
//! V3 positions: DAVE 3, EXCLUDED 1.
//! Reward rate 50 at 2 decimals, i.e. half the balance.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::aliases::{I24, U112, U160};
use reward_snapshot::bindings::{IRewardDistributor, IUniswapV2Pair, IUniswapV3Pool, IERC20};
use reward_snapshot::chain::MemoryChain;
use reward_snapshot::positions::{PositionIndex, StaticPositionIndex};
use reward_snapshot::retry::RetryPolicy;
use reward_snapshot::{Address, DistributionStore, Pipeline, SnapshotConfig, U256};

pub const BLOCK: u64 = 1_000;

pub const TOKEN: Address = Address::repeat_byte(0xaa);
pub const OTHER_TOKEN: Address = Address::repeat_byte(0xab);
pub const DISTRIBUTOR: Address = Address::repeat_byte(0xd1);

pub const ALICE: Address = Address::repeat_byte(0x01);
pub const BOB: Address = Address::repeat_byte(0x02);
pub const CAROL: Address = Address::repeat_byte(0x03);
pub const DAVE: Address = Address::repeat_byte(0x04);
pub const VAULT: Address = Address::repeat_byte(0x0c);
pub const EXCLUDED: Address = Address::repeat_byte(0xee);
pub const V2_POOL: Address = Address::repeat_byte(0x20);
pub const V3_POOL: Address = Address::repeat_byte(0x30);

pub const ONCHAIN_ID: u64 = 7;
pub const REWARD_PER_TOKEN: u64 = 50;
pub const DECIMALS: u8 = 2;

/// Knobs for building slightly different worlds.
#[derive(Debug, Clone, Copy)]
pub struct WorldOptions {
    pub v2_supply: u64,
}

impl Default for WorldOptions {
    fn default() -> Self {
        Self { v2_supply: 100 }
    }
}

pub fn world() -> MemoryChain {
    world_with(WorldOptions::default())
}

pub fn world_with(options: WorldOptions) -> MemoryChain {
    let mut chain = MemoryChain::new(BLOCK + 10);

    let info = IRewardDistributor::getCurrentDistributionInfoReturn {
        id: U256::from(ONCHAIN_ID),
        rewardPerToken: U256::from(REWARD_PER_TOKEN),
        totalSupply: U256::from(1_000_000u64),
        timestamp: U256::from(1_700_000_000u64),
    };
    chain
        .respond(
            DISTRIBUTOR,
            IRewardDistributor::getCurrentDistributionInfoCall {},
            info,
        )
        .respond(
            DISTRIBUTOR,
            IRewardDistributor::getExcludedAddressesCall {},
            vec![EXCLUDED],
        )
        .respond(TOKEN, IERC20::decimalsCall {}, DECIMALS);

    let holders = [
        (ALICE, 1000),
        (BOB, 600),
        (V2_POOL, 400),
        (V3_POOL, 300),
        (EXCLUDED, 500),
        (VAULT, 200),
    ];
    for (block, (holder, amount)) in (1u64..).zip(holders) {
        chain
            .transfer(TOKEN, Address::ZERO, holder, amount, block)
            .balance(TOKEN, holder, amount);
    }
    // Activity after the snapshot block is ignored.
    chain.transfer(TOKEN, ALICE, Address::repeat_byte(0x99), 1, BLOCK + 5);

    chain.deploy(VAULT);

    chain
        .deploy(V2_POOL)
        .respond(
            V2_POOL,
            IUniswapV2Pair::getReservesCall {},
            IUniswapV2Pair::getReservesReturn {
                reserve0: U112::from(400u64),
                reserve1: U112::from(9_999u64),
                blockTimestampLast: 1,
            },
        )
        .respond(V2_POOL, IUniswapV2Pair::price0CumulativeLastCall {}, U256::from(1u64))
        .respond(V2_POOL, IUniswapV2Pair::token0Call {}, TOKEN)
        .respond(V2_POOL, IUniswapV2Pair::token1Call {}, OTHER_TOKEN)
        .respond(V2_POOL, IERC20::totalSupplyCall {}, U256::from(options.v2_supply))
        .transfer(V2_POOL, Address::ZERO, CAROL, 60, 10)
        .transfer(V2_POOL, Address::ZERO, BOB, 40, 11)
        .balance(V2_POOL, CAROL, 60)
        .balance(V2_POOL, BOB, 40);

    let slot0 = IUniswapV3Pool::slot0Return {
        sqrtPriceX96: U160::from(1u64) << 96,
        tick: I24::ZERO,
        observationIndex: 0,
        observationCardinality: 1,
        observationCardinalityNext: 1,
        feeProtocol: 0,
        unlocked: true,
    };
    chain
        .deploy(V3_POOL)
        .respond(V3_POOL, IUniswapV3Pool::slot0Call {}, slot0)
        .respond(V3_POOL, IUniswapV3Pool::liquidityCall {}, 4);

    chain
}

pub fn positions() -> Arc<dyn PositionIndex> {
    let mut index = StaticPositionIndex::new();
    index.insert(V3_POOL, DAVE, 3).insert(V3_POOL, EXCLUDED, 1);
    Arc::new(index)
}

pub fn config() -> SnapshotConfig {
    let mut config = SnapshotConfig::new(TOKEN, DISTRIBUTOR);
    config.snapshot_block = Some(BLOCK);
    config.page_size = 100;
    config.max_concurrency = 4;
    config.batch_size = 2;
    config.batch_delay = Duration::ZERO;
    config.retry = RetryPolicy {
        attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
    };
    config
}

pub fn pipeline(chain: Arc<MemoryChain>, store: Arc<dyn DistributionStore>) -> Pipeline {
    Pipeline::new(config(), chain, Some(positions()), store)
}

pub fn amount(n: u64) -> U256 {
    U256::from(n)
}
