//! Solidity interfaces the pipeline reads from.
//!
//! Only the calls and events actually used are declared. Encoding and
//! decoding go through the generated `SolCall`/`SolEvent` types.

use alloy::sol;

sol! {
    /// Token reads plus the event used for holder discovery.
    interface IERC20 {
        event Transfer(address indexed from, address indexed to, uint256 value);

        function balanceOf(address account) external view returns (uint256);
        function totalSupply() external view returns (uint256);
        function decimals() external view returns (uint8);
    }

    /// Uniswap V2 style pair. Aerodrome pairs share `getReserves`/`token0`/`token1`.
    interface IUniswapV2Pair {
        function getReserves()
            external
            view
            returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
        function token0() external view returns (address);
        function token1() external view returns (address);
        function price0CumulativeLast() external view returns (uint256);
    }

    interface IAerodromePool {
        function stable() external view returns (bool);
    }

    interface IUniswapV3Pool {
        function slot0()
            external
            view
            returns (
                uint160 sqrtPriceX96,
                int24 tick,
                uint16 observationIndex,
                uint16 observationCardinality,
                uint16 observationCardinalityNext,
                uint8 feeProtocol,
                bool unlocked
            );
        function liquidity() external view returns (uint128);
    }

    interface ICurvePool {
        function coins(uint256 i) external view returns (address);
    }

    interface IBalancerPool {
        function getPoolId() external view returns (bytes32);
    }

    /// The on-chain distributor the Merkle root is published to.
    interface IRewardDistributor {
        function getExcludedAddresses() external view returns (address[] memory);
        function getCurrentDistributionInfo()
            external
            view
            returns (uint256 id, uint256 rewardPerToken, uint256 totalSupply, uint256 timestamp);
    }
}
