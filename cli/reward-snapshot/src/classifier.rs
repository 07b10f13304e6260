//! Heuristic address classification.
//!
//! Code presence is authoritative for EOAs. Everything else is decided by
//! speculative calls against known pool interfaces, tried in a fixed order.
//! A failing probe only means "this interface is absent".

use std::collections::BTreeSet;
use std::sync::Arc;

use alloy::sol_types::SolCall;
use tracing::{debug, warn};

use crate::bindings::{IAerodromePool, IBalancerPool, ICurvePool, IUniswapV2Pair, IUniswapV3Pool};
use crate::chain::Reader;
use crate::types::{Address, Classification, PoolKind, U256};

/// One read-only call a probe requires.
#[derive(Clone)]
pub struct ProbeCall {
    pub signature: &'static str,
    data: Vec<u8>,
    /// The return data decodes as the interface says it should.
    decodes: fn(&[u8]) -> bool,
}

impl ProbeCall {
    pub fn new<C: SolCall>(call: C) -> Self {
        Self {
            signature: C::SIGNATURE,
            data: call.abi_encode(),
            decodes: |ret| C::abi_decode_returns(ret).is_ok(),
        }
    }
}

/// A capability probe: all calls must succeed for `kind` to match.
#[derive(Clone)]
pub struct Probe {
    pub name: &'static str,
    pub kind: PoolKind,
    pub calls: Vec<ProbeCall>,
}

/// Probes in priority order; the first match wins.
pub fn probes() -> Vec<Probe> {
    vec![
        Probe {
            name: "constant-product",
            kind: PoolKind::ConstantProduct,
            calls: vec![
                ProbeCall::new(IUniswapV2Pair::getReservesCall {}),
                ProbeCall::new(IUniswapV2Pair::price0CumulativeLastCall {}),
            ],
        },
        Probe {
            name: "aerodrome",
            kind: PoolKind::Aerodrome,
            calls: vec![
                ProbeCall::new(IUniswapV2Pair::getReservesCall {}),
                ProbeCall::new(IAerodromePool::stableCall {}),
            ],
        },
        Probe {
            name: "concentrated-liquidity",
            kind: PoolKind::ConcentratedLiquidity,
            calls: vec![
                ProbeCall::new(IUniswapV3Pool::slot0Call {}),
                ProbeCall::new(IUniswapV3Pool::liquidityCall {}),
            ],
        },
        Probe {
            name: "curve",
            kind: PoolKind::Unknown,
            calls: vec![ProbeCall::new(ICurvePool::coinsCall { i: U256::ZERO })],
        },
        Probe {
            name: "weighted",
            kind: PoolKind::Unknown,
            calls: vec![ProbeCall::new(IBalancerPool::getPoolIdCall {})],
        },
    ]
}

#[derive(Clone)]
pub struct Classifier {
    reader: Reader,
    probes: Arc<[Probe]>,
    approved_pools: BTreeSet<Address>,
}

impl Classifier {
    pub fn new(reader: Reader, approved_pools: BTreeSet<Address>) -> Self {
        Self {
            reader,
            probes: probes().into(),
            approved_pools,
        }
    }

    pub async fn classify(&self, address: Address, block: u64) -> Classification {
        let code = match self.reader.code_at(address, block).await {
            Ok(code) => code,
            Err(e) => {
                // Unknown code is never assumed empty.
                warn!(%address, error = %e, "code lookup failed; treating as generic contract");
                return Classification::Contract;
            }
        };
        if code.is_empty() {
            return Classification::Eoa;
        }

        let detected = self.detect_pool_kind(address, block).await;
        let classification = match detected {
            Some(kind) => Classification::Pool(kind),
            None if self.approved_pools.contains(&address) => {
                Classification::Pool(PoolKind::Unknown)
            }
            None => Classification::Contract,
        };
        debug!(%address, ?classification, "classified");
        classification
    }

    /// Runs the probes in order and returns the first matching kind.
    pub async fn detect_pool_kind(&self, address: Address, block: u64) -> Option<PoolKind> {
        for probe in self.probes.iter() {
            if self.matches(probe, address, block).await {
                debug!(%address, probe = probe.name, "pool probe matched");
                return Some(probe.kind);
            }
        }
        None
    }

    async fn matches(&self, probe: &Probe, address: Address, block: u64) -> bool {
        for call in &probe.calls {
            match self.reader.probe(address, &call.data, block).await {
                Ok(ret) if (call.decodes)(&ret) => {}
                _ => {
                    debug!(%address, call = call.signature, "probe call failed");
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::aliases::{I24, U112, U160};

    use super::*;
    use crate::chain::MemoryChain;
    use crate::rate_limit::RateLimiter;
    use crate::retry::RetryPolicy;

    const BLOCK: u64 = 100;

    fn classifier(chain: MemoryChain, approved: &[Address]) -> Classifier {
        let reader = Reader::new(
            Arc::new(chain),
            Arc::new(RateLimiter::unthrottled(4)),
            RetryPolicy::none(),
        );
        Classifier::new(reader, approved.iter().copied().collect())
    }

    fn script_reserves(chain: &mut MemoryChain, pool: Address) {
        let reserves = IUniswapV2Pair::getReservesReturn {
            reserve0: U112::from(1u64),
            reserve1: U112::from(2u64),
            blockTimestampLast: 3,
        };
        chain
            .deploy(pool)
            .respond(pool, IUniswapV2Pair::getReservesCall {}, reserves);
    }

    fn script_v2(chain: &mut MemoryChain, pool: Address) {
        script_reserves(chain, pool);
        chain.respond(pool, IUniswapV2Pair::price0CumulativeLastCall {}, U256::from(1u64));
    }

    fn script_aerodrome(chain: &mut MemoryChain, pool: Address) {
        script_reserves(chain, pool);
        chain.respond(pool, IAerodromePool::stableCall {}, false);
    }

    #[tokio::test]
    async fn test_empty_code_is_eoa_even_when_approved() {
        let addr = Address::repeat_byte(1);
        let classifier = classifier(MemoryChain::new(BLOCK), &[addr]);
        assert_eq!(classifier.classify(addr, BLOCK).await, Classification::Eoa);
    }

    #[tokio::test]
    async fn test_code_without_probes_is_contract() {
        let addr = Address::repeat_byte(2);
        let mut chain = MemoryChain::new(BLOCK);
        chain.deploy(addr);
        let classifier = classifier(chain, &[]);
        assert_eq!(classifier.classify(addr, BLOCK).await, Classification::Contract);
    }

    #[tokio::test]
    async fn test_approved_pool_without_interface_match() {
        let addr = Address::repeat_byte(3);
        let mut chain = MemoryChain::new(BLOCK);
        chain.deploy(addr);
        let classifier = classifier(chain, &[addr]);
        assert_eq!(
            classifier.classify(addr, BLOCK).await,
            Classification::Pool(PoolKind::Unknown)
        );
    }

    #[tokio::test]
    async fn test_detection_priority() {
        let v2 = Address::repeat_byte(4);
        let aero = Address::repeat_byte(5);
        let mut chain = MemoryChain::new(BLOCK);
        script_v2(&mut chain, v2);
        script_aerodrome(&mut chain, aero);
        let classifier = classifier(chain, &[]);

        assert_eq!(
            classifier.classify(v2, BLOCK).await,
            Classification::Pool(PoolKind::ConstantProduct)
        );
        assert_eq!(
            classifier.classify(aero, BLOCK).await,
            Classification::Pool(PoolKind::Aerodrome)
        );
    }

    #[tokio::test]
    async fn test_concentrated_and_short_returns() {
        let v3 = Address::repeat_byte(6);
        let broken = Address::repeat_byte(7);
        let mut chain = MemoryChain::new(BLOCK);
        let slot0 = IUniswapV3Pool::slot0Return {
            sqrtPriceX96: U160::from(1u64),
            tick: I24::ZERO,
            observationIndex: 0,
            observationCardinality: 1,
            observationCardinalityNext: 1,
            feeProtocol: 0,
            unlocked: true,
        };
        chain
            .deploy(v3)
            .respond(v3, IUniswapV3Pool::slot0Call {}, slot0)
            .respond(v3, IUniswapV3Pool::liquidityCall {}, 1)
            .deploy(broken)
            .respond_raw(broken, IUniswapV3Pool::slot0Call {}, vec![0u8; 64])
            .respond(broken, IUniswapV3Pool::liquidityCall {}, 1);
        let classifier = classifier(chain, &[]);

        assert_eq!(
            classifier.classify(v3, BLOCK).await,
            Classification::Pool(PoolKind::ConcentratedLiquidity)
        );
        assert_eq!(classifier.classify(broken, BLOCK).await, Classification::Contract);
    }

    #[tokio::test]
    async fn test_curve_style_is_unknown_pool() {
        let curve = Address::repeat_byte(8);
        let mut chain = MemoryChain::new(BLOCK);
        chain.deploy(curve).respond(
            curve,
            ICurvePool::coinsCall { i: U256::ZERO },
            Address::repeat_byte(9),
        );
        let classifier = classifier(chain, &[]);
        assert_eq!(
            classifier.classify(curve, BLOCK).await,
            Classification::Pool(PoolKind::Unknown)
        );
    }

    #[tokio::test]
    async fn test_code_lookup_failure_is_contract() {
        let addr = Address::repeat_byte(10);
        let chain = MemoryChain::new(BLOCK);
        chain.fail_code(addr, true);
        let classifier = classifier(chain, &[]);
        assert_eq!(classifier.classify(addr, BLOCK).await, Classification::Contract);
    }
}
