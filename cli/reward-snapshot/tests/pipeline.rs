//! End-to-end pipeline runs against a scripted chain.

mod common;

use std::sync::Arc;

use reward_snapshot::bindings::IERC20;
use reward_snapshot::merkle::verify_claim;
use reward_snapshot::types::{Classification, ExpansionOutcome, PoolKind};
use reward_snapshot::{
    ChainError, DistributionStore, FileStore, MemoryStore, SnapshotError, StoreError,
};

use common::*;

#[tokio::test]
async fn test_full_run_balances_and_rewards() {
    let store = Arc::new(MemoryStore::new());
    let distribution = pipeline(Arc::new(world()), store.clone()).run().await.unwrap();

    assert_eq!(distribution.id, 1);
    let rewards: Vec<_> = distribution
        .claims
        .values()
        .map(|claim| (claim.account, claim.amount))
        .collect();
    assert_eq!(
        rewards,
        vec![
            (ALICE, amount(500)),
            (BOB, amount(380)),
            (CAROL, amount(120)),
            (DAVE, amount(112)),
            (VAULT, amount(100)),
        ]
    );
    assert_eq!(distribution.total_rewards, amount(1212));

    // Indices are dense and follow address order.
    let indices: Vec<u64> = distribution.claims.values().map(|claim| claim.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);

    let metadata = &distribution.metadata;
    assert_eq!(metadata.snapshot_block, BLOCK);
    assert_eq!(metadata.token, TOKEN);
    assert_eq!(metadata.token_decimals, 2);
    assert_eq!(metadata.onchain_distribution_id, amount(ONCHAIN_ID));
    assert_eq!(metadata.reward_per_token, amount(REWARD_PER_TOKEN));
    assert_eq!(metadata.holder_count, 6);
    assert!(!metadata.holders_truncated);
    assert_eq!(metadata.excluded_count, 1);
    assert_eq!(metadata.pools.len(), 2);
    assert_eq!(metadata.pools[0].address, V2_POOL);
    assert_eq!(
        metadata.pools[0].classification,
        Classification::Pool(PoolKind::ConstantProduct)
    );
    assert_eq!(
        metadata.pools[1].classification,
        Classification::Pool(PoolKind::ConcentratedLiquidity)
    );
    assert!(metadata
        .pools
        .iter()
        .all(|pool| pool.outcome == ExpansionOutcome::Redistributed { providers: 2 }));

    assert_eq!(store.get(1).await.unwrap(), Some(distribution));
}

#[tokio::test]
async fn test_every_proof_verifies() {
    let store = Arc::new(MemoryStore::new());
    let distribution = pipeline(Arc::new(world()), store).run().await.unwrap();

    for claim in distribution.claims.values() {
        assert!(
            verify_claim(&distribution.merkle_root, claim),
            "proof for {} does not verify",
            claim.account
        );
    }
}

#[tokio::test]
async fn test_same_state_same_root() {
    let chain = Arc::new(world());
    let first = pipeline(chain.clone(), Arc::new(MemoryStore::new()))
        .compute()
        .await
        .unwrap();
    let second = pipeline(chain, Arc::new(MemoryStore::new()))
        .compute()
        .await
        .unwrap();

    assert_eq!(first.merkle_root, second.merkle_root);
    assert_eq!(first.claims, second.claims);
    assert_eq!(first.metadata.pools, second.metadata.pools);
}

#[tokio::test]
async fn test_excluded_addresses_have_no_claim() {
    let distribution = pipeline(Arc::new(world()), Arc::new(MemoryStore::new()))
        .compute()
        .await
        .unwrap();

    // EXCLUDED holds the token directly and a concentrated-liquidity position.
    assert!(!distribution.claims.contains_key(&EXCLUDED));
    assert!(!distribution.claims.contains_key(&V2_POOL));
    assert!(!distribution.claims.contains_key(&V3_POOL));
}

#[tokio::test]
async fn test_static_exclusions_from_overrides() {
    let mut config = config();
    config.overrides.excluded.insert(ALICE);
    let pipeline = reward_snapshot::Pipeline::new(
        config,
        Arc::new(world()),
        Some(positions()),
        Arc::new(MemoryStore::new()),
    );

    let snapshot = pipeline.compute().await.unwrap();
    assert!(!snapshot.claims.contains_key(&ALICE));
    assert_eq!(snapshot.metadata.excluded_count, 2);
}

#[tokio::test]
async fn test_excluded_pool_is_still_split_among_providers() {
    let mut config = config();
    config.overrides.excluded.insert(V2_POOL);
    let pipeline = reward_snapshot::Pipeline::new(
        config,
        Arc::new(world()),
        Some(positions()),
        Arc::new(MemoryStore::new()),
    );

    let snapshot = pipeline.compute().await.unwrap();
    assert_eq!(snapshot.claims[&CAROL].amount, amount(120));
    // 600 held directly plus 160 from the pool
    assert_eq!(snapshot.claims[&BOB].amount, amount(380));
    assert!(!snapshot.claims.contains_key(&V2_POOL));
    assert_eq!(snapshot.metadata.excluded_count, 2);

    let report = snapshot
        .metadata
        .pools
        .iter()
        .find(|pool| pool.address == V2_POOL)
        .unwrap();
    assert_eq!(report.outcome, ExpansionOutcome::Redistributed { providers: 2 });
}

#[tokio::test]
async fn test_failed_expansion_keeps_pool_balance() {
    let chain = world_with(WorldOptions { v2_supply: 0 });
    let distribution = pipeline(Arc::new(chain), Arc::new(MemoryStore::new()))
        .run()
        .await
        .unwrap();

    assert_eq!(distribution.claims[&V2_POOL].amount, amount(200));
    assert!(!distribution.claims.contains_key(&CAROL));
    assert_eq!(distribution.claims[&BOB].amount, amount(300));

    let report = &distribution.metadata.pools[0];
    assert_eq!(report.address, V2_POOL);
    assert!(matches!(report.outcome, ExpansionOutcome::Fallback { .. }));
}

#[tokio::test]
async fn test_pools_without_position_index_fall_back() {
    let pipeline = reward_snapshot::Pipeline::new(
        config(),
        Arc::new(world()),
        None,
        Arc::new(MemoryStore::new()),
    );
    let snapshot = pipeline.compute().await.unwrap();

    assert_eq!(snapshot.claims[&V3_POOL].amount, amount(150));
    assert!(!snapshot.claims.contains_key(&DAVE));
}

#[tokio::test]
async fn test_truncated_harvest_is_flagged() {
    let mut config = config();
    config.page_size = 3;
    let pipeline = reward_snapshot::Pipeline::new(
        config,
        Arc::new(world()),
        Some(positions()),
        Arc::new(MemoryStore::new()),
    );

    let snapshot = pipeline.compute().await.unwrap();
    assert!(snapshot.metadata.holders_truncated);
    assert_eq!(snapshot.metadata.holder_count, 3);
}

#[tokio::test]
async fn test_harvest_failure_writes_nothing_then_rerun_succeeds() {
    let chain = Arc::new(world());
    let store = Arc::new(MemoryStore::new());

    chain.fail_logs(TOKEN, true);
    let err = pipeline(chain.clone(), store.clone()).run().await.unwrap_err();
    assert!(matches!(err, SnapshotError::NoHolders(token) if token == TOKEN));
    assert_eq!(store.latest_id().await.unwrap(), None);

    chain.fail_logs(TOKEN, false);
    let distribution = pipeline(chain.clone(), store.clone()).run().await.unwrap();
    assert_eq!(distribution.id, 1);

    let reference = pipeline(Arc::new(world()), Arc::new(MemoryStore::new()))
        .compute()
        .await
        .unwrap();
    assert_eq!(distribution.merkle_root, reference.merkle_root);
    assert_eq!(distribution.claims, reference.claims);
}

#[tokio::test]
async fn test_balance_failure_after_classification_writes_nothing() {
    let chain = Arc::new(world());
    let store = Arc::new(MemoryStore::new());
    let alice_balance = IERC20::balanceOfCall { account: ALICE };

    chain.fail_call(TOKEN, alice_balance.clone(), true);
    let err = pipeline(chain.clone(), store.clone()).run().await.unwrap_err();
    assert!(matches!(err, SnapshotError::Chain(ChainError::Transport(_))));
    // Every holder was classified before the balance read gave up.
    assert!(chain.code_requests() >= 6);
    assert_eq!(store.latest_id().await.unwrap(), None);

    chain.fail_call(TOKEN, alice_balance, false);
    let distribution = pipeline(chain, store.clone()).run().await.unwrap();
    assert_eq!(distribution.id, 1);

    let reference = pipeline(Arc::new(world()), Arc::new(MemoryStore::new()))
        .compute()
        .await
        .unwrap();
    assert_eq!(distribution.merkle_root, reference.merkle_root);
    assert_eq!(store.latest_id().await.unwrap(), Some(1));
}

#[tokio::test]
async fn test_distribution_contract_failure_is_fatal() {
    let mut chain = reward_snapshot::chain::MemoryChain::new(BLOCK);
    chain.transfer(TOKEN, reward_snapshot::Address::ZERO, ALICE, 10, 1);
    let store = Arc::new(MemoryStore::new());

    let err = pipeline(Arc::new(chain), store.clone()).run().await.unwrap_err();
    assert!(matches!(err, SnapshotError::DistributionContract(_)));
    assert_eq!(store.latest_id().await.unwrap(), None);
}

#[tokio::test]
async fn test_ids_increase_and_duplicates_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path().to_path_buf()).await.unwrap());
    let chain = Arc::new(world());

    let first = pipeline(chain.clone(), store.clone()).run().await.unwrap();
    let second = pipeline(chain, store.clone()).run().await.unwrap();
    assert_eq!(first.id, 1);
    assert_eq!(second.id, 2);
    assert!(store.path_for(2).exists());

    let err = store.insert(&first).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateId(1)));
    assert_eq!(store.get(1).await.unwrap(), Some(first));
}
