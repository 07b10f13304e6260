//! Merkle accumulator over reward claims.
//!
//! Leaves are sorted and de-duplicated before the tree is built and every
//! internal node hashes its children in ascending order, so proofs carry no
//! position bits and the root depends only on the set of claims.

use std::collections::BTreeMap;

use alloy::primitives::keccak256;
use alloy::sol_types::SolValue;

use crate::common::keccak256_hash;
use crate::types::{Address, Claim, Hash, U256};

/// Computes the leaf for one claim.
///
/// The preimage is `index (32 bytes) ‖ account (20 bytes) ‖ amount (32 bytes)`,
/// i.e. `abi.encodePacked(uint256, address, uint256)`.
///
/// # Arguments
/// * `index` - Dense claim index
/// * `account` - Claiming address
/// * `amount` - Reward amount
///
/// # Returns
/// 32-byte Merkle leaf
pub fn leaf_hash(index: u64, account: Address, amount: U256) -> Hash {
    keccak256((U256::from(index), account, amount).abi_encode_packed())
}

/// Hashes two siblings, smaller first.
pub fn hash_pair(a: Hash, b: Hash) -> Hash {
    if a <= b {
        keccak256_hash(a, b)
    } else {
        keccak256_hash(b, a)
    }
}

/// A fully materialized tree, leaves first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    levels: Vec<Vec<Hash>>,
}

impl MerkleTree {
    /// Builds the tree from leaves in any order.
    pub fn new(mut leaves: Vec<Hash>) -> Self {
        leaves.sort_unstable();
        leaves.dedup();

        let mut levels = vec![leaves];
        while levels.last().is_some_and(|level| level.len() > 1) {
            let next: Vec<Hash> = levels
                .last()
                .map(|level| {
                    level
                        .chunks(2)
                        // Odd node out is promoted unchanged.
                        .filter_map(|pair| match pair {
                            [left, rest @ ..] => Some(
                                rest.first()
                                    .map_or(*left, |right| hash_pair(*left, *right)),
                            ),
                            [] => None,
                        })
                        .collect()
                })
                .unwrap_or_default();
            levels.push(next);
        }

        Self { levels }
    }

    /// Number of distinct leaves.
    pub fn len(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The root, or all zeros for an empty tree.
    pub fn root(&self) -> Hash {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or(Hash::ZERO)
    }

    /// Sibling hashes from `leaf` up to the root. `None` if the leaf is not
    /// in the tree.
    pub fn proof(&self, leaf: &Hash) -> Option<Vec<Hash>> {
        let mut index = self.levels.first()?.binary_search(leaf).ok()?;
        let mut proof = Vec::new();

        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = index ^ 1;
            if sibling < level.len() {
                proof.push(level[sibling]);
            }
            index /= 2;
        }

        Some(proof)
    }
}

/// Folds `leaf` with `proof` and compares against `root`.
pub fn verify_proof(root: &Hash, leaf: Hash, proof: &[Hash]) -> bool {
    let computed = proof.iter().fold(leaf, |node, sibling| hash_pair(node, *sibling));
    &computed == root
}

/// Verifies a claim as the on-chain distributor would.
pub fn verify_claim(root: &Hash, claim: &Claim) -> bool {
    verify_proof(root, leaf_hash(claim.index, claim.account, claim.amount), &claim.proof)
}

/// Assigns dense indices in the given order, builds the tree and attaches a
/// proof to every claim.
///
/// # Arguments
/// * `rewards` - `(account, amount)` pairs, in index order, accounts unique
///
/// # Returns
/// The Merkle root and the claims keyed by account
pub fn build_claims(rewards: &[(Address, U256)]) -> (Hash, BTreeMap<Address, Claim>) {
    let leaves: Vec<(u64, Address, U256, Hash)> = rewards
        .iter()
        .zip(0u64..)
        .map(|((account, amount), index)| {
            (index, *account, *amount, leaf_hash(index, *account, *amount))
        })
        .collect();

    let tree = MerkleTree::new(leaves.iter().map(|(_, _, _, leaf)| *leaf).collect());
    let root = tree.root();

    let claims = leaves
        .into_iter()
        .map(|(index, account, amount, leaf)| {
            let claim = Claim {
                index,
                account,
                amount,
                proof: tree.proof(&leaf).unwrap_or_default(),
            };
            (account, claim)
        })
        .collect();

    (root, claims)
}
