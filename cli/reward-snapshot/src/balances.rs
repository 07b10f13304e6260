//! The balance map and its merge rules.
//!
//! Partial maps are produced independently (one per fan-out batch) and
//! folded with addition, so the result does not depend on processing order.
//! Keys are ordered by address bytes; that order is what claim indices follow.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::SnapshotError;
use crate::types::{Address, U256};

pub type BalanceMap = BTreeMap<Address, U256>;

/// Adds `amount` to `address`. Zero amounts do not create entries.
pub fn credit(map: &mut BalanceMap, address: Address, amount: U256) -> Result<(), SnapshotError> {
    if amount.is_zero() {
        return Ok(());
    }
    let entry = map.entry(address).or_insert(U256::ZERO);
    *entry = entry
        .checked_add(amount)
        .ok_or(SnapshotError::Overflow("merging balances"))?;
    Ok(())
}

/// Adds every entry of `other` into `into`.
pub fn merge(into: &mut BalanceMap, other: BalanceMap) -> Result<(), SnapshotError> {
    for (address, amount) in other {
        credit(into, address, amount)?;
    }
    Ok(())
}

/// Folds partial maps into one.
pub fn fold<I>(partials: I) -> Result<BalanceMap, SnapshotError>
where
    I: IntoIterator<Item = BalanceMap>,
{
    let mut total = BalanceMap::new();
    for partial in partials {
        merge(&mut total, partial)?;
    }
    Ok(total)
}

/// Drops excluded addresses and zero entries. Returns how many excluded
/// addresses held a nonzero balance.
pub fn apply_exclusions(map: &mut BalanceMap, excluded: &BTreeSet<Address>) -> usize {
    let mut removed = 0;
    map.retain(|address, amount| {
        if excluded.contains(address) {
            if !amount.is_zero() {
                removed += 1;
            }
            return false;
        }
        !amount.is_zero()
    });
    removed
}

/// Sum of all balances.
pub fn total(map: &BalanceMap) -> Result<U256, SnapshotError> {
    map.values().try_fold(U256::ZERO, |acc, amount| {
        acc.checked_add(*amount)
            .ok_or(SnapshotError::Overflow("summing balances"))
    })
}
