//! Burner wallet records and index allocation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::derivation::MAX_CHILD_INDEX;
use crate::types::NetworkFamily;

/// A disposable identity at one index of a family's derivation sequence.
///
/// Never hard-deleted. Archiving is a soft delete that also retires the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnerWallet {
    pub network: NetworkFamily,
    pub index: u32,
    /// Base58 for Solana, EIP-55 for EVM.
    pub address: String,
    pub is_active: bool,
    pub archived: bool,
    /// Whether the slot is backed by an imported key rather than the seed.
    #[serde(default)]
    pub imported: bool,
    pub created_at: i64,
}

impl BurnerWallet {
    pub fn new(network: NetworkFamily, index: u32, address: String, created_at: i64) -> Self {
        Self {
            network,
            index,
            address,
            is_active: false,
            archived: false,
            imported: false,
            created_at,
        }
    }

    /// Address comparison that ignores EIP-55 case for EVM.
    pub fn has_address(&self, address: &str) -> bool {
        match self.network {
            NetworkFamily::Solana => self.address == address,
            NetworkFamily::Evm => self.address.eq_ignore_ascii_case(address),
        }
    }
}

/// Per-family set of indices that must never be handed out again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetiredIndexSet(BTreeSet<u32>);

impl RetiredIndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the index was already retired.
    pub fn insert(&mut self, index: u32) -> bool {
        self.0.insert(index)
    }

    pub fn contains(&self, index: u32) -> bool {
        self.0.contains(&index)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<u32> for RetiredIndexSet {
    fn from_iter<T: IntoIterator<Item = u32>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Pick the next index for a new burner.
///
/// Starts at `counter`, skips retired indices and indices already holding a
/// burner, and returns `(index, next_counter)` where `next_counter` is one
/// past the selection. The counter only ever moves forward. Returns `None`
/// once no index up to [`MAX_CHILD_INDEX`] is free.
pub fn allocate_index(
    counter: u32,
    retired: &RetiredIndexSet,
    occupied: impl Fn(u32) -> bool,
) -> Option<(u32, u32)> {
    (counter..=MAX_CHILD_INDEX)
        .find(|&i| !retired.contains(i) && !occupied(i))
        .map(|i| (i, i + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_allocate_from_zero() {
        let retired = RetiredIndexSet::new();
        assert_eq!(allocate_index(0, &retired, |_| false), Some((0, 1)));
    }

    #[test]
    fn test_allocate_skips_retired_run() {
        let retired: RetiredIndexSet = [2, 3, 4].into_iter().collect();
        assert_eq!(allocate_index(2, &retired, |_| false), Some((5, 6)));
    }

    #[test]
    fn test_allocate_skips_occupied() {
        let retired = RetiredIndexSet::new();
        assert_eq!(allocate_index(0, &retired, |i| i == 0), Some((1, 2)));
    }

    #[test]
    fn test_allocate_exhausted() {
        let retired = RetiredIndexSet::new();
        assert_eq!(allocate_index(u32::MAX, &retired, |_| false), None);
    }

    #[test]
    fn test_allocate_stops_below_hardened_bit() {
        let retired = RetiredIndexSet::new();
        assert_eq!(
            allocate_index(MAX_CHILD_INDEX, &retired, |_| false),
            Some((MAX_CHILD_INDEX, MAX_CHILD_INDEX + 1))
        );
        assert_eq!(allocate_index(MAX_CHILD_INDEX + 1, &retired, |_| false), None);
        assert_eq!(allocate_index(MAX_CHILD_INDEX, &retired, |_| true), None);
    }

    #[test]
    fn test_has_address_evm_case_insensitive() {
        let wallet = BurnerWallet::new(
            NetworkFamily::Evm,
            0,
            "0x9858EfFD232B4033E47d90003D41EC34EcaEda94".into(),
            0,
        );
        assert!(wallet.has_address("0x9858effd232b4033e47d90003d41ec34ecaeda94"));
    }

    proptest! {
        #[test]
        fn prop_retired_never_allocated(
            retired in proptest::collection::btree_set(0u32..64, 0..32),
            rounds in 1usize..64,
        ) {
            let set: RetiredIndexSet = retired.iter().copied().collect();
            let mut counter = 0;
            let mut seen = BTreeSet::new();
            for _ in 0..rounds {
                let (index, next) = allocate_index(counter, &set, |_| false).unwrap();
                prop_assert!(!set.contains(index));
                prop_assert!(seen.insert(index));
                prop_assert!(next > counter);
                counter = next;
            }
        }
    }
}
