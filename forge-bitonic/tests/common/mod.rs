#![allow(dead_code)]

use forge_bitonic::SortOrder;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Verify that `indices` is a valid permutation of 0..n.
pub fn verify_permutation(indices: &[u32], n: usize) -> bool {
    if indices.len() != n {
        return false;
    }
    let mut seen = vec![false; n];
    for &idx in indices {
        let i = idx as usize;
        if i >= n || seen[i] {
            return false;
        }
        seen[i] = true;
    }
    true
}

/// Verify that `data` is non-decreasing (ascending) or non-increasing (descending).
pub fn verify_sorted<T: PartialOrd>(data: &[T], order: SortOrder) -> bool {
    data.windows(2).all(|w| match order {
        SortOrder::Ascending => !(w[1] < w[0]),
        SortOrder::Descending => !(w[0] < w[1]),
    })
}

/// Verify that data[indices[i]] is ordered for all consecutive pairs.
pub fn verify_sorted_by_indices<T: PartialOrd>(data: &[T], indices: &[u32], order: SortOrder) -> bool {
    let gathered: Vec<&T> = indices.iter().map(|&i| &data[i as usize]).collect();
    verify_sorted(&gathered, order)
}

/// Host reference: the standard sort of `data` in `order`.
pub fn reference_sort(data: &[u32], order: SortOrder) -> Vec<u32> {
    let mut expected = data.to_vec();
    expected.sort_unstable();
    if order == SortOrder::Descending {
        expected.reverse();
    }
    expected
}
