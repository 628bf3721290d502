//! Property-based tests of the bitonic schedule using proptest.
//!
//! A host model replays a `PassPlan` exactly as the generated kernel does:
//! one invocation per pair, the flip/disperse pairing formulas, local passes
//! confined to their workgroup block, and every compare-and-swap guarded
//! against the true element count. The model is checked against the standard
//! library sort across random data, sizes and device limits.

mod common;

use common::{reference_sort, seeded_rng, verify_permutation, verify_sorted_by_indices};
use forge_bitonic::schedule::{disperse_pair, flip_pair};
use forge_bitonic::{plan, DeviceLimits, PassPlan, Phase, SortOrder, SortPlan};

use proptest::prelude::*;
use proptest::test_runner::{Config, TestRunner};
use rand::Rng;

/// Number of proptest iterations per property test.
const NUM_CASES: u32 = 256;

// ============================================================================
// Host model of the sort kernel
// ============================================================================

/// Replay `passes`, calling `cas(x, y)` for every guarded pair (x < y < n).
fn execute<F: FnMut(usize, usize)>(plan: &SortPlan, passes: &PassPlan, mut cas: F) {
    let n = plan.n;
    let wg = plan.workgroup_size;
    let block = plan.block_size();
    let invocations = plan.workgroup_count * wg;

    for pass in passes {
        match pass.phase {
            Phase::GlobalFlip | Phase::GlobalDisperse => {
                for gid in 0..invocations {
                    let (x, y) = if pass.phase == Phase::GlobalFlip {
                        flip_pair(pass.h, gid)
                    } else {
                        disperse_pair(pass.h, gid)
                    };
                    assert!(x < y);
                    if y < n {
                        cas(x, y);
                    }
                }
            }
            Phase::LocalBms | Phase::LocalDisperse => {
                for group in 0..plan.workgroup_count {
                    let offset = group * block;
                    let limit = n.saturating_sub(offset);
                    let mut stage = |pair: fn(usize, usize) -> (usize, usize), h: usize| {
                        for lid in 0..wg {
                            let (x, y) = pair(h, lid);
                            assert!(y < block, "local pair escapes its block");
                            if y < limit {
                                cas(offset + x, offset + y);
                            }
                        }
                    };
                    if pass.phase == Phase::LocalBms {
                        let mut k = 2;
                        while k <= pass.h {
                            stage(flip_pair, k);
                            let mut kk = k / 2;
                            while kk > 1 {
                                stage(disperse_pair, kk);
                                kk /= 2;
                            }
                            k *= 2;
                        }
                    } else {
                        stage(disperse_pair, pass.h);
                    }
                }
            }
        }
    }
}

fn ordered_before(order: SortOrder, a: u32, b: u32) -> bool {
    match order {
        SortOrder::Ascending => a < b,
        SortOrder::Descending => b < a,
    }
}

fn limits(max_threads: usize) -> DeviceLimits {
    DeviceLimits::new(max_threads, 32768)
}

/// Direct layout: sort `keys` in place.
fn model_sort(keys: &mut [u32], order: SortOrder, limits: DeviceLimits) -> PassPlan {
    let p = plan(keys.len(), 4, limits).unwrap();
    let passes = PassPlan::from_plan(&p);
    execute(&p, &passes, |x, y| {
        if ordered_before(order, keys[y], keys[x]) {
            keys.swap(x, y);
        }
    });
    passes
}

/// Indirect layout: keys are read through the index array, only indices move.
fn model_index_sort(data: &[u32], order: SortOrder, limits: DeviceLimits) -> Vec<u32> {
    let p = plan(data.len(), 8, limits).unwrap();
    let passes = PassPlan::from_plan(&p);
    let mut indices: Vec<u32> = (0..data.len() as u32).collect();
    execute(&p, &passes, |x, y| {
        let (ix, iy) = (indices[x], indices[y]);
        if ordered_before(order, data[iy as usize], data[ix as usize]) {
            indices[x] = iy;
            indices[y] = ix;
        }
    });
    indices
}

/// Key-value layout: mapped keys with the original data as payload.
fn model_distance_sort<F: Fn(u32) -> u32>(
    data: &mut [u32],
    distance: F,
    order: SortOrder,
    limits: DeviceLimits,
) {
    let mut keys: Vec<u32> = data.iter().map(|&v| distance(v)).collect();
    let p = plan(data.len(), 8, limits).unwrap();
    let passes = PassPlan::from_plan(&p);
    execute(&p, &passes, |x, y| {
        if ordered_before(order, keys[y], keys[x]) {
            keys.swap(x, y);
            data.swap(x, y);
        }
    });
}

fn case_strategy() -> impl Strategy<Value = (Vec<u32>, usize, bool)> {
    (
        prop::collection::vec(any::<u32>(), 0..=700),
        prop::sample::select(vec![1usize, 2, 4, 8, 16, 32, 64, 96, 256]),
        any::<bool>(),
    )
}

fn order_of(descending: bool) -> SortOrder {
    if descending {
        SortOrder::Descending
    } else {
        SortOrder::Ascending
    }
}

// ============================================================================
// Fixed cases
// ============================================================================

#[test]
fn test_boundary_sizes() {
    let mut rng = seeded_rng(7);
    for n in [0usize, 1, 2, 3, 16, 17, 100, 1000, 1025] {
        for order in [SortOrder::Ascending, SortOrder::Descending] {
            let data: Vec<u32> = (0..n).map(|_| rng.gen_range(0..1_000_000)).collect();
            let mut keys = data.clone();
            let passes = model_sort(&mut keys, order, limits(256));
            assert_eq!(keys, reference_sort(&data, order), "n={} {:?}", n, order);
            if n <= 1 {
                assert!(passes.is_empty());
                assert_eq!(keys, data);
            }
        }
    }
}

#[test]
fn test_sixteen_element_permutation() {
    let mut rng = seeded_rng(16);
    let data: Vec<u32> = (0..16).map(|_| rng.gen_range(0..1_000_000)).collect();
    let mut keys = data.clone();
    let passes = model_sort(&mut keys, SortOrder::Ascending, limits(1024));
    assert_eq!(passes.len(), 1);
    assert_eq!(passes.passes()[0].phase, Phase::LocalBms);
    assert_eq!(keys, reference_sort(&data, SortOrder::Ascending));
}

#[test]
fn test_large_workgroup_count_keeps_local_passes_in_block() {
    // 2^14 elements with 4-wide workgroups: workgroup_count (2048) far
    // exceeds the block size (8).
    let mut rng = seeded_rng(99);
    let data: Vec<u32> = (0..(1 << 14)).map(|_| rng.gen()).collect();
    let mut keys = data.clone();
    model_sort(&mut keys, SortOrder::Ascending, limits(4));
    assert_eq!(keys, reference_sort(&data, SortOrder::Ascending));
}

#[test]
fn test_index_sort_single_element() {
    let indices = model_index_sort(&[42], SortOrder::Ascending, limits(256));
    assert_eq!(indices, vec![0]);
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn prop_network_sorts() {
    let mut runner = TestRunner::new(Config {
        cases: NUM_CASES,
        ..Config::default()
    });

    runner
        .run(&case_strategy(), |(data, max_threads, descending)| {
            let order = order_of(descending);
            let mut keys = data.clone();
            model_sort(&mut keys, order, limits(max_threads));
            prop_assert_eq!(keys, reference_sort(&data, order));
            Ok(())
        })
        .unwrap();
}

#[test]
fn prop_index_sort_is_sorting_permutation() {
    let mut runner = TestRunner::new(Config {
        cases: NUM_CASES,
        ..Config::default()
    });

    runner
        .run(&case_strategy(), |(data, max_threads, descending)| {
            let order = order_of(descending);
            let indices = model_index_sort(&data, order, limits(max_threads));
            prop_assert!(verify_permutation(&indices, data.len()));
            prop_assert!(verify_sorted_by_indices(&data, &indices, order));
            Ok(())
        })
        .unwrap();
}

#[test]
fn prop_sorting_is_idempotent() {
    let mut runner = TestRunner::new(Config {
        cases: NUM_CASES,
        ..Config::default()
    });

    runner
        .run(&case_strategy(), |(data, max_threads, descending)| {
            let order = order_of(descending);
            let mut once = data.clone();
            model_sort(&mut once, order, limits(max_threads));
            let mut twice = once.clone();
            model_sort(&mut twice, order, limits(max_threads));
            prop_assert_eq!(once, twice);
            Ok(())
        })
        .unwrap();
}

#[test]
fn prop_identity_distance_matches_comparator() {
    let mut runner = TestRunner::new(Config {
        cases: NUM_CASES,
        ..Config::default()
    });

    runner
        .run(&case_strategy(), |(data, max_threads, descending)| {
            let order = order_of(descending);
            let mut direct = data.clone();
            model_sort(&mut direct, order, limits(max_threads));
            let mut mapped = data.clone();
            model_distance_sort(&mut mapped, |v| v, order, limits(max_threads));
            prop_assert_eq!(direct, mapped);
            Ok(())
        })
        .unwrap();
}

#[test]
fn prop_distance_sort_orders_by_key() {
    let mut runner = TestRunner::new(Config {
        cases: NUM_CASES,
        ..Config::default()
    });

    runner
        .run(&case_strategy(), |(data, max_threads, descending)| {
            let order = order_of(descending);
            let key = |v: u32| v % 97;
            let mut mapped = data.clone();
            model_distance_sort(&mut mapped, key, order, limits(max_threads));
            let keys: Vec<u32> = mapped.iter().map(|&v| key(v)).collect();
            prop_assert!(common::verify_sorted(&keys, order));
            let mut before = data.clone();
            let mut after = mapped.clone();
            before.sort_unstable();
            after.sort_unstable();
            prop_assert_eq!(before, after);
            Ok(())
        })
        .unwrap();
}
