/*!
 * Registry and Profile Tests
 * Ceiling enforcement, resizing and partial profile application
 */

use pretty_assertions::assert_eq;
use semantic_pools::memory::{
    AllocationOptions, AllocatorConfig, CapacityProfile, ErrorKind, PoolAllocator, PoolError,
    PoolSpec, ResizeOutcome,
};
use std::collections::BTreeMap;

fn ceilinged(ceiling: usize) -> PoolAllocator {
    PoolAllocator::with_config(
        [
            PoolSpec::new("a", 1000).with_granularity(1),
            PoolSpec::new("b", 1000).with_granularity(1),
            PoolSpec::new("c", 500).with_granularity(1),
        ],
        AllocatorConfig::default().with_ceiling(ceiling),
    )
    .unwrap()
}

#[test]
fn test_profile_failure_is_isolated_to_offending_pool() {
    let mut alloc = ceilinged(3000);
    let targets: BTreeMap<String, usize> = [("a", 1400), ("b", 1300), ("c", 400)]
        .into_iter()
        .map(|(name, cap)| (name.to_string(), cap))
        .collect();

    let outcome = alloc.apply_profile(&targets);

    assert_eq!(outcome["a"], Ok(ResizeOutcome::Grown { from: 1000, to: 1400 }));
    assert_eq!(
        outcome["b"],
        Err(PoolError::InsufficientHeadroom {
            pool: "b".into(),
            requested: 300,
            available: 200,
        })
    );
    assert_eq!(
        outcome["c"],
        Ok(ResizeOutcome::Shrunk {
            from: 500,
            to: 400,
            compacted: false
        })
    );
    assert_eq!(alloc.get_pool("b").unwrap().capacity(), 1000);
    assert_eq!(alloc.total_capacity(), 2800);
    assert!(alloc.total_capacity() <= alloc.config().address_space_ceiling);
}

#[test]
fn test_profile_round_trip_between_named_profiles() {
    let mut alloc = ceilinged(2500);
    alloc.register_profile(CapacityProfile::new("favor-a").target("a", 1400).target("b", 600));
    alloc.register_profile(CapacityProfile::new("balanced").target("a", 1000).target("b", 1000));

    let outcome = alloc.apply_named_profile("favor-a").unwrap();
    assert!(outcome.values().all(Result::is_ok));
    assert_eq!(alloc.get_pool("a").unwrap().capacity(), 1400);

    let outcome = alloc.apply_named_profile("balanced").unwrap();
    assert!(outcome.values().all(Result::is_ok));
    assert_eq!(alloc.get_pool("a").unwrap().capacity(), 1000);
    assert_eq!(alloc.get_pool("b").unwrap().capacity(), 1000);

    let names: Vec<_> = alloc.profile_names().collect();
    assert_eq!(names, vec!["balanced", "favor-a"]);
}

#[test]
fn test_create_pool_respects_ceiling() {
    let mut alloc = ceilinged(3000);
    let err = alloc.create_pool(PoolSpec::new("d", 600)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientHeadroom);

    alloc.create_pool(PoolSpec::new("d", 500)).unwrap();
    assert_eq!(alloc.headroom(), 0);
}

#[test]
fn test_duplicate_and_invalid_pools() {
    let mut alloc = ceilinged(10_000);
    assert_eq!(
        alloc.create_pool(PoolSpec::new("a", 10)).unwrap_err(),
        PoolError::AlreadyExists("a".into())
    );
    assert_eq!(
        alloc.create_pool(PoolSpec::new("z", 0)).unwrap_err().kind(),
        ErrorKind::InvalidArgument
    );
    assert_eq!(
        alloc.resize_pool("ghost", 10).unwrap_err(),
        PoolError::PoolNotFound("ghost".into())
    );
}

#[test]
fn test_shrink_below_live_bytes_is_rejected() {
    let mut alloc = ceilinged(3000);
    alloc.allocate("c", 450, AllocationOptions::default()).unwrap();

    let err = alloc.resize_pool("c", 100).unwrap_err();
    assert_eq!(
        err,
        PoolError::InsufficientHeadroom {
            pool: "c".into(),
            requested: 400,
            available: 50,
        }
    );
    assert_eq!(alloc.get_pool("c").unwrap().capacity(), 500);

    assert_eq!(
        alloc.resize_pool("c", 450).unwrap(),
        ResizeOutcome::Shrunk {
            from: 500,
            to: 450,
            compacted: false
        }
    );
    assert_eq!(alloc.get_pool("c").unwrap().free(), 0);
}

#[test]
fn test_grow_extends_trailing_block() {
    let mut alloc = ceilinged(3000);
    alloc.allocate("c", 500, AllocationOptions::default()).unwrap();
    alloc.resize_pool("c", 1000).unwrap();

    let pool = alloc.get_pool("c").unwrap();
    assert_eq!(pool.free_block_count(), 1);
    assert_eq!(pool.trailing_free(), 500);
    let id = alloc.allocate("c", 500, AllocationOptions::default()).unwrap();
    assert_eq!(alloc.allocation(id).unwrap().offset, 500);
}
