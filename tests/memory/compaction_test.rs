/*!
 * Compaction Tests
 * Relocation callbacks, rollback and shrink-assisting compaction
 */

use pretty_assertions::assert_eq;
use semantic_pools::memory::{
    AllocationId, AllocationOptions, PoolAllocator, PoolError, PoolSpec, RelocationError,
    ResizeOutcome,
};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Pool of 10 slots of 100 bytes with every other slot freed
fn checkerboard() -> (PoolAllocator, Vec<AllocationId>) {
    let mut alloc =
        PoolAllocator::new([PoolSpec::new("dev", 1000).with_granularity(100)]).unwrap();
    let ids: Vec<_> = (0..10)
        .map(|_| alloc.allocate("dev", 100, AllocationOptions::default()).unwrap())
        .collect();
    for id in ids.iter().step_by(2) {
        alloc.deallocate(*id).unwrap();
    }
    let live = ids.into_iter().skip(1).step_by(2).collect();
    (alloc, live)
}

#[test]
fn test_free_space_ends_in_one_block() {
    let (mut alloc, live) = checkerboard();
    let ids_before: BTreeSet<_> = alloc
        .allocations("dev")
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();

    let report = alloc.compact("dev").unwrap();
    assert_eq!(report.relocated(), 5);
    assert_eq!(report.bytes_reclaimed, 500);

    let pool = alloc.get_pool("dev").unwrap();
    assert_eq!(pool.free_block_count(), 1);
    assert_eq!(pool.largest_free_block(), pool.free());
    assert_eq!(pool.trailing_free(), 500);

    let ids_after: BTreeSet<_> = alloc
        .allocations("dev")
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(ids_before, ids_after);

    let offsets: Vec<_> = live
        .iter()
        .map(|id| alloc.allocation(*id).unwrap().offset)
        .collect();
    assert_eq!(offsets, vec![0, 100, 200, 300, 400]);
}

#[test]
fn test_registered_relocator_sees_every_move() {
    let (mut alloc, _) = checkerboard();
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    alloc
        .set_relocator(
            "dev",
            Box::new(move |old: usize, new: usize, size: usize| -> Result<(), RelocationError> {
                sink.lock().push((old, new, size));
                Ok(())
            }),
        )
        .unwrap();

    alloc.compact("dev").unwrap();
    let moves = log.lock().clone();
    assert_eq!(
        moves,
        vec![
            (100, 0, 100),
            (300, 100, 100),
            (500, 200, 100),
            (700, 300, 100),
            (900, 400, 100),
        ]
    );
    assert!(moves.iter().all(|(old, new, _)| new <= old));
}

#[test]
fn test_relocator_failure_leaves_pool_untouched() {
    let (mut alloc, live) = checkerboard();
    let blocks_before: Vec<_> = alloc.get_pool("dev").unwrap().blocks().copied().collect();

    let mut moved = 0;
    let mut fail_third = |_: usize, _: usize, _: usize| {
        moved += 1;
        if moved == 3 {
            Err(RelocationError::new("dma timeout"))
        } else {
            Ok(())
        }
    };
    let err = alloc.compact_with("dev", &mut fail_third).unwrap_err();

    match err {
        PoolError::RelocationFailed { pool, allocation, .. } => {
            assert_eq!(pool, "dev");
            assert_eq!(allocation, live[2]);
        }
        other => panic!("unexpected error: {other}"),
    }
    let blocks_after: Vec<_> = alloc.get_pool("dev").unwrap().blocks().copied().collect();
    assert_eq!(blocks_before, blocks_after);
    assert_eq!(alloc.allocation(live[0]).unwrap().offset, 100);
    alloc.check_invariants().unwrap();
}

#[test]
fn test_pinned_allocations_move_with_compaction() {
    let (mut alloc, live) = checkerboard();
    alloc.pin(live[4]).unwrap();
    alloc.compact("dev").unwrap();

    let record = alloc.allocation(live[4]).unwrap();
    assert!(record.pinned);
    assert_eq!(record.offset, 400);
}

#[test]
fn test_shrink_compacts_scattered_free_space() {
    let (mut alloc, _) = checkerboard();
    assert_eq!(alloc.get_pool("dev").unwrap().trailing_free(), 0);

    let outcome = alloc.resize_pool("dev", 600).unwrap();
    assert_eq!(
        outcome,
        ResizeOutcome::Shrunk {
            from: 1000,
            to: 600,
            compacted: true
        }
    );
    let pool = alloc.get_pool("dev").unwrap();
    assert_eq!(pool.capacity(), 600);
    assert_eq!(pool.allocated(), 500);
    assert_eq!(pool.free(), 100);
    alloc.check_invariants().unwrap();
}

#[test]
fn test_shrink_rolls_back_when_relocation_fails() {
    let (mut alloc, _) = checkerboard();
    alloc
        .set_relocator(
            "dev",
            Box::new(|_: usize, _: usize, _: usize| -> Result<(), RelocationError> {
                Err(RelocationError::new("read-only mapping"))
            }),
        )
        .unwrap();

    let err = alloc.resize_pool("dev", 600).unwrap_err();
    assert!(matches!(err, PoolError::RelocationFailed { .. }));
    assert_eq!(alloc.get_pool("dev").unwrap().capacity(), 1000);
    assert_eq!(alloc.get_pool("dev").unwrap().free_block_count(), 5);
}
