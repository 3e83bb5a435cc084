/*!
 * Reclamation Tests
 * Sweeps, eviction policies and allocate escalation
 */

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use semantic_pools::core::ManualClock;
use semantic_pools::memory::{
    AllocationId, AllocationOptions, AllocatorConfig, IdlePolicy, LruPolicy, PoolAllocator,
    PoolError, PoolSpec, RelocationError,
};
use std::sync::Arc;
use std::time::Duration;

fn clocked(capacity: usize, config: AllocatorConfig) -> (PoolAllocator, ManualClock) {
    let clock = ManualClock::new();
    let alloc = PoolAllocator::with_config(
        [PoolSpec::new("pool", capacity).with_granularity(64)],
        config,
    )
    .unwrap()
    .with_clock(clock.clone());
    (alloc, clock)
}

#[test]
fn test_zero_ttl_reclaims_everything_unpinned() {
    let (mut alloc, _clock) = clocked(4096, AllocatorConfig::default().with_ttl(Duration::ZERO));
    for size in [64, 128, 256, 512] {
        alloc.allocate("pool", size, AllocationOptions::default()).unwrap();
    }

    let report = alloc.sweep("pool").unwrap();
    assert_eq!(report.freed_bytes, 960);
    assert_eq!(report.reclaimed.len(), 4);
    assert_eq!(alloc.get_pool("pool").unwrap().allocated(), 0);
    assert_eq!(alloc.get_pool("pool").unwrap().free_block_count(), 1);
}

#[test]
fn test_zero_ttl_sweep_spares_pinned() {
    let (mut alloc, _clock) = clocked(4096, AllocatorConfig::default().with_ttl(Duration::ZERO));
    let a = alloc.allocate("pool", 64, AllocationOptions::default()).unwrap();
    let keep = alloc.allocate("pool", 128, AllocationOptions::pinned()).unwrap();
    let c = alloc.allocate("pool", 256, AllocationOptions::default()).unwrap();
    let before = alloc.allocation(keep).unwrap().clone();

    let mut report = alloc.sweep("pool").unwrap();
    report.reclaimed.sort();
    assert_eq!(report.reclaimed, vec![a, c]);
    assert_eq!(report.freed_bytes, 320);
    assert_eq!(alloc.allocation(keep).unwrap(), &before);
    alloc.check_invariants().unwrap();
}

#[test]
fn test_sweep_of_empty_pool_reports_nothing() {
    let (mut alloc, _clock) = clocked(4096, AllocatorConfig::default());
    let report = alloc.sweep("pool").unwrap();
    assert!(!report.freed_any());
    assert!(alloc.sweep("missing").is_err());
}

#[test]
fn test_idle_policy_spares_touched_allocations() {
    let (mut alloc, clock) = clocked(4096, AllocatorConfig::default());
    let stale = alloc.allocate("pool", 64, AllocationOptions::default()).unwrap();
    let busy = alloc.allocate("pool", 64, AllocationOptions::default()).unwrap();

    clock.advance(Duration::from_secs(30));
    alloc.touch(busy).unwrap();
    clock.advance(Duration::from_secs(30));

    let report = alloc
        .sweep_with("pool", &IdlePolicy::new(Duration::from_secs(45)))
        .unwrap();
    assert_eq!(report.reclaimed, vec![stale]);
    assert!(alloc.allocation(busy).is_ok());
}

#[test]
fn test_lru_policy_stops_at_target() {
    let (mut alloc, clock) = clocked(4096, AllocatorConfig::default());
    let ids: Vec<_> = (0..4)
        .map(|_| {
            clock.advance(Duration::from_millis(1));
            alloc.allocate("pool", 64, AllocationOptions::default()).unwrap()
        })
        .collect();
    clock.advance(Duration::from_millis(1));
    alloc.touch(ids[0]).unwrap();

    let report = alloc.sweep_with("pool", &LruPolicy::new(128)).unwrap();
    assert_eq!(report.reclaimed, vec![ids[1], ids[2]]);
    assert_eq!(report.freed_bytes, 128);
}

#[test]
fn test_escalation_sweeps_expired_allocations() {
    let (mut alloc, clock) = clocked(
        256,
        AllocatorConfig::default().with_ttl(Duration::from_secs(60)),
    );
    for _ in 0..4 {
        alloc.allocate("pool", 64, AllocationOptions::default()).unwrap();
    }
    clock.advance(Duration::from_secs(61));

    let id = alloc.allocate("pool", 200, AllocationOptions::default()).unwrap();
    assert_eq!(alloc.allocation(id).unwrap().offset, 0);
    assert_eq!(alloc.get_pool("pool").unwrap().live_allocations(), 1);
}

#[test]
fn test_no_escalation_reports_fragmentation() {
    let (mut alloc, _clock) = clocked(512, AllocatorConfig::no_escalation());
    let ids: Vec<_> = (0..8)
        .map(|_| alloc.allocate("pool", 64, AllocationOptions::default()).unwrap())
        .collect();
    for id in ids.iter().step_by(2) {
        alloc.deallocate(*id).unwrap();
    }

    let err = alloc
        .allocate("pool", 128, AllocationOptions::default())
        .unwrap_err();
    assert_eq!(
        err,
        PoolError::Fragmented {
            pool: "pool".into(),
            requested: 128,
            free: 256,
            largest_free: 64,
        }
    );
    assert_eq!(alloc.get_pool("pool").unwrap().live_allocations(), 4);
}

#[test]
fn test_escalation_compacts_fragmented_pool() {
    let (mut alloc, _clock) = clocked(
        512,
        AllocatorConfig::default().with_sweep_on_pressure(false),
    );
    let ids: Vec<_> = (0..8)
        .map(|_| alloc.allocate("pool", 64, AllocationOptions::default()).unwrap())
        .collect();
    for id in ids.iter().step_by(2) {
        alloc.deallocate(*id).unwrap();
    }

    let id = alloc.allocate("pool", 256, AllocationOptions::default()).unwrap();
    assert_eq!(alloc.allocation(id).unwrap().offset, 256);
    assert_eq!(alloc.allocation(ids[1]).unwrap().offset, 0);
    assert_eq!(alloc.get_pool("pool").unwrap().free(), 0);
    alloc.check_invariants().unwrap();
}

#[test]
fn test_escalation_never_evicts_pinned() {
    let (mut alloc, clock) = clocked(256, AllocatorConfig::default().with_ttl(Duration::ZERO));
    alloc.allocate("pool", 256, AllocationOptions::pinned()).unwrap();
    clock.advance(Duration::from_secs(1));

    let err = alloc
        .allocate("pool", 64, AllocationOptions::default())
        .unwrap_err();
    assert!(matches!(err, PoolError::InsufficientMemory { free: 0, .. }));
}

/// 512-byte pool with live 64-byte blocks at 64, 192, 320 and 448
fn interleaved_without_sweep() -> (PoolAllocator, Vec<AllocationId>) {
    let (mut alloc, _clock) = clocked(
        512,
        AllocatorConfig::default().with_sweep_on_pressure(false),
    );
    let ids: Vec<_> = (0..8)
        .map(|_| alloc.allocate("pool", 64, AllocationOptions::default()).unwrap())
        .collect();
    for id in ids.iter().step_by(2) {
        alloc.deallocate(*id).unwrap();
    }
    let live = ids.into_iter().skip(1).step_by(2).collect();
    (alloc, live)
}

#[test]
fn test_escalation_compaction_uses_registered_relocator() {
    let (mut alloc, live) = interleaved_without_sweep();
    let moves = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&moves);
    alloc
        .set_relocator(
            "pool",
            Box::new(move |old: usize, new: usize, size: usize| -> Result<(), RelocationError> {
                sink.lock().push((old, new, size));
                Ok(())
            }),
        )
        .unwrap();

    let id = alloc.allocate("pool", 256, AllocationOptions::default()).unwrap();

    assert_eq!(
        *moves.lock(),
        vec![(64, 0, 64), (192, 64, 64), (320, 128, 64), (448, 192, 64)]
    );
    assert_eq!(alloc.allocation(id).unwrap().offset, 256);
    assert_eq!(alloc.allocation(live[3]).unwrap().offset, 192);
    alloc.check_invariants().unwrap();
}

#[test]
fn test_failed_escalation_compaction_is_fragmented_and_rolled_back() {
    let (mut alloc, live) = interleaved_without_sweep();
    let calls = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&calls);
    alloc
        .set_relocator(
            "pool",
            Box::new(move |_: usize, _: usize, _: usize| -> Result<(), RelocationError> {
                let mut calls = counter.lock();
                *calls += 1;
                if *calls == 2 {
                    Err(RelocationError::new("device busy"))
                } else {
                    Ok(())
                }
            }),
        )
        .unwrap();
    let blocks_before: Vec<_> = alloc.get_pool("pool").unwrap().blocks().copied().collect();

    let err = alloc
        .allocate("pool", 256, AllocationOptions::default())
        .unwrap_err();

    assert_eq!(
        err,
        PoolError::Fragmented {
            pool: "pool".into(),
            requested: 256,
            free: 256,
            largest_free: 64,
        }
    );
    assert_eq!(*calls.lock(), 2);
    let blocks_after: Vec<_> = alloc.get_pool("pool").unwrap().blocks().copied().collect();
    assert_eq!(blocks_before, blocks_after);
    assert_eq!(alloc.allocation(live[0]).unwrap().offset, 64);
    assert_eq!(alloc.get_pool("pool").unwrap().live_allocations(), 4);
    alloc.check_invariants().unwrap();
}
