//! Concurrency stress tests for the region arena.
//!
//! Many threads share one `Arena` and allocate through its lock. Every
//! block handed out must be disjoint from every other, whatever the
//! interleaving, and must keep the bytes its owner wrote.
//!
//! Run with: `cargo test -p strata-mem --test stress_test -- --nocapture`

use std::sync::Arc;
use std::sync::Barrier;
use std::thread;
use std::time::Instant;

use strata_mem::os::page_size;
use strata_mem::{Arena, ArenaVec};

fn assert_pairwise_disjoint(mut blocks: Vec<(usize, usize)>) {
    blocks.sort_unstable();
    for pair in blocks.windows(2) {
        assert!(
            pair[0].0 + pair[0].1 <= pair[1].0,
            "blocks {:#x}+{} and {:#x} overlap",
            pair[0].0,
            pair[0].1,
            pair[1].0
        );
    }
}

// ============================================================================
// Disjointness under contention
// ============================================================================

#[test]
fn test_concurrent_fixed_size_allocations_are_disjoint() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 2_000;
    const SIZE: usize = 24;

    let arena = Arena::new(page_size());
    let barrier = Barrier::new(THREADS);

    let blocks: Vec<(usize, usize)> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    (0..PER_THREAD)
                        .map(|_| (arena.allocate(SIZE).as_ptr().addr(), SIZE))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    assert_eq!(blocks.len(), THREADS * PER_THREAD);
    assert_eq!(arena.stats().total_used, THREADS * PER_THREAD * SIZE);
    assert_pairwise_disjoint(blocks);
}

#[test]
fn test_concurrent_mixed_sizes_keep_contents() {
    const THREADS: usize = 6;
    const PER_THREAD: usize = 500;

    let arena = Arena::new(0);

    thread::scope(|scope| {
        for t in 0..THREADS {
            let arena = &arena;
            scope.spawn(move || {
                let mut mine = Vec::with_capacity(PER_THREAD);
                for i in 0..PER_THREAD {
                    // occasionally larger than a default region
                    let size = if i % 97 == 0 { 3 * page_size() } else { 1 + (i * 13) % 700 };
                    let block = arena.alloc_bytes(size);
                    block.fill(t as u8);
                    mine.push(block);
                }

                // nobody else scribbled over our blocks
                for block in &mine {
                    assert!(block.iter().all(|&b| b == t as u8));
                }
            });
        }
    });

    assert!(arena.regions().len() > 1);
}

#[test]
fn test_shared_arena_through_arc() {
    let arena = Arc::new(Arena::new(64 * 1024));

    let handles: Vec<_> = (0..4u8)
        .map(|t| {
            let arena = Arc::clone(&arena);
            thread::spawn(move || {
                let block = arena.alloc_bytes(10);
                block.fill(t);
                (block.as_ptr().addr(), block.to_vec())
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for (t, (addr, bytes)) in results.iter().enumerate() {
        assert!(arena.owns(*addr as *const u8, 10));
        assert_eq!(bytes, &vec![t as u8; 10]);
    }
    assert_pairwise_disjoint(results.iter().map(|(addr, _)| (*addr, 10)).collect());
}

#[test]
fn test_concurrent_reallocation() {
    const THREADS: usize = 4;

    let arena = Arena::new(page_size());

    thread::scope(|scope| {
        for t in 0..THREADS {
            let arena = &arena;
            scope.spawn(move || {
                let mut block = arena.alloc_slice_copy(&[t as u8; 8]);
                for round in 0..10 {
                    let new_size = block.len() * 2;
                    block = arena.realloc_bytes(block, new_size);
                    assert!(block[..8].iter().all(|&b| b == t as u8), "round {round}");
                }
                assert_eq!(block.len(), 8 << 10);
            });
        }
    });
}

#[test]
fn test_concurrent_growable_vectors() {
    let arena = Arena::new(page_size());

    thread::scope(|scope| {
        for t in 0..4u64 {
            let arena = &arena;
            scope.spawn(move || {
                let mut vec = ArenaVec::new_in(arena);
                for i in 0..5_000u64 {
                    vec.push(t * 1_000_000 + i);
                }
                for (i, &v) in vec.iter().enumerate() {
                    assert_eq!(v, t * 1_000_000 + i as u64);
                }
            });
        }
    });
}

// ============================================================================
// Reset cycles
// ============================================================================

#[test]
fn test_reset_between_parallel_phases() {
    let mut arena = Arena::new(16 * 1024);

    for _phase in 0..5 {
        thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..1_000 {
                        let _ = arena.allocate(32);
                    }
                });
            }
        });

        assert_eq!(arena.stats().total_used, 4 * 1_000 * 32);
        arena.reset();
    }

    let regions_after = arena.regions().len();
    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..1_000 {
                    let _ = arena.allocate(32);
                }
            });
        }
    });
    // the same workload fits in the regions mapped by earlier phases
    assert_eq!(arena.regions().len(), regions_after);
}

#[test]
fn test_allocation_throughput() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 50_000;

    let arena = Arena::new(1024 * 1024);
    let start = Instant::now();

    thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                for _ in 0..PER_THREAD {
                    let _ = arena.allocate(16);
                }
            });
        }
    });

    let elapsed = start.elapsed();
    println!(
        "{} contended allocations in {:?} ({:.1} ns/alloc)",
        THREADS * PER_THREAD,
        elapsed,
        elapsed.as_nanos() as f64 / (THREADS * PER_THREAD) as f64
    );
    assert_eq!(arena.stats().total_used, THREADS * PER_THREAD * 16);
}
