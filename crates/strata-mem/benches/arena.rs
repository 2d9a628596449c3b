// Region arena benchmarks
//
// These benchmarks measure the cost of first-fit bump allocation, region
// growth, copy-based reallocation, reset, and lock contention when several
// threads share one arena.

use std::hint::black_box;
use std::thread;

use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use strata_mem::{Arena, ArenaVec};

/// Allocations between resets, so long runs do not map unbounded memory.
const RESET_EVERY: usize = 4096;

/// Benchmark sequential allocations of different sizes.
///
/// The arena is reset every `RESET_EVERY` calls, so this mostly measures
/// the lock plus the bump in the head region.
fn bench_sequential_allocations(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_alloc");

    for size in &[4, 16, 64, 256, 1024, 4096] {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut arena = Arena::new(RESET_EVERY * size);
            let mut count = 0;
            b.iter(|| {
                count += 1;
                if count % RESET_EVERY == 0 {
                    arena.reset();
                }
                black_box(arena.allocate(black_box(size)));
            });
        });
    }

    group.finish();
}

/// Benchmark mixed-size allocations simulating real workloads.
fn bench_mixed_allocations(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed_alloc");

    group.bench_function("variable_sizes", |b| {
        let mut arena = Arena::new(1024 * 1024);
        let sizes = [4, 16, 64, 256, 1024];
        let mut i = 0;

        b.iter(|| {
            i += 1;
            if i % RESET_EVERY == 0 {
                arena.reset();
            }
            black_box(arena.allocate(black_box(sizes[i % sizes.len()])));
        });
    });

    group.finish();
}

/// Benchmark region growth.
///
/// Starts from a one-page arena each time so every iteration walks a
/// growing chain and maps new regions.
fn bench_region_growth(c: &mut Criterion) {
    let mut group = c.benchmark_group("region_growth");
    group.sample_size(50);

    for count in &[16, 64, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter_batched(
                || Arena::new(0),
                |arena| {
                    for _ in 0..count {
                        black_box(arena.allocate(black_box(3000)));
                    }
                    arena
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// Benchmark growable vector pushes, which reallocate by doubling.
fn bench_vec_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("arena_vec");

    group.bench_function("push_10k_u64", |b| {
        let mut arena = Arena::new(1024 * 1024);
        b.iter(|| {
            {
                let mut vec = ArenaVec::new_in(&arena);
                for i in 0..10_000u64 {
                    vec.push(black_box(i));
                }
                black_box(vec.len());
            }
            arena.reset();
        });
    });

    group.finish();
}

/// Benchmark reset over a chain of regions.
fn bench_reset(c: &mut Criterion) {
    let mut group = c.benchmark_group("reset");

    group.bench_function("reset_32_regions", |b| {
        let mut arena = Arena::new(0);
        for _ in 0..32 {
            let _ = arena.allocate(8192);
        }
        b.iter(|| arena.reset());
    });

    group.finish();
}

/// Benchmark lock contention with several threads allocating at once.
fn bench_contended_allocations(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_alloc");
    group.sample_size(20);

    for threads in &[1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), threads, |b, &threads| {
            b.iter_batched(
                || Arena::new(4 * 1024 * 1024),
                |arena| {
                    thread::scope(|scope| {
                        for _ in 0..threads {
                            scope.spawn(|| {
                                for _ in 0..10_000 {
                                    black_box(arena.allocate(32));
                                }
                            });
                        }
                    });
                    arena
                },
                BatchSize::PerIteration,
            );
        });
    }

    group.finish();
}

/// Benchmark arena statistics access.
fn bench_arena_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("arena_stats");

    group.bench_function("stats", |b| {
        let arena = Arena::new(0);
        for _ in 0..10 {
            let _ = arena.allocate(4096);
        }

        b.iter(|| {
            black_box(arena.stats());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_sequential_allocations,
    bench_mixed_allocations,
    bench_region_growth,
    bench_vec_push,
    bench_reset,
    bench_contended_allocations,
    bench_arena_stats,
);
criterion_main!(benches);
