//! Criterion micro-benchmarks for arena allocation and reset.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use dsmem_arena::{Arena, ArenaConfig};
use dsmem_bench::request_sizes;
use dsmem_core::Allocator;

/// Benchmark: 10K mixed small allocations followed by a clear, so every
/// iteration after the first reuses warm blocks.
fn bench_arena_alloc_clear_10k(c: &mut Criterion) {
    let arena = Arena::new(Arc::new(Allocator::new())).unwrap();
    let sizes = request_sizes(10_000, 128);
    c.bench_function("arena_alloc_clear_10k", |b| {
        b.iter(|| {
            for &bytes in &sizes {
                black_box(arena.allocate(bytes).unwrap());
            }
            arena.clear().unwrap();
        });
    });
}

/// Benchmark: first-fit scan past 64 blocks that cannot take the request.
fn bench_arena_first_fit_scan(c: &mut Criterion) {
    let allocator = Arc::new(Allocator::new());
    c.bench_function("arena_first_fit_64_blocks", |b| {
        b.iter_batched(
            || {
                let arena =
                    Arena::with_config(allocator.clone(), ArenaConfig::with_block_size(4096))
                        .unwrap();
                // 64 blocks, each left with 96 bytes free.
                for _ in 0..64 {
                    arena.allocate(4000).unwrap();
                }
                arena
            },
            |arena| {
                // Larger than any block's remaining room: full scan, new block.
                black_box(arena.allocate(black_box(128)).unwrap());
                arena
            },
            BatchSize::LargeInput,
        );
    });
}

/// Benchmark: heap allocate+free of the same sizes, as a baseline.
fn bench_allocator_baseline_10k(c: &mut Criterion) {
    let allocator = Allocator::new();
    let sizes = request_sizes(10_000, 128);
    c.bench_function("allocator_alloc_free_10k", |b| {
        b.iter(|| {
            for &bytes in &sizes {
                let block = allocator.allocate(bytes).unwrap();
                black_box(block.as_ptr());
                allocator.free(block).unwrap();
            }
        });
    });
}

criterion_group!(
    benches,
    bench_arena_alloc_clear_10k,
    bench_arena_first_fit_scan,
    bench_allocator_baseline_10k
);
criterion_main!(benches);
