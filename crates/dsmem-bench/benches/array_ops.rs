//! Criterion micro-benchmarks for dynamic array append, lookup, and removal.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use dsmem_array::{DynArray, LockRegion, LockRegionList};
use dsmem_bench::filled_array;
use dsmem_core::Allocator;

/// Benchmark: 1K appends into a fresh array, including every resize.
fn bench_array_add_1k(c: &mut Criterion) {
    let allocator = Arc::new(Allocator::new());
    c.bench_function("array_add_1k", |b| {
        b.iter(|| {
            let array = DynArray::new(allocator.clone()).unwrap();
            for i in 0..1_000usize {
                array.add_item(black_box(i)).unwrap();
            }
            black_box(array.get_count());
        });
    });
}

/// Benchmark: indexed reads over a 1K-element array.
fn bench_array_get_1k(c: &mut Criterion) {
    let array = filled_array(Arc::new(Allocator::new()), 1_000).unwrap();
    c.bench_function("array_get_1k", |b| {
        b.iter(|| {
            let mut sum = 0usize;
            for i in 0..1_000 {
                sum += array.get_item(black_box(i)).unwrap();
            }
            black_box(sum);
        });
    });
}

/// Benchmark: head removal (full suffix shift) versus tail removal.
fn bench_array_remove(c: &mut Criterion) {
    let allocator = Arc::new(Allocator::new());
    let mut group = c.benchmark_group("array_remove_1k");
    group.bench_function("head", |b| {
        b.iter_batched(
            || filled_array(allocator.clone(), 1_000).unwrap(),
            |array| {
                while array.get_count() > 0 {
                    black_box(array.remove_item(0).unwrap());
                }
            },
            BatchSize::SmallInput,
        );
    });
    group.bench_function("tail", |b| {
        b.iter_batched(
            || filled_array(allocator.clone(), 1_000).unwrap(),
            |array| {
                while let Some(last) = array.get_count().checked_sub(1) {
                    black_box(array.remove_item(last).unwrap());
                }
            },
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

/// Benchmark: lock-region lookup by client address among 256 records.
fn bench_lock_region_find(c: &mut Criterion) {
    let regions = LockRegionList::new(Arc::new(Allocator::new())).unwrap();
    for i in 0..256u32 {
        regions
            .add_region(LockRegion::new(i * 64, 64, 0x10_000 + i as usize * 64))
            .unwrap();
    }
    c.bench_function("lock_region_find_256", |b| {
        b.iter(|| black_box(regions.find_by_addr(black_box(0x10_000 + 200 * 64)).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_array_add_1k,
    bench_array_get_1k,
    bench_array_remove,
    bench_lock_region_find
);
criterion_main!(benches);
