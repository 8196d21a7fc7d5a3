//! Benchmarks for propagation and list reconciliation
//!
//! Run with: cargo bench -p weft-core --bench reconcile

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use weft_core::reactive::Runtime;

fn bench_diamond(c: &mut Criterion) {
    let rt = Runtime::new();
    let source = rt.signal(0u64);

    let left = {
        let source = source.clone();
        rt.memo(move || source.get() + 1).unwrap()
    };
    let right = {
        let source = source.clone();
        rt.memo(move || source.get() * 2).unwrap()
    };
    rt.watch(move || left.get() + right.get(), |sum| {
        black_box(sum);
    })
    .unwrap();

    let mut next = 0u64;
    c.bench_function("propagate/diamond", |b| {
        b.iter(|| {
            next += 1;
            source.set(next);
        })
    });
}

fn bench_keyed(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile/keyed");

    // The greedy walk is quadratic on a full reversal.
    for len in [100usize, 1_000] {
        group.throughput(Throughput::Elements(len as u64));

        let forward: Vec<usize> = (0..len).collect();
        let reversed: Vec<usize> = (0..len).rev().collect();
        let mut swapped = forward.clone();
        swapped.swap(1, len - 2);
        let sparse: Vec<usize> = (0..len).filter(|n| n % 10 != 0).collect();

        for (name, target) in [("reverse", reversed), ("swap", swapped), ("remove_10pct", sparse)] {
            let rt = Runtime::new();
            let items = rt.signal(forward.clone());
            let list = rt.for_each(items.clone(), |key: &usize, _| *key).unwrap();

            group.bench_with_input(BenchmarkId::new(name, len), &target, |b, target| {
                b.iter(|| {
                    items.set(target.clone());
                    items.set(forward.clone());
                    black_box(list.len())
                })
            });
        }
    }

    group.finish();
}

fn bench_indexed(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile/indexed");

    for len in [100usize, 1_000, 10_000] {
        group.throughput(Throughput::Elements(len as u64));

        let rt = Runtime::new();
        let items = rt.signal((0..len).collect::<Vec<_>>());
        let list = rt
            .index_for(items.clone(), |value, _| value.get_untracked())
            .unwrap();

        let mut offset = 0;
        group.bench_function(BenchmarkId::new("shift_values", len), |b| {
            b.iter(|| {
                offset += 1;
                items.set((offset..offset + len).collect());
                black_box(list.len())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_diamond, bench_keyed, bench_indexed);
criterion_main!(benches);
