//! Propagation benchmarks: fan-out width, chain depth, and dynamic re-tracking.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ripple_core::config::{PruningPolicy, RuntimeConfig};
use ripple_core::reactive::{Derived, Runtime, WatchOptions};

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");

    for width in [1usize, 10, 100, 1000] {
        let rt = Runtime::new();
        let cell = rt.cell(0_u64);
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..width {
            let hits = hits.clone();
            rt.watch(
                &[&cell],
                move || {
                    hits.fetch_add(1, Ordering::Relaxed);
                },
                WatchOptions::default(),
            )
            .unwrap();
        }

        group.throughput(Throughput::Elements(width as u64));
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, _| {
            let mut next = 0;
            b.iter(|| {
                next += 1;
                cell.set(black_box(next)).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_derived_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("derived_chain_read");

    for depth in [1usize, 4, 16] {
        let rt = Runtime::new();
        let cell = rt.cell(1_u64);

        let source = cell.clone();
        let mut tip: Derived<u64> = rt.derived(move || source.get() + 1).unwrap();
        for _ in 1..depth {
            let previous = tip.clone();
            tip = rt.derived(move || previous.get().unwrap_or(0) + 1).unwrap();
        }

        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| black_box(tip.get().unwrap()));
        });
    }

    group.finish();
}

fn bench_dynamic_tracking(c: &mut Criterion) {
    let mut group = c.benchmark_group("dynamic_tracking");

    let policies = [
        ("prune", PruningPolicy::Prune),
        ("accumulate", PruningPolicy::Accumulate),
    ];
    for (label, pruning) in policies {
        let rt = Runtime::with_config(RuntimeConfig::default().with_pruning(pruning));
        let flag = rt.cell(true);
        let left = rt.cell(0_u64);
        let right = rt.cell(0_u64);

        let (f, l, r) = (flag.clone(), left.clone(), right.clone());
        rt.watch_effect(move || {
            black_box(if f.get() { l.get() } else { r.get() });
        })
        .unwrap();

        group.bench_function(label, |b| {
            b.iter(|| flag.update(|value| !value).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fan_out, bench_derived_chain, bench_dynamic_tracking);
criterion_main!(benches);
