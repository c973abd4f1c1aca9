//! Benchmark: trigger fan-out and computed chains.
//!
//! Measures:
//! - one write reaching N effects subscribed to the same key
//! - one write invalidating a chain of N computed values read by one effect

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ripple_core::{computed, effect, reactive, stop, Computed, EffectOptions, Object, Reactive};

fn observe() -> Reactive {
    reactive(Object::from_entries([("count", 0)]))
        .into_reactive()
        .expect("record is observable")
}

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");
    for n in [1usize, 10, 100, 1000] {
        let state = observe();
        let effects: Vec<_> = (0..n)
            .map(|_| {
                let s = state.clone();
                effect(move || black_box(s.get("count")), EffectOptions::default())
            })
            .collect();

        let mut next = 0.0;
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                next += 1.0;
                state.set("count", next);
            })
        });

        for e in &effects {
            stop(e);
        }
    }
    group.finish();
}

fn bench_computed_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("computed_chain");
    for depth in [1usize, 10, 100] {
        let state = observe();
        let s = state.clone();
        let mut last: Computed<f64> =
            computed(move || s.get("count").as_number().unwrap_or_default());
        for _ in 1..depth {
            let prev = last.clone();
            last = computed(move || prev.value() + 1.0);
        }
        let tail = last.clone();
        let reader = effect(move || black_box(tail.value()), EffectOptions::default());

        let mut next = 0.0;
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| {
                next += 1.0;
                state.set("count", next);
            })
        });

        stop(&reader);
    }
    group.finish();
}

criterion_group!(benches, bench_fan_out, bench_computed_chain);
criterion_main!(benches);
