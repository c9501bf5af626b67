use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::hint::black_box;

use keystate::{CreateOptions, Next, SharedState, StateKey};

#[derive(Clone, Serialize, Deserialize)]
struct State {
    counter: usize,
    name: String,
}

fn engine_with_counter() -> (SharedState, StateKey<usize>) {
    let state = SharedState::new();
    let key = StateKey::new("counter");
    state.create(&key, 0, CreateOptions::default()).unwrap();
    (state, key)
}

fn read_benchmark(c: &mut Criterion) {
    let (state, key) = engine_with_counter();

    c.bench_function("get", |b| {
        b.iter(|| {
            black_box(state.get(&key).unwrap());
        });
    });
}

fn write_benchmark(c: &mut Criterion) {
    let (state, key) = engine_with_counter();

    c.bench_function("set", |b| {
        let mut i = 0;
        b.iter(|| {
            state.set(&key, black_box(i)).unwrap();
            i += 1;
        });
    });
}

fn object_merge_benchmark(c: &mut Criterion) {
    let state = SharedState::new();
    let typed: StateKey<State> = StateKey::new("state");
    state
        .create(
            &typed,
            State {
                counter: 0,
                name: "test".to_string(),
            },
            CreateOptions::default(),
        )
        .unwrap();
    let untyped: StateKey<Value> = StateKey::new("state");

    c.bench_function("set_merge", |b| {
        let mut i = 0;
        b.iter(|| {
            state.set(&untyped, json!({ "counter": black_box(i) })).unwrap();
            i += 1;
        });
    });
}

fn middleware_benchmark(c: &mut Criterion) {
    let (state, key) = engine_with_counter();
    for _ in 0..5 {
        state.add_middleware(&key, |n: usize, next: Next<'_, usize>| next.run(n));
    }

    c.bench_function("set_with_5_middlewares", |b| {
        let mut i = 0;
        b.iter(|| {
            state.set(&key, black_box(i)).unwrap();
            i += 1;
        });
    });
}

fn flush_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_and_flush");

    for subscriber_count in [1, 10, 100].iter() {
        let state = SharedState::new();
        let key: StateKey<State> = StateKey::new("state");
        state
            .create(
                &key,
                State {
                    counter: 0,
                    name: "test".to_string(),
                },
                CreateOptions::default(),
            )
            .unwrap();

        for _ in 0..*subscriber_count {
            state
                .subscribe_select(&key, |s: &State| s.counter, |_: &usize| {
                    // Empty subscriber
                })
                .unwrap();
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(subscriber_count),
            subscriber_count,
            |b, _| {
                let mut i = 0;
                b.iter(|| {
                    state
                        .update(&key, |s| State {
                            counter: black_box(i),
                            ..s
                        })
                        .unwrap();
                    state.flush();
                    i += 1;
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    read_benchmark,
    write_benchmark,
    object_merge_benchmark,
    middleware_benchmark,
    flush_benchmark,
);
criterion_main!(benches);
