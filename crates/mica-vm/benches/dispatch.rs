// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Dispatch loop and collector throughput.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use mica_vm::{Engine, GcConfig, VmConfig};

const FIB: &str = "\
def fib(n) = if n < 2 then n else fib(n - 1) + fib(n - 2)
def main() = fib(18)
";

const RECORDS: &str = "\
def point(n) = x: n, y: n * 2
def sum(x: a, y: b) = a + b
def loop(n) = if n < 1 then 0 else sum(point(n)) + loop(n - 1)
def main() = loop(200)
";

fn loaded(source: &str, config: VmConfig) -> Engine {
    let mut engine = Engine::with_config(config);
    if let Err(err) = engine.load(source, "bench") {
        panic!("benchmark source failed to compile: {}", err);
    }
    engine
}

fn bench_calls(c: &mut Criterion) {
    let mut engine = loaded(FIB, VmConfig::default());
    c.bench_function("fib_18", |b| {
        b.iter(|| black_box(engine.run("main").ok()))
    });
}

fn bench_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("records");

    let mut engine = loaded(RECORDS, VmConfig::default());
    group.bench_function("default_threshold", |b| {
        b.iter(|| black_box(engine.run("main").ok()))
    });

    let stress = VmConfig {
        gc: GcConfig {
            stress: true,
            ..GcConfig::default()
        },
    };
    let mut engine = loaded(RECORDS, stress);
    group.bench_function("stress", |b| {
        b.iter(|| black_box(engine.run("main").ok()))
    });

    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    c.bench_function("compile_records", |b| {
        b.iter(|| {
            let mut engine = Engine::new();
            black_box(engine.load(RECORDS, "bench").is_ok())
        })
    });
}

criterion_group!(benches, bench_calls, bench_allocation, bench_compile);
criterion_main!(benches);
