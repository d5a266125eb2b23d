//! Journey hot-path benchmarks
//!
//! - Stepper increment and branch
//! - Journey creation and branching
//! - Log emission overhead with a discarding logger
//!
//! Run with: `cargo bench`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::expect_used)] // Benchmarks can use expect for setup

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use journey_core::config::Config;
use journey_core::log::{Field, NullLogger};
use journey_core::stats::NullStats;
use journey_runtime::{App, Journey, JourneyKind, Stepper};
use journey_testing::InlineDispatcher;
use std::sync::Arc;

fn quiet_app() -> Arc<App> {
    App::builder(Config::new("bench"))
        .with_logger(Arc::new(NullLogger))
        .with_stats(Arc::new(NullStats))
        .with_dispatcher(Arc::new(InlineDispatcher::new()))
        .build()
        .expect("Failed to build app")
}

/// Benchmark the causality counter in isolation
fn benchmark_stepper(c: &mut Criterion) {
    let mut group = c.benchmark_group("stepper");
    group.throughput(Throughput::Elements(1));

    group.bench_function("inc", |b| {
        let stepper = Stepper::new();
        b.iter(|| black_box(stepper.inc()));
    });

    for depth in [1_usize, 4, 16] {
        group.bench_with_input(BenchmarkId::new("branch_off", depth), &depth, |b, &depth| {
            let mut stepper = Stepper::new();
            for _ in 0..depth {
                stepper = stepper.branch_off();
            }
            b.iter(|| black_box(stepper.branch_off()));
        });

        group.bench_with_input(BenchmarkId::new("render", depth), &depth, |b, &depth| {
            let mut stepper = Stepper::new();
            for _ in 0..depth {
                stepper = stepper.branch_off();
            }
            b.iter(|| black_box(stepper.to_string()));
        });
    }

    group.finish();
}

/// Benchmark journey creation and branching
fn benchmark_journey_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("journey");
    group.throughput(Throughput::Elements(1));
    let app = quiet_app();

    group.bench_function("new", |b| {
        b.iter(|| black_box(Journey::new(&app)));
    });

    group.bench_function("branch_off_child", |b| {
        let journey = app.journey();
        b.iter(|| black_box(journey.branch_off(JourneyKind::Child)));
    });

    group.bench_function("branch_off_root", |b| {
        let journey = app.journey();
        b.iter(|| black_box(journey.branch_off(JourneyKind::Root)));
    });

    group.bench_function("bg_inline", |b| {
        let journey = app.journey();
        b.iter(|| journey.bg(|bg| black_box(bg).trace("bench.bg", "work", &[])));
    });

    group.finish();
}

/// Benchmark log emission overhead (fields, stepper, stats tags)
fn benchmark_journey_logging(c: &mut Criterion) {
    let mut group = c.benchmark_group("journey_logging");
    group.throughput(Throughput::Elements(1));
    let app = quiet_app();

    group.bench_function("trace_no_fields", |b| {
        let journey = app.journey();
        b.iter(|| journey.trace(black_box("bench.trace"), "message", &[]));
    });

    group.bench_function("trace_three_fields", |b| {
        let journey = app.journey();
        let fields = [
            Field::string("sku", "A-1"),
            Field::uint("qty", 3),
            Field::bool("gift", false),
        ];
        b.iter(|| journey.trace(black_box("bench.trace"), "message", &fields));
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_stepper,
    benchmark_journey_lifecycle,
    benchmark_journey_logging,
);
criterion_main!(benches);
