//! Performance benchmarks for the speed probe
//!
//! Covers the hot paths that run per tick or per session: statistics over
//! latency samples, instantaneous throughput, quality classification, upload
//! payload construction and sparkline rendering.

use clap::Parser;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use speed_probe::{
    cli::Cli,
    executor::build_upload_payload,
    models::{
        metrics::{LatencySample, ThroughputSample},
        Config,
    },
    output::sparkline,
    stats::{QualityClassifier, StatisticsEngine},
};
use std::hint::black_box;
use std::time::Duration;

/// Latency samples with every tenth probe lost
fn create_sample_latencies(count: usize) -> Vec<LatencySample> {
    (0..count)
        .map(|i| {
            if i % 10 == 9 {
                LatencySample::lost()
            } else {
                LatencySample::success(Duration::from_micros(8_000 + (i as u64 * 137) % 9_000))
            }
        })
        .collect()
}

fn create_sample_history(count: usize) -> Vec<ThroughputSample> {
    (0..count)
        .map(|i| ThroughputSample::new(Duration::from_millis(60 * (i as u64 + 1)), 50.0 + (i % 17) as f64 * 3.5))
        .collect()
}

fn benchmark_statistics_calculation(c: &mut Criterion) {
    let mut group = c.benchmark_group("statistics");
    let engine = StatisticsEngine::new();

    for size in [10, 100, 1000].iter() {
        let samples = create_sample_latencies(*size);
        group.bench_with_input(BenchmarkId::new("summarize", size), size, |b, _| {
            b.iter(|| black_box(engine.summarize(black_box(&samples))));
        });
    }

    group.bench_function("instantaneous_mbps", |b| {
        b.iter(|| black_box(engine.instantaneous_mbps(black_box(12_500_000), black_box(Duration::from_millis(60)))));
    });

    group.finish();
}

fn benchmark_quality_classification(c: &mut Criterion) {
    let classifier = QualityClassifier::new();

    c.bench_function("classify_session", |b| {
        b.iter(|| {
            black_box(classifier.classify(
                black_box(Some(94.2)),
                black_box(Some(38.7)),
                black_box(Some(21.0)),
                black_box(Some(4.3)),
                black_box(0.0),
            ))
        });
    });
}

fn benchmark_upload_payload(c: &mut Criterion) {
    let mut group = c.benchmark_group("upload_payload");

    for size in [64 * 1024, 1024 * 1024, 8 * 1024 * 1024].iter() {
        group.bench_with_input(BenchmarkId::new("build", size), size, |b, &size| {
            b.iter(|| black_box(build_upload_payload(black_box(size))));
        });
    }

    group.finish();
}

fn benchmark_sparkline(c: &mut Criterion) {
    let mut group = c.benchmark_group("sparkline");

    for size in [40, 400, 4000].iter() {
        let history = create_sample_history(*size);
        group.bench_with_input(BenchmarkId::new("render", size), size, |b, _| {
            b.iter(|| black_box(sparkline::render(black_box(&history), 40)));
        });
    }

    group.finish();
}

fn benchmark_config_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("config_parsing");

    group.bench_function("parse_cli_args", |b| {
        let args = ["speedprobe", "--streams", "8", "--samples", "20", "--timeout", "10"];
        b.iter(|| black_box(Cli::try_parse_from(black_box(args)).unwrap()));
    });

    group.bench_function("validate_config", |b| {
        let config = Config::default();
        b.iter(|| black_box(config.validate()));
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_statistics_calculation,
    benchmark_quality_classification,
    benchmark_upload_payload,
    benchmark_sparkline,
    benchmark_config_parsing
);

criterion_main!(benches);
