//! Pipeline benchmark: sample → adapter → scaler → scorers → vote → window.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nids_agent::config::DetectorConfig;
use nids_agent::features::{feature_index, FeatureAdapter, Sample, StandardScaler};
use nids_agent::model::{InMemoryArtifacts, ModelKind};
use nids_agent::session::DetectionSession;
use std::sync::Arc;

fn make_samples(n: usize) -> Vec<Sample> {
    (0..n)
        .map(|i| {
            Sample::new()
                .with("src_ip", format!("10.0.{}.{}", i % 4, i % 50))
                .with("src_port", 30000 + (i % 1000) as u64)
                .with("timestamp", 1_700_000_000.0 + i as f64)
                .with("bytes_fwd", 1500.0 * (i % 7) as f64)
                .with("bytes_bwd", 900.0)
                .with("pkts_fwd", (i % 9) as f64)
                .with("pkts_bwd", 4.0)
                .with("syn_count", (i % 11) as f64)
        })
        .collect()
}

fn session() -> DetectionSession {
    let syn = feature_index("syn_count").unwrap_or(11);
    let loader = InMemoryArtifacts::new()
        .with_scaler(StandardScaler::identity())
        .with_model(
            ModelKind::IsolationForest,
            Arc::new(move |x: &[f32]| 0.1 - 0.05 * x[syn] as f64),
        )
        .with_model(
            ModelKind::OneClassSvm,
            Arc::new(move |x: &[f32]| 0.5 - 0.1 * x[syn] as f64),
        )
        .with_model(
            ModelKind::Autoencoder,
            Arc::new(|x: &[f32]| {
                x.iter().map(|v| (*v as f64).powi(2)).sum::<f64>() / x.len() as f64
            }),
        );
    DetectionSession::from_loader(&DetectorConfig::default(), &loader)
        .unwrap()
        .without_sinks()
}

fn bench_adapter(c: &mut Criterion) {
    let adapter = FeatureAdapter::new();
    let samples = make_samples(100);

    c.bench_function("adapt_100_samples", |b| {
        b.iter(|| {
            for s in &samples {
                black_box(adapter.adapt(black_box(s))).ok();
            }
        })
    });
}

fn bench_batch(c: &mut Criterion) {
    let samples = make_samples(1000);
    let mut s = session();

    c.bench_function("predict_batch_1000", |b| {
        b.iter(|| {
            s.reset_windows();
            black_box(s.predict_batch(black_box(&samples)))
        })
    });
}

criterion_group!(benches, bench_adapter, bench_batch);
criterion_main!(benches);
