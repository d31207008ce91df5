//! Scoring latency benchmarks
//!
//! A block is scored on the request path, so feature extraction plus a
//! forward pass should stay well under a millisecond.

use block_ai_validator::validator::{
    AiValidator, BlockData, BlockFeatureEngine, DecisionThresholds, FeatureExtractor,
    ModelArchitecture, TransactionData, FEATURE_NAMES,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn sample_block(height: u64) -> BlockData {
    BlockData {
        height,
        hash: format!("0x{:064x}", height),
        timestamp: 1_700_000_000.0 + height as f64 * 6.0,
        expected_timestamp: 1_700_000_000.0 + height as f64 * 6.0,
        tx_count: 120,
        miner: format!("miner_{}", height % 4 + 1),
        size: 400_000.0,
        gas_used: 8_000_000.0,
        gas_limit: 10_000_000.0,
        transactions: (0..40)
            .map(|i| TransactionData {
                hash: format!("tx_{}_{}", height, i),
                amount: 10.0 + i as f64 * 3.5,
                fee: 1.0 + (i % 5) as f64,
            })
            .collect(),
        ..BlockData::default()
    }
}

fn bench_feature_extraction(c: &mut Criterion) {
    let extractor = FeatureExtractor::new();
    let block = sample_block(1);

    c.bench_function("extract_block_features", |b| {
        b.iter(|| extractor.extract_block_features(black_box(&block)));
    });
}

fn bench_history_features(c: &mut Criterion) {
    let mut engine = BlockFeatureEngine::new();
    for height in 0..100 {
        engine.push_block(sample_block(height));
    }
    let current = sample_block(100);

    c.bench_function("advanced_features_full_history", |b| {
        b.iter(|| engine.compute(black_box(&current)));
    });
}

fn bench_prediction(c: &mut Criterion) {
    let architecture = ModelArchitecture::new(FEATURE_NAMES.len(), ModelArchitecture::default_hidden());
    let validator = AiValidator::untrained(&architecture, 42, DecisionThresholds::default());
    let features = FeatureExtractor::new().extract_block_features(&sample_block(1));

    c.bench_function("predict_block", |b| {
        b.iter(|| validator.predict(black_box(&features)));
    });
}

criterion_group!(
    benches,
    bench_feature_extraction,
    bench_history_features,
    bench_prediction
);
criterion_main!(benches);
