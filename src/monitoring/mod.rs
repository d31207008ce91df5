use anyhow::Result;
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use tracing::{info, warn};

use crate::validator::Decision;

/// Score histogram buckets, one per tenth
const SCORE_BUCKETS: [f64; 9] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];

/// Inference latency buckets in seconds
const LATENCY_BUCKETS: [f64; 8] = [0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5];

pub struct ValidatorMetrics {
    registry: Registry,

    // Validation metrics
    pub blocks_validated: IntCounterVec,
    pub validation_errors: IntCounter,
    pub journal_errors: IntCounter,
    pub validation_score: Histogram,
    pub validation_latency: Histogram,

    // Model / service state
    pub model_loaded: Gauge,
    pub history_blocks: Gauge,
}

impl ValidatorMetrics {
    pub fn new() -> Result<Self> {
        info!("Initializing validator metrics");

        let registry = Registry::new();

        let blocks_validated = IntCounterVec::new(
            Opts::new("blocks_validated_total", "Total number of blocks validated"),
            &["decision"],
        )?;
        let validation_errors =
            IntCounter::new("validation_errors_total", "Total number of failed validations")?;
        let journal_errors = IntCounter::new(
            "journal_errors_total",
            "Total number of validation journal write failures",
        )?;
        let validation_score = Histogram::with_opts(
            HistogramOpts::new("validation_score", "Model validity score per block")
                .buckets(SCORE_BUCKETS.to_vec()),
        )?;
        let validation_latency = Histogram::with_opts(
            HistogramOpts::new(
                "validation_latency_seconds",
                "Feature extraction plus inference time in seconds",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
        )?;
        let model_loaded = Gauge::new("model_loaded", "1 when a classifier is loaded")?;
        let history_blocks =
            Gauge::new("history_blocks", "Blocks currently held in the history window")?;

        registry.register(Box::new(blocks_validated.clone()))?;
        registry.register(Box::new(validation_errors.clone()))?;
        registry.register(Box::new(journal_errors.clone()))?;
        registry.register(Box::new(validation_score.clone()))?;
        registry.register(Box::new(validation_latency.clone()))?;
        registry.register(Box::new(model_loaded.clone()))?;
        registry.register(Box::new(history_blocks.clone()))?;

        Ok(Self {
            registry,
            blocks_validated,
            validation_errors,
            journal_errors,
            validation_score,
            validation_latency,
            model_loaded,
            history_blocks,
        })
    }

    pub fn export_metrics(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn record_validation(&self, decision: Decision, score: f64, latency_secs: f64) {
        self.blocks_validated
            .with_label_values(&[decision.as_str()])
            .inc();
        self.validation_score.observe(score);
        self.validation_latency.observe(latency_secs);
    }

    pub fn record_validation_error(&self) {
        self.validation_errors.inc();
    }

    pub fn record_journal_error(&self) {
        self.journal_errors.inc();
        warn!("Recorded validation journal failure");
    }

    pub fn set_model_loaded(&self, loaded: bool) {
        self.model_loaded.set(if loaded { 1.0 } else { 0.0 });
    }

    pub fn set_history_blocks(&self, count: usize) {
        self.history_blocks.set(count as f64);
    }

    pub fn decision_count(&self, decision: Decision) -> u64 {
        self.blocks_validated
            .with_label_values(&[decision.as_str()])
            .get()
    }
}
