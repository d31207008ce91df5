//! Block validation service
//!
//! Combines basic and history-based features for each submitted block,
//! scores it, keeps the running counters and feeds the history window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::monitoring::ValidatorMetrics;
use crate::validator::network::LayerSummary;
use crate::validator::{
    AiValidator, BlockData, BlockFeatureEngine, Decision, FeatureExtractor, FeatureMap,
    Prediction, Result, ValidatorConfig, ValidatorError,
};

/// Result of validating one block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub score: f64,
    pub decision: Decision,
    pub confidence: f64,
    pub blocks_processed: u64,
    pub anomalies_detected: u64,
    pub success_rate: f64,
    /// Number of combined basic and advanced descriptors
    pub feature_count: usize,
    pub model: String,
    pub block_height: u64,
    pub block_hash: String,
}

impl ValidationReport {
    pub fn prediction(&self) -> Prediction {
        Prediction {
            score: self.score,
            decision: self.decision,
            confidence: self.confidence,
        }
    }
}

/// Running service statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStats {
    pub blocks_processed: u64,
    pub anomalies_detected: u64,
    pub success_rate: f64,
    pub model_loaded: bool,
    pub model_trained: bool,
    /// Seconds since the service started
    pub service_uptime: f64,
    pub started_at: DateTime<Utc>,
    pub history_len: usize,
}

/// Loaded classifier description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_loaded: bool,
    pub model_trained: bool,
    /// `[batch, features]`, batch left open
    pub input_shape: [Option<usize>; 2],
    pub output_shape: [Option<usize>; 2],
    pub layers: usize,
    pub total_params: usize,
    pub feature_names: Vec<String>,
    pub layer_summary: Vec<LayerSummary>,
}

/// Stateful block validator shared by the API and the simulator
pub struct ValidationService {
    validator: AiValidator,
    extractor: FeatureExtractor,
    engine: BlockFeatureEngine,
    blocks_processed: u64,
    anomalies_detected: u64,
    started: Instant,
    started_at: DateTime<Utc>,
    metrics: Option<Arc<ValidatorMetrics>>,
}

impl ValidationService {
    pub fn new(validator: AiValidator, engine: BlockFeatureEngine) -> Self {
        Self {
            validator,
            extractor: FeatureExtractor::new(),
            engine,
            blocks_processed: 0,
            anomalies_detected: 0,
            started: Instant::now(),
            started_at: Utc::now(),
            metrics: None,
        }
    }

    /// Build from configuration, loading the model artifact if present
    pub fn from_config(config: &ValidatorConfig) -> Self {
        let validator = AiValidator::load_or_untrained(
            &config.model.model_path,
            &config.model.architecture(),
            config.model.seed,
            config.model.thresholds(),
        );
        let engine = BlockFeatureEngine::with_window(
            config.features.history_window,
            config.features.target_block_time_secs,
        );
        info!(
            "Validation service ready (model: {}, history window: {})",
            validator.model_label(),
            config.features.history_window
        );
        Self::new(validator, engine)
    }

    pub fn with_metrics(mut self, metrics: Arc<ValidatorMetrics>) -> Self {
        metrics.set_model_loaded(self.validator.is_loaded());
        self.metrics = Some(metrics);
        self
    }

    pub fn validator(&self) -> &AiValidator {
        &self.validator
    }

    /// Swap in a newly trained or loaded classifier
    pub fn replace_validator(&mut self, validator: AiValidator) {
        info!("Replacing classifier ({} -> {})", self.validator.model_label(), validator.model_label());
        self.validator = validator;
        if let Some(metrics) = &self.metrics {
            metrics.set_model_loaded(self.validator.is_loaded());
        }
    }

    pub fn history_len(&self) -> usize {
        self.engine.history_len()
    }

    /// Basic descriptors overlaid on the history-based ones
    pub fn combined_features(&self, block: &BlockData) -> FeatureMap {
        let mut combined = self.engine.compute(block);
        // normalized values replace raw ones for shared names (tx_count, block_size, ...)
        // so the classifier reads the same scale it was trained on
        combined.extend(self.extractor.extract_block_features(block));
        combined
    }

    /// Score a block, update counters and record it in the history window
    pub fn validate_block(&mut self, block: BlockData) -> Result<ValidationReport> {
        let started = Instant::now();
        debug!("Validating block #{}", block.height);

        let features = self.combined_features(&block);
        let prediction = match self.validator.predict(&features) {
            Ok(prediction) => prediction,
            Err(e) => {
                error!("Validation of block #{} failed: {}", block.height, e);
                if let Some(metrics) = &self.metrics {
                    metrics.record_validation_error();
                }
                return Err(e);
            }
        };

        self.blocks_processed += 1;
        if prediction.decision == Decision::Reject {
            self.anomalies_detected += 1;
        }

        let report = ValidationReport {
            score: prediction.score,
            decision: prediction.decision,
            confidence: prediction.confidence,
            blocks_processed: self.blocks_processed,
            anomalies_detected: self.anomalies_detected,
            success_rate: self.success_rate(),
            feature_count: features.len(),
            model: self.validator.model_label().to_string(),
            block_height: block.height,
            block_hash: block.hash.clone(),
        };

        info!(
            "Validation complete - Block: #{}, Score: {:.3}, Decision: {}",
            block.height, report.score, report.decision
        );

        self.engine.push_block(block);

        if let Some(metrics) = &self.metrics {
            metrics.record_validation(
                report.decision,
                report.score,
                started.elapsed().as_secs_f64(),
            );
            metrics.set_history_blocks(self.engine.history_len());
        }

        Ok(report)
    }

    /// Share of processed blocks that were not rejected
    pub fn success_rate(&self) -> f64 {
        (self.blocks_processed - self.anomalies_detected) as f64 / self.blocks_processed.max(1) as f64
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            blocks_processed: self.blocks_processed,
            anomalies_detected: self.anomalies_detected,
            success_rate: self.success_rate(),
            model_loaded: self.validator.is_loaded(),
            model_trained: self.validator.is_trained(),
            service_uptime: self.started.elapsed().as_secs_f64(),
            started_at: self.started_at,
            history_len: self.engine.history_len(),
        }
    }

    pub fn model_info(&self) -> Result<ModelInfo> {
        let model = self.validator.model().ok_or(ValidatorError::ModelNotLoaded)?;
        Ok(ModelInfo {
            model_loaded: true,
            model_trained: self.validator.is_trained(),
            input_shape: [None, Some(model.input_dim())],
            output_shape: [None, Some(model.output_dim())],
            layers: model.layer_count(),
            total_params: model.parameter_count(),
            feature_names: self.validator.feature_names().to_vec(),
            layer_summary: model.summary(),
        })
    }
}
