//! Block anomaly scoring
//!
//! Feature engineering over submitted blocks, a dense classifier that maps
//! the features onto accept/review/reject, and the training pipeline that
//! produces the classifier.
//!
//! ## Layout
//! - `block`: wire types for submitted blocks
//! - `features`: fixed 15-wide normalized classifier input
//! - `history`: descriptors over a rolling window of recent blocks
//! - `scaler` / `network`: standardization and the multilayer perceptron
//! - `model`: decision thresholds, predictions and persisted artifacts
//! - `training`: synthetic data, train/test runs and cross-validation

pub mod block;
pub mod config;
pub mod errors;
pub mod features;
pub mod history;
pub mod model;
pub mod network;
pub mod scaler;
pub mod stats;
pub mod training;

pub use block::{BlockData, TransactionData, ValidatorVote};
pub use config::ValidatorConfig;
pub use errors::{Result, ValidatorError};
pub use features::{FeatureExtractor, FeatureMap, FeatureVector, FEATURE_NAMES};
pub use history::BlockFeatureEngine;
pub use model::{AiValidator, Decision, DecisionThresholds, ModelArtifact, Prediction};
pub use network::{BlockValidatorModel, EvaluationMetrics, ModelArchitecture};
pub use scaler::StandardScaler;
pub use training::{CrossValidationReport, DatasetSummary, ModelTrainer, TrainingMetrics};
