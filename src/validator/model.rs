//! Block validator model
//!
//! Wraps the dense network with its scaler, maps the sigmoid score onto an
//! accept/review/reject decision and handles artifact persistence.

use chrono::{DateTime, Utc};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

use super::errors::{Result, ValidatorError};
use super::features::{FeatureMap, FEATURE_NAMES};
use super::network::{BlockValidatorModel, EvaluationMetrics, ModelArchitecture};
use super::scaler::StandardScaler;

/// Artifact layout version written by this build
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// Score returned when no model is available
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Outcome of scoring a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Review,
    Reject,
    /// No model available
    Unknown,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Accept => "accept",
            Decision::Review => "review",
            Decision::Reject => "reject",
            Decision::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score cutoffs. `score > accept` accepts, `score < reject` rejects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionThresholds {
    pub accept: f64,
    pub reject: f64,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self {
            accept: 0.85,
            reject: 0.6,
        }
    }
}

impl DecisionThresholds {
    pub fn new(accept: f64, reject: f64) -> Result<Self> {
        let thresholds = Self { accept, reject };
        thresholds.validate()?;
        Ok(thresholds)
    }

    /// Requires `0 <= reject < accept <= 1`
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.reject) || !(0.0..=1.0).contains(&self.accept) {
            return Err(ValidatorError::Configuration(
                "decision thresholds must lie within [0, 1]".to_string(),
            ));
        }
        if self.reject >= self.accept {
            return Err(ValidatorError::Configuration(format!(
                "reject threshold {} must be below accept threshold {}",
                self.reject, self.accept
            )));
        }
        Ok(())
    }

    pub fn decide(&self, score: f64) -> Decision {
        if score > self.accept {
            Decision::Accept
        } else if score < self.reject {
            Decision::Reject
        } else {
            Decision::Review
        }
    }
}

/// Score, decision and confidence for one block
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub score: f64,
    pub decision: Decision,
    pub confidence: f64,
}

impl Prediction {
    /// Placeholder returned without a model
    pub fn unknown() -> Self {
        Self {
            score: NEUTRAL_SCORE,
            decision: Decision::Unknown,
            confidence: 0.0,
        }
    }

    pub fn from_score(score: f64, thresholds: &DecisionThresholds) -> Self {
        Self {
            score,
            decision: thresholds.decide(score),
            confidence: (score - NEUTRAL_SCORE).abs() * 2.0,
        }
    }
}

/// Persisted model: network weights, fitted scaler and feature order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub feature_names: Vec<String>,
    pub network: BlockValidatorModel,
    pub scaler: Option<StandardScaler>,
    pub trained_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metrics: Option<EvaluationMetrics>,
}

impl ModelArtifact {
    pub fn new(network: BlockValidatorModel, scaler: Option<StandardScaler>) -> Self {
        Self {
            format_version: MODEL_FORMAT_VERSION,
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            network,
            scaler,
            trained_at: Some(Utc::now()),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: EvaluationMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Model saved to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let artifact: Self = serde_json::from_str(&content)?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Version, feature order, layer shapes and widths must agree
    pub fn validate(&self) -> Result<()> {
        if self.format_version != MODEL_FORMAT_VERSION {
            return Err(ValidatorError::Serialization(format!(
                "unsupported model format version {}",
                self.format_version
            )));
        }
        if !self.feature_names.iter().map(String::as_str).eq(FEATURE_NAMES) {
            return Err(ValidatorError::Serialization(format!(
                "feature names {:?} do not match the extractor order",
                self.feature_names
            )));
        }
        self.network.validate_shapes()?;
        if self.network.input_dim() != self.feature_names.len() {
            return Err(ValidatorError::DimensionMismatch {
                expected: self.feature_names.len(),
                actual: self.network.input_dim(),
            });
        }
        if let Some(scaler) = &self.scaler {
            if scaler.n_features() != self.feature_names.len() {
                return Err(ValidatorError::DimensionMismatch {
                    expected: self.feature_names.len(),
                    actual: scaler.n_features(),
                });
            }
        }
        Ok(())
    }
}

/// Block classifier used by the validation service
#[derive(Debug, Clone)]
pub struct AiValidator {
    model: Option<BlockValidatorModel>,
    scaler: Option<StandardScaler>,
    feature_names: Vec<String>,
    thresholds: DecisionThresholds,
    trained: bool,
}

impl AiValidator {
    /// Validator without a model; every prediction is `unknown`
    pub fn new(thresholds: DecisionThresholds) -> Self {
        Self {
            model: None,
            scaler: None,
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            thresholds,
            trained: false,
        }
    }

    /// Freshly initialized, untrained network
    pub fn untrained(architecture: &ModelArchitecture, seed: u64, thresholds: DecisionThresholds) -> Self {
        let mut validator = Self::new(thresholds);
        validator.model = Some(BlockValidatorModel::new(architecture, seed));
        validator
    }

    pub fn from_artifact(artifact: ModelArtifact, thresholds: DecisionThresholds) -> Result<Self> {
        artifact.validate()?;
        Ok(Self {
            model: Some(artifact.network),
            scaler: artifact.scaler,
            feature_names: artifact.feature_names,
            thresholds,
            trained: artifact.trained_at.is_some(),
        })
    }

    pub fn load(path: &Path, thresholds: DecisionThresholds) -> Result<Self> {
        let artifact = ModelArtifact::load(path)?;
        let validator = Self::from_artifact(artifact, thresholds)?;
        info!("Model loaded from {}", path.display());
        Ok(validator)
    }

    /// Load the artifact at `path`, falling back to an untrained network
    pub fn load_or_untrained(
        path: &Path,
        architecture: &ModelArchitecture,
        seed: u64,
        thresholds: DecisionThresholds,
    ) -> Self {
        match Self::load(path, thresholds) {
            Ok(validator) => validator,
            Err(e) => {
                warn!(
                    "No usable model at {} ({}), using untrained model",
                    path.display(),
                    e
                );
                Self::untrained(architecture, seed, thresholds)
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    pub fn model(&self) -> Option<&BlockValidatorModel> {
        self.model.as_ref()
    }

    pub fn scaler(&self) -> Option<&StandardScaler> {
        self.scaler.as_ref()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn thresholds(&self) -> DecisionThresholds {
        self.thresholds
    }

    /// Short label for reports and the journal
    pub fn model_label(&self) -> &'static str {
        match (&self.model, self.trained) {
            (None, _) => "none",
            (Some(_), true) => "dense_mlp",
            (Some(_), false) => "dense_mlp_untrained",
        }
    }

    /// Score a descriptor map; names outside the feature order are ignored
    /// and missing ones read as 0.0
    pub fn predict(&self, features: &FeatureMap) -> Result<Prediction> {
        if self.model.is_none() {
            return Ok(Prediction::unknown());
        }
        let row: Vec<f64> = self
            .feature_names
            .iter()
            .map(|name| features.get(name).copied().unwrap_or(0.0))
            .collect();
        self.predict_vector(&row)
    }

    /// Score a vector already in feature order
    pub fn predict_vector(&self, row: &[f64]) -> Result<Prediction> {
        let model = match &self.model {
            Some(model) => model,
            None => return Ok(Prediction::unknown()),
        };

        let mut input = Array1::from(row.to_vec());
        if let Some(scaler) = &self.scaler {
            input = scaler.transform_row(input.view())?;
        }

        let score = model.predict_one(input.view())?;
        if !score.is_finite() {
            return Err(ValidatorError::ModelInference(format!(
                "non-finite score {}",
                score
            )));
        }
        Ok(Prediction::from_score(score, &self.thresholds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::features::FeatureVector;
    use crate::validator::network::LayerSpec;
    use tempfile::TempDir;

    fn architecture() -> ModelArchitecture {
        ModelArchitecture::new(FEATURE_NAMES.len(), ModelArchitecture::default_hidden())
    }

    #[test]
    fn test_decision_thresholds() {
        let t = DecisionThresholds::default();
        assert_eq!(t.decide(0.9), Decision::Accept);
        assert_eq!(t.decide(0.85), Decision::Review);
        assert_eq!(t.decide(0.6), Decision::Review);
        assert_eq!(t.decide(0.59), Decision::Reject);
    }

    #[test]
    fn test_threshold_validation() {
        assert!(DecisionThresholds::new(0.85, 0.6).is_ok());
        assert!(DecisionThresholds::new(0.5, 0.6).is_err());
        assert!(DecisionThresholds::new(1.2, 0.6).is_err());
        assert!(DecisionThresholds::new(0.8, -0.1).is_err());
    }

    #[test]
    fn test_prediction_confidence() {
        let p = Prediction::from_score(0.95, &DecisionThresholds::default());
        assert_eq!(p.decision, Decision::Accept);
        assert!((p.confidence - 0.9).abs() < 1e-12);

        let p = Prediction::from_score(0.5, &DecisionThresholds::default());
        assert_eq!(p.decision, Decision::Reject);
        assert_eq!(p.confidence, 0.0);
    }

    #[test]
    fn test_no_model_returns_unknown() {
        let validator = AiValidator::new(DecisionThresholds::default());
        let prediction = validator.predict(&FeatureMap::new()).unwrap();
        assert_eq!(prediction.decision, Decision::Unknown);
        assert_eq!(prediction.score, 0.5);
        assert_eq!(validator.model_label(), "none");
    }

    #[test]
    fn test_untrained_model_scores_in_range() {
        let validator = AiValidator::untrained(&architecture(), 42, DecisionThresholds::default());
        let features = FeatureVector::default().to_map();
        let prediction = validator.predict(&features).unwrap();
        assert!((0.0..=1.0).contains(&prediction.score));
        assert_ne!(prediction.decision, Decision::Unknown);
        assert!(!validator.is_trained());
    }

    #[test]
    fn test_decision_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Decision::Review).unwrap(), "\"review\"");
        assert_eq!(Decision::Reject.to_string(), "reject");
    }

    #[test]
    fn test_artifact_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("models").join("validator.json");

        let network = BlockValidatorModel::new(&architecture(), 5);
        let artifact = ModelArtifact::new(network, None);
        artifact.save(&path).unwrap();

        let original = AiValidator::from_artifact(artifact, DecisionThresholds::default()).unwrap();
        let restored = AiValidator::load(&path, DecisionThresholds::default()).unwrap();
        assert!(restored.is_trained());

        let row = vec![0.3; FEATURE_NAMES.len()];
        assert_eq!(
            original.predict_vector(&row).unwrap().score,
            restored.predict_vector(&row).unwrap().score
        );
    }

    #[test]
    fn test_load_failure_falls_back_to_untrained() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.json");
        std::fs::write(&path, "{ not a model").unwrap();

        let validator =
            AiValidator::load_or_untrained(&path, &architecture(), 1, DecisionThresholds::default());
        assert!(validator.is_loaded());
        assert!(!validator.is_trained());
        assert_eq!(validator.model_label(), "dense_mlp_untrained");
    }

    #[test]
    fn test_artifact_width_mismatch_rejected() {
        let narrow = ModelArchitecture::new(3, vec![LayerSpec { units: 4, dropout: 0.0 }]);
        let artifact = ModelArtifact::new(BlockValidatorModel::new(&narrow, 1), None);
        assert!(matches!(
            artifact.validate(),
            Err(ValidatorError::DimensionMismatch { expected: 15, actual: 3 })
        ));
    }

    fn dense_json(inputs: usize, units: usize, activation: &str) -> serde_json::Value {
        serde_json::json!({
            "weights": { "v": 1, "dim": [inputs, units], "data": vec![0.1; inputs * units] },
            "bias": { "v": 1, "dim": [units], "data": vec![0.0; units] },
            "activation": activation,
            "dropout": 0.0
        })
    }

    fn write_artifact(dir: &TempDir, feature_names: Vec<String>, layers: Vec<serde_json::Value>) -> std::path::PathBuf {
        let path = dir.path().join("model.json");
        let artifact = serde_json::json!({
            "format_version": MODEL_FORMAT_VERSION,
            "feature_names": feature_names,
            "network": { "layers": layers },
            "scaler": null,
            "trained_at": null
        });
        std::fs::write(&path, artifact.to_string()).unwrap();
        path
    }

    fn expected_names() -> Vec<String> {
        FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_network_artifact_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_artifact(&dir, Vec::new(), Vec::new());

        assert!(matches!(ModelArtifact::load(&path), Err(ValidatorError::Serialization(_))));
        let validator =
            AiValidator::load_or_untrained(&path, &architecture(), 1, DecisionThresholds::default());
        assert!(!validator.is_trained());
        let prediction = validator.predict(&FeatureVector::default().to_map()).unwrap();
        assert!((0.0..=1.0).contains(&prediction.score));
    }

    #[test]
    fn test_unchained_layer_artifact_rejected() {
        let dir = TempDir::new().unwrap();
        let layers = vec![
            dense_json(FEATURE_NAMES.len(), 2, "Relu"),
            dense_json(3, 1, "Sigmoid"),
        ];
        let path = write_artifact(&dir, expected_names(), layers);

        assert!(ModelArtifact::load(&path).is_err());
        assert!(AiValidator::load(&path, DecisionThresholds::default()).is_err());
    }

    #[test]
    fn test_well_formed_json_artifact_loads() {
        let dir = TempDir::new().unwrap();
        let layers = vec![
            dense_json(FEATURE_NAMES.len(), 2, "Relu"),
            dense_json(2, 1, "Sigmoid"),
        ];
        let path = write_artifact(&dir, expected_names(), layers);

        let validator = AiValidator::load(&path, DecisionThresholds::default()).unwrap();
        let score = validator.predict_vector(&vec![0.5; FEATURE_NAMES.len()]).unwrap().score;
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn test_unrelated_feature_names_rejected() {
        let dir = TempDir::new().unwrap();
        let names = (0..FEATURE_NAMES.len()).map(|i| format!("column_{}", i)).collect();
        let layers = vec![
            dense_json(FEATURE_NAMES.len(), 2, "Relu"),
            dense_json(2, 1, "Sigmoid"),
        ];
        let path = write_artifact(&dir, names, layers);

        let err = ModelArtifact::load(&path).unwrap_err();
        assert!(err.to_string().contains("feature names"), "{}", err);
    }
}
