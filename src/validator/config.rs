//! Validator configuration
//!
//! Defaults reproduce the production service; every section can be
//! overridden from a TOML/JSON file and a handful of environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::errors::{Result, ValidatorError};
use super::features::FEATURE_NAMES;
use super::history::{DEFAULT_HISTORY_WINDOW, DEFAULT_TARGET_BLOCK_TIME};
use super::model::DecisionThresholds;
use super::network::{AdamConfig, LayerSpec, ModelArchitecture};

/// Complete service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Rolling history used by the advanced features
    pub features: FeatureConfig,

    /// Classifier shape, thresholds and artifact location
    pub model: ModelConfig,

    /// Training hyperparameters
    pub training: TrainingConfig,

    /// HTTP listener and middleware limits
    pub server: ServerConfig,

    /// Background block simulator
    pub simulator: SimulatorConfig,

    /// Validation journal
    pub journal: JournalConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Number of recent blocks kept for the advanced features
    pub history_window: usize,

    /// Expected seconds between blocks
    pub target_block_time_secs: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            history_window: DEFAULT_HISTORY_WINDOW,
            target_block_time_secs: DEFAULT_TARGET_BLOCK_TIME,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Artifact loaded at startup and written by training
    pub model_path: PathBuf,

    /// Hidden layers between the input and the sigmoid output
    pub hidden_layers: Vec<LayerSpec>,

    /// Scores above this are accepted
    pub accept_threshold: f64,

    /// Scores below this are rejected
    pub reject_threshold: f64,

    /// Seed for weight initialization
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/block_validator.json"),
            hidden_layers: ModelArchitecture::default_hidden(),
            accept_threshold: 0.85,
            reject_threshold: 0.6,
            seed: 42,
        }
    }
}

impl ModelConfig {
    pub fn architecture(&self) -> ModelArchitecture {
        ModelArchitecture::new(FEATURE_NAMES.len(), self.hidden_layers.clone())
    }

    pub fn thresholds(&self) -> DecisionThresholds {
        DecisionThresholds {
            accept: self.accept_threshold,
            reject: self.reject_threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,

    /// Epochs per fold during cross-validation
    pub cv_epochs: usize,

    pub cv_folds: usize,

    pub batch_size: usize,

    /// Held-out share of the data
    pub test_size: f64,

    pub learning_rate: f64,

    /// Seed for data generation, splits and dropout
    pub seed: u64,

    /// Samples generated when no dataset is supplied
    pub synthetic_samples: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            cv_epochs: 50,
            cv_folds: 5,
            batch_size: 32,
            test_size: 0.2,
            learning_rate: 0.001,
            seed: 42,
            synthetic_samples: 10_000,
        }
    }
}

impl TrainingConfig {
    pub fn adam(&self) -> AdamConfig {
        AdamConfig {
            learning_rate: self.learning_rate,
            ..AdamConfig::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Maximum request body in bytes
    pub max_body_bytes: usize,

    /// Maximum in-flight requests
    pub max_concurrency: usize,

    /// Allowed CORS origins; empty allows any
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            request_timeout_secs: 30,
            max_body_bytes: 1024 * 1024, // 1MB
            max_concurrency: 256,
            cors_origins: vec![],
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub enabled: bool,

    /// Seconds between simulated blocks
    pub interval_secs: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 8,
        }
    }
}

impl SimulatorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    pub enabled: bool,
    pub log_dir: PathBuf,
    pub file_name: String,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_dir: PathBuf::from("data"),
            file_name: "block_validations.jsonl".to_string(),
        }
    }
}

impl JournalConfig {
    pub fn path(&self) -> PathBuf {
        self.log_dir.join(&self.file_name)
    }
}

impl ValidatorConfig {
    /// Load from a `.toml` or `.json` file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = match extension(path) {
            Some("json") => serde_json::from_str(&content)?,
            _ => toml::from_str(&content)
                .map_err(|e| ValidatorError::Configuration(format!("{}: {}", path.display(), e)))?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Save as TOML or JSON depending on the extension
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = match extension(path) {
            Some("json") => serde_json::to_string_pretty(self)?,
            _ => toml::to_string_pretty(self)
                .map_err(|e| ValidatorError::Serialization(e.to_string()))?,
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Defaults overlaid with `VALIDATOR_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("VALIDATOR_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("VALIDATOR_PORT") {
            self.server.port = parse_env("VALIDATOR_PORT", &port)?;
        }
        if let Some(path) = lookup("VALIDATOR_MODEL_PATH") {
            self.model.model_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup("VALIDATOR_LOG_DIR") {
            self.journal.log_dir = PathBuf::from(dir);
        }
        if let Some(flag) = lookup("VALIDATOR_SIMULATOR") {
            self.simulator.enabled = parse_flag("VALIDATOR_SIMULATOR", &flag)?;
        }
        if let Some(secs) = lookup("VALIDATOR_SIMULATOR_INTERVAL_SECS") {
            self.simulator.interval_secs = parse_env("VALIDATOR_SIMULATOR_INTERVAL_SECS", &secs)?;
        }
        self.validate()
    }

    /// Validate configuration validity
    pub fn validate(&self) -> Result<()> {
        self.model
            .thresholds()
            .validate()?;

        if self.features.history_window == 0 {
            return Err(ValidatorError::Configuration(
                "History window must be greater than 0".to_string(),
            ));
        }
        if self.features.target_block_time_secs <= 0.0 {
            return Err(ValidatorError::Configuration(
                "Target block time must be greater than 0".to_string(),
            ));
        }
        if self.model.hidden_layers.iter().any(|l| l.units == 0) {
            return Err(ValidatorError::Configuration(
                "Hidden layers must have at least one unit".to_string(),
            ));
        }
        if self
            .model
            .hidden_layers
            .iter()
            .any(|l| !(0.0..1.0).contains(&l.dropout))
        {
            return Err(ValidatorError::Configuration(
                "Dropout must be in [0, 1)".to_string(),
            ));
        }
        if self.training.batch_size == 0 {
            return Err(ValidatorError::Configuration(
                "Batch size must be greater than 0".to_string(),
            ));
        }
        if self.training.test_size <= 0.0 || self.training.test_size >= 1.0 {
            return Err(ValidatorError::Configuration(
                "Test size must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.training.learning_rate <= 0.0 {
            return Err(ValidatorError::Configuration(
                "Learning rate must be greater than 0".to_string(),
            ));
        }
        if self.training.cv_folds < 2 {
            return Err(ValidatorError::Configuration(
                "Cross-validation needs at least 2 folds".to_string(),
            ));
        }
        if self.server.max_concurrency == 0 {
            return Err(ValidatorError::Configuration(
                "Maximum concurrency must be greater than 0".to_string(),
            ));
        }
        if self.simulator.enabled && self.simulator.interval_secs == 0 {
            return Err(ValidatorError::Configuration(
                "Simulator interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ValidatorError::Configuration(format!("{} has invalid value '{}'", key, value)))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ValidatorError::Configuration(format!(
            "{} has invalid value '{}'",
            key, value
        ))),
    }
}
