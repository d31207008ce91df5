//! Validator error types
//!
//! One error enum for feature extraction, model, training and persistence failures.

use thiserror::Error;

/// Errors raised by the block validator
#[derive(Debug, Error)]
pub enum ValidatorError {
    /// Input block or request could not be interpreted
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Feature extraction failed
    #[error("Feature extraction failed: {0}")]
    FeatureExtraction(String),

    /// Feature width does not match the model
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Inference failed or no model is available
    #[error("Model inference failed: {0}")]
    ModelInference(String),

    /// No model has been loaded
    #[error("Model not loaded")]
    ModelNotLoaded,

    /// Training failed
    #[error("Training failed: {0}")]
    Training(String),

    /// Training data could not be loaded
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Lock poisoned (a thread panicked while holding it)
    #[error("Lock poisoned")]
    LockPoisoned,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Validator result type
pub type Result<T> = std::result::Result<T, ValidatorError>;

impl From<serde_json::Error> for ValidatorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl ValidatorError {
    /// Whether the caller can retry or continue with a fallback
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::DimensionMismatch { .. }
                | Self::ModelNotLoaded
                | Self::Dataset(_)
        )
    }

    /// Whether the error indicates a broken process state
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::LockPoisoned | Self::Io(_))
    }

    /// Stable machine-readable code used in HTTP error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::FeatureExtraction(_) => "FEATURE_EXTRACTION_FAILED",
            Self::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Self::ModelInference(_) => "MODEL_INFERENCE_FAILED",
            Self::ModelNotLoaded => "MODEL_NOT_LOADED",
            Self::Training(_) => "TRAINING_FAILED",
            Self::Dataset(_) => "DATASET_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::LockPoisoned => "LOCK_POISONED",
            Self::Io(_) => "IO_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ValidatorError::DimensionMismatch { expected: 15, actual: 3 };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 15, got 3");
        assert_eq!(ValidatorError::ModelNotLoaded.to_string(), "Model not loaded");
    }

    #[test]
    fn test_error_is_recoverable() {
        assert!(ValidatorError::InvalidInput("bad".to_string()).is_recoverable());
        assert!(ValidatorError::ModelNotLoaded.is_recoverable());

        let critical = ValidatorError::LockPoisoned;
        assert!(!critical.is_recoverable());
        assert!(critical.is_critical());
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: ValidatorError = parse.unwrap_err().into();
        assert_eq!(err.code(), "SERIALIZATION_ERROR");
    }
}
