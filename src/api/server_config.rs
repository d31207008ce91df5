//! Server constants

use std::time::Duration;

/// Service name reported by `/health`
pub const SERVICE_NAME: &str = "block-ai-validator";

/// CORS preflight cache time
pub const CORS_MAX_AGE: Duration = Duration::from_secs(3600);

/// Samples generated by `/train/generate` when the body names none
pub const DEFAULT_GENERATE_SAMPLES: usize = 1000;

/// Upper bound for `/train/generate`
pub const MAX_GENERATE_SAMPLES: usize = 100_000;
