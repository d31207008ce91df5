//! Request and response bodies shared by the HTTP handlers

use serde::{Deserialize, Serialize};

use crate::service::ServiceStats;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    /// Unix seconds
    pub timestamp: f64,
    pub statistics: ServiceStats,
}

/// Body of `POST /train/generate`; an empty body uses the default size
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct GenerateRequest {
    #[serde(default)]
    pub samples: Option<usize>,
}
