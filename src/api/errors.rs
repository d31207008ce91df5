//! HTTP mapping for validator errors

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use crate::api::types::ErrorResponse;
use crate::validator::ValidatorError;

impl ValidatorError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_)
            | Self::DimensionMismatch { .. }
            | Self::ModelNotLoaded
            | Self::Dataset(_) => StatusCode::BAD_REQUEST,
            Self::FeatureExtraction(_)
            | Self::ModelInference(_)
            | Self::Training(_)
            | Self::Configuration(_)
            | Self::Serialization(_)
            | Self::LockPoisoned
            | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Renders `{ "error": ..., "code": ... }`
impl IntoResponse for ValidatorError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(ValidatorError::ModelNotLoaded.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ValidatorError::InvalidInput("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ValidatorError::Training("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_into_response_status() {
        let response = ValidatorError::ModelNotLoaded.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
