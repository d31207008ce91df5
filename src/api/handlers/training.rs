//! Training data handlers

use axum::{body::Bytes, extract::State, Json};
use tracing::info;

use crate::api::server::AppState;
use crate::api::server_config::{DEFAULT_GENERATE_SAMPLES, MAX_GENERATE_SAMPLES};
use crate::api::types::GenerateRequest;
use crate::validator::{DatasetSummary, ModelTrainer, ValidatorError};

/// POST /train/generate
///
/// Generates a synthetic dataset and reports its shape and class balance.
/// The body is optional; `{"samples": n}` overrides the default size.
pub async fn generate_training_data(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<DatasetSummary>, ValidatorError> {
    let request: GenerateRequest = if body.iter().all(u8::is_ascii_whitespace) {
        GenerateRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ValidatorError::InvalidInput(format!("Malformed request: {}", e)))?
    };

    let samples = request.samples.unwrap_or(DEFAULT_GENERATE_SAMPLES);
    if samples == 0 || samples > MAX_GENERATE_SAMPLES {
        return Err(ValidatorError::InvalidInput(format!(
            "samples must be between 1 and {}",
            MAX_GENERATE_SAMPLES
        )));
    }

    let training = state.training.clone();
    let architecture = state.architecture.clone();
    let summary = tokio::task::spawn_blocking(move || {
        let trainer = ModelTrainer::new(training, architecture);
        let (x, y) = trainer.generate_synthetic_data(samples)?;
        Ok::<_, ValidatorError>(DatasetSummary::from_arrays(x.view(), y.view()))
    })
    .await
    .map_err(|e| ValidatorError::Training(format!("generation task failed: {}", e)))??;

    info!(
        "Generated {} training samples ({} positive)",
        summary.samples_generated, summary.positive_samples
    );
    Ok(Json(summary))
}
