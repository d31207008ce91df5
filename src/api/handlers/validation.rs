//! Block validation and model inspection handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::Value;

use crate::api::server::AppState;
use crate::service::{ModelInfo, ValidationReport};
use crate::validator::{BlockData, ValidatorError};

/// POST /validate/block
pub async fn validate_block(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ValidationReport>, ValidatorError> {
    let Json(value) = payload.map_err(|rejection| {
        ValidatorError::InvalidInput(format!("No valid JSON data provided: {}", rejection.body_text()))
    })?;
    if !value.is_object() {
        return Err(ValidatorError::InvalidInput(
            "Block must be a JSON object".to_string(),
        ));
    }
    let block: BlockData = serde_json::from_value(value)
        .map_err(|e| ValidatorError::InvalidInput(format!("Malformed block: {}", e)))?;

    let report = state.service.lock().await.validate_block(block.clone())?;
    if !state.journal.log_validation(&block, &report) {
        state.metrics.record_journal_error();
    }

    Ok(Json(report))
}

/// GET /model/info
pub async fn model_info(State(state): State<AppState>) -> Result<Json<ModelInfo>, ValidatorError> {
    let info = state.service.lock().await.model_info()?;
    Ok(Json(info))
}
