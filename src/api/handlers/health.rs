//! Health, statistics and metrics handlers

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::api::server::AppState;
use crate::api::server_config::SERVICE_NAME;
use crate::api::types::HealthResponse;
use crate::service::ServiceStats;

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let statistics = state.service.lock().await.stats();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
        statistics,
    })
}

/// GET /stats
pub async fn stats(State(state): State<AppState>) -> Json<ServiceStats> {
    Json(state.service.lock().await.stats())
}

/// GET /metrics (Prometheus text format)
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.export_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => {
            tracing::error!("Metrics export failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain; version=0.0.4")],
                String::new(),
            )
        }
    }
}
