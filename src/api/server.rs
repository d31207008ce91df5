use axum::{
    error_handling::HandleErrorLayer,
    http::{header, HeaderValue, Method, StatusCode},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};
use tower::{limit::ConcurrencyLimitLayer, timeout::TimeoutLayer, BoxError, ServiceBuilder};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::api::handlers;
use crate::api::server_config::CORS_MAX_AGE;
use crate::monitoring::ValidatorMetrics;
use crate::service::{SharedValidationService, ValidationJournal, ValidationService};
use crate::validator::config::{ServerConfig, TrainingConfig, ValidatorConfig};
use crate::validator::ModelArchitecture;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub service: SharedValidationService,
    pub journal: Arc<ValidationJournal>,
    pub metrics: Arc<ValidatorMetrics>,
    pub training: TrainingConfig,
    pub architecture: ModelArchitecture,
}

impl AppState {
    /// Load the model, open the journal and register metrics
    pub fn from_config(config: &ValidatorConfig) -> anyhow::Result<Self> {
        let metrics = Arc::new(ValidatorMetrics::new()?);
        let service = ValidationService::from_config(config).with_metrics(metrics.clone());
        Ok(Self::new(service, ValidationJournal::from_config(&config.journal), metrics, config))
    }

    pub fn new(
        service: ValidationService,
        journal: ValidationJournal,
        metrics: Arc<ValidatorMetrics>,
        config: &ValidatorConfig,
    ) -> Self {
        Self {
            service: Arc::new(Mutex::new(service)),
            journal: Arc::new(journal),
            metrics,
            training: config.training.clone(),
            architecture: config.model.architecture(),
        }
    }
}

#[derive(Clone)]
pub struct ValidatorServer {
    pub state: AppState,
    pub config: ServerConfig,
}

impl ValidatorServer {
    pub fn new(state: AppState, config: ServerConfig) -> Self {
        Self { state, config }
    }

    pub fn create_router(&self) -> Router {
        Router::new()
            .route("/health", get(handlers::health_check))
            .route("/validate/block", post(handlers::validate_block))
            .route("/model/info", get(handlers::model_info))
            .route("/train/generate", post(handlers::generate_training_data))
            .route("/stats", get(handlers::stats))
            .route("/metrics", get(handlers::metrics))
            .with_state(self.state.clone())
            .layer(
                ServiceBuilder::new()
                    // Convert middleware errors (timeout/overload) into HTTP responses
                    .layer(HandleErrorLayer::new(|err: BoxError| async move {
                        if err.is::<tower::timeout::error::Elapsed>() {
                            (StatusCode::REQUEST_TIMEOUT, "request timed out")
                        } else {
                            (StatusCode::SERVICE_UNAVAILABLE, "service overloaded")
                        }
                    }))
                    .layer(ConcurrencyLimitLayer::new(self.config.max_concurrency))
                    .layer(RequestBodyLimitLayer::new(self.config.max_body_bytes))
                    .layer(TimeoutLayer::new(self.config.request_timeout()))
                    .layer(TraceLayer::new_for_http()),
            )
            .layer(cors_layer(&self.config.cors_origins))
    }

    /// Serve until `shutdown` flips to true or its sender is dropped
    pub async fn start(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let app = self.create_router();
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr).await?;
        info!("Server listening on {}", addr);

        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async move {
                // a dropped sender also ends the wait
                let _ = shutdown.wait_for(|stop| *stop).await;
                info!("Shutting down HTTP server");
            })
            .await?;
        Ok(())
    }
}

/// Any origin when `origins` is empty, otherwise the listed ones
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN])
        .max_age(CORS_MAX_AGE);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let list: Vec<HeaderValue> = origins
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| match HeaderValue::from_str(s) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", s);
                None
            }
        })
        .collect();
    info!("CORS configured to allow origins: {:?}", list);
    layer.allow_origin(AllowOrigin::list(list))
}
