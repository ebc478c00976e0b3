//! HTTP surface of the service

pub mod handlers;

use crate::config::{AppConfig, ServerConfig};
use crate::feature_extractor::FeatureExtractor;
use crate::metrics::ServiceMetrics;
use crate::models::InferenceEngine;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Shared state handed to every handler
pub struct AppState {
    pub engine: InferenceEngine,
    pub extractor: FeatureExtractor,
    pub config: AppConfig,
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    pub fn new(engine: InferenceEngine, config: AppConfig, metrics: Arc<ServiceMetrics>) -> Self {
        Self {
            engine,
            extractor: FeatureExtractor::new(config.validation.missing_fields),
            config,
            metrics,
        }
    }
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins = if server.cors_origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = server
            .cors_origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    use handlers::*;

    let cors = cors_layer(&state.config.server);

    Router::new()
        .route("/", get(home).options(preflight))
        .route("/health", get(health).options(preflight))
        .route("/predict", post(predict).options(preflight))
        .route("/predict/ensemble", post(predict_ensemble).options(preflight))
        .route("/predict/explain", post(explain).options(preflight))
        .route(
            "/history",
            get(get_history)
                .post(save_history)
                .delete(clear_history)
                .options(preflight),
        )
        .route("/history/:id", delete(delete_history_entry).options(preflight))
        .route(
            "/models/feature-importance",
            get(feature_importance).options(preflight),
        )
        .route("/models/comparison", get(model_comparison).options(preflight))
        .route("/health-info", get(health_info).options(preflight))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
