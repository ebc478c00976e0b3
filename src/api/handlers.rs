//! Request handlers

use crate::api::AppState;
use crate::catalog::{self, Ack, HealthInfo, HistoryRecord, ModelMetrics, ServiceDescriptor};
use crate::error::{ApiError, ApiResult};
use crate::metrics::Endpoint;
use crate::types::prediction::{
    EnsembleResponse, ExplainResponse, FeatureImportance, PredictResponse,
};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

type Shared = State<Arc<AppState>>;

/// Empty 200 for plain `OPTIONS` requests.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

pub async fn home() -> Json<ServiceDescriptor> {
    Json(catalog::service_descriptor())
}

#[derive(Serialize)]
pub struct HealthStatus {
    status: &'static str,
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus { status: "OK" })
}

/// Log, count and redact a failed prediction request.
fn failed(state: &AppState, endpoint: Endpoint, err: ApiError) -> ApiError {
    state.metrics.record_failure(endpoint, err.is_client_error());
    match &err {
        ApiError::ServiceUnavailable(detail) => {
            warn!(endpoint = endpoint.as_str(), detail = %detail, "Prediction refused, models unavailable")
        }
        e if e.is_client_error() => {
            debug!(endpoint = endpoint.as_str(), error = %e, "Rejected request")
        }
        e => warn!(endpoint = endpoint.as_str(), error = %e, "Prediction failed"),
    }
    err.redact(state.config.server.expose_error_details)
}

pub async fn predict(State(state): Shared, body: Bytes) -> ApiResult<Json<PredictResponse>> {
    let start = Instant::now();
    let run = || -> ApiResult<PredictResponse> {
        let extracted = state.extractor.extract_bytes(&body)?;
        let result = state.engine.predict(&extracted.features)?;
        Ok(PredictResponse::new(result, extracted.inputs))
    };

    let response = run().map_err(|e| failed(&state, Endpoint::Predict, e))?;
    state.metrics.record_prediction(
        Endpoint::Predict,
        start.elapsed(),
        response.probability,
        response.risk_level.label(),
    );
    info!(
        prediction = response.prediction,
        probability = response.probability,
        risk_level = %response.risk_level,
        "Prediction served"
    );
    Ok(Json(response))
}

pub async fn predict_ensemble(
    State(state): Shared,
    body: Bytes,
) -> ApiResult<Json<EnsembleResponse>> {
    let start = Instant::now();
    let run = || -> ApiResult<EnsembleResponse> {
        let extracted = state.extractor.extract_bytes(&body)?;
        let mut rng = rand::thread_rng();
        state.engine.predict_ensemble(&extracted.features, &mut rng)
    };

    let response = run().map_err(|e| failed(&state, Endpoint::Ensemble, e))?;
    state.metrics.record_prediction(
        Endpoint::Ensemble,
        start.elapsed(),
        response.probability,
        response.risk_level.label(),
    );
    state
        .metrics
        .record_ensemble(response.rf_prediction, response.nn_prediction, response.demo_mode);
    info!(
        prediction = response.prediction,
        probability = response.probability,
        risk_level = %response.risk_level,
        demo_mode = response.demo_mode,
        "Ensemble prediction served"
    );
    Ok(Json(response))
}

pub async fn explain(State(state): Shared, body: Bytes) -> ApiResult<Json<ExplainResponse>> {
    let start = Instant::now();
    let run = || -> ApiResult<ExplainResponse> {
        let extracted = state.extractor.extract_bytes(&body)?;
        state.engine.explain(&extracted.features, &extracted.inputs)
    };

    let response = run().map_err(|e| failed(&state, Endpoint::Explain, e))?;
    state.metrics.record_prediction(
        Endpoint::Explain,
        start.elapsed(),
        response.probability,
        response.risk_level.label(),
    );
    Ok(Json(response))
}

pub async fn feature_importance(State(state): Shared) -> Json<Vec<FeatureImportance>> {
    Json(state.engine.feature_importance())
}

pub async fn model_comparison() -> Json<[ModelMetrics; 4]> {
    Json(catalog::MODEL_COMPARISON)
}

pub async fn health_info() -> Json<HealthInfo> {
    Json(catalog::HEALTH_INFO)
}

pub async fn get_history() -> Json<Vec<HistoryRecord>> {
    Json(catalog::sample_history())
}

/// Accepts any JSON object; nothing is stored.
pub async fn save_history(body: Bytes) -> ApiResult<Json<Ack>> {
    let value: Value =
        serde_json::from_slice(&body).map_err(|e| ApiError::InvalidBody(e.to_string()))?;
    if !value.is_object() {
        return Err(ApiError::InvalidBody("expected a JSON object".to_string()));
    }
    Ok(Json(Ack::ok("History saved successfully")))
}

pub async fn clear_history() -> Json<Ack> {
    Json(Ack::ok("History entry deleted successfully"))
}

pub async fn delete_history_entry(Path(id): Path<String>) -> Json<Ack> {
    Json(Ack::ok(format!("History entry {} deleted successfully", id)))
}
