//! Heart Disease Risk API - Main Entry Point
//!
//! Loads the model artifacts and serves the prediction endpoints over HTTP.

use anyhow::{Context, Result};
use heart_risk_api::{
    api::{router, AppState},
    config::{AppConfig, LoggingConfig},
    metrics::{MetricsReporter, ServiceMetrics},
    models::inference::InferenceEngine,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("heart_risk_api={},tower_http=info", logging.level)))
        .context("Invalid log filter")?;

    if logging.format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config.logging)?;

    info!("Starting Heart Disease Risk API");
    info!(
        models_dir = %config.models.models_dir,
        missing_fields = ?config.validation.missing_fields,
        weights = ?(config.ensemble.primary_weight, config.ensemble.secondary_weight),
        "Configuration loaded"
    );

    let engine = InferenceEngine::new(&config)?;
    if let Some(reason) = engine.load_error() {
        warn!(reason = %reason, "Serving in degraded mode; prediction endpoints will return 500");
    } else {
        info!(models = ?engine.model_names(), "Models ready");
    }

    let metrics = Arc::new(ServiceMetrics::new());
    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(engine, config, metrics));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
