//! Heart Disease Risk API Library
//!
//! HTTP inference service that scores patient records with a random forest
//! and a neural network, blends them into an ensemble, and explains the
//! result in terms of individual clinical features.

pub mod api;
pub mod catalog;
pub mod config;
pub mod dataset;
pub mod error;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod types;

pub use api::{router, AppState};
pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use feature_extractor::FeatureExtractor;
pub use models::inference::InferenceEngine;
pub use types::{patient::PatientFeatures, prediction::PredictResponse};
