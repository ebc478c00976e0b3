//! Type definitions for the heart risk service

pub mod patient;
pub mod prediction;

pub use patient::{PatientFeatures, FEATURE_COUNT, FEATURE_NAMES};
pub use prediction::{EnsembleRiskLevel, ModelPrediction, RiskLevel};
