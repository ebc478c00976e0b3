//! Prediction result data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Three-tier risk classification used by single-model endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "Low Risk")]
    Low,
    #[serde(rename = "Moderate Risk")]
    Moderate,
    #[serde(rename = "High Risk")]
    High,
}

impl RiskLevel {
    /// Classify a probability: `> 0.7` high, `> 0.3` moderate, otherwise low.
    pub fn from_probability(probability: f64) -> Self {
        if probability > 0.7 {
            RiskLevel::High
        } else if probability > 0.3 {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low Risk",
            RiskLevel::Moderate => "Moderate Risk",
            RiskLevel::High => "High Risk",
        }
    }

    /// Article + adjective used in explanation sentences.
    pub fn explanation_phrase(&self) -> &'static str {
        match self {
            RiskLevel::Low => "a low",
            RiskLevel::Moderate => "a medium",
            RiskLevel::High => "a high",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Four-tier risk classification used by the ensemble endpoint.
///
/// Deliberately distinct from [`RiskLevel`]: the thresholds differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnsembleRiskLevel {
    #[serde(rename = "Low Risk")]
    Low,
    #[serde(rename = "Moderate Risk")]
    Moderate,
    #[serde(rename = "High Risk")]
    High,
    #[serde(rename = "Very High Risk")]
    VeryHigh,
}

impl EnsembleRiskLevel {
    /// Classify a blended probability: `< 0.2`, `< 0.4`, `< 0.7`, else very high.
    pub fn from_probability(probability: f64) -> Self {
        if probability < 0.2 {
            EnsembleRiskLevel::Low
        } else if probability < 0.4 {
            EnsembleRiskLevel::Moderate
        } else if probability < 0.7 {
            EnsembleRiskLevel::High
        } else {
            EnsembleRiskLevel::VeryHigh
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EnsembleRiskLevel::Low => "Low Risk",
            EnsembleRiskLevel::Moderate => "Moderate Risk",
            EnsembleRiskLevel::High => "High Risk",
            EnsembleRiskLevel::VeryHigh => "Very High Risk",
        }
    }
}

impl std::fmt::Display for EnsembleRiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Output of one model for one patient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPrediction {
    /// Class decided by the model (0 = no disease, 1 = disease)
    pub prediction: u8,
    /// Probability of class 1
    pub probability: f64,
}

impl ModelPrediction {
    pub fn risk_level(&self) -> RiskLevel {
        RiskLevel::from_probability(self.probability)
    }
}

/// Response of `POST /predict`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: u8,
    pub probability: f64,
    pub risk_level: RiskLevel,
    pub timestamp: DateTime<Utc>,
    /// Assembled input values keyed by feature name
    pub inputs: Map<String, Value>,
}

impl PredictResponse {
    pub fn new(result: ModelPrediction, inputs: Map<String, Value>) -> Self {
        Self {
            prediction: result.prediction,
            probability: result.probability,
            risk_level: result.risk_level(),
            timestamp: Utc::now(),
            inputs,
        }
    }
}

/// Per-model entry of an ensemble response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPredictionEntry {
    pub model_name: String,
    pub prediction: u8,
    pub probability: f64,
    /// Fixed display confidence, not computed from the model
    pub confidence: f64,
    /// True when the value was synthesized rather than produced by a model
    pub simulated: bool,
}

/// Response of `POST /predict/ensemble`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleResponse {
    pub prediction: u8,
    pub probability: f64,
    pub risk_level: EnsembleRiskLevel,
    pub message: String,
    pub rf_prediction: u8,
    pub rf_probability: f64,
    pub nn_prediction: u8,
    pub nn_probability: f64,
    pub model_predictions: Vec<ModelPredictionEntry>,
    /// True when the secondary model output was synthesized
    pub demo_mode: bool,
    pub timestamp: DateTime<Utc>,
}

/// One row of the explanation ranking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureContribution {
    pub feature: String,
    pub value: Value,
    pub importance: f64,
    pub contribution: f64,
    pub description: String,
}

/// Response of `POST /predict/explain`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainResponse {
    pub prediction: u8,
    pub probability: f64,
    pub risk_level: RiskLevel,
    pub explanation: String,
    pub feature_contributions: Vec<FeatureContribution>,
}

/// One row of `GET /models/feature-importance`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
    pub description: String,
}
