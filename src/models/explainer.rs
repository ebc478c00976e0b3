//! Per-feature contribution ranking for `/predict/explain`.

use crate::types::patient::{feature_description, FEATURE_COUNT, FEATURE_NAMES};
use crate::types::prediction::{FeatureContribution, RiskLevel};
use serde_json::{Map, Value};

/// Number of factors named in the explanation sentence.
pub const TOP_FACTORS: usize = 3;

/// Contribution is the raw (unscaled) value times the feature importance.
/// Rows are ordered by absolute contribution, largest first.
pub fn contributions(
    values: &[f64; FEATURE_COUNT],
    importances: &[f64; FEATURE_COUNT],
    inputs: &Map<String, Value>,
) -> Vec<FeatureContribution> {
    let mut rows: Vec<FeatureContribution> = FEATURE_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| FeatureContribution {
            feature: name.to_string(),
            value: inputs
                .get(*name)
                .cloned()
                .unwrap_or_else(|| Value::from(values[i])),
            importance: importances[i],
            contribution: values[i] * importances[i],
            description: feature_description(name).to_string(),
        })
        .collect();

    rows.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));
    rows
}

pub fn explanation_text(risk: RiskLevel, ranked: &[FeatureContribution]) -> String {
    let factors = ranked
        .iter()
        .take(TOP_FACTORS)
        .map(|c| format!("{} ({})", c.feature, c.description))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "The model predicts {} risk of heart disease. The most important factors in this prediction are: {}",
        risk.explanation_phrase(),
        factors
    )
}
