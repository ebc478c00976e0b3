//! Model kind resolution and feature importance ranking.

use crate::types::patient::{feature_description, FEATURE_COUNT, FEATURE_NAMES};
use crate::types::prediction::FeatureImportance;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Importances used when the loaded model exposes none.
pub const FALLBACK_IMPORTANCES: [f64; FEATURE_COUNT] = [
    0.08, 0.12, 0.15, 0.05, 0.07, 0.03, 0.04, 0.10, 0.09, 0.08, 0.06, 0.07, 0.06,
];

/// What the loaded model can tell us about its features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelKind {
    /// Tree ensemble with fitted impurity importances
    TreeEnsemble { feature_importances: Vec<f64> },
    /// Linear model; importance is the coefficient magnitude
    Linear { coefficients: Vec<f64> },
    #[default]
    Unknown,
}

impl ModelKind {
    /// Per-feature importance in canonical order.
    pub fn importances(&self) -> [f64; FEATURE_COUNT] {
        let from = |values: &[f64], map: fn(f64) -> f64| {
            let mut out = [0.0; FEATURE_COUNT];
            for (o, v) in out.iter_mut().zip(values) {
                *o = map(*v);
            }
            out
        };

        match self {
            ModelKind::TreeEnsemble {
                feature_importances,
            } if feature_importances.len() == FEATURE_COUNT => from(feature_importances, |v| v),
            ModelKind::Linear { coefficients } if coefficients.len() == FEATURE_COUNT => {
                from(coefficients, f64::abs)
            }
            _ => FALLBACK_IMPORTANCES,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::TreeEnsemble { .. } => "tree_ensemble",
            ModelKind::Linear { .. } => "linear",
            ModelKind::Unknown => "unknown",
        }
    }

    fn validate(&self) -> Result<()> {
        let len = match self {
            ModelKind::TreeEnsemble {
                feature_importances,
            } => feature_importances.len(),
            ModelKind::Linear { coefficients } => coefficients.len(),
            ModelKind::Unknown => return Ok(()),
        };
        if len != FEATURE_COUNT {
            anyhow::bail!(
                "{} card lists {} values, expected {}",
                self.name(),
                len,
                FEATURE_COUNT
            );
        }
        if let ModelKind::TreeEnsemble {
            feature_importances,
        } = self
        {
            if let Some(i) = feature_importances
                .iter()
                .position(|v| !v.is_finite() || *v < 0.0)
            {
                anyhow::bail!(
                    "Importance for {} must be a non-negative number, got {}",
                    FEATURE_NAMES[i],
                    feature_importances[i]
                );
            }
        }
        Ok(())
    }
}

/// Sidecar describing a model artifact (`<stem>.card.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCard {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub kind: ModelKind,
}

impl ModelCard {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model card {:?}", path))?;
        let card: ModelCard = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse model card {:?}", path))?;
        card.kind.validate()?;
        Ok(card)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.kind.validate()?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write model card to {:?}", path))
    }
}

/// Pair importances with feature descriptions, most important first.
///
/// The sort is stable, so ties keep canonical order.
pub fn rank_importances(importances: &[f64; FEATURE_COUNT]) -> Vec<FeatureImportance> {
    let mut ranked: Vec<FeatureImportance> = FEATURE_NAMES
        .iter()
        .zip(importances)
        .map(|(name, &importance)| FeatureImportance {
            feature: name.to_string(),
            importance,
            description: feature_description(name).to_string(),
        })
        .collect();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_for_unknown() {
        assert_eq!(ModelKind::Unknown.importances(), FALLBACK_IMPORTANCES);
    }

    #[test]
    fn test_linear_uses_magnitude() {
        let mut coefficients = vec![0.0; FEATURE_COUNT];
        coefficients[2] = -1.5;
        coefficients[7] = 0.5;
        let importances = ModelKind::Linear { coefficients }.importances();
        assert_eq!(importances[2], 1.5);
        assert_eq!(importances[7], 0.5);
    }

    #[test]
    fn test_wrong_length_falls_back() {
        let kind = ModelKind::TreeEnsemble {
            feature_importances: vec![1.0; 3],
        };
        assert_eq!(kind.importances(), FALLBACK_IMPORTANCES);
        assert!(kind.validate().is_err());
    }

    #[test]
    fn test_negative_importance_rejected() {
        let mut feature_importances = FALLBACK_IMPORTANCES.to_vec();
        feature_importances[4] = -0.2;
        let kind = ModelKind::TreeEnsemble {
            feature_importances,
        };
        let err = kind.validate().unwrap_err();
        assert!(err.to_string().contains("chol"));

        let card = ModelCard {
            name: "Random Forest".to_string(),
            kind,
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("random_forest.card.json");
        assert!(card.save(&path).is_err());

        std::fs::write(&path, serde_json::to_string(&card).unwrap()).unwrap();
        assert!(ModelCard::load(&path).is_err());

        // signed coefficients are fine; importance is their magnitude
        let linear = ModelKind::Linear {
            coefficients: vec![-0.2; FEATURE_COUNT],
        };
        assert!(linear.validate().is_ok());
    }

    #[test]
    fn test_rank_is_sorted_and_stable() {
        let ranked = rank_importances(&FALLBACK_IMPORTANCES);
        assert_eq!(ranked.len(), FEATURE_COUNT);
        assert_eq!(ranked[0].feature, "cp");
        assert_eq!(ranked[1].feature, "sex");
        assert!(ranked
            .windows(2)
            .all(|w| w[0].importance >= w[1].importance));

        // age and exang tie at 0.08; age comes first in canonical order
        let age = ranked.iter().position(|f| f.feature == "age").unwrap();
        let exang = ranked.iter().position(|f| f.feature == "exang").unwrap();
        assert!(age < exang);
        assert!(!ranked[0].description.is_empty());
    }

    #[test]
    fn test_card_round_trip_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("random_forest.card.json");
        let card = ModelCard {
            name: "Random Forest".to_string(),
            kind: ModelKind::TreeEnsemble {
                feature_importances: FALLBACK_IMPORTANCES.to_vec(),
            },
        };
        card.save(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["kind"], "tree_ensemble");
        assert_eq!(ModelCard::load(&path).unwrap(), card);
    }
}
