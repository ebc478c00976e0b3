//! Model and scaler artifact loader

use crate::config::ModelFiles;
use crate::models::importance::{ModelCard, ModelKind};
use crate::models::scaler::StandardScaler;
use crate::types::patient::FEATURE_COUNT;
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};

/// Logistic model exported as JSON: `sigmoid(w·x + b)` over scaled features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LogisticModel {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model from {:?}", path))?;
        let model: LogisticModel = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse model {:?}", path))?;

        if model.coefficients.len() != FEATURE_COUNT {
            anyhow::bail!(
                "Model {:?} has {} coefficients, expected {}",
                path,
                model.coefficients.len(),
                FEATURE_COUNT
            );
        }
        if !model.intercept.is_finite() || model.coefficients.iter().any(|c| !c.is_finite()) {
            anyhow::bail!("Model {:?} has non-finite parameters", path);
        }
        Ok(model)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write model to {:?}", path))
    }

    /// Probability of class 1.
    pub fn predict_proba(&self, scaled: &[f64]) -> f64 {
        let z: f64 = self
            .coefficients
            .iter()
            .zip(scaled)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept;
        1.0 / (1.0 + (-z).exp())
    }
}

/// ONNX session with resolved tensor names.
pub struct OnnxModel {
    /// `Session::run` needs exclusive access
    pub session: Mutex<Session>,
    pub input_name: String,
    /// Output carrying class probabilities
    pub output_name: String,
    /// Output carrying the predicted class, if the export has one
    pub label_name: Option<String>,
}

pub enum ModelBackend {
    Onnx(OnnxModel),
    Logistic(LogisticModel),
}

impl ModelBackend {
    pub fn name(&self) -> &'static str {
        match self {
            ModelBackend::Onnx(_) => "onnx",
            ModelBackend::Logistic(_) => "logistic_json",
        }
    }
}

/// A model together with the scaler it was fitted behind.
pub struct LoadedModel {
    /// Display name
    pub name: String,
    pub backend: ModelBackend,
    pub scaler: StandardScaler,
    pub kind: ModelKind,
}

/// Loader for model/scaler pairs
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
    ort_ready: Cell<bool>,
}

impl ModelLoader {
    /// Create a loader; ONNX Runtime is initialised on the first ONNX artifact.
    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
            ort_ready: Cell::new(false),
        }
    }

    fn ensure_ort(&self) -> Result<()> {
        if !self.ort_ready.get() {
            ort::init().commit()?;
            info!(onnx_threads = self.onnx_threads, "ONNX Runtime initialized");
            self.ort_ready.set(true);
        }
        Ok(())
    }

    /// Load a single ONNX model from file
    pub fn load_onnx<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<OnnxModel> {
        let path = path.as_ref();
        self.ensure_ort()?;

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let label_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("label"))
            .map(|o| o.name.clone());

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .or_else(|| session.outputs.iter().rev().find(|o| !o.name.contains("label")))
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "probabilities".to_string());

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            label = ?label_name,
            "Model loaded successfully"
        );

        Ok(OnnxModel {
            session: Mutex::new(session),
            input_name,
            output_name,
            label_name,
        })
    }

    /// Load a model, its scaler and its card from `models_dir`.
    ///
    /// `<stem>.onnx` is preferred; `<stem>.json` is read as a logistic model.
    pub fn load_pair<P: AsRef<Path>>(&self, models_dir: P, files: &ModelFiles) -> Result<LoadedModel> {
        let models_dir = models_dir.as_ref();

        let scaler = StandardScaler::load(models_dir.join(&files.scaler_file))
            .with_context(|| format!("Failed to load scaler for {}", files.name))?;

        let onnx_path = models_dir.join(format!("{}.onnx", files.model_stem));
        let json_path = models_dir.join(format!("{}.json", files.model_stem));

        let backend = if onnx_path.exists() {
            ModelBackend::Onnx(self.load_onnx(&onnx_path, &files.name)?)
        } else if json_path.exists() {
            info!(model = %files.name, path = %json_path.display(), "Loading logistic model");
            ModelBackend::Logistic(LogisticModel::load(&json_path)?)
        } else {
            anyhow::bail!(
                "No model artifact for {} in {} (tried {}.onnx, {}.json)",
                files.name,
                models_dir.display(),
                files.model_stem,
                files.model_stem
            );
        };

        let card_path = models_dir.join(files.card_file_name());
        let kind = if card_path.exists() {
            let card = ModelCard::load(&card_path)?;
            if !card.name.is_empty() && card.name != files.name {
                warn!(model = %files.name, card = %card.name, "Model card name differs from configured name");
            }
            card.kind
        } else {
            match &backend {
                ModelBackend::Logistic(m) => ModelKind::Linear {
                    coefficients: m.coefficients.clone(),
                },
                ModelBackend::Onnx(_) => ModelKind::Unknown,
            }
        };

        info!(
            model = %files.name,
            backend = backend.name(),
            kind = kind.name(),
            "Model pair ready"
        );

        Ok(LoadedModel {
            name: files.name.clone(),
            backend,
            scaler,
            kind,
        })
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::with_threads(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files() -> ModelFiles {
        ModelFiles {
            name: "Random Forest".to_string(),
            model_stem: "random_forest".to_string(),
            scaler_file: "scaler.json".to_string(),
            card_file: None,
        }
    }

    fn write_scaler(dir: &Path) {
        StandardScaler {
            feature_names: Vec::new(),
            mean: vec![0.0; FEATURE_COUNT],
            scale: vec![1.0; FEATURE_COUNT],
        }
        .save(dir.join("scaler.json"))
        .unwrap();
    }

    #[test]
    fn test_logistic_probability() {
        let model = LogisticModel {
            coefficients: vec![0.0; FEATURE_COUNT],
            intercept: 0.0,
        };
        assert!((model.predict_proba(&[1.0; FEATURE_COUNT]) - 0.5).abs() < 1e-12);

        let mut coefficients = vec![0.0; FEATURE_COUNT];
        coefficients[0] = 10.0;
        let model = LogisticModel {
            coefficients,
            intercept: 0.0,
        };
        assert!(model.predict_proba(&[1.0; FEATURE_COUNT]) > 0.99);
    }

    #[test]
    fn test_load_json_pair_resolves_linear_kind() {
        let dir = tempfile::tempdir().unwrap();
        write_scaler(dir.path());
        LogisticModel {
            coefficients: vec![0.5; FEATURE_COUNT],
            intercept: -1.0,
        }
        .save(dir.path().join("random_forest.json"))
        .unwrap();

        let model = ModelLoader::default().load_pair(dir.path(), &files()).unwrap();
        assert_eq!(model.name, "Random Forest");
        assert!(matches!(model.backend, ModelBackend::Logistic(_)));
        assert_eq!(model.kind.name(), "linear");
    }

    #[test]
    fn test_card_overrides_kind() {
        let dir = tempfile::tempdir().unwrap();
        write_scaler(dir.path());
        LogisticModel {
            coefficients: vec![0.5; FEATURE_COUNT],
            intercept: 0.0,
        }
        .save(dir.path().join("random_forest.json"))
        .unwrap();
        ModelCard {
            name: "Random Forest".to_string(),
            kind: ModelKind::TreeEnsemble {
                feature_importances: vec![1.0 / FEATURE_COUNT as f64; FEATURE_COUNT],
            },
        }
        .save(dir.path().join("random_forest.card.json"))
        .unwrap();

        let model = ModelLoader::default().load_pair(dir.path(), &files()).unwrap();
        assert_eq!(model.kind.name(), "tree_ensemble");
    }

    #[test]
    fn test_missing_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        // no scaler
        assert!(ModelLoader::default().load_pair(dir.path(), &files()).is_err());

        // scaler but no model
        write_scaler(dir.path());
        let err = ModelLoader::default()
            .load_pair(dir.path(), &files())
            .err()
            .unwrap();
        assert!(err.to_string().contains("random_forest"));
    }

    #[test]
    fn test_wrong_coefficient_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.json");
        std::fs::write(&path, r#"{"coefficients": [1.0, 2.0], "intercept": 0.0}"#).unwrap();
        assert!(LogisticModel::load(&path).is_err());
    }
}
