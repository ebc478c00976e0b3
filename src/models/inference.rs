//! Inference engine for the heart risk models

use crate::config::{AppConfig, EnsembleConfig};
use crate::error::{ApiError, ApiResult};
use crate::models::aggregator::{EnsembleCombiner, SecondarySynthesizer};
use crate::models::explainer;
use crate::models::importance::{rank_importances, FALLBACK_IMPORTANCES};
use crate::models::loader::{LoadedModel, ModelBackend, ModelLoader, OnnxModel};
use crate::types::patient::{PatientFeatures, FEATURE_COUNT};
use crate::types::prediction::{
    EnsembleResponse, ExplainResponse, FeatureImportance, ModelPrediction, ModelPredictionEntry,
};
use anyhow::{Context, Result};
use chrono::Utc;
use ort::memory::Allocator;
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, Tensor};
use rand::Rng;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

/// Display confidence of the primary model in ensemble responses
pub const PRIMARY_CONFIDENCE: f64 = 0.85;
/// Display confidence of the secondary model in ensemble responses
pub const SECONDARY_CONFIDENCE: f64 = 0.84;

const SECONDARY_DISPLAY_NAME: &str = "Neural Network";

impl LoadedModel {
    /// Scale the features and run the model.
    pub fn predict(&self, features: &PatientFeatures) -> Result<ModelPrediction> {
        let scaled = self.scaler.transform(&features.to_array())?;

        let (probability, label) = match &self.backend {
            ModelBackend::Logistic(model) => (model.predict_proba(&scaled), None),
            ModelBackend::Onnx(model) => run_onnx(model, &scaled, &self.name)?,
        };

        if !probability.is_finite() {
            anyhow::bail!("{} produced a non-finite probability", self.name);
        }
        let probability = probability.clamp(0.0, 1.0);
        let prediction = label.unwrap_or(u8::from(probability >= 0.5));

        debug!(model = %self.name, prediction, probability, "Model inference complete");
        Ok(ModelPrediction {
            prediction,
            probability,
        })
    }
}

/// Run an ONNX session on one scaled row; returns (p(class 1), label).
fn run_onnx(model: &OnnxModel, scaled: &[f64], model_name: &str) -> Result<(f64, Option<u8>)> {
    let input: Vec<f32> = scaled.iter().map(|&v| v as f32).collect();
    let shape = vec![1_i64, input.len() as i64];
    let input_tensor =
        Tensor::from_array((shape, input)).context("Failed to create input tensor")?;

    let mut session = model
        .session
        .lock()
        .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
    let outputs = session.run(ort::inputs![&model.input_name => input_tensor])?;

    let probability = extract_probability(&outputs, &model.output_name, model_name)?;

    let label = model.label_name.as_deref().and_then(|name| {
        outputs
            .get(name)
            .and_then(|output| output.try_extract_tensor::<i64>().ok())
            .and_then(|(_, data)| data.first().map(|&l| u8::from(l != 0)))
    });

    Ok((probability, label))
}

/// Probability of class 1 from either a `[1, 2]` tensor or a seq(map) output.
fn extract_probability(
    outputs: &ort::session::SessionOutputs,
    output_name: &str,
    model_name: &str,
) -> Result<f64> {
    if let Some(output) = outputs.get(output_name) {
        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            return positive_class_from_tensor(shape, data);
        }
        if DynSequenceValueType::can_downcast(&output.dtype()) {
            return extract_from_sequence_map(output, model_name);
        }
    }

    for (name, output) in outputs.iter() {
        if name.contains("label") {
            continue;
        }
        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            debug!(model = %model_name, output = %name, "Extracted probability from fallback output");
            return positive_class_from_tensor(shape, data);
        }
        if DynSequenceValueType::can_downcast(&output.dtype()) {
            return extract_from_sequence_map(&output, model_name);
        }
    }

    anyhow::bail!("{} returned no probability output", model_name)
}

/// seq(map(int64, float)), as emitted by skl2onnx classifiers with zipmap
fn extract_from_sequence_map(output: &ort::value::DynValue, model_name: &str) -> Result<f64> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| anyhow::anyhow!("Failed to downcast to sequence: {}", e))?;
    let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;
    let first = maps
        .first()
        .ok_or_else(|| anyhow::anyhow!("{} returned an empty sequence", model_name))?;
    let pairs = first.try_extract_key_values::<i64, f32>()?;

    if let Some((_, p)) = pairs.iter().find(|(class, _)| *class == 1) {
        return Ok(*p as f64);
    }
    if let Some((_, p)) = pairs.iter().find(|(class, _)| *class == 0) {
        return Ok(1.0 - *p as f64);
    }
    anyhow::bail!("{} returned no class probabilities", model_name)
}

fn positive_class_from_tensor(shape: &ort::tensor::Shape, data: &[f32]) -> Result<f64> {
    let classes = shape.iter().last().copied().unwrap_or(0);
    match (classes, data) {
        (c, [_, p1, ..]) if c >= 2 => Ok(*p1 as f64),
        (1, [p, ..]) => Ok(*p as f64),
        _ => anyhow::bail!("Unexpected probability tensor shape {:?}", shape),
    }
}

/// Owns the loaded models and answers every prediction request.
pub struct InferenceEngine {
    primary: Option<LoadedModel>,
    /// Why the primary pair is unavailable
    load_error: Option<String>,
    secondary: Option<LoadedModel>,
    combiner: EnsembleCombiner,
    /// Present when demo synthesis of a missing secondary is enabled
    synthesizer: Option<SecondarySynthesizer>,
}

impl InferenceEngine {
    /// Load the configured model pairs.
    ///
    /// A primary failure is fatal only with `models.fail_fast`; otherwise the
    /// engine starts degraded and prediction calls fail.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let loader = ModelLoader::with_threads(config.models.onnx_threads);
        let models_dir = &config.models.models_dir;

        let (primary, load_error) = match loader.load_pair(models_dir, &config.models.primary) {
            Ok(model) => (Some(model), None),
            Err(e) if config.models.fail_fast => return Err(e),
            Err(e) => {
                error!(
                    model = %config.models.primary.name,
                    error = %format!("{:#}", e),
                    "Failed to load primary model, starting degraded"
                );
                (None, Some(format!("{:#}", e)))
            }
        };

        let secondary = match config.models.secondary_files() {
            Some(files) => match loader.load_pair(models_dir, files) {
                Ok(model) => Some(model),
                Err(e) => {
                    warn!(
                        model = %files.name,
                        error = %format!("{:#}", e),
                        synthesize = config.ensemble.synthesize_missing_secondary,
                        "Secondary model unavailable"
                    );
                    None
                }
            },
            None => {
                info!("Secondary model disabled");
                None
            }
        };

        let mut engine = Self::from_models(primary, secondary, &config.ensemble)?;
        if load_error.is_some() {
            engine.load_error = load_error;
        }

        info!(
            ready = engine.is_ready(),
            secondary = engine.has_secondary(),
            demo_fallback = engine.synthesizer.is_some(),
            "Inference engine initialized"
        );
        Ok(engine)
    }

    /// Build an engine from already-loaded models.
    pub fn from_models(
        primary: Option<LoadedModel>,
        secondary: Option<LoadedModel>,
        ensemble: &EnsembleConfig,
    ) -> Result<Self> {
        let synthesizer = if ensemble.synthesize_missing_secondary {
            Some(SecondarySynthesizer::from_config(ensemble)?)
        } else {
            None
        };
        let load_error = primary
            .is_none()
            .then(|| "primary model not loaded".to_string());

        Ok(Self {
            primary,
            load_error,
            secondary,
            combiner: EnsembleCombiner::new(ensemble),
            synthesizer,
        })
    }

    pub fn is_ready(&self) -> bool {
        self.primary.is_some()
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn has_secondary(&self) -> bool {
        self.secondary.is_some()
    }

    /// Names of loaded models, primary first
    pub fn model_names(&self) -> Vec<String> {
        self.primary
            .iter()
            .chain(self.secondary.iter())
            .map(|m| m.name.clone())
            .collect()
    }

    fn primary(&self) -> ApiResult<&LoadedModel> {
        self.primary.as_ref().ok_or_else(|| {
            ApiError::ServiceUnavailable(
                self.load_error
                    .clone()
                    .unwrap_or_else(|| "primary model not loaded".to_string()),
            )
        })
    }

    fn run(model: &LoadedModel, features: &PatientFeatures) -> ApiResult<ModelPrediction> {
        model.predict(features).map_err(|e| {
            let detail = format!("{:#}", e);
            error!(model = %model.name, error = %detail, "Model inference failed");
            ApiError::Inference(detail)
        })
    }

    /// Single-model prediction with the primary pair.
    pub fn predict(&self, features: &PatientFeatures) -> ApiResult<ModelPrediction> {
        Self::run(self.primary()?, features)
    }

    /// Blend the primary and secondary predictions.
    pub fn predict_ensemble<R: Rng + ?Sized>(
        &self,
        features: &PatientFeatures,
        rng: &mut R,
    ) -> ApiResult<EnsembleResponse> {
        let primary = self.primary()?;
        let rf = Self::run(primary, features)?;

        let (nn_name, nn_probability, simulated) = match (&self.secondary, &self.synthesizer) {
            (Some(model), _) => (model.name.clone(), Self::run(model, features)?.probability, false),
            (None, Some(synth)) => (
                SECONDARY_DISPLAY_NAME.to_string(),
                synth.synthesize(rf.probability, rng),
                true,
            ),
            (None, None) => {
                return Err(ApiError::ServiceUnavailable(
                    "secondary model not loaded and synthesis disabled".to_string(),
                ))
            }
        };
        let nn_prediction = self.combiner.classify(nn_probability);

        let decision = self.combiner.decide(rf.probability, nn_probability);
        debug!(
            rf = rf.probability,
            nn = nn_probability,
            simulated,
            blended = decision.probability,
            "Ensemble inference complete"
        );

        Ok(EnsembleResponse {
            prediction: decision.prediction,
            probability: decision.probability,
            risk_level: decision.risk_level,
            message: decision.message,
            rf_prediction: rf.prediction,
            rf_probability: rf.probability,
            nn_prediction,
            nn_probability,
            model_predictions: vec![
                ModelPredictionEntry {
                    model_name: primary.name.clone(),
                    prediction: rf.prediction,
                    probability: rf.probability,
                    confidence: PRIMARY_CONFIDENCE,
                    simulated: false,
                },
                ModelPredictionEntry {
                    model_name: nn_name,
                    prediction: nn_prediction,
                    probability: nn_probability,
                    confidence: SECONDARY_CONFIDENCE,
                    simulated,
                },
            ],
            demo_mode: simulated,
            timestamp: Utc::now(),
        })
    }

    /// Importances of the primary model, or the fallback table.
    pub fn importances(&self) -> [f64; FEATURE_COUNT] {
        self.primary
            .as_ref()
            .map(|m| m.kind.importances())
            .unwrap_or(FALLBACK_IMPORTANCES)
    }

    pub fn feature_importance(&self) -> Vec<FeatureImportance> {
        rank_importances(&self.importances())
    }

    /// Predict and attribute the result to individual features.
    pub fn explain(
        &self,
        features: &PatientFeatures,
        inputs: &Map<String, Value>,
    ) -> ApiResult<ExplainResponse> {
        let result = self.predict(features)?;
        let risk_level = result.risk_level();
        let contributions =
            explainer::contributions(&features.to_array(), &self.importances(), inputs);

        Ok(ExplainResponse {
            prediction: result.prediction,
            probability: result.probability,
            risk_level,
            explanation: explainer::explanation_text(risk_level, &contributions),
            feature_contributions: contributions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::importance::ModelKind;
    use crate::models::loader::LogisticModel;
    use crate::models::scaler::StandardScaler;
    use crate::types::prediction::{EnsembleRiskLevel, RiskLevel};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn identity_scaler() -> StandardScaler {
        StandardScaler {
            feature_names: Vec::new(),
            mean: vec![0.0; FEATURE_COUNT],
            scale: vec![1.0; FEATURE_COUNT],
        }
    }

    /// Constant-probability model: all weights zero.
    fn constant_model(name: &str, probability: f64) -> LoadedModel {
        let intercept = (probability / (1.0 - probability)).ln();
        LoadedModel {
            name: name.to_string(),
            backend: ModelBackend::Logistic(LogisticModel {
                coefficients: vec![0.0; FEATURE_COUNT],
                intercept,
            }),
            scaler: identity_scaler(),
            kind: ModelKind::Unknown,
        }
    }

    fn patient() -> PatientFeatures {
        PatientFeatures::from_array([
            63.0, 1.0, 3.0, 145.0, 233.0, 1.0, 0.0, 150.0, 0.0, 2.3, 0.0, 0.0, 1.0,
        ])
    }

    #[test]
    fn test_predict_primary() {
        let engine = InferenceEngine::from_models(
            Some(constant_model("Random Forest", 0.8)),
            None,
            &EnsembleConfig::default(),
        )
        .unwrap();

        let result = engine.predict(&patient()).unwrap();
        assert_eq!(result.prediction, 1);
        assert!((result.probability - 0.8).abs() < 1e-9);
        assert_eq!(result.risk_level(), RiskLevel::High);
    }

    #[test]
    fn test_degraded_engine() {
        let engine =
            InferenceEngine::from_models(None, None, &EnsembleConfig::default()).unwrap();
        assert!(!engine.is_ready());
        assert!(matches!(
            engine.predict(&patient()),
            Err(ApiError::ServiceUnavailable(_))
        ));
        // importance still answers from the fallback table
        assert_eq!(engine.importances(), FALLBACK_IMPORTANCES);
    }

    #[test]
    fn test_ensemble_with_both_models() {
        let engine = InferenceEngine::from_models(
            Some(constant_model("Random Forest", 0.8)),
            Some(constant_model("Neural Network", 0.6)),
            &EnsembleConfig::default(),
        )
        .unwrap();

        let mut rng = StdRng::seed_from_u64(3);
        let response = engine.predict_ensemble(&patient(), &mut rng).unwrap();
        assert!((response.probability - 0.72).abs() < 1e-9);
        assert_eq!(response.prediction, 1);
        assert_eq!(response.risk_level, EnsembleRiskLevel::VeryHigh);
        assert!(!response.demo_mode);
        assert_eq!(response.model_predictions.len(), 2);
        assert_eq!(response.model_predictions[0].confidence, PRIMARY_CONFIDENCE);
        assert!(!response.model_predictions[1].simulated);
    }

    #[test]
    fn test_ensemble_demo_mode() {
        let engine = InferenceEngine::from_models(
            Some(constant_model("Random Forest", 0.3)),
            None,
            &EnsembleConfig::default(),
        )
        .unwrap();

        let mut rng = StdRng::seed_from_u64(11);
        let response = engine.predict_ensemble(&patient(), &mut rng).unwrap();
        assert!(response.demo_mode);
        assert!(response.model_predictions[1].simulated);
        assert_eq!(response.model_predictions[1].model_name, "Neural Network");
        assert!((0.0..=1.0).contains(&response.nn_probability));
        assert!((0.0..=1.0).contains(&response.probability));
    }

    #[test]
    fn test_ensemble_without_synthesis() {
        let config = EnsembleConfig {
            synthesize_missing_secondary: false,
            ..EnsembleConfig::default()
        };
        let engine =
            InferenceEngine::from_models(Some(constant_model("Random Forest", 0.3)), None, &config)
                .unwrap();

        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            engine.predict_ensemble(&patient(), &mut rng),
            Err(ApiError::ServiceUnavailable(_))
        ));
    }

    #[test]
    fn test_explain() {
        let engine = InferenceEngine::from_models(
            Some(constant_model("Random Forest", 0.5)),
            None,
            &EnsembleConfig::default(),
        )
        .unwrap();

        let response = engine.explain(&patient(), &Map::new()).unwrap();
        assert_eq!(response.risk_level, RiskLevel::Moderate);
        assert_eq!(response.feature_contributions.len(), FEATURE_COUNT);
        assert_eq!(response.feature_contributions[0].feature, "chol");
        assert!(response.explanation.contains("a medium risk"));
    }

    #[test]
    fn test_new_degraded_without_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.models.models_dir = dir.path().display().to_string();

        let engine = InferenceEngine::new(&config).unwrap();
        assert!(!engine.is_ready());
        assert!(engine.load_error().is_some());

        config.models.fail_fast = true;
        assert!(InferenceEngine::new(&config).is_err());
    }
}
