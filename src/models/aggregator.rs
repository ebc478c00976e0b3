//! Two-model ensemble blending and demo-mode secondary synthesis.

use crate::config::EnsembleConfig;
use crate::types::prediction::EnsembleRiskLevel;
use anyhow::Result;
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Outcome of blending the primary and secondary probabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleDecision {
    pub prediction: u8,
    pub probability: f64,
    pub risk_level: EnsembleRiskLevel,
    pub message: String,
}

/// Blends primary and secondary model probabilities into one score.
#[derive(Debug, Clone)]
pub struct EnsembleCombiner {
    primary_weight: f64,
    secondary_weight: f64,
    threshold: f64,
}

impl EnsembleCombiner {
    pub fn new(config: &EnsembleConfig) -> Self {
        Self::with_weights(
            config.primary_weight,
            config.secondary_weight,
            config.decision_threshold,
        )
    }

    pub fn with_weights(primary_weight: f64, secondary_weight: f64, threshold: f64) -> Self {
        Self {
            primary_weight,
            secondary_weight,
            threshold,
        }
    }

    /// Weighted average normalised by the weight sum, clamped to `[0, 1]`.
    pub fn combine(&self, primary: f64, secondary: f64) -> f64 {
        let total_weight = self.primary_weight + self.secondary_weight;
        if total_weight <= 0.0 {
            return 0.5;
        }
        ((primary * self.primary_weight + secondary * self.secondary_weight) / total_weight)
            .clamp(0.0, 1.0)
    }

    /// Class decision for a single probability.
    pub fn classify(&self, probability: f64) -> u8 {
        u8::from(probability > self.threshold)
    }

    pub fn decide(&self, primary: f64, secondary: f64) -> EnsembleDecision {
        let probability = self.combine(primary, secondary);
        let prediction = self.classify(probability);
        let risk_level = EnsembleRiskLevel::from_probability(probability);

        EnsembleDecision {
            prediction,
            probability,
            risk_level,
            message: ensemble_message(prediction, risk_level),
        }
    }
}

impl Default for EnsembleCombiner {
    fn default() -> Self {
        Self::new(&EnsembleConfig::default())
    }
}

pub fn ensemble_message(prediction: u8, risk_level: EnsembleRiskLevel) -> String {
    let tier = risk_level.label().to_lowercase();
    if prediction == 1 {
        format!(
            "You have a {} of heart disease. Please consult with a healthcare professional.",
            tier
        )
    } else {
        format!(
            "You have a {} of heart disease. Continue maintaining a healthy lifestyle.",
            tier
        )
    }
}

/// Stand-in for a missing secondary model: the primary probability plus
/// Gaussian noise, clamped to `[0, 1]`.
#[derive(Debug, Clone)]
pub struct SecondarySynthesizer {
    noise: Normal<f64>,
}

impl SecondarySynthesizer {
    pub fn new(mean: f64, std_dev: f64) -> Result<Self> {
        let noise = Normal::new(mean, std_dev)
            .map_err(|e| anyhow::anyhow!("Invalid synthesis noise N({}, {}): {}", mean, std_dev, e))?;
        Ok(Self { noise })
    }

    pub fn from_config(config: &EnsembleConfig) -> Result<Self> {
        Self::new(config.noise_mean, config.noise_std)
    }

    pub fn synthesize<R: Rng + ?Sized>(&self, primary: f64, rng: &mut R) -> f64 {
        (primary + self.noise.sample(rng)).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_combine_default_weights() {
        let combiner = EnsembleCombiner::default();
        let p = combiner.combine(0.8, 0.6);
        assert!((p - 0.72).abs() < 1e-12);
    }

    #[test]
    fn test_combine_normalises_weights() {
        let combiner = EnsembleCombiner::with_weights(3.0, 1.0, 0.5);
        assert!((combiner.combine(1.0, 0.0) - 0.75).abs() < 1e-12);
        assert_eq!(EnsembleCombiner::with_weights(0.0, 0.0, 0.5).combine(1.0, 1.0), 0.5);
    }

    #[test]
    fn test_blend_stays_in_unit_interval() {
        let combiner = EnsembleCombiner::default();
        for &(a, b) in &[(0.0, 0.0), (1.0, 1.0), (0.0, 1.0), (1.0, 0.0)] {
            let p = combiner.combine(a, b);
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_decision_threshold_is_strict() {
        let combiner = EnsembleCombiner::default();
        assert_eq!(combiner.classify(0.5), 0);
        assert_eq!(combiner.classify(0.5001), 1);
    }

    #[test]
    fn test_decide_messages() {
        let combiner = EnsembleCombiner::default();

        let high = combiner.decide(0.9, 0.8);
        assert_eq!(high.prediction, 1);
        assert_eq!(high.risk_level, EnsembleRiskLevel::VeryHigh);
        assert_eq!(
            high.message,
            "You have a very high risk of heart disease. Please consult with a healthcare professional."
        );

        let low = combiner.decide(0.1, 0.1);
        assert_eq!(low.prediction, 0);
        assert_eq!(low.risk_level, EnsembleRiskLevel::Low);
        assert_eq!(
            low.message,
            "You have a low risk of heart disease. Continue maintaining a healthy lifestyle."
        );
    }

    #[test]
    fn test_synthesizer_clamps() {
        let mut rng = StdRng::seed_from_u64(7);
        let synth = SecondarySynthesizer::new(-0.05, 0.05).unwrap();
        for _ in 0..200 {
            let p = synth.synthesize(0.01, &mut rng);
            assert!((0.0..=1.0).contains(&p));
            let p = synth.synthesize(0.99, &mut rng);
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_synthesizer_zero_noise() {
        let mut rng = StdRng::seed_from_u64(1);
        let synth = SecondarySynthesizer::new(-0.05, 0.0).unwrap();
        assert!((synth.synthesize(0.6, &mut rng) - 0.55).abs() < 1e-12);
    }

    #[test]
    fn test_synthesizer_rejects_bad_noise() {
        assert!(SecondarySynthesizer::new(0.0, -1.0).is_err());
    }
}
