//! Configuration management for the heart risk service

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// How absent input fields are handled by the prediction endpoints
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingFieldPolicy {
    /// Reject the request with a 400 naming the missing field
    #[default]
    Reject,
    /// Substitute 0 for the missing field
    DefaultZero,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub models: ModelsConfig,
    pub ensemble: EnsembleConfig,
    pub validation: ValidationConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins ("*" allows any)
    pub cors_origins: Vec<String>,
    /// Return internal inference error text to clients
    pub expose_error_details: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: vec!["http://localhost:3000".to_string()],
            expose_error_details: false,
        }
    }
}

/// Artifact names for one (model, scaler) pair
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ModelFiles {
    /// Display name of the model
    pub name: String,
    /// File stem; `<stem>.onnx` is preferred over `<stem>.json`
    pub model_stem: String,
    /// Scaler artifact file name
    pub scaler_file: String,
    /// Optional model card; defaults to `<stem>.card.json`
    #[serde(default)]
    pub card_file: Option<String>,
}

impl ModelFiles {
    pub fn card_file_name(&self) -> String {
        self.card_file
            .clone()
            .unwrap_or_else(|| format!("{}.card.json", self.model_stem))
    }
}

/// ML models configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Directory containing model and scaler artifacts
    pub models_dir: String,
    /// Refuse to start when the primary pair cannot be loaded
    pub fail_fast: bool,
    /// Primary model (random forest)
    pub primary: ModelFiles,
    /// Secondary model (neural network); absence enables demo synthesis
    pub secondary: Option<ModelFiles>,
    /// Skip the secondary pair even when it is configured
    pub secondary_enabled: bool,
    /// Number of threads for ONNX inference per model
    pub onnx_threads: usize,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            models_dir: "models".to_string(),
            fail_fast: false,
            primary: ModelFiles {
                name: "Random Forest".to_string(),
                model_stem: "random_forest".to_string(),
                scaler_file: "scaler.json".to_string(),
                card_file: None,
            },
            secondary: Some(ModelFiles {
                name: "Neural Network".to_string(),
                model_stem: "neural_network".to_string(),
                scaler_file: "scaler_nn.json".to_string(),
                card_file: None,
            }),
            secondary_enabled: true,
            onnx_threads: 1,
        }
    }
}

impl ModelsConfig {
    /// Secondary pair to load, if any.
    pub fn secondary_files(&self) -> Option<&ModelFiles> {
        self.secondary.as_ref().filter(|_| self.secondary_enabled)
    }
}

/// Ensemble blending configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    /// Weight of the primary model probability
    pub primary_weight: f64,
    /// Weight of the secondary model probability
    pub secondary_weight: f64,
    /// Blended probability above which the class is 1
    pub decision_threshold: f64,
    /// Synthesize the secondary probability when no secondary model is loaded
    pub synthesize_missing_secondary: bool,
    /// Mean of the demo-mode perturbation
    pub noise_mean: f64,
    /// Standard deviation of the demo-mode perturbation
    pub noise_std: f64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            primary_weight: 0.6,
            secondary_weight: 0.4,
            decision_threshold: 0.5,
            synthesize_missing_secondary: true,
            noise_mean: -0.05,
            noise_std: 0.05,
        }
    }
}

/// Input validation configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ValidationConfig {
    pub missing_fields: MissingFieldPolicy,
}

/// Metrics reporting configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Seconds between summary logs (0 disables the reporter)
    pub report_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 300,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `HEART_CONFIG` or the default path, plus environment
    pub fn load() -> Result<Self> {
        let path =
            std::env::var("HEART_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path (optional) layered with `HEART__*` variables
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("HEART")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins"),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would break the ensemble arithmetic
    pub fn validate(&self) -> Result<()> {
        let e = &self.ensemble;
        if e.primary_weight < 0.0 || e.secondary_weight < 0.0 {
            anyhow::bail!("Ensemble weights must be non-negative");
        }
        if e.primary_weight + e.secondary_weight <= 0.0 {
            anyhow::bail!("Ensemble weights must not both be zero");
        }
        if !(0.0..=1.0).contains(&e.decision_threshold) {
            anyhow::bail!("Ensemble decision threshold must lie in [0, 1]");
        }
        if !(e.noise_std.is_finite() && e.noise_std >= 0.0) {
            anyhow::bail!("Ensemble noise_std must be a non-negative number");
        }
        if self.models.onnx_threads == 0 {
            anyhow::bail!("models.onnx_threads must be at least 1");
        }
        Ok(())
    }
}
