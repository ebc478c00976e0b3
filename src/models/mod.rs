//! Model artifacts and inference

pub mod aggregator;
pub mod explainer;
pub mod importance;
pub mod inference;
pub mod loader;
pub mod scaler;

pub use aggregator::{EnsembleCombiner, SecondarySynthesizer};
pub use importance::{ModelCard, ModelKind};
pub use inference::InferenceEngine;
pub use loader::{LoadedModel, ModelLoader};
pub use scaler::StandardScaler;
