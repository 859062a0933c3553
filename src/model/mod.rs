//! Statistical scorer boundary: features → fraud probability in [0, 1].

mod linear;
#[cfg(feature = "onnx")]
mod onnx;

pub use linear::LinearScorer;
#[cfg(feature = "onnx")]
pub use onnx::OnnxScorer;

use crate::config::ModelConfig;
use crate::error::DependencyError;
use crate::features::FeatureVector;
use std::sync::Arc;

/// Side-effect free from the engine's point of view. Must fail rather than return a default.
pub trait ModelScorer: Send + Sync {
    fn score(&self, features: &FeatureVector) -> Result<f64, DependencyError>;
}

impl<F> ModelScorer for F
where
    F: Fn(&FeatureVector) -> Result<f64, DependencyError> + Send + Sync,
{
    fn score(&self, features: &FeatureVector) -> Result<f64, DependencyError> {
        self(features)
    }
}

/// Load the configured backend. Missing model files fail here, at startup.
pub fn load_scorer(config: &ModelConfig) -> Result<Arc<dyn ModelScorer>, DependencyError> {
    match config {
        ModelConfig::Linear { path } => Ok(Arc::new(LinearScorer::load(path)?)),
        #[cfg(feature = "onnx")]
        ModelConfig::Onnx { path } => Ok(Arc::new(OnnxScorer::load(path)?)),
        #[cfg(not(feature = "onnx"))]
        ModelConfig::Onnx { path } => Err(DependencyError::ModelUnavailable(format!(
            "{}: built without the `onnx` feature",
            path.display()
        ))),
    }
}
