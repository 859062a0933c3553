//! ONNX Runtime scorer. Input: [1, n_features] f32, output: fraud probability.
//! Unlike a best-effort detector, a missing or broken model is an error, never a 0.0 score.

use super::ModelScorer;
use crate::error::DependencyError;
use crate::features::{FeatureVector, FEATURE_NAMES};
use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use parking_lot::Mutex;
use std::path::Path;

fn unavailable(e: impl std::fmt::Display) -> DependencyError {
    DependencyError::ModelUnavailable(e.to_string())
}

fn scoring_err(e: impl std::fmt::Display) -> DependencyError {
    DependencyError::Scoring(e.to_string())
}

pub struct OnnxScorer {
    // `Session::run` needs exclusive access
    session: Mutex<Session>,
}

impl OnnxScorer {
    pub fn load(path: &Path) -> Result<Self, DependencyError> {
        if !path.exists() {
            return Err(DependencyError::ModelUnavailable(format!(
                "ONNX model not found: {}",
                path.display()
            )));
        }
        let session = Session::builder()
            .map_err(unavailable)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(unavailable)?
            .commit_from_file(path)
            .map_err(unavailable)?;
        tracing::info!(path = %path.display(), "ONNX model loaded");
        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl ModelScorer for OnnxScorer {
    fn score(&self, features: &FeatureVector) -> Result<f64, DependencyError> {
        let input = Array2::from_shape_vec((1, FEATURE_NAMES.len()), features.as_model_input())
            .map_err(scoring_err)?;
        let tensor = Value::from_array(input).map_err(scoring_err)?;
        let mut session = self.session.lock();
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| DependencyError::Scoring("model declares no output".into()))?;
        let outputs = session.run(ort::inputs![tensor]).map_err(scoring_err)?;
        let output = outputs
            .get(output_name.as_str())
            .ok_or_else(|| DependencyError::Scoring("model produced no output".into()))?;
        let (_, data) = output.try_extract_tensor::<f32>().map_err(scoring_err)?;
        // classifiers exporting [p_legit, p_fraud] put the positive class last
        let score = data
            .last()
            .copied()
            .ok_or_else(|| DependencyError::Scoring("empty output tensor".into()))?;
        Ok(score as f64)
    }
}
