//! Logistic scorer: `sigmoid(bias + Σ weight·feature)` with weights keyed by feature name.

use super::ModelScorer;
use crate::error::DependencyError;
use crate::features::{FeatureVector, FEATURE_NAMES};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LinearModelFile {
    bias: f64,
    weights: BTreeMap<String, f64>,
}

#[derive(Debug, Clone)]
pub struct LinearScorer {
    bias: f64,
    /// Indexed like `FEATURE_NAMES`; absent names weigh 0
    weights: Vec<f64>,
}

impl LinearScorer {
    pub fn new(bias: f64, weights: &BTreeMap<String, f64>) -> Result<Self, DependencyError> {
        let mut dense = vec![0.0; FEATURE_NAMES.len()];
        for (name, w) in weights {
            let idx = FEATURE_NAMES
                .iter()
                .position(|n| *n == name.as_str())
                .ok_or_else(|| DependencyError::ModelUnavailable(format!("unknown feature `{name}`")))?;
            if !w.is_finite() {
                return Err(DependencyError::ModelUnavailable(format!(
                    "weight for `{name}` is not finite"
                )));
            }
            dense[idx] = *w;
        }
        if !bias.is_finite() {
            return Err(DependencyError::ModelUnavailable("bias is not finite".into()));
        }
        Ok(Self {
            bias,
            weights: dense,
        })
    }

    /// Load `{"bias": .., "weights": {"feature": w, ..}}`.
    pub fn load(path: &Path) -> Result<Self, DependencyError> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            DependencyError::ModelUnavailable(format!("{}: {}", path.display(), e))
        })?;
        let file: LinearModelFile = serde_json::from_str(&data).map_err(|e| {
            DependencyError::ModelUnavailable(format!("{}: {}", path.display(), e))
        })?;
        let scorer = Self::new(file.bias, &file.weights)?;
        info!(path = %path.display(), features = file.weights.len(), "linear model loaded");
        Ok(scorer)
    }
}

impl ModelScorer for LinearScorer {
    fn score(&self, features: &FeatureVector) -> Result<f64, DependencyError> {
        let z = features
            .as_model_input()
            .iter()
            .zip(&self.weights)
            .fold(self.bias, |acc, (x, w)| acc + *x as f64 * w);
        let p = 1.0 / (1.0 + (-z).exp());
        if p.is_nan() {
            return Err(DependencyError::Scoring("non-numeric model output".into()));
        }
        Ok(p)
    }
}
