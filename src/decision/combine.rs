//! Score combination policies: model probability + rule score → final score in [0, 1].

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub trait ScoreCombiner: Send + Sync + fmt::Debug {
    fn combine(&self, model_score: f64, rule_score: f64) -> f64;
}

/// `(model + rule) / 2`
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanCombiner;

impl ScoreCombiner for MeanCombiner {
    fn combine(&self, model_score: f64, rule_score: f64) -> f64 {
        ((model_score + rule_score) / 2.0).clamp(0.0, 1.0)
    }
}

/// `alpha * model + (1 - alpha) * rule`, clamped
#[derive(Debug, Clone, Copy)]
pub struct WeightedCombiner {
    alpha: f64,
}

impl WeightedCombiner {
    pub fn new(alpha: f64) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(ConfigError::InvalidAlpha(alpha));
        }
        Ok(Self { alpha })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl ScoreCombiner for WeightedCombiner {
    fn combine(&self, model_score: f64, rule_score: f64) -> f64 {
        (self.alpha * model_score + (1.0 - self.alpha) * rule_score).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CombinerConfig {
    #[default]
    Mean,
    Weighted {
        alpha: f64,
    },
}

impl CombinerConfig {
    pub fn build(&self) -> Result<Arc<dyn ScoreCombiner>, ConfigError> {
        let combiner: Arc<dyn ScoreCombiner> = match self {
            CombinerConfig::Mean => Arc::new(MeanCombiner),
            CombinerConfig::Weighted { alpha } => Arc::new(WeightedCombiner::new(*alpha)?),
        };
        Ok(combiner)
    }
}
