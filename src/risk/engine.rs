//! Wires the subject store, feature engine, rule engine, scorer and decision pipeline.

use crate::config::AppConfig;
use crate::decision::{Action, Decision, DecisionContext, DecisionPipeline};
use crate::error::{ConfigError, DependencyError, InputError, RiskError};
use crate::events::Event;
use crate::features::{FeatureVector, TemporalFeatureEngine};
use crate::model::ModelScorer;
use crate::rules::RuleEngine;
use crate::state::EntityStateStore;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

pub struct RiskEngine {
    store: EntityStateStore,
    features: TemporalFeatureEngine,
    rules: RuleEngine,
    decisions: DecisionPipeline,
    scorer: Arc<dyn ModelScorer>,
}

impl RiskEngine {
    pub fn new(config: &AppConfig, scorer: Arc<dyn ModelScorer>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            store: EntityStateStore::new(&config.store)?,
            features: TemporalFeatureEngine::new(&config.features),
            rules: RuleEngine::new(config.rules.clone()),
            decisions: DecisionPipeline::from_config(&config.decision)?,
            scorer,
        })
    }

    pub fn store(&self) -> &EntityStateStore {
        &self.store
    }

    pub fn decisions(&self) -> &DecisionPipeline {
        &self.decisions
    }

    pub fn scorer(&self) -> Arc<dyn ModelScorer> {
        Arc::clone(&self.scorer)
    }

    /// Features for `event`; the subject's state is updated in the same step.
    pub fn extract(&self, event: &Event) -> Result<FeatureVector, InputError> {
        self.features.process(&self.store, event)
    }

    /// Rules, score combination and thresholds for features already extracted.
    pub fn conclude(&self, features: &FeatureVector, model_score: f64) -> Result<Decision, RiskError> {
        if !(0.0..=1.0).contains(&model_score) {
            return Err(DependencyError::InvalidScore(model_score).into());
        }
        let outcome = self.rules.evaluate(features);
        let decision = self.decisions.decide(
            model_score,
            outcome.score,
            &outcome.flags,
            context_for(features),
        )?;
        if decision.action != Action::Allow {
            info!(
                event_id = %features.event_id,
                subject_id = %features.subject_id,
                action = %decision.action,
                final_score = decision.final_score,
                flags = ?decision.rule_flags,
                "risk decision"
            );
        } else {
            debug!(event_id = %features.event_id, final_score = decision.final_score, "allowed");
        }
        Ok(decision)
    }

    /// Synchronous path: extract, score, conclude.
    pub fn assess(&self, event: &Event) -> Result<Decision, RiskError> {
        let features = self.extract(event)?;
        let model_score = self.scorer.score(&features)?;
        self.conclude(&features, model_score)
    }
}

fn context_for(features: &FeatureVector) -> DecisionContext {
    let mut ctx = DecisionContext::new();
    ctx.insert("event_id".into(), Value::from(features.event_id.clone()));
    ctx.insert("subject_id".into(), Value::from(features.subject_id.clone()));
    ctx.insert("kind".into(), Value::from(features.kind.as_str()));
    ctx.insert("timestamp".into(), Value::from(features.ts.to_rfc3339()));
    ctx
}
