//! Forced-flag precedence first (BLOCK over OTP), then score thresholds.

use super::{reason, Action, Decision, DecisionContext, ScoreCombiner, ThresholdCell, Thresholds};
use crate::config::DecisionConfig;
use crate::error::{ConfigError, RiskError};
use crate::rules::RuleFlag;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Immutable decision policy, passed explicitly to the pipeline.
#[derive(Debug, Clone)]
pub struct DecisionPolicy {
    pub force_block: BTreeSet<RuleFlag>,
    pub force_otp: BTreeSet<RuleFlag>,
    pub combiner: Arc<dyn ScoreCombiner>,
    /// Start without thresholds; only flag-forced decisions can then be produced
    pub tolerate_missing_threshold: bool,
}

impl DecisionPolicy {
    pub fn from_config(config: &DecisionConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            force_block: config.force_block.clone(),
            force_otp: config.force_otp.clone(),
            combiner: config.combiner.build()?,
            tolerate_missing_threshold: config.tolerate_missing_threshold,
        })
    }

    /// BLOCK if any flag is in `force_block`, else OTP if any is in `force_otp`.
    pub fn forced_action(&self, flags: &[RuleFlag]) -> Option<Action> {
        if flags.iter().any(|f| self.force_block.contains(f)) {
            Some(Action::Block)
        } else if flags.iter().any(|f| self.force_otp.contains(f)) {
            Some(Action::Otp)
        } else {
            None
        }
    }
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        let config = DecisionConfig::default();
        Self {
            force_block: config.force_block,
            force_otp: config.force_otp,
            combiner: Arc::new(super::MeanCombiner),
            tolerate_missing_threshold: false,
        }
    }
}

pub struct DecisionPipeline {
    policy: DecisionPolicy,
    thresholds: ThresholdCell,
}

fn check_unit(name: &'static str, value: f64) -> Result<f64, RiskError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(RiskError::ScoreOutOfRange { name, value })
    }
}

impl DecisionPipeline {
    pub fn new(policy: DecisionPolicy, thresholds: Option<Thresholds>) -> Result<Self, ConfigError> {
        if thresholds.is_none() && !policy.tolerate_missing_threshold {
            return Err(ConfigError::MissingThresholds);
        }
        Ok(Self {
            policy,
            thresholds: ThresholdCell::new(thresholds),
        })
    }

    pub fn from_config(config: &DecisionConfig) -> Result<Self, ConfigError> {
        Self::new(
            DecisionPolicy::from_config(config)?,
            config.resolve_thresholds()?,
        )
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    pub fn thresholds(&self) -> Option<Thresholds> {
        self.thresholds.get()
    }

    pub fn set_thresholds(&self, thresholds: Thresholds) {
        self.thresholds.set(thresholds);
    }

    pub fn reload_thresholds(&self, path: &Path) -> Result<Thresholds, ConfigError> {
        self.thresholds.reload_from(path)
    }

    /// Combine scores with the policy's combiner, then decide.
    pub fn decide(
        &self,
        model_score: f64,
        rule_score: f64,
        rule_flags: &[RuleFlag],
        context: DecisionContext,
    ) -> Result<Decision, RiskError> {
        let model_score = check_unit("model_score", model_score)?;
        let rule_score = check_unit("rule_score", rule_score)?;
        let final_score = self.policy.combiner.combine(model_score, rule_score);
        self.decide_with_score(final_score, model_score, rule_score, rule_flags, context)
    }

    /// Decide from an already combined `final_score`.
    pub fn decide_with_score(
        &self,
        final_score: f64,
        model_score: f64,
        rule_score: f64,
        rule_flags: &[RuleFlag],
        context: DecisionContext,
    ) -> Result<Decision, RiskError> {
        // one snapshot per decision
        let threshold = self.thresholds.get();
        if threshold.is_none() && !self.policy.tolerate_missing_threshold {
            return Err(ConfigError::MissingThresholds.into());
        }
        let final_score = check_unit("final_score", final_score)?;

        let mut reasons = Vec::with_capacity(rule_flags.len() + 1);
        let action = match self.policy.forced_action(rule_flags) {
            Some(action) => {
                reasons.push(reason::FORCED_BY_RULE_FLAG.to_string());
                action
            }
            None => {
                let t = threshold.ok_or(ConfigError::MissingThresholds)?;
                let action = Action::from_score(final_score, &t);
                let why = match action {
                    Action::Block => reason::SCORE_HIGH,
                    Action::Otp => reason::SCORE_MEDIUM,
                    Action::Allow => reason::SCORE_LOW,
                };
                reasons.push(why.to_string());
                action
            }
        };
        reasons.extend(rule_flags.iter().map(|f| reason::rule(*f)));

        let decision = Decision {
            action,
            final_score,
            model_score,
            rule_score,
            rule_flags: rule_flags.to_vec(),
            threshold_used: threshold,
            reasons,
            context,
        };
        debug!(
            action = %decision.action,
            final_score = decision.final_score,
            flags = ?decision.rule_flags,
            reasons = ?decision.reasons,
            "decision made"
        );
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::WeightedCombiner;

    fn pipeline() -> DecisionPipeline {
        DecisionPipeline::new(
            DecisionPolicy::default(),
            Thresholds::new(0.2, 0.5, 0.8).ok(),
        )
        .unwrap()
    }

    #[test]
    fn forced_block_beats_low_score() {
        let d = pipeline()
            .decide_with_score(0.01, 0.01, 0.3, &[RuleFlag::ImpossibleTravel], DecisionContext::new())
            .unwrap();
        assert_eq!(d.action, Action::Block);
        assert_eq!(d.reasons, vec!["forced_by_rule_flag", "rule:impossible_travel"]);
    }

    #[test]
    fn block_dominates_otp() {
        let flags = [RuleFlag::NewDevice, RuleFlag::HighAmountDeviation];
        let d = pipeline()
            .decide_with_score(0.0, 0.0, 0.5, &flags, DecisionContext::new())
            .unwrap();
        assert_eq!(d.action, Action::Block);
        assert_eq!(
            d.reasons,
            vec![
                "forced_by_rule_flag",
                "rule:new_device",
                "rule:high_amount_deviation"
            ]
        );
    }

    #[test]
    fn forced_otp() {
        let d = pipeline()
            .decide_with_score(0.95, 0.9, 0.2, &[RuleFlag::FirstTimeReceiver], DecisionContext::new())
            .unwrap();
        // forced OTP applies even above the high threshold
        assert_eq!(d.action, Action::Otp);
    }

    #[test]
    fn score_fallback_bands() {
        let p = pipeline();
        let d = p.decide_with_score(0.85, 0.9, 0.8, &[], DecisionContext::new()).unwrap();
        assert_eq!(d.action, Action::Block);
        assert!(d.reasons.contains(&"score>=high_threshold".to_string()));

        let d = p.decide_with_score(0.5, 0.5, 0.5, &[], DecisionContext::new()).unwrap();
        assert_eq!(d.action, Action::Otp);
        assert_eq!(d.reasons, vec!["medium_threshold<=score<high_threshold"]);

        let d = p
            .decide_with_score(0.49, 0.5, 0.15, &[RuleFlag::NewIp], DecisionContext::new())
            .unwrap();
        assert_eq!(d.action, Action::Allow);
        assert_eq!(d.reasons, vec!["score<medium_threshold", "rule:new_ip"]);
        assert_eq!(d.threshold_used, Thresholds::new(0.2, 0.5, 0.8).ok());
    }

    #[test]
    fn decide_combines_with_policy() {
        let d = pipeline().decide(0.6, 0.4, &[], DecisionContext::new()).unwrap();
        assert!((d.final_score - 0.5).abs() < 1e-12);
        assert_eq!(d.action, Action::Otp);

        let policy = DecisionPolicy {
            combiner: Arc::new(WeightedCombiner::new(1.0).unwrap()),
            ..DecisionPolicy::default()
        };
        let p = DecisionPipeline::new(policy, Thresholds::new(0.2, 0.5, 0.8).ok()).unwrap();
        let d = p.decide(0.9, 0.0, &[], DecisionContext::new()).unwrap();
        assert_eq!(d.action, Action::Block);
    }

    #[test]
    fn missing_thresholds() {
        assert_eq!(
            DecisionPipeline::new(DecisionPolicy::default(), None).err(),
            Some(ConfigError::MissingThresholds)
        );

        let tolerant = DecisionPolicy {
            tolerate_missing_threshold: true,
            ..DecisionPolicy::default()
        };
        let p = DecisionPipeline::new(tolerant, None).unwrap();
        let d = p
            .decide_with_score(0.1, 0.1, 0.2, &[RuleFlag::NewDevice], DecisionContext::new())
            .unwrap();
        assert_eq!(d.action, Action::Otp);
        assert_eq!(d.threshold_used, None);
        // never fall back to ALLOW without thresholds
        assert_eq!(
            p.decide_with_score(0.1, 0.1, 0.0, &[], DecisionContext::new()),
            Err(RiskError::Config(ConfigError::MissingThresholds))
        );
    }

    #[test]
    fn scores_outside_unit_interval_are_rejected() {
        let p = pipeline();
        assert!(matches!(
            p.decide(1.2, 0.0, &[], DecisionContext::new()),
            Err(RiskError::ScoreOutOfRange { name: "model_score", .. })
        ));
        assert!(p
            .decide_with_score(f64::NAN, 0.0, 0.0, &[], DecisionContext::new())
            .is_err());
    }

    #[test]
    fn deterministic_output() {
        let p = pipeline();
        let flags = [RuleFlag::NewIp, RuleFlag::FailedLoginVelocity];
        let a = p.decide(0.3, 0.4, &flags, DecisionContext::new()).unwrap();
        let b = p.decide(0.3, 0.4, &flags, DecisionContext::new()).unwrap();
        assert_eq!(a, b);
    }
}
