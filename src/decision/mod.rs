//! Scores + rule flags + thresholds → auditable action (ALLOW / OTP / BLOCK).

mod combine;
mod pipeline;
mod thresholds;

pub use combine::{CombinerConfig, MeanCombiner, ScoreCombiner, WeightedCombiner};
pub use pipeline::{DecisionPipeline, DecisionPolicy};
pub use thresholds::{ThresholdCell, Thresholds};

use crate::rules::RuleFlag;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Free-form audit context attached to a decision (event id, subject, …). Ordered for
/// deterministic output.
pub type DecisionContext = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Allow,
    Otp,
    Block,
}

impl Action {
    /// Lower edges are inclusive: `score == medium` is OTP, `score == high` is BLOCK.
    pub fn from_score(score: f64, thresholds: &Thresholds) -> Self {
        if score >= thresholds.high() {
            Action::Block
        } else if score >= thresholds.medium() {
            Action::Otp
        } else {
            Action::Allow
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allow => "ALLOW",
            Action::Otp => "OTP",
            Action::Block => "BLOCK",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reason trail entries.
pub mod reason {
    pub const FORCED_BY_RULE_FLAG: &str = "forced_by_rule_flag";
    pub const SCORE_HIGH: &str = "score>=high_threshold";
    pub const SCORE_MEDIUM: &str = "medium_threshold<=score<high_threshold";
    pub const SCORE_LOW: &str = "score<medium_threshold";

    pub fn rule(flag: crate::rules::RuleFlag) -> String {
        format!("rule:{}", flag)
    }
}

/// Outcome for one event. Built once by the pipeline and only read afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    pub final_score: f64,
    pub model_score: f64,
    pub rule_score: f64,
    pub rule_flags: Vec<RuleFlag>,
    /// `None` only when the policy tolerates missing thresholds and a flag forced the action
    pub threshold_used: Option<Thresholds>,
    pub reasons: Vec<String>,
    pub context: DecisionContext,
}

impl Decision {
    pub fn event_id(&self) -> Option<&str> {
        self.context.get("event_id").and_then(|v| v.as_str())
    }

    pub fn subject_id(&self) -> Option<&str> {
        self.context.get("subject_id").and_then(|v| v.as_str())
    }
}
