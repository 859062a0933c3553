//! Ordered predicate table; each hit adds its flag's weight. Total is capped at 1.0.

use super::RuleFlag;
use crate::config::RulesConfig;
use crate::features::FeatureVector;
use serde::{Deserialize, Serialize};

type Predicate = fn(&FeatureVector, &RulesConfig) -> bool;

fn failed_login_velocity(f: &FeatureVector, c: &RulesConfig) -> bool {
    f.failed_login_10min >= c.failed_login_min
}

fn new_device(f: &FeatureVector, _: &RulesConfig) -> bool {
    f.new_device
}

fn new_ip(f: &FeatureVector, _: &RulesConfig) -> bool {
    f.new_ip
}

fn high_amount_deviation(f: &FeatureVector, c: &RulesConfig) -> bool {
    f.amount_zscore >= c.amount_zscore_min
}

fn first_time_receiver(f: &FeatureVector, _: &RulesConfig) -> bool {
    f.new_counterparty
}

fn high_txn_velocity(f: &FeatureVector, c: &RulesConfig) -> bool {
    f.txn_velocity_10min >= c.txn_velocity_min
}

/// Fires in both directions: a login right after a password reset, and a password reset
/// right after a login.
fn instant_password_reset(f: &FeatureVector, c: &RulesConfig) -> bool {
    f.login_reset_gap_s
        .is_some_and(|gap| gap <= c.login_reset_gap_max_s)
}

fn impossible_travel(f: &FeatureVector, c: &RulesConfig) -> bool {
    f.distance_from_last_location_km >= c.travel_km_min
}

/// Evaluation order; also the order flags appear in the decision trail.
const RULES: [(RuleFlag, Predicate); 8] = [
    (RuleFlag::FailedLoginVelocity, failed_login_velocity),
    (RuleFlag::NewDevice, new_device),
    (RuleFlag::NewIp, new_ip),
    (RuleFlag::HighAmountDeviation, high_amount_deviation),
    (RuleFlag::FirstTimeReceiver, first_time_receiver),
    (RuleFlag::HighTxnVelocity, high_txn_velocity),
    (RuleFlag::InstantPasswordReset, instant_password_reset),
    (RuleFlag::ImpossibleTravel, impossible_travel),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    /// Sum of triggered weights, at most 1.0
    pub score: f64,
    pub flags: Vec<RuleFlag>,
}

pub struct RuleEngine {
    config: RulesConfig,
}

impl RuleEngine {
    pub fn new(config: RulesConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, features: &FeatureVector) -> RuleOutcome {
        let mut flags = Vec::new();
        let mut total = 0.0_f64;
        for (flag, predicate) in RULES.iter() {
            if predicate(features, &self.config) && !flags.contains(flag) {
                total += flag.weight();
                flags.push(*flag);
            }
        }
        RuleOutcome {
            score: total.min(1.0),
            flags,
        }
    }

    pub fn config(&self) -> &RulesConfig {
        &self.config
    }
}
