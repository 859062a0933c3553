//! Deterministic business rules over a feature vector.

mod engine;

pub use engine::{RuleEngine, RuleOutcome};

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleFlag {
    FailedLoginVelocity,
    NewDevice,
    NewIp,
    HighAmountDeviation,
    FirstTimeReceiver,
    HighTxnVelocity,
    InstantPasswordReset,
    ImpossibleTravel,
}

impl RuleFlag {
    pub fn weight(&self) -> f64 {
        match self {
            RuleFlag::FailedLoginVelocity => 0.25,
            RuleFlag::NewDevice => 0.20,
            RuleFlag::NewIp => 0.15,
            RuleFlag::HighAmountDeviation => 0.30,
            RuleFlag::FirstTimeReceiver => 0.15,
            RuleFlag::HighTxnVelocity => 0.25,
            RuleFlag::InstantPasswordReset => 0.20,
            RuleFlag::ImpossibleTravel => 0.30,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleFlag::FailedLoginVelocity => "failed_login_velocity",
            RuleFlag::NewDevice => "new_device",
            RuleFlag::NewIp => "new_ip",
            RuleFlag::HighAmountDeviation => "high_amount_deviation",
            RuleFlag::FirstTimeReceiver => "first_time_receiver",
            RuleFlag::HighTxnVelocity => "high_txn_velocity",
            RuleFlag::InstantPasswordReset => "instant_password_reset",
            RuleFlag::ImpossibleTravel => "impossible_travel",
        }
    }
}

impl fmt::Display for RuleFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
