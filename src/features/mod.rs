//! Point-in-time behavioral features per event, computed from the subject's prior state.

mod engine;
mod geo;

pub use engine::TemporalFeatureEngine;
pub use geo::haversine_km;

use crate::events::EventKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Model input order. Count fields are named for the default 10 minute window.
pub const FEATURE_NAMES: [&str; 15] = [
    "failed_login_10min",
    "new_device",
    "new_ip",
    "new_counterparty",
    "amount_deviation",
    "amount_zscore",
    "distance_from_last_location_km",
    "time_since_last_login_s",
    "time_since_last_reset_s",
    "time_since_last_txn_s",
    "login_reset_gap_s",
    "login_velocity_10min",
    "txn_velocity_10min",
    "ip_change_velocity_10min",
    "device_change_velocity_10min",
];

/// Value fed to the model when no login/reset pair exists: one day.
const NO_LOGIN_RESET_GAP_S: f64 = 86_400.0;

/// Snapshot of signals for exactly one event. Owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub event_id: String,
    pub subject_id: String,
    pub ts: DateTime<Utc>,
    pub kind: EventKind,

    pub failed_login_10min: u32,
    pub new_device: bool,
    pub new_ip: bool,
    pub new_counterparty: bool,
    pub amount_deviation: f64,
    pub amount_zscore: f64,
    pub distance_from_last_location_km: f64,
    pub time_since_last_login_s: f64,
    pub time_since_last_reset_s: f64,
    pub time_since_last_txn_s: f64,
    /// Seconds between a login/reset and the latest event of the other kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_reset_gap_s: Option<f64>,
    pub login_velocity_10min: u32,
    pub txn_velocity_10min: u32,
    pub ip_change_velocity_10min: u32,
    pub device_change_velocity_10min: u32,
}

impl FeatureVector {
    /// Numeric values in [`FEATURE_NAMES`] order.
    pub fn as_model_input(&self) -> Vec<f32> {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        vec![
            self.failed_login_10min as f32,
            flag(self.new_device),
            flag(self.new_ip),
            flag(self.new_counterparty),
            self.amount_deviation as f32,
            self.amount_zscore as f32,
            self.distance_from_last_location_km as f32,
            self.time_since_last_login_s as f32,
            self.time_since_last_reset_s as f32,
            self.time_since_last_txn_s as f32,
            self.login_reset_gap_s.unwrap_or(NO_LOGIN_RESET_GAP_S) as f32,
            self.login_velocity_10min as f32,
            self.txn_velocity_10min as f32,
            self.ip_change_velocity_10min as f32,
            self.device_change_velocity_10min as f32,
        ]
    }

    /// Value of a named feature, as used by the linear scorer.
    pub fn get(&self, name: &str) -> Option<f64> {
        let idx = FEATURE_NAMES.iter().position(|n| *n == name)?;
        self.as_model_input().get(idx).map(|v| *v as f64)
    }
}
