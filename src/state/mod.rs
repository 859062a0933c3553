//! Per-subject mutable aggregates, created lazily and kept for the life of the process.

mod store;
mod window;

pub use store::{EntityStateStore, SubjectHandle};
pub use window::SlidingWindow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Velocity windows tracked per subject.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VelocityWindows {
    pub login_fail: SlidingWindow,
    pub login: SlidingWindow,
    pub transaction: SlidingWindow,
    /// Events whose ip differs from the previous event's
    pub ip_change: SlidingWindow,
    /// Events whose device differs from the previous event's
    pub device_change: SlidingWindow,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    /// Timestamp of the latest folded event; later events may not precede it
    pub last_event_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_reset_at: Option<DateTime<Utc>>,
    pub last_txn_at: Option<DateTime<Utc>>,

    // Membership only; no retention policy.
    pub seen_devices: HashSet<String>,
    pub seen_ips: HashSet<String>,
    pub seen_counterparties: HashSet<String>,

    /// Prior transaction amounts: count, sum and Welford second moment
    pub amount_count: u64,
    pub amount_sum: f64,
    pub amount_m2: f64,

    pub last_lat: Option<f64>,
    pub last_lon: Option<f64>,
    pub last_ip: Option<String>,
    pub last_device: Option<String>,

    pub windows: VelocityWindows,
}

impl EntityState {
    /// Mean of prior transaction amounts, if any.
    pub fn amount_mean(&self) -> Option<f64> {
        (self.amount_count > 0).then(|| self.amount_sum / self.amount_count as f64)
    }

    /// Sample standard deviation of prior amounts; needs two observations.
    pub fn amount_std(&self) -> Option<f64> {
        (self.amount_count > 1).then(|| (self.amount_m2 / (self.amount_count - 1) as f64).sqrt())
    }

    /// Fold one amount into the running statistics.
    pub fn observe_amount(&mut self, amount: f64) {
        let mean_before = self.amount_mean().unwrap_or(0.0);
        self.amount_count += 1;
        self.amount_sum += amount;
        let mean_after = self.amount_sum / self.amount_count as f64;
        self.amount_m2 += (amount - mean_before) * (amount - mean_after);
    }
}
