//! Temporal feature engine: event + prior subject state → features, then state update.

use super::{haversine_km, FeatureVector};
use crate::config::FeaturesConfig;
use crate::error::InputError;
use crate::events::{Event, EventKind};
use crate::state::{EntityState, EntityStateStore};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Spread assumed, as a fraction of the prior mean, when the prior amounts have none.
const MIN_RELATIVE_SPREAD: f64 = 0.25;

pub struct TemporalFeatureEngine {
    window: Duration,
}

fn seconds_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    (later - earlier).num_milliseconds() as f64 / 1000.0
}

impl TemporalFeatureEngine {
    pub fn new(config: &FeaturesConfig) -> Self {
        let secs = i64::try_from(config.window_secs)
            .unwrap_or(i64::MAX)
            .clamp(1, i64::MAX / 1000);
        Self {
            window: Duration::seconds(secs),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Validate, lock the subject, reject out-of-order timestamps, then compute and commit.
    pub fn process(
        &self,
        store: &EntityStateStore,
        event: &Event,
    ) -> Result<FeatureVector, InputError> {
        event.validate()?;
        let handle = store.get_or_create(&event.subject_id);
        if let Some(last) = handle.state().last_event_at {
            if event.timestamp < last {
                return Err(InputError::OutOfOrder {
                    event_id: event.event_id.clone(),
                    subject_id: event.subject_id.clone(),
                    ts: event.timestamp,
                    last,
                });
            }
        }
        let features = handle.commit(|state| self.compute(event, state));
        debug!(
            event_id = %features.event_id,
            subject_id = %features.subject_id,
            kind = features.kind.as_str(),
            failed_login = features.failed_login_10min,
            distance_km = features.distance_from_last_location_km,
            "features computed"
        );
        Ok(features)
    }

    /// Features from the state as it was before `event`, then fold `event` into `state`.
    ///
    /// The event must already be validated and not precede `state.last_event_at`.
    /// Nothing here can fail, so the caller's update is all-or-nothing.
    pub fn compute(&self, event: &Event, state: &mut EntityState) -> FeatureVector {
        let now = event.timestamp;

        let new_device = !state.seen_devices.contains(&event.device_id);
        let new_ip = !state.seen_ips.contains(&event.ip);
        let counterparty = event.counterparty();
        let new_counterparty =
            counterparty.is_some_and(|c| !state.seen_counterparties.contains(c));

        let amount = event.transaction_amount();
        let (amount_deviation, amount_zscore) = match (amount, state.amount_mean()) {
            (Some(a), Some(mean)) => {
                let deviation = (a - mean).abs();
                let spread = match state.amount_std() {
                    Some(sd) if sd > 0.0 => sd,
                    // one prior amount or a constant baseline
                    _ => mean * MIN_RELATIVE_SPREAD,
                };
                (deviation, deviation / spread)
            }
            _ => (0.0, 0.0),
        };

        let distance_from_last_location_km = match (state.last_lat, state.last_lon) {
            (Some(lat), Some(lon)) => haversine_km(lat, lon, event.lat, event.lon),
            _ => 0.0,
        };

        let since = |last: Option<DateTime<Utc>>| last.map_or(0.0, |t| seconds_between(t, now));
        let login_reset_gap_s = match event.kind {
            EventKind::Login => state.last_reset_at.map(|t| seconds_between(t, now)),
            EventKind::ResetPassword => state.last_login_at.map(|t| seconds_between(t, now)),
            _ => None,
        };
        let time_since_last_login_s = since(state.last_login_at);
        let time_since_last_reset_s = since(state.last_reset_at);
        let time_since_last_txn_s = since(state.last_txn_at);

        let ip_changed = state.last_ip.as_deref().is_some_and(|ip| ip != event.ip);
        let device_changed = state
            .last_device
            .as_deref()
            .is_some_and(|d| d != event.device_id);

        let w = &mut state.windows;
        for window in [
            &mut w.login_fail,
            &mut w.login,
            &mut w.transaction,
            &mut w.ip_change,
            &mut w.device_change,
        ] {
            window.evict(now, self.window);
        }
        match event.kind {
            EventKind::LoginFail => w.login_fail.push(now),
            EventKind::Login => w.login.push(now),
            EventKind::Transaction => w.transaction.push(now),
            EventKind::ResetPassword => {}
        }
        if ip_changed {
            w.ip_change.push(now);
        }
        if device_changed {
            w.device_change.push(now);
        }

        let features = FeatureVector {
            event_id: event.event_id.clone(),
            subject_id: event.subject_id.clone(),
            ts: now,
            kind: event.kind,
            failed_login_10min: w.login_fail.len() as u32,
            new_device,
            new_ip,
            new_counterparty,
            amount_deviation,
            amount_zscore,
            distance_from_last_location_km,
            time_since_last_login_s,
            time_since_last_reset_s,
            time_since_last_txn_s,
            login_reset_gap_s,
            login_velocity_10min: w.login.len() as u32,
            txn_velocity_10min: w.transaction.len() as u32,
            ip_change_velocity_10min: w.ip_change.len() as u32,
            device_change_velocity_10min: w.device_change.len() as u32,
        };

        state.last_event_at = Some(now);
        state.last_lat = Some(event.lat);
        state.last_lon = Some(event.lon);
        match event.kind {
            EventKind::Login => state.last_login_at = Some(now),
            EventKind::ResetPassword => state.last_reset_at = Some(now),
            EventKind::Transaction => state.last_txn_at = Some(now),
            EventKind::LoginFail => {}
        }
        if let Some(a) = amount {
            state.observe_amount(a);
        }
        state.seen_devices.insert(event.device_id.clone());
        state.seen_ips.insert(event.ip.clone());
        if let Some(c) = counterparty {
            state.seen_counterparties.insert(c.to_string());
        }
        state.last_ip = Some(event.ip.clone());
        state.last_device = Some(event.device_id.clone());

        features
    }
}
