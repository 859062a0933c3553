//! Behavioral events (login, failed login, password reset, transaction) and their ingestion.

mod reader;

pub use reader::{parse_event_line, EventReader};

use crate::error::InputError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Login,
    LoginFail,
    ResetPassword,
    Transaction,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Login => "login",
            EventKind::LoginFail => "login_fail",
            EventKind::ResetPassword => "reset_password",
            EventKind::Transaction => "transaction",
        }
    }
}

/// One behavioral event for a subject. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default = "new_event_id")]
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(alias = "user_id")]
    pub subject_id: String,
    pub device_id: String,
    pub ip: String,
    #[serde(alias = "event_type")]
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, alias = "receiver_id", skip_serializing_if = "Option::is_none")]
    pub counterparty_id: Option<String>,
    pub lat: f64,
    pub lon: f64,
}

fn new_event_id() -> String {
    Uuid::new_v4().to_string()
}

impl Event {
    /// Non-transaction event at `timestamp`; amount and counterparty stay empty.
    pub fn new(
        kind: EventKind,
        timestamp: DateTime<Utc>,
        subject_id: impl Into<String>,
        device_id: impl Into<String>,
        ip: impl Into<String>,
        (lat, lon): (f64, f64),
    ) -> Self {
        Self {
            event_id: new_event_id(),
            timestamp,
            subject_id: subject_id.into(),
            device_id: device_id.into(),
            ip: ip.into(),
            kind,
            amount: None,
            counterparty_id: None,
            lat,
            lon,
        }
    }

    /// Turn the event into a transaction of `amount` to `counterparty_id`.
    pub fn with_transaction(mut self, amount: f64, counterparty_id: impl Into<String>) -> Self {
        self.kind = EventKind::Transaction;
        self.amount = Some(amount);
        self.counterparty_id = Some(counterparty_id.into());
        self
    }

    pub fn with_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = event_id.into();
        self
    }

    /// Field-level checks. Per-subject ordering is checked against state by the feature engine.
    pub fn validate(&self) -> Result<(), InputError> {
        let missing = |field| InputError::MissingField {
            event_id: self.event_id.clone(),
            field,
        };
        if self.subject_id.trim().is_empty() {
            return Err(missing("subject_id"));
        }
        if self.device_id.trim().is_empty() {
            return Err(missing("device_id"));
        }
        if self.ip.trim().is_empty() {
            return Err(missing("ip"));
        }
        let lat_ok = self.lat.is_finite() && (-90.0..=90.0).contains(&self.lat);
        let lon_ok = self.lon.is_finite() && (-180.0..=180.0).contains(&self.lon);
        if !lat_ok || !lon_ok {
            return Err(InputError::InvalidCoordinates {
                event_id: self.event_id.clone(),
                lat: self.lat,
                lon: self.lon,
            });
        }
        if self.kind == EventKind::Transaction {
            let amount = self.amount.ok_or_else(|| missing("amount"))?;
            if !(amount.is_finite() && amount > 0.0) {
                return Err(InputError::NonPositiveAmount {
                    event_id: self.event_id.clone(),
                    amount,
                });
            }
        }
        Ok(())
    }

    /// Amount of a valid transaction; `None` for every other kind.
    pub fn transaction_amount(&self) -> Option<f64> {
        match self.kind {
            EventKind::Transaction => self.amount.filter(|a| *a > 0.0),
            _ => None,
        }
    }

    pub fn counterparty(&self) -> Option<&str> {
        match self.kind {
            EventKind::Transaction => self
                .counterparty_id
                .as_deref()
                .filter(|c| !c.trim().is_empty()),
            _ => None,
        }
    }
}
