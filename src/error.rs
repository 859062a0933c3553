//! Error taxonomy: configuration (fatal), input (per event), dependency (model scorer), sink.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Malformed or missing configuration. Prevents any decision from being produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("threshold must contain keys low, medium, high; missing `{0}`")]
    MissingThresholdKey(&'static str),
    #[error("threshold `{key}` must be a number")]
    ThresholdNotNumber { key: &'static str },
    #[error("threshold order invalid: required 0.0 <= low ({low}) <= medium ({medium}) <= high ({high}) <= 1.0")]
    ThresholdOrder { low: f64, medium: f64, high: f64 },
    #[error("no thresholds configured and policy does not tolerate missing thresholds")]
    MissingThresholds,
    #[error("combiner alpha must be within [0, 1], got {0}")]
    InvalidAlpha(f64),
    #[error("store shard count must be a power of two greater than one, got {0}")]
    InvalidShardCount(usize),
    #[error("{field} must be greater than zero")]
    NonPositive { field: &'static str },
    #[error("config I/O error for {path}: {reason}")]
    Io { path: String, reason: String },
    #[error("config parse error for {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// A single event was rejected. The engine keeps running.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("line {line}: malformed event: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("event {event_id}: required field `{field}` is missing or empty")]
    MissingField { event_id: String, field: &'static str },
    #[error("event {event_id}: transaction amount must be positive, got {amount}")]
    NonPositiveAmount { event_id: String, amount: f64 },
    #[error("event {event_id}: coordinates out of range ({lat}, {lon})")]
    InvalidCoordinates { event_id: String, lat: f64, lon: f64 },
    #[error("event {event_id}: timestamp {ts} precedes last seen {last} for subject {subject_id}")]
    OutOfOrder {
        event_id: String,
        subject_id: String,
        ts: DateTime<Utc>,
        last: DateTime<Utc>,
    },
}

/// The model scorer could not produce a usable probability. No decision is fabricated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DependencyError {
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("model scoring failed: {0}")]
    Scoring(String),
    #[error("model returned out-of-range score {0}")]
    InvalidScore(f64),
    #[error("model scoring timed out after {0} ms")]
    Timeout(u64),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("crypto error: {0}")]
    Crypto(String),
}

/// Any failure on the path from event to decision.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Dependency(#[from] DependencyError),
    #[error("{name} must be within [0, 1], got {value}")]
    ScoreOutOfRange { name: &'static str, value: f64 },
}
