//! Risk agent: real-time fraud decisions from per-subject behavioral events.
//!
//! Modular structure:
//! - [`events`]: Event model and NDJSON ingestion
//! - [`state`]: Per-subject temporal state, sharded by subject
//! - [`features`]: Online temporal feature extraction
//! - [`rules`]: Weighted rule flags
//! - [`model`]: Statistical scorer boundary (linear, ONNX)
//! - [`decision`]: Thresholds, forced overrides and the reason trail
//! - [`risk`]: Engine wiring the stages together
//! - [`dispatch`]: Subject-partitioned async worker pool
//! - [`sink`]: NDJSON output and encrypted audit store
//! - [`logging`]: Structured JSON logging

pub mod config;
pub mod decision;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod features;
pub mod logging;
pub mod model;
pub mod risk;
pub mod rules;
pub mod sink;
pub mod state;

pub use config::AppConfig;
pub use decision::{Action, Decision, DecisionPipeline, DecisionPolicy, Thresholds};
pub use dispatch::{Dispatcher, Outcome};
pub use error::{ConfigError, DependencyError, InputError, RiskError, SinkError};
pub use events::{Event, EventKind};
pub use features::{FeatureVector, TemporalFeatureEngine};
pub use logging::StructuredLogger;
pub use model::{LinearScorer, ModelScorer};
pub use risk::RiskEngine;
pub use rules::{RuleEngine, RuleFlag};
pub use sink::{AuditStore, DecisionSink, JsonLinesSink};
pub use state::{EntityState, EntityStateStore};
