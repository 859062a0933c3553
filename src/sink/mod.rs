//! Where decisions go once made: NDJSON stream and the encrypted audit store.

mod audit;
mod json;

pub use audit::{AuditRecord, AuditStore};
pub use json::JsonLinesSink;

use crate::decision::Decision;
use crate::error::SinkError;

pub trait DecisionSink: Send + Sync {
    fn record(&self, decision: &Decision) -> Result<(), SinkError>;
}

/// Fan out to several sinks; the first failure stops the chain.
impl<S: DecisionSink> DecisionSink for [S] {
    fn record(&self, decision: &Decision) -> Result<(), SinkError> {
        self.iter().try_for_each(|s| s.record(decision))
    }
}

impl<S: DecisionSink + ?Sized> DecisionSink for Box<S> {
    fn record(&self, decision: &Decision) -> Result<(), SinkError> {
        (**self).record(decision)
    }
}
