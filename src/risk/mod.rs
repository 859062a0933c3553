//! End-to-end risk assessment: features → rules + model → decision.

mod engine;

pub use engine::RiskEngine;
