//! Ordered score thresholds and an atomically swappable holder for them.

use crate::error::ConfigError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::info;

/// `0.0 <= low <= medium <= high <= 1.0`, checked on every construction path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct Thresholds {
    low: f64,
    medium: f64,
    high: f64,
}

impl Thresholds {
    pub fn new(low: f64, medium: f64, high: f64) -> Result<Self, ConfigError> {
        // written so NaN fails too
        let ordered = 0.0 <= low && low <= medium && medium <= high && high <= 1.0;
        if !ordered {
            return Err(ConfigError::ThresholdOrder { low, medium, high });
        }
        Ok(Self { low, medium, high })
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn medium(&self) -> f64 {
        self.medium
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    /// Build from a JSON object with numeric `low`, `medium`, `high`.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let key = |name: &'static str| -> Result<f64, ConfigError> {
            let v = value
                .get(name)
                .ok_or(ConfigError::MissingThresholdKey(name))?;
            v.as_f64()
                .ok_or(ConfigError::ThresholdNotNumber { key: name })
        };
        Self::new(key("low")?, key("medium")?, key("high")?)
    }

    /// Read thresholds from a JSON file. A missing file is an error, never a default.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let data = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: display.clone(),
            reason: e.to_string(),
        })?;
        let value: Value = serde_json::from_str(&data).map_err(|e| ConfigError::Parse {
            path: display,
            reason: e.to_string(),
        })?;
        Self::from_value(&value)
    }
}

impl TryFrom<Value> for Thresholds {
    type Error = ConfigError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(&value)
    }
}

/// Current thresholds. Readers copy one consistent snapshot; reloads validate before swapping.
#[derive(Debug, Default)]
pub struct ThresholdCell {
    current: RwLock<Option<Thresholds>>,
}

impl ThresholdCell {
    pub fn new(initial: Option<Thresholds>) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }

    pub fn get(&self) -> Option<Thresholds> {
        *self.current.read()
    }

    pub fn set(&self, thresholds: Thresholds) {
        *self.current.write() = Some(thresholds);
    }

    /// Load and validate `path`, then swap. On error the previous thresholds stay in force.
    pub fn reload_from(&self, path: &Path) -> Result<Thresholds, ConfigError> {
        let next = Thresholds::load(path)?;
        self.set(next);
        info!(
            path = %path.display(),
            low = next.low,
            medium = next.medium,
            high = next.high,
            "thresholds reloaded"
        );
        Ok(next)
    }
}
