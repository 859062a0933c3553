//! Service configuration. Absent file → defaults; present but invalid → `ConfigError`.

use crate::decision::{CombinerConfig, Thresholds};
use crate::error::ConfigError;
use crate::rules::RuleFlag;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Data directory (audit store)
    pub data_dir: PathBuf,
    /// Temporal feature parameters
    pub features: FeaturesConfig,
    /// Rule predicate thresholds
    pub rules: RulesConfig,
    /// Thresholds, forced flags and score combination
    pub decision: DecisionConfig,
    /// Scorer backend
    pub model: ModelConfig,
    pub store: StoreConfig,
    pub dispatch: DispatchConfig,
    pub audit: AuditConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    /// Trailing window for velocity counts (seconds)
    pub window_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub failed_login_min: u32,
    pub amount_zscore_min: f64,
    pub txn_velocity_min: u32,
    /// Login and password reset this close together (seconds) count as instant
    pub login_reset_gap_max_s: f64,
    pub travel_km_min: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Inline thresholds; ignored when `thresholds_path` is set
    pub thresholds: Option<Thresholds>,
    /// JSON file with `low`, `medium`, `high`
    pub thresholds_path: Option<PathBuf>,
    pub tolerate_missing_threshold: bool,
    pub combiner: CombinerConfig,
    pub force_block: BTreeSet<RuleFlag>,
    pub force_otp: BTreeSet<RuleFlag>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelConfig {
    /// Logistic model weights in JSON
    Linear { path: PathBuf },
    /// ONNX classifier (requires the `onnx` feature)
    Onnx { path: PathBuf },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Shard count for the subject map; power of two
    pub shards: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Worker tasks; each subject is pinned to one
    pub workers: usize,
    /// Per-worker queue depth
    pub queue_depth: usize,
    /// Model call deadline (milliseconds)
    pub model_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    /// Secret for the payload key (in production: from a keystore)
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".risk-agent"),
            features: FeaturesConfig::default(),
            rules: RulesConfig::default(),
            decision: DecisionConfig::default(),
            model: ModelConfig::default(),
            store: StoreConfig::default(),
            dispatch: DispatchConfig::default(),
            audit: AuditConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self { window_secs: 600 }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            failed_login_min: 3,
            amount_zscore_min: 3.0,
            txn_velocity_min: 5,
            login_reset_gap_max_s: 10.0,
            travel_km_min: 500.0,
        }
    }
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::new(0.2, 0.5, 0.8).ok(),
            thresholds_path: None,
            tolerate_missing_threshold: false,
            combiner: CombinerConfig::default(),
            force_block: [RuleFlag::ImpossibleTravel, RuleFlag::HighAmountDeviation]
                .into_iter()
                .collect(),
            force_otp: [
                RuleFlag::NewDevice,
                RuleFlag::FirstTimeReceiver,
                RuleFlag::InstantPasswordReset,
            ]
            .into_iter()
            .collect(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig::Linear {
            path: PathBuf::from("model.json"),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { shards: 64 }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_depth: 1024,
            model_timeout_ms: 250,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            secret: "audit-secret-placeholder".to_string(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl DecisionConfig {
    /// Thresholds from `thresholds_path` if set, else the inline value. Missing file is an error.
    pub fn resolve_thresholds(&self) -> Result<Option<Thresholds>, ConfigError> {
        match &self.thresholds_path {
            Some(path) => Thresholds::load(path).map(Some),
            None => Ok(self.thresholds),
        }
    }
}

impl AppConfig {
    /// Load from JSON file if present; otherwise return defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let display = path.display().to_string();
        let data = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: display.clone(),
            reason: e.to_string(),
        })?;
        let config: AppConfig = serde_json::from_str(&data).map_err(|e| ConfigError::Parse {
            path: display,
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.features.window_secs == 0 {
            return Err(ConfigError::NonPositive {
                field: "features.window_secs",
            });
        }
        if self.store.shards < 2 || !self.store.shards.is_power_of_two() {
            return Err(ConfigError::InvalidShardCount(self.store.shards));
        }
        if self.dispatch.workers == 0 {
            return Err(ConfigError::NonPositive {
                field: "dispatch.workers",
            });
        }
        if self.dispatch.queue_depth == 0 {
            return Err(ConfigError::NonPositive {
                field: "dispatch.queue_depth",
            });
        }
        if self.dispatch.model_timeout_ms == 0 {
            return Err(ConfigError::NonPositive {
                field: "dispatch.model_timeout_ms",
            });
        }
        self.decision.combiner.build()?;
        Ok(())
    }
}
