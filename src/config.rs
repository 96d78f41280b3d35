use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{KnowledgeError, KnowledgeResult};

const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_STATE_FILE: &str = "knowledge_base.json";
const DEFAULT_MAX_MEMORY: usize = 1000;
const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;
const DEFAULT_MAINTENANCE_SECS: u64 = 3600; // one hour

/// Longest accepted maintenance period (one year). The timer's first
/// deadline is `now + period`, which must stay representable.
pub const MAX_MAINTENANCE_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory for the default state file. Created on initialize.
    pub data_dir: PathBuf,
    pub state_file: String,
    /// Capacity of the recent-items buffer.
    pub max_memory: usize,
    /// Threshold used by `query_default`.
    pub confidence_threshold: f64,
    pub maintenance_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            state_file: DEFAULT_STATE_FILE.to_string(),
            max_memory: DEFAULT_MAX_MEMORY,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            maintenance_interval_secs: DEFAULT_MAINTENANCE_SECS,
        }
    }
}

impl EngineConfig {
    /// Reads a TOML config. Missing fields fall back to defaults.
    pub fn from_file(path: &Path) -> KnowledgeResult<Self> {
        let contents = fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&contents)
            .map_err(|e| KnowledgeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> KnowledgeResult<()> {
        if self.maintenance_interval_secs == 0 {
            return Err(KnowledgeError::Config(
                "maintenance_interval_secs must be positive".to_string(),
            ));
        }
        if self.maintenance_interval_secs > MAX_MAINTENANCE_SECS {
            return Err(KnowledgeError::Config(format!(
                "maintenance_interval_secs {} exceeds the maximum of {}",
                self.maintenance_interval_secs, MAX_MAINTENANCE_SECS
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(KnowledgeError::Config(format!(
                "confidence_threshold {} is outside [0.0, 1.0]",
                self.confidence_threshold
            )));
        }
        if self.state_file.trim().is_empty() {
            return Err(KnowledgeError::Config("state_file must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join(&self.state_file)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }
}
