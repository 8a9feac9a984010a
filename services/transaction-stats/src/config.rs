//! Transaction statistics configuration

use crate::error::{StatsError, StatsResult};
use serde::{Deserialize, Serialize};
use services_common::{DEFAULT_CHANNEL_SIZE, DEFAULT_TOP_K};
use std::path::{Path, PathBuf};

/// Order in which stored transactions are replayed into a fresh engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayOrder {
    /// Store insertion order; reproduces live tie-breaking exactly
    #[default]
    Insertion,
    /// Transaction timestamp, insertion order among equal timestamps
    Timestamp,
}

/// Statistics service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    /// Number of highest-amount transactions to keep (K)
    pub top_k: usize,

    /// Bounded capacity of the update dispatcher queue
    pub dispatcher_queue_capacity: usize,

    /// Transaction journal file
    pub journal_path: PathBuf,

    /// Replay order used during recovery
    pub replay_order: ReplayOrder,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            dispatcher_queue_capacity: DEFAULT_CHANNEL_SIZE,
            journal_path: PathBuf::from("./data/transactions.journal"),
            replay_order: ReplayOrder::Insertion,
        }
    }
}

impl StatisticsConfig {
    /// Load configuration from a JSON file; missing fields take defaults
    pub fn from_file(path: &Path) -> StatsResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| StatsError::Configuration {
            message: format!("{}: {e}", path.display()),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject unusable settings
    pub fn validate(&self) -> StatsResult<()> {
        if self.top_k == 0 {
            return Err(StatsError::Configuration {
                message: "top_k must be at least 1".to_string(),
            });
        }
        if self.dispatcher_queue_capacity == 0 {
            return Err(StatsError::Configuration {
                message: "dispatcher_queue_capacity must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
