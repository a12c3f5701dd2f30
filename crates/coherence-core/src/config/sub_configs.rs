//! Sub-configuration structures for the engine components.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};

use super::constants::{engine, identity, rollover, sync};

/// Score, decay and recovery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub initial_score: f64,
    pub decay_window_secs: u64,
    pub default_decay_rate: f64,
    pub anchored_decay_rate: f64,
    pub recovery_interval_ms: u64,
    pub default_recovery_step: f64,
    pub anchored_recovery_step: f64,
    pub unanchored_day_cap: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_score: engine::INITIAL_SCORE,
            decay_window_secs: engine::DECAY_WINDOW_SECS,
            default_decay_rate: engine::DEFAULT_DECAY_RATE,
            anchored_decay_rate: engine::ANCHORED_DECAY_RATE,
            recovery_interval_ms: engine::RECOVERY_INTERVAL_MS,
            default_recovery_step: engine::DEFAULT_RECOVERY_STEP,
            anchored_recovery_step: engine::ANCHORED_RECOVERY_STEP,
            unanchored_day_cap: engine::UNANCHORED_DAY_CAP,
        }
    }
}

impl EngineConfig {
    pub fn decay_window(&self) -> ChronoDuration {
        ChronoDuration::seconds(self.decay_window_secs as i64)
    }

    pub fn recovery_interval(&self) -> Duration {
        Duration::from_millis(self.recovery_interval_ms)
    }
}

/// Day rollover configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RolloverConfig {
    pub day_bonus: f64,
    pub transition_signal_ms: u64,
}

impl Default for RolloverConfig {
    fn default() -> Self {
        Self {
            day_bonus: rollover::DAY_BONUS,
            transition_signal_ms: rollover::TRANSITION_SIGNAL_MS,
        }
    }
}

impl RolloverConfig {
    pub fn transition_signal(&self) -> ChronoDuration {
        ChronoDuration::milliseconds(self.transition_signal_ms as i64)
    }
}

/// Sync trigger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    pub initial_sync_delay_ms: u64,
    pub transition_poll_ms: u64,
    pub backup_poll_ms: u64,
    pub backup_min_interval_ms: u64,
    pub backup_score_delta: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            initial_sync_delay_ms: sync::INITIAL_SYNC_DELAY_MS,
            transition_poll_ms: sync::TRANSITION_POLL_MS,
            backup_poll_ms: sync::BACKUP_POLL_MS,
            backup_min_interval_ms: sync::BACKUP_MIN_INTERVAL_MS,
            backup_score_delta: sync::BACKUP_SCORE_DELTA,
        }
    }
}

impl SyncConfig {
    pub fn initial_sync_delay(&self) -> Duration {
        Duration::from_millis(self.initial_sync_delay_ms)
    }

    pub fn transition_poll(&self) -> Duration {
        Duration::from_millis(self.transition_poll_ms)
    }

    pub fn backup_poll(&self) -> Duration {
        Duration::from_millis(self.backup_poll_ms)
    }
}

/// Local identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Key of the identity blob in the local store.
    pub storage_key: String,
    /// Directory for the file-backed local store. `None` keeps identity in memory.
    pub storage_dir: Option<PathBuf>,
    pub recovery_code_length: usize,
    pub recovery_code_ttl_secs: i64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            storage_key: identity::STORAGE_KEY.to_string(),
            storage_dir: None,
            recovery_code_length: identity::RECOVERY_CODE_LENGTH,
            recovery_code_ttl_secs: identity::RECOVERY_CODE_TTL_SECS,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            include_target: true,
        }
    }
}
