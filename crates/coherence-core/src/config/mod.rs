//! Configuration management for the coherence engine.

pub mod constants;
mod sub_configs;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

pub use sub_configs::{EngineConfig, IdentityConfig, LoggingConfig, RolloverConfig, SyncConfig};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub rollover: RolloverConfig,
    pub sync: SyncConfig,
    pub identity: IdentityConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from files and environment.
    ///
    /// Configuration is loaded in order:
    /// 1. config/default.toml (base settings)
    /// 2. config/{COHERENCE_ENV}.toml (environment-specific)
    /// 3. Environment variables with COHERENCE__ prefix, e.g.
    ///    `COHERENCE__SYNC__BACKUP_POLL_MS=15000`
    pub fn load() -> CoreResult<Self> {
        let env = std::env::var("COHERENCE_ENV").unwrap_or_else(|_| "development".to_string());

        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                config::Environment::with_prefix("COHERENCE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults for tests and the simulator.
    pub fn default_config() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> CoreResult<()> {
        let e = &self.engine;
        if !(0.0..=100.0).contains(&e.initial_score) {
            return Err(CoreError::ConfigError(format!(
                "engine.initial_score must be in [0, 100], got {}",
                e.initial_score
            )));
        }
        if e.decay_window_secs == 0 {
            return Err(CoreError::ConfigError(
                "engine.decay_window_secs must be greater than 0".into(),
            ));
        }
        if e.default_decay_rate < 0.0 || e.anchored_decay_rate < 0.0 {
            return Err(CoreError::ConfigError("decay rates must be non-negative".into()));
        }
        if e.anchored_decay_rate >= e.default_decay_rate {
            return Err(CoreError::ConfigError(format!(
                "engine.anchored_decay_rate ({}) must be lower than engine.default_decay_rate ({})",
                e.anchored_decay_rate, e.default_decay_rate
            )));
        }
        if e.anchored_recovery_step < e.default_recovery_step {
            return Err(CoreError::ConfigError(format!(
                "engine.anchored_recovery_step ({}) must not be lower than engine.default_recovery_step ({})",
                e.anchored_recovery_step, e.default_recovery_step
            )));
        }
        if e.unanchored_day_cap == 0 {
            return Err(CoreError::ConfigError(
                "engine.unanchored_day_cap must be at least 1".into(),
            ));
        }

        if self.rollover.day_bonus < 0.0 {
            return Err(CoreError::ConfigError(
                "rollover.day_bonus must be non-negative".into(),
            ));
        }

        for (name, value) in [
            ("engine.recovery_interval_ms", e.recovery_interval_ms),
            ("sync.initial_sync_delay_ms", self.sync.initial_sync_delay_ms),
            ("sync.transition_poll_ms", self.sync.transition_poll_ms),
            ("sync.backup_poll_ms", self.sync.backup_poll_ms),
        ] {
            if value == 0 {
                return Err(CoreError::ConfigError(format!("{} must be greater than 0", name)));
            }
        }
        if self.sync.backup_score_delta < 0.0 {
            return Err(CoreError::ConfigError(
                "sync.backup_score_delta must be non-negative".into(),
            ));
        }

        if self.identity.storage_key.trim().is_empty() {
            return Err(CoreError::ConfigError("identity.storage_key must not be empty".into()));
        }
        if self.identity.recovery_code_length < 4 {
            return Err(CoreError::ConfigError(
                "identity.recovery_code_length must be at least 4".into(),
            ));
        }

        Ok(())
    }
}
