//! Controller configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, Result};

/// Default reconciliation interval in seconds.
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 15;

/// Default cache-sync polling interval in milliseconds.
pub const DEFAULT_SYNC_POLL_INTERVAL_MS: u64 = 100;

/// Default taint key prefix marking system nodes.
pub const DEFAULT_SYSTEM_TAINT_PREFIX: &str = "gamefleet.dev/";

/// Configuration for the metrics controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ControllerConfig {
    /// Seconds between reconciliation ticks.
    pub resync_interval_secs: u64,
    /// Milliseconds between cache-sync readiness checks at startup.
    pub sync_poll_interval_ms: u64,
    /// Nodes with a taint key starting with this prefix are not counted.
    pub system_taint_prefix: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            resync_interval_secs: DEFAULT_RESYNC_INTERVAL_SECS,
            sync_poll_interval_ms: DEFAULT_SYNC_POLL_INTERVAL_MS,
            system_taint_prefix: DEFAULT_SYSTEM_TAINT_PREFIX.to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            MetricsError::Config(format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| MetricsError::Config(format!("invalid TOML: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an interval is zero or the taint prefix is empty.
    pub fn validate(&self) -> Result<()> {
        if self.resync_interval_secs == 0 {
            return Err(MetricsError::Config(
                "resync_interval_secs must be greater than 0".to_string(),
            ));
        }

        if self.sync_poll_interval_ms == 0 {
            return Err(MetricsError::Config(
                "sync_poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.system_taint_prefix.is_empty() {
            return Err(MetricsError::Config(
                "system_taint_prefix cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Reconciliation interval.
    #[must_use]
    pub const fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    /// Cache-sync polling interval.
    #[must_use]
    pub const fn sync_poll_interval(&self) -> Duration {
        Duration::from_millis(self.sync_poll_interval_ms)
    }
}
