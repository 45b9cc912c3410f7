//! Engine configuration
//!
//! Loaded from an optional JSON file. Every field has a default, so an empty
//! object (or no file at all) yields a working configuration:
//!
//! ```json
//! {
//!   "lock_timeout_ms": 3000,
//!   "max_consecutive_failures": 3,
//!   "reserved_poll_interval_secs": 60,
//!   "recurring_sweep_interval_secs": 86400,
//!   "log_level": "info"
//! }
//! ```

use crate::types::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Tunables of the executor, the orchestrator and the sweep scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum wait for each account lock
    pub lock_timeout_ms: u64,

    /// Consecutive failures after which a scheduled transfer is paused
    pub max_consecutive_failures: u32,

    /// Period of the reserved-transfer poll
    pub reserved_poll_interval_secs: u64,

    /// Period of the recurring and expiry sweeps
    pub recurring_sweep_interval_secs: u64,

    /// Default log filter; `RUST_LOG` takes precedence
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 3000,
            max_consecutive_failures: 3,
            reserved_poll_interval_secs: 60,
            recurring_sweep_interval_secs: 86_400,
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration file
    ///
    /// # Errors
    ///
    /// - `ConfigError::Io` if the file cannot be read
    /// - `ConfigError::Parse` if it is not a valid configuration object
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Parse `path` when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Replace zero values with defaults, warning for each
    ///
    /// Called once logging is up so the warnings are visible.
    pub fn normalized(self) -> Self {
        let default = Self::default();

        let lock_timeout_ms = non_zero(
            "lock_timeout_ms",
            self.lock_timeout_ms,
            default.lock_timeout_ms,
        );
        let max_consecutive_failures = non_zero(
            "max_consecutive_failures",
            self.max_consecutive_failures,
            default.max_consecutive_failures,
        );
        let reserved_poll_interval_secs = non_zero(
            "reserved_poll_interval_secs",
            self.reserved_poll_interval_secs,
            default.reserved_poll_interval_secs,
        );
        let recurring_sweep_interval_secs = non_zero(
            "recurring_sweep_interval_secs",
            self.recurring_sweep_interval_secs,
            default.recurring_sweep_interval_secs,
        );
        let log_level = if self.log_level.trim().is_empty() {
            warn!(default = %default.log_level, "empty log_level, using default");
            default.log_level
        } else {
            self.log_level
        };

        Self {
            lock_timeout_ms,
            max_consecutive_failures,
            reserved_poll_interval_secs,
            recurring_sweep_interval_secs,
            log_level,
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn reserved_poll_interval(&self) -> Duration {
        Duration::from_secs(self.reserved_poll_interval_secs)
    }

    pub fn recurring_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.recurring_sweep_interval_secs)
    }
}

fn non_zero<T>(field: &str, value: T, default: T) -> T
where
    T: Copy + PartialEq + Default + std::fmt::Display,
{
    if value == T::default() {
        warn!(field, value = %value, default = %default, "invalid zero value, using default");
        default
    } else {
        value
    }
}
