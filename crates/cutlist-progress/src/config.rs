//! Tracker configuration

use anyhow::Context;
use cutlist_common::{CutlistError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Tracker Configuration Constants
// ============================================================================

/// Idle time after the last update before a session may be evicted (30 minutes).
pub const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;

/// Interval between background eviction passes (5 minutes).
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 5 * 60;

/// Session store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub session_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

impl TrackerConfig {
    /// Load from `.env` and the environment, then validate.
    ///
    /// - `PROGRESS_SESSION_TTL_SECS`
    /// - `PROGRESS_SWEEP_INTERVAL_SECS`
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_env();
        config
            .validate()
            .context("Invalid progress tracker configuration")?;

        Ok(config)
    }

    /// Read environment overrides; unparsable values fall back to defaults.
    pub fn from_env() -> Self {
        Self {
            session_ttl: Duration::from_secs(env_secs(
                "PROGRESS_SESSION_TTL_SECS",
                DEFAULT_SESSION_TTL_SECS,
            )),
            sweep_interval: Duration::from_secs(env_secs(
                "PROGRESS_SWEEP_INTERVAL_SECS",
                DEFAULT_SWEEP_INTERVAL_SECS,
            )),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.session_ttl.is_zero() {
            return Err(CutlistError::Config(
                "Session TTL must be greater than 0".to_string(),
            ));
        }

        if self.sweep_interval.is_zero() {
            return Err(CutlistError::Config(
                "Sweep interval must be greater than 0".to_string(),
            ));
        }

        if self.sweep_interval > self.session_ttl {
            tracing::warn!(
                ttl_secs = self.session_ttl.as_secs(),
                sweep_secs = self.sweep_interval.as_secs(),
                "Sweep interval exceeds session TTL - expired sessions may linger"
            );
        }

        Ok(())
    }

    pub fn ttl_millis(&self) -> i64 {
        i64::try_from(self.session_ttl.as_millis()).unwrap_or(i64::MAX)
    }
}

fn env_secs(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
