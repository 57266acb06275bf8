//! Scheduler configuration.
//!
//! Provides the pass interval and the shutdown drain timeout.

use serde::{Deserialize, Serialize};

use matchmaker_types::MatchmakerConfig;

use crate::SchedulerError;

/// Configuration for the pass scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Milliseconds between scheduled passes.
    /// Defaults to 15000.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Timeout in seconds for draining an in-flight pass on shutdown.
    /// Defaults to 30 seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

fn default_interval_ms() -> u64 {
    15_000
}

fn default_shutdown_timeout() -> u64 {
    30
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl From<&MatchmakerConfig> for SchedulerConfig {
    fn from(config: &MatchmakerConfig) -> Self {
        Self {
            interval_ms: config.interval_secs.saturating_mul(1000),
            ..Default::default()
        }
    }
}

impl SchedulerConfig {
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    pub fn with_shutdown_timeout_secs(mut self, secs: u64) -> Self {
        self.shutdown_timeout_secs = secs;
        self
    }

    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidInterval` for a zero interval.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.interval_ms == 0 {
            return Err(SchedulerError::InvalidInterval(
                "interval_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
