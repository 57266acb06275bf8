//! Configuration loading for the matchmaker.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at `<config dir>/matchmaker/config.{toml,json,...}`.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::SettingsError;

/// Widest candidate set the custom strategy will enumerate (2^24 subsets).
pub const MAX_CUSTOM_CANDIDATES_LIMIT: usize = 24;

/// Matching engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchmakerConfig {
    /// Seconds between scheduled passes.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Passes a pooled ticket survives before it is promoted to active.
    #[serde(default = "default_max_intervals")]
    pub max_intervals: u32,

    /// Require each side's query to match the other before grouping.
    #[serde(default)]
    pub mutual_match: bool,

    /// Per-pass budget for mutual-match checks; once spent, the rest of the
    /// pass matches one-directionally.
    #[serde(default = "default_mutual_match_threshold_ms")]
    pub mutual_match_threshold_ms: u64,

    /// Query used when a request leaves it blank.
    #[serde(default = "default_query")]
    pub default_query: String,

    /// Maximum hits fetched per candidate search.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Concurrent tickets allowed per session (solo) or per party.
    #[serde(default = "default_max_tickets")]
    pub max_tickets: usize,

    /// Candidates kept (best ranked first) before the custom strategy
    /// enumerates subsets. Cost is O(2^n) per ticket.
    #[serde(default = "default_max_custom_candidates")]
    pub max_custom_candidates: usize,

    /// Memory budget for the index writer in MB.
    #[serde(default = "default_writer_memory_mb")]
    pub writer_memory_mb: usize,
}

fn default_interval_secs() -> u64 {
    15
}

fn default_max_intervals() -> u32 {
    2
}

fn default_mutual_match_threshold_ms() -> u64 {
    500
}

fn default_query() -> String {
    "*".to_string()
}

fn default_batch_size() -> usize {
    100
}

fn default_max_tickets() -> usize {
    3
}

fn default_max_custom_candidates() -> usize {
    16
}

fn default_writer_memory_mb() -> usize {
    50
}

impl Default for MatchmakerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_intervals: default_max_intervals(),
            mutual_match: false,
            mutual_match_threshold_ms: default_mutual_match_threshold_ms(),
            default_query: default_query(),
            batch_size: default_batch_size(),
            max_tickets: default_max_tickets(),
            max_custom_candidates: default_max_custom_candidates(),
            writer_memory_mb: default_writer_memory_mb(),
        }
    }
}

impl MatchmakerConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.interval_secs == 0 {
            return Err(SettingsError::Invalid("interval_secs must be > 0".into()));
        }
        if self.max_intervals == 0 {
            return Err(SettingsError::Invalid("max_intervals must be > 0".into()));
        }
        if self.batch_size == 0 {
            return Err(SettingsError::Invalid("batch_size must be > 0".into()));
        }
        if self.max_tickets == 0 {
            return Err(SettingsError::Invalid("max_tickets must be > 0".into()));
        }
        if self.max_custom_candidates > MAX_CUSTOM_CANDIDATES_LIMIT {
            return Err(SettingsError::Invalid(format!(
                "max_custom_candidates must be <= {}, got {}",
                MAX_CUSTOM_CANDIDATES_LIMIT, self.max_custom_candidates
            )));
        }
        Ok(())
    }
}

/// Top-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub matchmaker: MatchmakerConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            matchmaker: MatchmakerConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Default config file (optional)
    /// 3. CLI-specified config file (required when given)
    /// 4. Environment variables (MATCHMAKER_*)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, SettingsError> {
        let config_dir = ProjectDirs::from("", "", "matchmaker")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        let default_config_path = config_dir.join("config");

        let defaults = MatchmakerConfig::default();
        let mut builder = Config::builder()
            .set_default("log_level", default_log_level())?
            .set_default("matchmaker.interval_secs", defaults.interval_secs as i64)?
            .set_default("matchmaker.max_intervals", defaults.max_intervals as i64)?
            .set_default("matchmaker.mutual_match", defaults.mutual_match)?
            .set_default(
                "matchmaker.mutual_match_threshold_ms",
                defaults.mutual_match_threshold_ms as i64,
            )?
            .set_default("matchmaker.default_query", defaults.default_query)?
            .set_default("matchmaker.batch_size", defaults.batch_size as i64)?
            .set_default("matchmaker.max_tickets", defaults.max_tickets as i64)?
            .set_default(
                "matchmaker.max_custom_candidates",
                defaults.max_custom_candidates as i64,
            )?
            .set_default("matchmaker.writer_memory_mb", defaults.writer_memory_mb as i64)?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // MATCHMAKER_LOG_LEVEL, MATCHMAKER_MATCHMAKER__BATCH_SIZE, ...
        builder = builder.add_source(
            Environment::with_prefix("MATCHMAKER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.matchmaker.validate()?;
        Ok(settings)
    }
}
