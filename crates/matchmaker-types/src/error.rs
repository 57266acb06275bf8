//! Error types for configuration loading.

use thiserror::Error;

/// Errors raised while loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Layered config could not be built or deserialized
    #[error("Configuration error: {0}")]
    Config(String),

    /// A loaded value is outside its allowed range
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

impl From<config::ConfigError> for SettingsError {
    fn from(err: config::ConfigError) -> Self {
        SettingsError::Config(err.to_string())
    }
}
