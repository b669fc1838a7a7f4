//! Error types for limiter construction and configuration.
//!
//! Admission decisions never fail: `allow` always returns a boolean. Errors
//! only surface when a quota or a [`LimiterConfig`](crate::LimiterConfig) is
//! rejected before an engine is built.

use thiserror::Error;

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, RateLimitError>;

/// Main error type.
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A configuration document could not be parsed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RateLimitError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Configuration-related errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Invalid quota configuration.
    #[error("Invalid quota: {0}")]
    InvalidQuota(String),

    /// Missing required configuration.
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
