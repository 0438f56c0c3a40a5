//! Analytics error types.

use thiserror::Error;

/// Result type for analytics operations.
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

/// Errors that can occur while recording or aggregating usage.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Usage log backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Record could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Query range is inverted or unbounded
    #[error("Invalid range: {0}")]
    InvalidRange(String),
}

impl From<serde_json::Error> for AnalyticsError {
    fn from(err: serde_json::Error) -> Self {
        AnalyticsError::Serialization(err.to_string())
    }
}
