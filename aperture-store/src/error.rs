//! Error types for store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Store-specific errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend could not be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Operation exceeded its deadline
    #[error("Store operation timed out")]
    Timeout,

    /// Flag payload could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Flag payload could not be parsed
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Generic error
    #[error("Store error: {0}")]
    Other(String),
}
