//! Error taxonomy for flag operations.
//!
//! Administrative operations surface these errors; the evaluation path
//! never does: it degrades to a disabled result with a reason code.

use crate::validation::ValidationErrors;
use thiserror::Error;

/// Result type for flag operations.
pub type FlagResult<T> = Result<T, FlagError>;

/// Errors surfaced by administrative flag operations.
#[derive(Debug, Error)]
pub enum FlagError {
    /// Flag definition failed create/update validation
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// Explicit lookup of a flag that does not exist
    #[error("Flag not found: {0}")]
    NotFound(String),

    /// Backing store could not be reached or timed out
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Usage log failure; never raised from the tracking fast path
    #[error("Analytics error: {0}")]
    Analytics(String),

    /// Flag payload could not be serialized or parsed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for FlagError {
    fn from(err: serde_json::Error) -> Self {
        FlagError::Serialization(err.to_string())
    }
}
