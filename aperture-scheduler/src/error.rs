//! Error types for scheduler operations.

use thiserror::Error;

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Scheduler already running
    #[error("Scheduler already running")]
    AlreadyRunning,

    /// Scheduler not running
    #[error("Scheduler not running")]
    NotRunning,

    /// Store failure while listing or updating flags
    #[error("Store error: {0}")]
    Store(String),
}
