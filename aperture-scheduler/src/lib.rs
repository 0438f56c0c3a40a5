//! Gradual rollout scheduling for Aperture.
//!
//! A single periodic worker walks every active flag on the gradual
//! strategy, recomputes its rollout percentage from the elapsed time, and
//! persists the new value. Ticks never overlap, per-flag failures are
//! logged and skipped, and shutdown is an explicit, deterministic stop.

pub mod error;
pub mod scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use scheduler::{GradualRolloutScheduler, SchedulerConfig, TickStats};
