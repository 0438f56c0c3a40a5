//! Flag usage analytics for Aperture.
//!
//! Usage records are appended to per-day log buckets and aggregated on
//! demand: total evaluations, enabled/disabled counts, per-variant
//! counts, unique-user cardinality, and a per-day breakdown. Recording is
//! fire-and-forget from the evaluation path; a failed append must never
//! fail the feature check that triggered it.

pub mod error;
pub mod recorder;
pub mod store;

pub use error::{AnalyticsError, AnalyticsResult};
pub use recorder::{AnalyticsRecorder, DailyUsage, FlagAnalytics};
pub use store::{AnalyticsStore, InMemoryAnalyticsStore};
