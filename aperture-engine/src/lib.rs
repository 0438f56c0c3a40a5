//! Rollout evaluation engine for Aperture.
//!
//! Decides, deterministically, whether a feature is enabled for a user
//! and which A/B variant they see:
//!
//! - **Bucketing** - stable hash assignment of a user to a 0-99 bucket
//! - **Targeting** - attribute rules evaluated against a user context
//! - **Rollout** - percentage, user-list, attribute, gradual, and canary
//!   strategies with short-circuiting status/environment/date checks
//! - **Variants** - weighted A/B selection sharing the rollout bucket
//! - **Caching** - short-TTL memoization invalidated on flag mutation
//!
//! # Quick Start
//!
//! ```no_run
//! use aperture_core::*;
//! use aperture_engine::FeatureFlagService;
//! use aperture_store::InMemoryFlagStore;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> FlagResult<()> {
//! let service = FeatureFlagService::builder(Arc::new(InMemoryFlagStore::new())).build();
//!
//! let flag = FeatureFlag::boolean("new-ui", false)
//!     .with_rollout(RolloutConfig::percentage(25.0));
//! service.create_flag(flag).await?;
//!
//! let ctx = UserContext::new("user-123");
//! let evaluation = service.evaluate("new-ui", &ctx, "production").await;
//! if evaluation.enabled {
//!     // Show new UI
//! }
//! # Ok(())
//! # }
//! ```

pub mod bucketing;
pub mod cache;
pub mod rollout;
pub mod service;
pub mod targeting;
pub mod variants;

pub use bucketing::{bucket, random_bucket, BUCKET_COUNT};
pub use cache::{CacheStats, EvaluationCache, DEFAULT_CACHE_TTL};
pub use rollout::{RolloutDecision, RolloutEvaluator};
pub use service::{FeatureFlagService, FeatureFlagServiceBuilder, FlagFilter, ServiceConfig};
pub use targeting::TargetingRuleEngine;
pub use variants::VariantSelector;
