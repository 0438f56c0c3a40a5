//! Core data model for Aperture feature flags.
//!
//! Defines flag definitions, rollout configuration, user contexts,
//! evaluation results, and the validation rules enforced when flags are
//! created or updated.
//!
//! # Quick Start
//!
//! ```
//! use aperture_core::*;
//!
//! // A boolean flag rolled out to 25% of users in production
//! let flag = FeatureFlag::boolean("new-ui", false)
//!     .with_description("Redesigned dashboard")
//!     .with_rollout(RolloutConfig::percentage(25.0));
//!
//! assert!(validate_flag(&flag).is_ok());
//! ```

pub mod clock;
pub mod context;
pub mod error;
pub mod evaluation;
pub mod flag;
pub mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::UserContext;
pub use error::{FlagError, FlagResult};
pub use evaluation::{EvaluationReason, FlagEvaluation, UsageRecord};
pub use flag::{
    FeatureFlag, FeatureVariant, FlagStatus, FlagValue, RolloutConfig, RolloutStrategy,
    TargetingOperator, TargetingRule,
};
pub use validation::{validate_flag, ValidationError, ValidationErrors, WEIGHT_SUM_TOLERANCE};
