// Aperture - feature-flag rollout and evaluation engine
//
// This library decides, deterministically, whether a feature is enabled
// for a user, which A/B variant they see, and records the decision for
// analytics. Flags roll out by percentage, user list, attribute
// targeting, time-driven gradual ramp, or canary.

// Re-export the data model
pub use aperture_core::*;

// Re-export the engine surface
pub use aperture_engine::{
    bucket, random_bucket, CacheStats, EvaluationCache, FeatureFlagService,
    FeatureFlagServiceBuilder, FlagFilter, RolloutDecision, RolloutEvaluator, ServiceConfig,
    TargetingRuleEngine, VariantSelector,
};

// Re-export collaborator seams
pub use aperture_analytics::{
    AnalyticsRecorder, AnalyticsStore, FlagAnalytics, InMemoryAnalyticsStore,
};
pub use aperture_events::{
    ChangeListener, ChangeNotifier, FlagChanged, FlagOperation, InProcessNotifier,
};
pub use aperture_scheduler::{GradualRolloutScheduler, SchedulerConfig, TickStats};
pub use aperture_store::{FlagStore, InMemoryFlagStore, StoreError, StoreResult};

// Prelude for common imports
pub mod prelude {
    pub use aperture_analytics::{AnalyticsStore, InMemoryAnalyticsStore};
    pub use aperture_core::{
        Clock,
        EvaluationReason,
        FeatureFlag,
        FeatureVariant,
        FlagError,
        FlagEvaluation,
        FlagResult,
        FlagStatus,
        FlagValue,
        RolloutConfig,
        RolloutStrategy,
        SystemClock,
        TargetingOperator,
        TargetingRule,
        UserContext,
    };
    pub use aperture_engine::{FeatureFlagService, FlagFilter, ServiceConfig};
    pub use aperture_events::{ChangeNotifier, InProcessNotifier};
    pub use aperture_scheduler::GradualRolloutScheduler;
    pub use aperture_store::{FlagStore, InMemoryFlagStore};
}
