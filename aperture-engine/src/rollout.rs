//! Rollout evaluation.
//!
//! Pure function of (flag, context, environment, now): ordered
//! short-circuiting checks, then strategy dispatch. Bad configuration
//! fails closed: the evaluator decides "disabled", it never errors.

use crate::bucketing::{bucket, random_bucket};
use crate::targeting::TargetingRuleEngine;
use aperture_core::{
    EvaluationReason, FeatureFlag, FlagStatus, RolloutConfig, RolloutStrategy, UserContext,
};
use chrono::{DateTime, Utc};

/// Outcome of the rollout checks for one flag and context.
#[derive(Debug, Clone, PartialEq)]
pub struct RolloutDecision {
    pub enabled: bool,
    pub reason: EvaluationReason,
    /// Bucket computed during the percentage path, reused for variant
    /// selection so enablement and variant stay correlated
    pub bucket: Option<u8>,
}

impl RolloutDecision {
    fn enabled(reason: EvaluationReason) -> Self {
        Self {
            enabled: true,
            reason,
            bucket: None,
        }
    }

    fn disabled(reason: EvaluationReason) -> Self {
        Self {
            enabled: false,
            reason,
            bucket: None,
        }
    }

    fn with_bucket(mut self, bucket: u8) -> Self {
        self.bucket = Some(bucket);
        self
    }
}

/// Orchestrates status, environment, date-window, and strategy checks.
pub struct RolloutEvaluator;

impl RolloutEvaluator {
    /// Evaluate a flag for a context in an environment at an instant.
    pub fn evaluate(
        flag: &FeatureFlag,
        ctx: &UserContext,
        environment: &str,
        now: DateTime<Utc>,
    ) -> RolloutDecision {
        if flag.status != FlagStatus::Active {
            return RolloutDecision::disabled(EvaluationReason::FlagInactive);
        }

        if !flag.environments.contains(environment) {
            return RolloutDecision::disabled(EvaluationReason::EnvironmentNotTargeted);
        }

        let rollout = &flag.rollout;
        if let Some(start) = rollout.start_date {
            if now < start {
                return RolloutDecision::disabled(EvaluationReason::BeforeStartDate);
            }
        }
        if let Some(end) = rollout.end_date {
            if now > end {
                return RolloutDecision::disabled(EvaluationReason::AfterEndDate);
            }
        }

        match rollout.strategy {
            RolloutStrategy::Percentage => match rollout.percentage {
                Some(percentage) => Self::check_percentage(flag, ctx, percentage),
                None => RolloutDecision::disabled(EvaluationReason::MissingRolloutConfig),
            },
            RolloutStrategy::UserList => Self::check_user_list(rollout, ctx),
            RolloutStrategy::UserAttribute => Self::check_user_attribute(rollout, ctx),
            RolloutStrategy::Gradual => Self::check_gradual(flag, ctx, now),
            RolloutStrategy::Canary => Self::check_canary(flag, ctx),
            RolloutStrategy::Unknown => {
                RolloutDecision::disabled(EvaluationReason::UnknownStrategy)
            }
        }
    }

    fn check_percentage(flag: &FeatureFlag, ctx: &UserContext, percentage: f64) -> RolloutDecision {
        if percentage >= 100.0 {
            return RolloutDecision::enabled(EvaluationReason::Percentage100);
        }
        if percentage <= 0.0 {
            return RolloutDecision::disabled(EvaluationReason::Percentage0);
        }

        let user_bucket = match ctx.user_id.as_deref() {
            Some(user_id) => bucket(&flag.name, user_id),
            None => random_bucket(),
        };

        let enabled = f64::from(user_bucket) < percentage;
        RolloutDecision {
            enabled,
            reason: EvaluationReason::Percentage(percentage),
            bucket: Some(user_bucket),
        }
    }

    fn check_user_list(rollout: &RolloutConfig, ctx: &UserContext) -> RolloutDecision {
        let (Some(user_id), Some(user_ids)) = (ctx.user_id.as_deref(), rollout.user_ids.as_ref())
        else {
            return RolloutDecision::disabled(EvaluationReason::NoUserListOrContext);
        };
        if user_ids.is_empty() {
            return RolloutDecision::disabled(EvaluationReason::NoUserListOrContext);
        }

        if user_ids.contains(user_id) {
            RolloutDecision::enabled(EvaluationReason::UserListMatch)
        } else {
            RolloutDecision::disabled(EvaluationReason::UserListNoMatch)
        }
    }

    fn check_user_attribute(rollout: &RolloutConfig, ctx: &UserContext) -> RolloutDecision {
        let rules = rollout.targeting_rules.as_deref().unwrap_or(&[]);
        match TargetingRuleEngine::first_match(rules, ctx) {
            Some(rule) => RolloutDecision::enabled(EvaluationReason::TargetingRuleMatch(
                rule.attribute.clone(),
            )),
            None => RolloutDecision::disabled(EvaluationReason::NoTargetingRuleMatch),
        }
    }

    fn check_gradual(flag: &FeatureFlag, ctx: &UserContext, now: DateTime<Utc>) -> RolloutDecision {
        match flag.rollout.gradual_percentage_at(now) {
            Some(effective) => Self::check_percentage(flag, ctx, effective),
            None => RolloutDecision::disabled(EvaluationReason::MissingRolloutConfig),
        }
    }

    fn check_canary(flag: &FeatureFlag, ctx: &UserContext) -> RolloutDecision {
        let rollout = &flag.rollout;

        if let (Some(user_id), Some(user_ids)) = (ctx.user_id.as_deref(), rollout.user_ids.as_ref())
        {
            if user_ids.contains(user_id) {
                return RolloutDecision::enabled(EvaluationReason::CanaryUserList);
            }
        }

        match rollout.percentage {
            Some(percentage) => {
                let decision = Self::check_percentage(flag, ctx, percentage);
                if decision.enabled {
                    decision
                } else {
                    let bucket = decision.bucket;
                    let mut fallback =
                        RolloutDecision::disabled(EvaluationReason::CanaryNoMatch);
                    if let Some(bucket) = bucket {
                        fallback = fallback.with_bucket(bucket);
                    }
                    fallback
                }
            }
            None => RolloutDecision::disabled(EvaluationReason::CanaryNoMatch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aperture_core::{FlagValue, TargetingOperator, TargetingRule};
    use chrono::Duration;

    fn ctx(user_id: &str) -> UserContext {
        UserContext::new(user_id)
    }

    #[test]
    fn test_inactive_flag_short_circuits() {
        let flag = FeatureFlag::boolean("off", false).with_status(FlagStatus::Inactive);
        let decision = RolloutEvaluator::evaluate(&flag, &ctx("u1"), "production", Utc::now());

        assert!(!decision.enabled);
        assert_eq!(decision.reason, EvaluationReason::FlagInactive);
    }

    #[test]
    fn test_environment_not_targeted() {
        let flag = FeatureFlag::boolean("prod-only", false);
        let decision = RolloutEvaluator::evaluate(&flag, &ctx("u1"), "staging", Utc::now());

        assert!(!decision.enabled);
        assert_eq!(decision.reason, EvaluationReason::EnvironmentNotTargeted);
    }

    #[test]
    fn test_date_window() {
        let now = Utc::now();
        let flag = FeatureFlag::boolean("windowed", false).with_rollout(
            RolloutConfig::percentage(100.0).with_start_date(now + Duration::days(1)),
        );
        let decision = RolloutEvaluator::evaluate(&flag, &ctx("u1"), "production", now);
        assert_eq!(decision.reason, EvaluationReason::BeforeStartDate);

        let flag = FeatureFlag::boolean("expired", false).with_rollout(
            RolloutConfig::percentage(100.0).with_end_date(now - Duration::days(1)),
        );
        let decision = RolloutEvaluator::evaluate(&flag, &ctx("u1"), "production", now);
        assert_eq!(decision.reason, EvaluationReason::AfterEndDate);
    }

    #[test]
    fn test_percentage_bounds() {
        let full = FeatureFlag::boolean("full", false)
            .with_rollout(RolloutConfig::percentage(100.0));
        let decision = RolloutEvaluator::evaluate(&full, &ctx("anyone"), "production", Utc::now());
        assert!(decision.enabled);
        assert_eq!(decision.reason, EvaluationReason::Percentage100);

        let none = FeatureFlag::boolean("none", false)
            .with_rollout(RolloutConfig::percentage(0.0));
        let decision = RolloutEvaluator::evaluate(&none, &ctx("anyone"), "production", Utc::now());
        assert!(!decision.enabled);
        assert_eq!(decision.reason, EvaluationReason::Percentage0);
    }

    #[test]
    fn test_partial_percentage_is_deterministic() {
        let flag = FeatureFlag::boolean("half", false)
            .with_rollout(RolloutConfig::percentage(50.0));

        let first = RolloutEvaluator::evaluate(&flag, &ctx("u-stable"), "production", Utc::now());
        for _ in 0..20 {
            let again =
                RolloutEvaluator::evaluate(&flag, &ctx("u-stable"), "production", Utc::now());
            assert_eq!(again.enabled, first.enabled);
            assert_eq!(again.bucket, first.bucket);
        }
        assert_eq!(first.reason, EvaluationReason::Percentage(50.0));
    }

    #[test]
    fn test_user_list() {
        let flag = FeatureFlag::boolean("beta-ui", false)
            .with_rollout(RolloutConfig::user_list(["u1", "u2"]));

        let hit = RolloutEvaluator::evaluate(&flag, &ctx("u1"), "production", Utc::now());
        assert!(hit.enabled);
        assert_eq!(hit.reason, EvaluationReason::UserListMatch);

        let miss = RolloutEvaluator::evaluate(&flag, &ctx("u3"), "production", Utc::now());
        assert!(!miss.enabled);
        assert_eq!(miss.reason, EvaluationReason::UserListNoMatch);

        let anon =
            RolloutEvaluator::evaluate(&flag, &UserContext::anonymous(), "production", Utc::now());
        assert!(!anon.enabled);
        assert_eq!(anon.reason, EvaluationReason::NoUserListOrContext);
    }

    #[test]
    fn test_empty_user_list_fails_closed() {
        let flag = FeatureFlag::boolean("empty", false)
            .with_rollout(RolloutConfig::user_list(Vec::<String>::new()));

        let decision = RolloutEvaluator::evaluate(&flag, &ctx("u1"), "production", Utc::now());
        assert_eq!(decision.reason, EvaluationReason::NoUserListOrContext);
    }

    #[test]
    fn test_user_attribute_or_semantics() {
        let flag = FeatureFlag::boolean("premium-feature", false).with_rollout(
            RolloutConfig::user_attribute(vec![TargetingRule::new(
                "plan",
                TargetingOperator::Equals,
                vec!["premium".to_string(), "enterprise".to_string()],
            )]),
        );

        let premium = ctx("u1").with_plan("premium");
        let decision = RolloutEvaluator::evaluate(&flag, &premium, "production", Utc::now());
        assert!(decision.enabled);
        assert_eq!(
            decision.reason,
            EvaluationReason::TargetingRuleMatch("plan".to_string())
        );

        let basic = ctx("u2").with_plan("basic");
        let decision = RolloutEvaluator::evaluate(&flag, &basic, "production", Utc::now());
        assert!(!decision.enabled);
        assert_eq!(decision.reason, EvaluationReason::NoTargetingRuleMatch);
    }

    #[test]
    fn test_gradual_delegates_to_percentage() {
        let now = Utc::now();
        let flag = FeatureFlag::boolean("ramp", false)
            .with_rollout(RolloutConfig::gradual(now - Duration::days(5), 10.0));

        let decision = RolloutEvaluator::evaluate(&flag, &ctx("u1"), "production", now);
        assert_eq!(decision.reason, EvaluationReason::Percentage(50.0));

        let done = FeatureFlag::boolean("done", false)
            .with_rollout(RolloutConfig::gradual(now - Duration::days(20), 10.0));
        let decision = RolloutEvaluator::evaluate(&done, &ctx("u1"), "production", now);
        assert!(decision.enabled);
        assert_eq!(decision.reason, EvaluationReason::Percentage100);
    }

    #[test]
    fn test_canary_list_then_percentage() {
        let flag = FeatureFlag::boolean("canary", false)
            .with_rollout(RolloutConfig::canary(["qa-1"], 0.0));

        let listed = RolloutEvaluator::evaluate(&flag, &ctx("qa-1"), "production", Utc::now());
        assert!(listed.enabled);
        assert_eq!(listed.reason, EvaluationReason::CanaryUserList);

        let unlisted = RolloutEvaluator::evaluate(&flag, &ctx("u9"), "production", Utc::now());
        assert!(!unlisted.enabled);
        assert_eq!(unlisted.reason, EvaluationReason::CanaryNoMatch);

        let open = FeatureFlag::boolean("canary-open", false)
            .with_rollout(RolloutConfig::canary(["qa-1"], 100.0));
        let decision = RolloutEvaluator::evaluate(&open, &ctx("u9"), "production", Utc::now());
        assert!(decision.enabled);
        assert_eq!(decision.reason, EvaluationReason::Percentage100);
    }

    #[test]
    fn test_missing_strategy_config_fails_closed() {
        let mut rollout = RolloutConfig::percentage(50.0);
        rollout.percentage = None;
        let flag = FeatureFlag::boolean("broken", false).with_rollout(rollout);

        let decision = RolloutEvaluator::evaluate(&flag, &ctx("u1"), "production", Utc::now());
        assert!(!decision.enabled);
        assert_eq!(decision.reason, EvaluationReason::MissingRolloutConfig);
    }

    #[test]
    fn test_unknown_strategy_fails_closed() {
        let mut rollout = RolloutConfig::percentage(100.0);
        rollout.strategy = RolloutStrategy::Unknown;
        let flag = FeatureFlag::boolean("future", false).with_rollout(rollout);

        let decision = RolloutEvaluator::evaluate(&flag, &ctx("u1"), "production", Utc::now());
        assert!(!decision.enabled);
        assert_eq!(decision.reason, EvaluationReason::UnknownStrategy);
    }

    #[test]
    fn test_archived_flag_is_disabled() {
        let flag = FeatureFlag::boolean("old", false).with_status(FlagStatus::Archived);
        let decision = RolloutEvaluator::evaluate(&flag, &ctx("u1"), "production", Utc::now());
        assert_eq!(decision.reason, EvaluationReason::FlagInactive);
    }

    #[test]
    fn test_default_value_untouched_by_decision() {
        // The decision carries enablement only; value resolution happens
        // in the service layer.
        let flag = FeatureFlag::new("typed", FlagValue::string("fallback"))
            .with_rollout(RolloutConfig::percentage(0.0));
        let decision = RolloutEvaluator::evaluate(&flag, &ctx("u1"), "production", Utc::now());
        assert!(!decision.enabled);
    }
}
