//! Evaluation results and usage records.

use crate::flag::FlagValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Why an evaluation came out the way it did.
///
/// Serialized (and displayed) as a stable snake_case code, e.g.
/// `percentage_25` or `targeting_rule_match_plan`.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationReason {
    FlagInactive,
    EnvironmentNotTargeted,
    BeforeStartDate,
    AfterEndDate,
    Percentage100,
    Percentage0,
    /// Bucket compared against the given percentage
    Percentage(f64),
    UserListMatch,
    UserListNoMatch,
    NoUserListOrContext,
    /// A targeting rule on the given attribute matched
    TargetingRuleMatch(String),
    NoTargetingRuleMatch,
    CanaryUserList,
    CanaryNoMatch,
    UnknownStrategy,
    MissingRolloutConfig,
    FlagNotFound,
    StoreUnavailable,
}

impl fmt::Display for EvaluationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FlagInactive => write!(f, "flag_inactive"),
            Self::EnvironmentNotTargeted => write!(f, "environment_not_targeted"),
            Self::BeforeStartDate => write!(f, "before_start_date"),
            Self::AfterEndDate => write!(f, "after_end_date"),
            Self::Percentage100 => write!(f, "percentage_100"),
            Self::Percentage0 => write!(f, "percentage_0"),
            Self::Percentage(pct) => write!(f, "percentage_{}", format_percentage(*pct)),
            Self::UserListMatch => write!(f, "user_list_match"),
            Self::UserListNoMatch => write!(f, "user_list_no_match"),
            Self::NoUserListOrContext => write!(f, "no_user_list_or_context"),
            Self::TargetingRuleMatch(attribute) => {
                write!(f, "targeting_rule_match_{attribute}")
            }
            Self::NoTargetingRuleMatch => write!(f, "no_targeting_rule_match"),
            Self::CanaryUserList => write!(f, "canary_user_list"),
            Self::CanaryNoMatch => write!(f, "canary_no_match"),
            Self::UnknownStrategy => write!(f, "unknown_strategy"),
            Self::MissingRolloutConfig => write!(f, "missing_rollout_config"),
            Self::FlagNotFound => write!(f, "flag_not_found"),
            Self::StoreUnavailable => write!(f, "store_unavailable"),
        }
    }
}

impl Serialize for EvaluationReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Render a percentage without a trailing `.0` for whole numbers.
fn format_percentage(pct: f64) -> String {
    if (pct - pct.round()).abs() < 1e-9 {
        format!("{}", pct.round() as i64)
    } else {
        format!("{pct}")
    }
}

/// Outcome of evaluating one flag for one context.
///
/// Produced fresh on every call; persisted only through usage records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlagEvaluation {
    pub flag_name: String,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    pub value: FlagValue,
    pub reason: EvaluationReason,
    pub evaluated_at: DateTime<Utc>,
}

impl FlagEvaluation {
    /// A disabled result carrying the fallback value.
    pub fn disabled(
        flag_name: impl Into<String>,
        value: FlagValue,
        reason: EvaluationReason,
        evaluated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            flag_name: flag_name.into(),
            enabled: false,
            variant: None,
            value,
            reason,
            evaluated_at,
        }
    }
}

/// One append-only entry in the usage log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub flag_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    pub environment: String,
    pub timestamp: DateTime<Utc>,
    /// Caller-supplied context from `track_usage`; opaque to aggregation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}
