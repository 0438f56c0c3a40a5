//! Flag definitions and rollout configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Lifecycle status of a feature flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagStatus {
    /// Flag is live and evaluated normally
    Active,
    /// Flag exists but always evaluates to disabled
    Inactive,
    /// Flag is retired; kept only for history
    Archived,
}

/// Value carried by a flag or variant.
///
/// Every value kind is an explicit variant so configuration is validated
/// exhaustively at construction rather than coerced at evaluation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<FlagValue>),
    Json(serde_json::Value),
}

impl FlagValue {
    pub fn boolean(value: bool) -> Self {
        Self::Bool(value)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(n) => Some(*n),
            Self::Int(n) => Some(*n as f64),
            _ => None,
        }
    }
}

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<i64> for FlagValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// Rollout strategy selecting which users see a flag as enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutStrategy {
    /// Stable hash bucket below a fixed percentage
    Percentage,
    /// Explicit allow-list of user ids
    UserList,
    /// Attribute-based targeting rules (OR across rules)
    UserAttribute,
    /// Percentage grows over time at a fixed daily rate
    Gradual,
    /// Allow-list first, percentage fallback for everyone else
    Canary,
    /// Unrecognized strategy from an older or newer writer; evaluates to
    /// disabled
    #[serde(other)]
    Unknown,
}

/// Comparison operator for targeting rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetingOperator {
    Equals,
    NotEquals,
    In,
    NotIn,
    Contains,
    GreaterThan,
    LessThan,
}

/// Predicate over a single user attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetingRule {
    /// Attribute to check; built-in context fields resolve before the
    /// free-form attribute map
    pub attribute: String,

    /// Operator
    pub operator: TargetingOperator,

    /// Values to compare against (non-empty)
    pub values: Vec<String>,
}

impl TargetingRule {
    pub fn new(
        attribute: impl Into<String>,
        operator: TargetingOperator,
        values: Vec<String>,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            operator,
            values,
        }
    }
}

/// One weighted A/B alternative served when a flag is enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVariant {
    /// Variant name (unique within the flag)
    pub name: String,

    /// Value returned when this variant is selected
    pub value: FlagValue,

    /// Weight in [0, 100]; all weights in a flag sum to 100
    pub weight: f64,
}

impl FeatureVariant {
    pub fn new(name: impl Into<String>, value: impl Into<FlagValue>, weight: f64) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            weight,
        }
    }
}

/// Rollout configuration for a flag.
///
/// Only the fields relevant to the chosen strategy need to be set; the
/// evaluator treats a missing required field as disabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolloutConfig {
    /// Strategy to apply
    pub strategy: RolloutStrategy,

    /// Percentage in [0, 100] (percentage/canary; maintained by the
    /// scheduler for gradual)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,

    /// Allow-listed user ids (user_list/canary)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_ids: Option<HashSet<String>>,

    /// Targeting rules, evaluated in order with OR semantics
    /// (user_attribute)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targeting_rules: Option<Vec<TargetingRule>>,

    /// Flag is disabled before this instant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,

    /// Flag is disabled after this instant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,

    /// Percent-per-day growth rate (gradual)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradual_increment: Option<f64>,
}

impl RolloutConfig {
    /// Fixed-percentage rollout.
    pub fn percentage(percentage: f64) -> Self {
        Self {
            strategy: RolloutStrategy::Percentage,
            percentage: Some(percentage),
            user_ids: None,
            targeting_rules: None,
            start_date: None,
            end_date: None,
            gradual_increment: None,
        }
    }

    /// Allow-list rollout.
    pub fn user_list(user_ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            strategy: RolloutStrategy::UserList,
            percentage: None,
            user_ids: Some(user_ids.into_iter().map(Into::into).collect()),
            targeting_rules: None,
            start_date: None,
            end_date: None,
            gradual_increment: None,
        }
    }

    /// Attribute-targeting rollout.
    pub fn user_attribute(rules: Vec<TargetingRule>) -> Self {
        Self {
            strategy: RolloutStrategy::UserAttribute,
            percentage: None,
            user_ids: None,
            targeting_rules: Some(rules),
            start_date: None,
            end_date: None,
            gradual_increment: None,
        }
    }

    /// Time-driven gradual rollout starting at `start_date` and growing
    /// `increment` percent per day.
    pub fn gradual(start_date: DateTime<Utc>, increment: f64) -> Self {
        Self {
            strategy: RolloutStrategy::Gradual,
            percentage: Some(0.0),
            user_ids: None,
            targeting_rules: None,
            start_date: Some(start_date),
            end_date: None,
            gradual_increment: Some(increment),
        }
    }

    /// Canary rollout: allow-listed users first, percentage for the rest.
    pub fn canary(
        user_ids: impl IntoIterator<Item = impl Into<String>>,
        percentage: f64,
    ) -> Self {
        Self {
            strategy: RolloutStrategy::Canary,
            percentage: Some(percentage),
            user_ids: Some(user_ids.into_iter().map(Into::into).collect()),
            targeting_rules: None,
            start_date: None,
            end_date: None,
            gradual_increment: None,
        }
    }

    /// Effective percentage of a gradual rollout at `now`.
    ///
    /// Grows by `gradual_increment` percent per whole elapsed day since
    /// `start_date`, capped at 100. `None` when either field is missing.
    pub fn gradual_percentage_at(&self, now: DateTime<Utc>) -> Option<f64> {
        let start = self.start_date?;
        let increment = self.gradual_increment?;

        let days_elapsed = (now - start).num_days().max(0) as f64;
        Some((increment * days_elapsed).min(100.0))
    }

    /// Restrict the rollout window start.
    pub fn with_start_date(mut self, start: DateTime<Utc>) -> Self {
        self.start_date = Some(start);
        self
    }

    /// Restrict the rollout window end.
    pub fn with_end_date(mut self, end: DateTime<Utc>) -> Self {
        self.end_date = Some(end);
        self
    }
}

/// Feature flag definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFlag {
    /// Flag name (unique key)
    pub name: String,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Lifecycle status
    pub status: FlagStatus,

    /// Value returned when the flag evaluates to disabled
    pub default_value: FlagValue,

    /// Rollout configuration
    pub rollout: RolloutConfig,

    /// A/B variants in stored order; empty for plain on/off flags
    #[serde(default)]
    pub variants: Vec<FeatureVariant>,

    /// Environments the flag is targeted at
    pub environments: HashSet<String>,

    /// Free-form labels for filtering
    #[serde(default)]
    pub tags: Vec<String>,

    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl FeatureFlag {
    /// Create a flag with an explicit default value.
    ///
    /// New flags are active, roll out to 100% of users, and target the
    /// `production` environment until told otherwise.
    pub fn new(name: impl Into<String>, default_value: impl Into<FlagValue>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            description: None,
            status: FlagStatus::Active,
            default_value: default_value.into(),
            rollout: RolloutConfig::percentage(100.0),
            variants: Vec::new(),
            environments: HashSet::from(["production".to_string()]),
            tags: Vec::new(),
            created_at: now,
            created_by: None,
            updated_at: now,
            updated_by: None,
        }
    }

    /// Create a simple boolean flag.
    ///
    /// `default_value` is what callers receive while the flag is disabled.
    ///
    /// # Examples
    ///
    /// ```
    /// use aperture_core::FeatureFlag;
    ///
    /// let flag = FeatureFlag::boolean("new-ui", false);
    /// ```
    pub fn boolean(name: impl Into<String>, default_value: bool) -> Self {
        Self::new(name, FlagValue::Bool(default_value))
    }

    /// Set description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set status.
    pub fn with_status(mut self, status: FlagStatus) -> Self {
        self.status = status;
        self
    }

    /// Replace the rollout configuration.
    pub fn with_rollout(mut self, rollout: RolloutConfig) -> Self {
        self.rollout = rollout;
        self
    }

    /// Add an A/B variant.
    pub fn with_variant(mut self, variant: FeatureVariant) -> Self {
        self.variants.push(variant);
        self
    }

    /// Replace all variants.
    pub fn with_variants(mut self, variants: Vec<FeatureVariant>) -> Self {
        self.variants = variants;
        self
    }

    /// Target an additional environment.
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environments.insert(environment.into());
        self
    }

    /// Replace the targeted environments.
    pub fn with_environments(
        mut self,
        environments: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.environments = environments.into_iter().map(Into::into).collect();
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Record the author.
    pub fn with_created_by(mut self, author: impl Into<String>) -> Self {
        self.created_by = Some(author.into());
        self
    }
}
