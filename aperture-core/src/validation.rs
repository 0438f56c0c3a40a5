//! Construction-time validation of flag definitions.
//!
//! Validation runs when flags are created or updated, never at evaluation
//! time: the evaluator fails closed on bad configuration instead.

use crate::flag::{FeatureFlag, RolloutStrategy};
use std::collections::HashSet;
use std::fmt;

/// Tolerance when checking that variant weights sum to 100.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Validation error for a single field.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,

    /// Constraint that failed
    pub constraint: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            constraint: "custom".to_string(),
        }
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = constraint.into();
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Collection of validation errors for one flag.
#[derive(Debug, Clone, Default)]
pub struct ValidationErrors {
    pub errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Ok when no errors were collected.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", rendered.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Validate a flag definition.
///
/// Checks the invariants enforced at create/update time: weight sums,
/// value ranges, strategy-required fields, and rule shapes.
pub fn validate_flag(flag: &FeatureFlag) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if flag.name.trim().is_empty() {
        errors.add(
            ValidationError::new("name", "flag name must not be empty")
                .with_constraint("required"),
        );
    }

    validate_variants(flag, &mut errors);
    validate_rollout(flag, &mut errors);

    errors.into_result()
}

fn validate_variants(flag: &FeatureFlag, errors: &mut ValidationErrors) {
    if flag.variants.is_empty() {
        return;
    }

    let mut seen = HashSet::new();
    for variant in &flag.variants {
        if !seen.insert(variant.name.as_str()) {
            errors.add(
                ValidationError::new(
                    "variants",
                    format!("duplicate variant name '{}'", variant.name),
                )
                .with_constraint("unique"),
            );
        }
        if !(0.0..=100.0).contains(&variant.weight) {
            errors.add(
                ValidationError::new(
                    "variants",
                    format!(
                        "variant '{}' weight {} outside [0, 100]",
                        variant.name, variant.weight
                    ),
                )
                .with_constraint("range"),
            );
        }
    }

    let sum: f64 = flag.variants.iter().map(|v| v.weight).sum();
    if (sum - 100.0).abs() > WEIGHT_SUM_TOLERANCE {
        errors.add(
            ValidationError::new(
                "variants",
                format!("variant weights sum to {sum}, expected 100"),
            )
            .with_constraint("weight_sum"),
        );
    }
}

fn validate_rollout(flag: &FeatureFlag, errors: &mut ValidationErrors) {
    let rollout = &flag.rollout;

    if let Some(pct) = rollout.percentage {
        if !(0.0..=100.0).contains(&pct) {
            errors.add(
                ValidationError::new(
                    "rollout.percentage",
                    format!("percentage {pct} outside [0, 100]"),
                )
                .with_constraint("range"),
            );
        }
    }

    if let Some(increment) = rollout.gradual_increment {
        if !(increment > 0.0 && increment <= 100.0) {
            errors.add(
                ValidationError::new(
                    "rollout.gradual_increment",
                    format!("increment {increment} outside (0, 100]"),
                )
                .with_constraint("range"),
            );
        }
    }

    if let (Some(start), Some(end)) = (rollout.start_date, rollout.end_date) {
        if end < start {
            errors.add(
                ValidationError::new("rollout.end_date", "end date precedes start date")
                    .with_constraint("date_order"),
            );
        }
    }

    if let Some(rules) = &rollout.targeting_rules {
        for (index, rule) in rules.iter().enumerate() {
            if rule.values.is_empty() {
                errors.add(
                    ValidationError::new(
                        format!("rollout.targeting_rules[{index}]"),
                        format!("rule on '{}' has no values", rule.attribute),
                    )
                    .with_constraint("non_empty"),
                );
            }
        }
    }

    // Strategy-relevant fields must be present at write time; the
    // evaluator additionally fails closed if they are missing.
    match rollout.strategy {
        RolloutStrategy::Percentage => {
            if rollout.percentage.is_none() {
                errors.add(missing_field("rollout.percentage", "percentage"));
            }
        }
        RolloutStrategy::UserList => {
            if rollout.user_ids.is_none() {
                errors.add(missing_field("rollout.user_ids", "user_list"));
            }
        }
        RolloutStrategy::UserAttribute => {
            if rollout
                .targeting_rules
                .as_ref()
                .is_none_or(|rules| rules.is_empty())
            {
                errors.add(missing_field("rollout.targeting_rules", "user_attribute"));
            }
        }
        RolloutStrategy::Gradual => {
            if rollout.start_date.is_none() {
                errors.add(missing_field("rollout.start_date", "gradual"));
            }
            if rollout.gradual_increment.is_none() {
                errors.add(missing_field("rollout.gradual_increment", "gradual"));
            }
        }
        RolloutStrategy::Canary => {
            if rollout.user_ids.is_none() {
                errors.add(missing_field("rollout.user_ids", "canary"));
            }
        }
        RolloutStrategy::Unknown => {
            errors.add(
                ValidationError::new("rollout.strategy", "strategy is not recognized")
                    .with_constraint("known_strategy"),
            );
        }
    }
}

fn missing_field(field: &str, strategy: &str) -> ValidationError {
    ValidationError::new(field, format!("required by the {strategy} strategy"))
        .with_constraint("required")
}
