//! Attribute-based targeting rules.

use aperture_core::{TargetingOperator, TargetingRule, UserContext};
use std::cmp::Ordering;

/// Evaluates targeting rules against a user context.
///
/// Rules never panic and fail closed: an attribute that does not resolve,
/// or a numeric comparison with a non-numeric operand, is a non-match.
pub struct TargetingRuleEngine;

impl TargetingRuleEngine {
    /// Whether a single rule matches the context.
    pub fn matches(rule: &TargetingRule, ctx: &UserContext) -> bool {
        let Some(value) = ctx.get(&rule.attribute) else {
            return false;
        };
        let value = value.as_ref();

        match rule.operator {
            TargetingOperator::Equals | TargetingOperator::In => {
                rule.values.iter().any(|candidate| candidate == value)
            }
            TargetingOperator::NotEquals | TargetingOperator::NotIn => {
                !rule.values.iter().any(|candidate| candidate == value)
            }
            TargetingOperator::Contains => rule
                .values
                .iter()
                .any(|candidate| value.contains(candidate.as_str())),
            TargetingOperator::GreaterThan => {
                Self::compare(value, rule.values.first()) == Some(Ordering::Greater)
            }
            TargetingOperator::LessThan => {
                Self::compare(value, rule.values.first()) == Some(Ordering::Less)
            }
        }
    }

    /// First matching rule, if any. A flag's attribute strategy is the OR
    /// over its rules, so one match is enough.
    pub fn first_match<'a>(
        rules: &'a [TargetingRule],
        ctx: &UserContext,
    ) -> Option<&'a TargetingRule> {
        rules.iter().find(|rule| Self::matches(rule, ctx))
    }

    fn compare(lhs: &str, rhs: Option<&String>) -> Option<Ordering> {
        let lhs: f64 = lhs.trim().parse().ok()?;
        let rhs: f64 = rhs?.trim().parse().ok()?;
        lhs.partial_cmp(&rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(attribute: &str, operator: TargetingOperator, values: &[&str]) -> TargetingRule {
        TargetingRule::new(
            attribute,
            operator,
            values.iter().map(|v| v.to_string()).collect(),
        )
    }

    #[test]
    fn test_equals_is_membership() {
        let ctx = UserContext::new("u1").with_plan("premium");
        let premium = rule("plan", TargetingOperator::Equals, &["premium", "enterprise"]);

        assert!(TargetingRuleEngine::matches(&premium, &ctx));

        let basic = UserContext::new("u2").with_plan("basic");
        assert!(!TargetingRuleEngine::matches(&premium, &basic));
    }

    #[test]
    fn test_not_equals() {
        let ctx = UserContext::new("u1").with_country("DE");
        let outside_us = rule("country", TargetingOperator::NotEquals, &["US"]);
        assert!(TargetingRuleEngine::matches(&outside_us, &ctx));

        let us = UserContext::new("u2").with_country("US");
        assert!(!TargetingRuleEngine::matches(&outside_us, &us));
    }

    #[test]
    fn test_unresolved_attribute_never_matches() {
        let ctx = UserContext::new("u1");

        // Fail closed even for negated operators.
        let not_in = rule("country", TargetingOperator::NotIn, &["US"]);
        assert!(!TargetingRuleEngine::matches(&not_in, &ctx));

        let not_equals = rule("country", TargetingOperator::NotEquals, &["US"]);
        assert!(!TargetingRuleEngine::matches(&not_equals, &ctx));
    }

    #[test]
    fn test_contains_substring() {
        let ctx = UserContext::new("u1").with_email("dev@company.com");
        let company = rule("email", TargetingOperator::Contains, &["@company.com"]);
        assert!(TargetingRuleEngine::matches(&company, &ctx));

        let other = rule("email", TargetingOperator::Contains, &["@other.org"]);
        assert!(!TargetingRuleEngine::matches(&other, &ctx));
    }

    #[test]
    fn test_numeric_comparisons() {
        let ctx = UserContext::new("u1").with_attribute("seats", "25");

        assert!(TargetingRuleEngine::matches(
            &rule("seats", TargetingOperator::GreaterThan, &["10"]),
            &ctx
        ));
        assert!(!TargetingRuleEngine::matches(
            &rule("seats", TargetingOperator::GreaterThan, &["25"]),
            &ctx
        ));
        assert!(TargetingRuleEngine::matches(
            &rule("seats", TargetingOperator::LessThan, &["100"]),
            &ctx
        ));
    }

    #[test]
    fn test_non_numeric_comparison_fails_closed() {
        let ctx = UserContext::new("u1").with_attribute("seats", "lots");
        assert!(!TargetingRuleEngine::matches(
            &rule("seats", TargetingOperator::GreaterThan, &["10"]),
            &ctx
        ));

        let ctx = UserContext::new("u1").with_attribute("seats", "25");
        assert!(!TargetingRuleEngine::matches(
            &rule("seats", TargetingOperator::GreaterThan, &["many"]),
            &ctx
        ));
    }

    #[test]
    fn test_first_match_or_semantics() {
        let rules = vec![
            rule("plan", TargetingOperator::Equals, &["enterprise"]),
            rule("role", TargetingOperator::Equals, &["admin"]),
        ];

        let admin = UserContext::new("u1").with_role("admin").with_plan("basic");
        let matched = TargetingRuleEngine::first_match(&rules, &admin).unwrap();
        assert_eq!(matched.attribute, "role");

        let nobody = UserContext::new("u2").with_plan("basic");
        assert!(TargetingRuleEngine::first_match(&rules, &nobody).is_none());
    }

    #[test]
    fn test_free_form_attributes_resolve_after_builtins() {
        let ctx = UserContext::new("u1").with_attribute("beta_cohort", "alpha");
        let cohort = rule("beta_cohort", TargetingOperator::In, &["alpha", "bravo"]);
        assert!(TargetingRuleEngine::matches(&cohort, &ctx));
    }
}
