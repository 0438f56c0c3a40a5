//! User context evaluated against flags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;

/// Attributes describing the user a flag is evaluated for.
///
/// Anonymous evaluation (no `user_id`) is allowed; such users get a fresh
/// random bucket on every call. The context is immutable for the duration
/// of an evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Free-form attributes consulted after the built-in fields
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,
}

impl UserContext {
    /// Context for an identified user.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    /// Context with no identity.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_plan(mut self, plan: impl Into<String>) -> Self {
        self.plan = Some(plan.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Resolve an attribute by name.
    ///
    /// Built-in fields (`user_id`, `email`, `role`, `plan`, `country`,
    /// `created_at`) shadow entries in the free-form map.
    pub fn get(&self, attribute: &str) -> Option<Cow<'_, str>> {
        match attribute {
            "user_id" => self.user_id.as_deref().map(Cow::Borrowed),
            "email" => self.email.as_deref().map(Cow::Borrowed),
            "role" => self.role.as_deref().map(Cow::Borrowed),
            "plan" => self.plan.as_deref().map(Cow::Borrowed),
            "country" => self.country.as_deref().map(Cow::Borrowed),
            "created_at" => self
                .created_at
                .map(|ts| Cow::Owned(ts.to_rfc3339())),
            _ => self
                .attributes
                .get(attribute)
                .map(|v| Cow::Borrowed(v.as_str())),
        }
    }

    /// Whether the context carries a user identity.
    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }
}
