//! Change event definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Mutation kind carried by a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagOperation {
    Created,
    Updated,
    Deleted,
}

/// Published whenever a flag definition changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagChanged {
    /// Unique event id
    pub id: Uuid,

    /// Name of the flag that changed
    pub flag_name: String,

    /// What happened to it
    pub operation: FlagOperation,

    /// When the event was created
    pub timestamp: DateTime<Utc>,
}

impl FlagChanged {
    pub fn new(flag_name: impl Into<String>, operation: FlagOperation) -> Self {
        Self {
            id: Uuid::new_v4(),
            flag_name: flag_name.into(),
            operation,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_construction() {
        let event = FlagChanged::new("new-ui", FlagOperation::Updated);
        assert_eq!(event.flag_name, "new-ui");
        assert_eq!(event.operation, FlagOperation::Updated);
    }

    #[test]
    fn test_operation_wire_names() {
        let json = serde_json::to_string(&FlagOperation::Deleted).unwrap();
        assert_eq!(json, "\"deleted\"");
    }
}
