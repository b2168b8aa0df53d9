use serde::{Deserialize, Serialize};

/// Events that can trigger item state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemEvent {
    /// Every validation rule passed
    Validate,
    /// A validation or conflict-resolution rule failed
    Reject,
    /// No existing record holds the resolved slug
    MarkCreate,
    /// The resolved slug belongs to an existing record
    MarkUpdate,
    /// The write was committed
    Commit,
    /// The batch policy voided the item
    DropByPolicy,
}

impl ItemEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Reject => "reject",
            Self::MarkCreate => "mark_create",
            Self::MarkUpdate => "mark_update",
            Self::Commit => "commit",
            Self::DropByPolicy => "drop_by_policy",
        }
    }

    /// Check if this event represents a terminal transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Reject | Self::Commit | Self::DropByPolicy)
    }
}
