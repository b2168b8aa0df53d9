use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one batch item within a single call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    /// Received, not yet validated
    #[default]
    Pending,
    /// Failed validation or conflict resolution
    Rejected,
    /// Passed every validation rule
    Validated,
    /// Slug is new in its namespace
    MarkedCreate,
    /// Slug targets an existing record
    MarkedUpdate,
    /// Written and committed
    Committed,
    /// Valid but discarded because the batch policy voided it
    DroppedByPolicy,
}

impl ItemState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Rejected | Self::Committed | Self::DroppedByPolicy
        )
    }

    /// Check if the item is headed for a write
    pub fn is_marked(&self) -> bool {
        matches!(self, Self::MarkedCreate | Self::MarkedUpdate)
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Rejected => write!(f, "rejected"),
            Self::Validated => write!(f, "validated"),
            Self::MarkedCreate => write!(f, "marked_create"),
            Self::MarkedUpdate => write!(f, "marked_update"),
            Self::Committed => write!(f, "committed"),
            Self::DroppedByPolicy => write!(f, "dropped_by_policy"),
        }
    }
}

impl std::str::FromStr for ItemState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "rejected" => Ok(Self::Rejected),
            "validated" => Ok(Self::Validated),
            "marked_create" => Ok(Self::MarkedCreate),
            "marked_update" => Ok(Self::MarkedUpdate),
            "committed" => Ok(Self::Committed),
            "dropped_by_policy" => Ok(Self::DroppedByPolicy),
            _ => Err(format!("Invalid item state: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(ItemState::Rejected.is_terminal());
        assert!(ItemState::Committed.is_terminal());
        assert!(ItemState::DroppedByPolicy.is_terminal());
        assert!(!ItemState::Validated.is_terminal());
        assert!(!ItemState::MarkedUpdate.is_terminal());
    }

    #[test]
    fn display_parses_back() {
        for state in [
            ItemState::Pending,
            ItemState::MarkedCreate,
            ItemState::DroppedByPolicy,
        ] {
            assert_eq!(state.to_string().parse::<ItemState>().unwrap(), state);
        }
    }
}
