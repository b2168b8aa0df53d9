use super::{ItemEvent, ItemState};
use crate::error::{BulkError, Result};
use tracing::trace;

/// Checked state tracker for one batch item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemStateMachine {
    index: usize,
    state: ItemState,
}

impl ItemStateMachine {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            state: ItemState::Pending,
        }
    }

    pub fn state(&self) -> ItemState {
        self.state
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Apply `event`, failing on a transition the lifecycle does not allow
    pub fn transition(&mut self, event: ItemEvent) -> Result<ItemState> {
        let target = determine_target_state(self.state, event).ok_or_else(|| {
            BulkError::internal(format!(
                "Illegal transition for item {}: {} on {}",
                self.index,
                event.event_type(),
                self.state
            ))
        })?;

        trace!(
            index = self.index,
            from = %self.state,
            to = %target,
            event = event.event_type(),
            "Item state transition"
        );
        self.state = target;
        Ok(target)
    }
}

/// Target state for `event` applied in `current`, or `None` if illegal
pub fn determine_target_state(current: ItemState, event: ItemEvent) -> Option<ItemState> {
    let target = match (current, event) {
        (ItemState::Pending, ItemEvent::Validate) => ItemState::Validated,
        (ItemState::Pending, ItemEvent::Reject) => ItemState::Rejected,

        // Required-on-create and slug conflicts surface after validation
        (ItemState::Validated, ItemEvent::Reject) => ItemState::Rejected,
        (ItemState::Validated, ItemEvent::MarkCreate) => ItemState::MarkedCreate,
        (ItemState::Validated, ItemEvent::MarkUpdate) => ItemState::MarkedUpdate,
        (ItemState::Validated, ItemEvent::DropByPolicy) => ItemState::DroppedByPolicy,

        (ItemState::MarkedCreate | ItemState::MarkedUpdate, ItemEvent::Commit) => {
            ItemState::Committed
        }
        (ItemState::MarkedCreate | ItemState::MarkedUpdate, ItemEvent::DropByPolicy) => {
            ItemState::DroppedByPolicy
        }

        _ => return None,
    };
    Some(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_reaches_committed() {
        let mut machine = ItemStateMachine::new(0);
        assert_eq!(
            machine.transition(ItemEvent::Validate).unwrap(),
            ItemState::Validated
        );
        assert_eq!(
            machine.transition(ItemEvent::MarkUpdate).unwrap(),
            ItemState::MarkedUpdate
        );
        assert_eq!(
            machine.transition(ItemEvent::Commit).unwrap(),
            ItemState::Committed
        );
        assert!(machine.state().is_terminal());
    }

    #[test]
    fn terminal_states_accept_nothing() {
        for event in [
            ItemEvent::Validate,
            ItemEvent::Reject,
            ItemEvent::MarkCreate,
            ItemEvent::Commit,
            ItemEvent::DropByPolicy,
        ] {
            assert!(determine_target_state(ItemState::Rejected, event).is_none());
            assert!(determine_target_state(ItemState::Committed, event).is_none());
        }
    }

    #[test]
    fn illegal_transition_is_internal_error() {
        let mut machine = ItemStateMachine::new(3);
        let err = machine.transition(ItemEvent::Commit).unwrap_err();
        assert!(matches!(err, BulkError::Internal(_)));
        assert!(err.to_string().contains("item 3"));
        assert_eq!(machine.state(), ItemState::Pending);
    }
}
