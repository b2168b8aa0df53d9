// Item lifecycle state machine
//
// Every batch item moves Pending -> {Rejected | Validated} -> {MarkedCreate |
// MarkedUpdate} -> {Committed | DroppedByPolicy}. Any other transition is an
// internal error.

pub mod events;
pub mod item_state_machine;
pub mod states;

pub use events::ItemEvent;
pub use item_state_machine::{determine_target_state, ItemStateMachine};
pub use states::ItemState;
