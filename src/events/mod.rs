pub mod notifier;
pub mod publisher;
pub mod types;

pub use notifier::EventNotifier;
pub use publisher::{BroadcastEventSink, CollectingEventSink, EventSink, PublishError};
pub use types::{EventKind, LifecycleEvent};
