use super::types::{EventKind, LifecycleEvent};
use crate::models::Entity;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Destination for lifecycle events, called only after a commit succeeded
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, kind: EventKind, entity: &Entity) -> Result<(), PublishError>;
}

/// Error types for event publishing
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Event channel is closed")]
    ChannelClosed,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Event sink rejected {kind}: {reason}")]
    Rejected { kind: EventKind, reason: String },
}

/// Publishes lifecycle events on a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl BroadcastEventSink {
    /// Create a new sink with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl EventSink for BroadcastEventSink {
    async fn emit(&self, kind: EventKind, entity: &Entity) -> Result<(), PublishError> {
        let event = LifecycleEvent {
            kind,
            slug: entity.slug().to_string(),
            payload: serde_json::to_value(entity)?,
            published_at: chrono::Utc::now(),
        };

        // No subscribers is not a failure
        let _ = self.sender.send(event);
        Ok(())
    }
}

/// Keeps every emitted event in memory, in emission order
#[derive(Debug, Clone, Default)]
pub struct CollectingEventSink {
    events: Arc<Mutex<Vec<(EventKind, Entity)>>>,
    fail_on: Arc<Mutex<Option<EventKind>>>,
}

impl CollectingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every emit of `kind` fail until cleared
    pub fn fail_on(&self, kind: EventKind) {
        *self.fail_on.lock() = Some(kind);
    }

    pub fn events(&self) -> Vec<(EventKind, Entity)> {
        self.events.lock().clone()
    }

    /// `kind:slug` pairs in emission order
    pub fn summary(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .map(|(kind, entity)| format!("{kind}:{}", entity.slug()))
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
        *self.fail_on.lock() = None;
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, kind: EventKind, entity: &Entity) -> Result<(), PublishError> {
        if *self.fail_on.lock() == Some(kind) {
            return Err(PublishError::Rejected {
                kind,
                reason: "configured to fail".to_string(),
            });
        }
        self.events.lock().push((kind, entity.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductType;

    fn entity() -> Entity {
        Entity::ProductType(ProductType::new("shoes", "Shoes"))
    }

    #[tokio::test]
    async fn broadcast_reaches_subscribers() {
        let sink = BroadcastEventSink::new(8);
        let mut receiver = sink.subscribe();
        assert_eq!(sink.subscriber_count(), 1);

        sink.emit(EventKind::ProductCreated, &entity()).await.unwrap();
        let event = receiver.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::ProductCreated);
        assert_eq!(event.slug, "shoes");
        assert_eq!(event.payload["kind"], "product_type");
    }

    #[tokio::test]
    async fn broadcast_without_subscribers_is_ok() {
        let sink = BroadcastEventSink::default();
        assert!(sink.emit(EventKind::ProductUpdated, &entity()).await.is_ok());
    }

    #[tokio::test]
    async fn collecting_sink_can_fail() {
        let sink = CollectingEventSink::new();
        sink.fail_on(EventKind::CategoryCreated);
        assert!(sink.emit(EventKind::CategoryCreated, &entity()).await.is_err());
        sink.emit(EventKind::CategoryUpdated, &entity()).await.unwrap();
        assert_eq!(sink.summary(), vec!["category_updated:shoes"]);
    }
}
