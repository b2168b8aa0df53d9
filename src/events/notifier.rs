use super::publisher::EventSink;
use super::types::EventKind;
use crate::models::Entity;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Sends post-commit events to the configured sink.
///
/// The write is already durable when this runs, so a failing sink is logged
/// and counted but never surfaces as an error.
pub struct EventNotifier {
    sink: Arc<dyn EventSink>,
    failures: AtomicU64,
}

impl EventNotifier {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            failures: AtomicU64::new(0),
        }
    }

    /// Emit one event per committed entity, in the order given.
    /// Returns the number of events the sink accepted.
    pub async fn notify(&self, committed: &[(EventKind, Entity)]) -> usize {
        let mut delivered = 0;
        for (kind, entity) in committed {
            match self.sink.emit(*kind, entity).await {
                Ok(()) => delivered += 1,
                Err(error) => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        event = %kind,
                        slug = %entity.slug(),
                        error = %error,
                        "Failed to emit lifecycle event"
                    );
                }
            }
        }
        debug!(delivered, total = committed.len(), "Lifecycle events emitted");
        delivered
    }

    /// Total emit failures since this notifier was created
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for EventNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventNotifier")
            .field("failures", &self.failure_count())
            .finish()
    }
}
