//! Shared helpers for the integration tests

#![allow(dead_code)]

pub mod builders;
pub mod strategies;

pub use builders::*;

use catalog_bulk::config::BatchConfig;
use catalog_bulk::{
    BatchOrchestrator, BatchRequest, BatchResult, Caller, CollectingEventSink, EntityKind,
    ErrorPolicy, InMemoryStore,
};
use serde_json::{Map, Value};
use std::sync::Arc;

/// JSON object literal as a raw item
pub fn object(value: Value) -> Map<String, Value> {
    value
        .as_object()
        .cloned()
        .expect("test item must be a JSON object")
}

pub fn items(values: Vec<Value>) -> Vec<Map<String, Value>> {
    values.into_iter().map(object).collect()
}

pub fn admin() -> Caller {
    Caller::superuser("admin")
}

/// Orchestrator over an in-memory store, plus handles to inspect both sides
pub struct Harness {
    pub orchestrator: BatchOrchestrator<InMemoryStore>,
    pub store: InMemoryStore,
    pub sink: CollectingEventSink,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(BatchConfig::default())
    }

    pub fn with_config(config: BatchConfig) -> Self {
        Self::with_store(InMemoryStore::new(), config)
    }

    pub fn with_store(store: InMemoryStore, config: BatchConfig) -> Self {
        let sink = CollectingEventSink::new();
        let orchestrator = BatchOrchestrator::new(store.clone(), Arc::new(sink.clone()), config);
        Self {
            orchestrator,
            store,
            sink,
        }
    }

    /// Store seeded with the `shoes` and `hats` product types
    pub async fn with_product_types() -> Self {
        let harness = Self::new();
        harness.store.seed_product_type("shoes", "Shoes").await;
        harness.store.seed_product_type("hats", "Hats").await;
        harness
    }

    pub async fn upsert(
        &self,
        kind: EntityKind,
        raw: Vec<Value>,
        policy: ErrorPolicy,
    ) -> BatchResult {
        let request = BatchRequest::new(kind, items(raw)).with_policy(policy);
        self.orchestrator
            .upsert(&admin(), request)
            .await
            .expect("batch call failed")
    }
}
