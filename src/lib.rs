#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Catalog Bulk
//!
//! Bulk upsert engine for e-commerce catalog records: attributes (with nested
//! values), standalone attribute values, products and categories.
//!
//! ## Overview
//!
//! A caller submits a homogeneous batch of loosely-typed items and an error
//! policy. The engine validates every item, derives URL-safe slugs that are
//! unique per namespace, decides CREATE or UPDATE per item from a single
//! batched lookup, and writes the survivors in chunked bulk operations inside
//! one transaction. Results are positionally aligned with the input and carry
//! per-item errors.
//!
//! ## Error Policies
//!
//! - `REJECT_EVERYTHING` (default): one failing item rolls back the batch
//! - `REJECT_FAILED_ROWS`: valid items commit, failing items report errors
//!
//! ## Module Organization
//!
//! - [`orchestration`] - Batch pipeline, conflict resolution, commit
//! - [`validation`] - Per-item field rules and cleaned drafts
//! - [`slug`] - Slug derivation and uniqueness
//! - [`state_machine`] - Per-item lifecycle
//! - [`store`] - Persistence seam (in-memory and PostgreSQL)
//! - [`models`] - Catalog records
//! - [`events`] - Post-commit lifecycle notifications
//! - [`permissions`] - Caller capabilities
//! - [`config`] - Layered YAML + environment configuration
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust
//! use catalog_bulk::{BatchOrchestrator, BatchRequest, Caller, EntityKind, InMemoryStore};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let orchestrator = BatchOrchestrator::with_defaults(InMemoryStore::new());
//! let items = vec![json!({"name": "Color", "type": "PRODUCT_TYPE"})
//!     .as_object()
//!     .cloned()
//!     .unwrap_or_default()];
//!
//! let result = orchestrator
//!     .upsert(&Caller::superuser("admin"), BatchRequest::new(EntityKind::Attribute, items))
//!     .await
//!     .unwrap();
//! assert_eq!(result.count, 1);
//! # });
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod permissions;
pub mod slug;
pub mod state_machine;
pub mod store;
pub mod validation;

pub use config::{BatchConfig, BulkConfig, ConfigManager, ConfigurationError, DatabaseConfig};
pub use constants::{
    AttributeEntityType, AttributeInputType, AttributeType, Capability, EntityKind, ErrorPolicy,
};
pub use error::{BulkError, Result};
pub use events::{BroadcastEventSink, CollectingEventSink, EventKind, EventSink};
pub use models::{Entity, Namespace, NaturalKey};
pub use orchestration::{BatchOrchestrator, BatchRequest, BatchResult, ItemResult};
pub use permissions::{Caller, CapabilityChecker, GrantedCapabilities};
pub use state_machine::ItemState;
pub use store::{EntityStore, InMemoryStore, StoreError, StoreTransaction};
#[cfg(feature = "postgres")]
pub use store::PgEntityStore;
pub use validation::{ErrorCode, ValidationError};
