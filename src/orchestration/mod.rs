//! # Bulk Orchestration
//!
//! Turns one homogeneous batch of raw items into committed catalog records.
//!
//! ## Architecture
//!
//! - **BatchOrchestrator**: runs the pipeline for a call and owns its transaction
//! - **ConflictResolver**: CREATE/UPDATE classification from one batched lookup
//! - **ErrorAggregator**: per-index error lists and the single policy decision
//! - **PersistenceCommitter**: chunked bulk writes inside the open transaction
//!
//! Validation lives in [`crate::validation`], slug generation in
//! [`crate::slug`] and per-item lifecycle tracking in [`crate::state_machine`].
//!
//! ## Guarantees
//!
//! - `results[i]` always describes input item `i`
//! - Under `REJECT_EVERYTHING` a single failing item means nothing is written
//! - Events are published only after the transaction commits

pub mod batch_orchestrator;
pub mod committer;
pub mod conflict_resolver;
pub mod error_aggregator;
pub mod types;

pub use batch_orchestrator::BatchOrchestrator;
pub use committer::{CommitPlan, CommitStats, PersistenceCommitter};
pub use conflict_resolver::ConflictResolver;
pub use error_aggregator::{ErrorAggregator, PolicyDecision};
pub use types::{BatchItem, BatchRequest, BatchResult, Classification, ItemResult};
