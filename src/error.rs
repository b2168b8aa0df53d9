//! Error types for the catalog bulk engine.
//!
//! Item-level failures are never errors here: they are collected as
//! [`ValidationError`](crate::validation::ValidationError) values and returned
//! inside the [`BatchResult`](crate::orchestration::BatchResult). A
//! [`BulkError`] fails the whole call.

use crate::config::ConfigurationError;
use crate::constants::{Capability, EntityKind};
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BulkError {
    #[error("Permission denied for {kind} batch: one of {required:?} is required")]
    PermissionDenied {
        kind: EntityKind,
        required: Vec<Capability>,
    },

    #[error("Batch of {size} items exceeds the configured maximum of {max}")]
    BatchTooLarge { size: usize, max: usize },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BulkError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the failure happened before any item was looked at.
    pub fn is_rejected_upfront(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. } | Self::BatchTooLarge { .. })
    }
}

pub type Result<T> = std::result::Result<T, BulkError>;
