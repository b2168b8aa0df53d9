//! # Entity Store
//!
//! The persistence seam of the bulk engine. The orchestrator only needs four
//! operations inside one atomic scope: read persisted slugs, look records up
//! by natural key, bulk-create and bulk-update. Everything else about storage
//! stays behind [`EntityStore`].
//!
//! Two implementations ship with the crate:
//!
//! - [`InMemoryStore`]: process-local, transactions serialize on an async mutex
//! - `PgEntityStore` (`postgres` feature): PostgreSQL through SQLx, one database
//!   transaction per batch

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::{CatalogState, InMemoryStore, MemoryTransaction, StoreStats};
#[cfg(feature = "postgres")]
pub use postgres::{PgEntityStore, PgStoreTransaction};

use crate::constants::EntityKind;
use crate::models::{Attribute, AttributeValue, Category, Entity, NaturalKey, Product};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error during {operation}: {reason}")]
    Database { operation: String, reason: String },

    #[error("Write failed during {operation}: {reason}")]
    WriteFailed { operation: String, reason: String },

    #[error("Entity kind {kind} is not supported by {operation}")]
    UnsupportedKind { kind: EntityKind, operation: String },

    #[error("Connection error: {0}")]
    Connection(String),
}

impl StoreError {
    #[cfg(feature = "postgres")]
    pub fn database(operation: &str, error: sqlx::Error) -> Self {
        Self::Database {
            operation: operation.to_string(),
            reason: error.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Opens the atomic scope a batch runs in
#[async_trait]
pub trait EntityStore: Send + Sync {
    type Transaction: StoreTransaction;

    async fn begin(&self) -> StoreResult<Self::Transaction>;
}

/// Operations available inside one batch's atomic scope.
///
/// Nothing written through a transaction is visible to other callers until
/// [`commit`](StoreTransaction::commit); dropping or rolling back discards it.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Persisted keys whose slug equals a requested base or `<base>-<n>` in the same namespace
    async fn persisted_slugs(&mut self, bases: &[NaturalKey]) -> StoreResult<HashSet<NaturalKey>>;

    /// Records for the requested keys; missing keys are simply absent
    async fn lookup_by_slug(
        &mut self,
        keys: &[NaturalKey],
    ) -> StoreResult<HashMap<NaturalKey, Entity>>;

    async fn bulk_create(&mut self, entities: &[Entity]) -> StoreResult<u64>;

    /// Overwrite only `fields` (column names) of existing records, matched by id
    async fn bulk_update(&mut self, entities: &[Entity], fields: &[&str]) -> StoreResult<u64>;

    async fn commit(self) -> StoreResult<()>;

    async fn rollback(self) -> StoreResult<()>;
}

/// Borrowed view of a mixed entity slice split by kind
#[derive(Debug, Default)]
pub(crate) struct EntitiesByKind<'a> {
    pub attributes: Vec<&'a Attribute>,
    pub values: Vec<&'a AttributeValue>,
    pub products: Vec<&'a Product>,
    pub categories: Vec<&'a Category>,
    pub read_only: Vec<&'a Entity>,
}

impl<'a> EntitiesByKind<'a> {
    pub fn split(entities: &'a [Entity]) -> Self {
        let mut grouped = Self::default();
        for entity in entities {
            match entity {
                Entity::Attribute(attribute) => grouped.attributes.push(attribute),
                Entity::AttributeValue(value) => grouped.values.push(value),
                Entity::Product(product) => grouped.products.push(product),
                Entity::Category(category) => grouped.categories.push(category),
                Entity::ProductType(_) => grouped.read_only.push(entity),
            }
        }
        grouped
    }

    /// Fails for kinds the engine never writes
    pub fn ensure_writable(&self, operation: &str) -> StoreResult<()> {
        match self.read_only.first() {
            Some(entity) => Err(StoreError::UnsupportedKind {
                kind: entity.kind(),
                operation: operation.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Whether `slug` is `base` itself or `base` followed by `-<digits>`
pub(crate) fn matches_base(slug: &str, base: &str) -> bool {
    if slug == base {
        return true;
    }
    slug.strip_prefix(base)
        .and_then(|rest| rest.strip_prefix('-'))
        .is_some_and(|suffix| !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()))
}
