//! In-process entity store.
//!
//! Transactions serialize on a `tokio::sync::Mutex`: `begin` takes the lock,
//! works on a private copy of the catalog, and `commit` swaps the copy in.
//! Rolling back (or dropping the transaction) leaves the catalog untouched.

use super::{matches_base, EntitiesByKind, EntityStore, StoreError, StoreResult, StoreTransaction};
use crate::models::{
    Attribute, AttributeValue, Category, Entity, Namespace, NaturalKey, Product, ProductType,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

/// Full catalog contents held by the in-memory store
#[derive(Debug, Clone, Default)]
pub struct CatalogState {
    pub attributes: BTreeMap<String, Attribute>,
    /// Keyed by `(attribute_slug, slug)`
    pub values: BTreeMap<(String, String), AttributeValue>,
    pub products: BTreeMap<String, Product>,
    pub categories: BTreeMap<String, Category>,
    pub product_types: BTreeMap<String, ProductType>,
}

impl CatalogState {
    pub fn insert(&mut self, entity: Entity) {
        match entity {
            Entity::Attribute(a) => {
                self.attributes.insert(a.slug.clone(), a);
            }
            Entity::AttributeValue(v) => {
                self.values
                    .insert((v.attribute_slug.clone(), v.slug.clone()), v);
            }
            Entity::Product(p) => {
                self.products.insert(p.slug.clone(), p);
            }
            Entity::Category(c) => {
                self.categories.insert(c.slug.clone(), c);
            }
            Entity::ProductType(t) => {
                self.product_types.insert(t.slug.clone(), t);
            }
        }
    }

    pub fn get(&self, key: &NaturalKey) -> Option<Entity> {
        match &key.namespace {
            Namespace::Attributes => self.attributes.get(&key.slug).cloned().map(Entity::Attribute),
            Namespace::AttributeValues { attribute } => self
                .values
                .get(&(attribute.clone(), key.slug.clone()))
                .cloned()
                .map(Entity::AttributeValue),
            Namespace::Products => self.products.get(&key.slug).cloned().map(Entity::Product),
            Namespace::Categories => self.categories.get(&key.slug).cloned().map(Entity::Category),
            Namespace::ProductTypes => self
                .product_types
                .get(&key.slug)
                .cloned()
                .map(Entity::ProductType),
        }
    }

    fn slugs_in(&self, namespace: &Namespace) -> Vec<&str> {
        match namespace {
            Namespace::Attributes => self.attributes.keys().map(String::as_str).collect(),
            Namespace::AttributeValues { attribute } => self
                .values
                .keys()
                .filter(|(owner, _)| owner == attribute)
                .map(|(_, slug)| slug.as_str())
                .collect(),
            Namespace::Products => self.products.keys().map(String::as_str).collect(),
            Namespace::Categories => self.categories.keys().map(String::as_str).collect(),
            Namespace::ProductTypes => self.product_types.keys().map(String::as_str).collect(),
        }
    }

    /// Values belonging to `attribute`, ordered by slug
    pub fn values_of(&self, attribute: &str) -> Vec<&AttributeValue> {
        self.values
            .iter()
            .filter(|((owner, _), _)| owner == attribute)
            .map(|(_, value)| value)
            .collect()
    }

    fn contains_key(&self, entity: &Entity) -> bool {
        self.get(&entity.natural_key()).is_some()
    }

    fn update(&mut self, entity: &Entity, fields: &[&str]) -> bool {
        let key = entity.natural_key();
        let target: Option<Entity> = self.get(&key).filter(|current| current.id() == entity.id());
        match target {
            Some(mut current) => {
                current.copy_columns(entity, fields);
                self.insert(current);
                true
            }
            None => false,
        }
    }
}

/// Call counters, read through [`InMemoryStore::stats`]
#[derive(Debug, Default)]
struct Counters {
    transactions: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    slug_reads: AtomicUsize,
    lookups: AtomicUsize,
    create_calls: AtomicUsize,
    update_calls: AtomicUsize,
    rows_created: AtomicUsize,
    rows_updated: AtomicUsize,
}

/// Snapshot of store activity since construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    pub transactions: usize,
    pub commits: usize,
    pub rollbacks: usize,
    pub slug_reads: usize,
    pub lookups: usize,
    pub create_calls: usize,
    pub update_calls: usize,
    pub rows_created: usize,
    pub rows_updated: usize,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<AsyncMutex<CatalogState>>,
    counters: Arc<Counters>,
    /// Number of write calls allowed before writes start failing
    write_budget: Arc<Mutex<Option<usize>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `entities`
    pub fn with_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        let mut state = CatalogState::default();
        for entity in entities {
            state.insert(entity);
        }
        Self {
            state: Arc::new(AsyncMutex::new(state)),
            ..Self::default()
        }
    }

    pub async fn seed(&self, entity: Entity) {
        self.state.lock().await.insert(entity);
    }

    pub async fn seed_product_type(&self, slug: &str, name: &str) -> ProductType {
        let product_type = ProductType::new(slug, name);
        self.seed(Entity::ProductType(product_type.clone())).await;
        product_type
    }

    /// Copy of the committed catalog
    pub async fn snapshot(&self) -> CatalogState {
        self.state.lock().await.clone()
    }

    /// Let `calls` more write calls succeed, then fail every write
    pub fn fail_writes_after(&self, calls: usize) {
        *self.write_budget.lock() = Some(calls);
    }

    pub fn clear_write_failures(&self) {
        *self.write_budget.lock() = None;
    }

    pub fn stats(&self) -> StoreStats {
        let c = &self.counters;
        StoreStats {
            transactions: c.transactions.load(Ordering::SeqCst),
            commits: c.commits.load(Ordering::SeqCst),
            rollbacks: c.rollbacks.load(Ordering::SeqCst),
            slug_reads: c.slug_reads.load(Ordering::SeqCst),
            lookups: c.lookups.load(Ordering::SeqCst),
            create_calls: c.create_calls.load(Ordering::SeqCst),
            update_calls: c.update_calls.load(Ordering::SeqCst),
            rows_created: c.rows_created.load(Ordering::SeqCst),
            rows_updated: c.rows_updated.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl EntityStore for InMemoryStore {
    type Transaction = MemoryTransaction;

    async fn begin(&self) -> StoreResult<MemoryTransaction> {
        let guard = self.state.clone().lock_owned().await;
        let working = (*guard).clone();
        self.counters.transactions.fetch_add(1, Ordering::SeqCst);
        debug!("In-memory transaction started");
        Ok(MemoryTransaction {
            guard,
            working,
            counters: self.counters.clone(),
            write_budget: self.write_budget.clone(),
        })
    }
}

/// Exclusive transaction over the in-memory catalog
#[derive(Debug)]
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<CatalogState>,
    working: CatalogState,
    counters: Arc<Counters>,
    write_budget: Arc<Mutex<Option<usize>>>,
}

impl MemoryTransaction {
    fn spend_write(&self, operation: &str) -> StoreResult<()> {
        let mut budget = self.write_budget.lock();
        match budget.as_mut() {
            Some(0) => Err(StoreError::WriteFailed {
                operation: operation.to_string(),
                reason: "injected write failure".to_string(),
            }),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn persisted_slugs(&mut self, bases: &[NaturalKey]) -> StoreResult<HashSet<NaturalKey>> {
        self.counters.slug_reads.fetch_add(1, Ordering::SeqCst);
        let mut found = HashSet::new();
        for base in bases {
            for slug in self.working.slugs_in(&base.namespace) {
                if matches_base(slug, &base.slug) {
                    found.insert(NaturalKey::new(base.namespace.clone(), slug));
                }
            }
        }
        Ok(found)
    }

    async fn lookup_by_slug(
        &mut self,
        keys: &[NaturalKey],
    ) -> StoreResult<HashMap<NaturalKey, Entity>> {
        self.counters.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(keys
            .iter()
            .filter_map(|key| self.working.get(key).map(|entity| (key.clone(), entity)))
            .collect())
    }

    async fn bulk_create(&mut self, entities: &[Entity]) -> StoreResult<u64> {
        EntitiesByKind::split(entities).ensure_writable("bulk_create")?;
        self.spend_write("bulk_create")?;
        self.counters.create_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(duplicate) = entities.iter().find(|e| self.working.contains_key(e)) {
            return Err(StoreError::WriteFailed {
                operation: "bulk_create".to_string(),
                reason: format!("duplicate key {}", duplicate.natural_key()),
            });
        }
        for entity in entities {
            self.working.insert(entity.clone());
        }
        self.counters
            .rows_created
            .fetch_add(entities.len(), Ordering::SeqCst);
        Ok(entities.len() as u64)
    }

    async fn bulk_update(&mut self, entities: &[Entity], fields: &[&str]) -> StoreResult<u64> {
        EntitiesByKind::split(entities).ensure_writable("bulk_update")?;
        self.spend_write("bulk_update")?;
        self.counters.update_calls.fetch_add(1, Ordering::SeqCst);

        let mut updated = 0;
        for entity in entities {
            if self.working.update(entity, fields) {
                updated += 1;
            }
        }
        self.counters.rows_updated.fetch_add(updated, Ordering::SeqCst);
        Ok(updated as u64)
    }

    async fn commit(self) -> StoreResult<()> {
        let MemoryTransaction {
            mut guard,
            working,
            counters,
            ..
        } = self;
        *guard = working;
        counters.commits.fetch_add(1, Ordering::SeqCst);
        debug!("In-memory transaction committed");
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        self.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
        debug!("In-memory transaction rolled back");
        Ok(())
    }
}
