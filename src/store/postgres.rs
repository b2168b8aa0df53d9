//! PostgreSQL entity store.
//!
//! One `sqlx::Transaction` spans the whole batch. Reads and writes are
//! delegated to the model functions, which take `&mut PgConnection` so they
//! run inside the open transaction.

use super::{EntitiesByKind, EntityStore, StoreError, StoreResult, StoreTransaction};
use crate::config::DatabaseConfig;
use crate::models::{
    Attribute, AttributeValue, Category, Entity, Namespace, NaturalKey, Product, ProductType,
};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect using the `database` configuration section
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        info!(
            "Initializing catalog database pool with {} max connections",
            config.max_connections
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .connect(&config.url)
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to connect to database: {e}")))?;

        Ok(Self { pool })
    }

    /// Apply the bundled catalog migrations
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database {
                operation: "migrate".to_string(),
                reason: e.to_string(),
            })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    type Transaction = PgStoreTransaction;

    async fn begin(&self) -> StoreResult<PgStoreTransaction> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::database("begin", e))?;
        Ok(PgStoreTransaction { tx })
    }
}

pub struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

impl std::fmt::Debug for PgStoreTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgStoreTransaction").finish_non_exhaustive()
    }
}

/// Requested keys split by namespace
#[derive(Default)]
struct KeysByNamespace {
    attributes: Vec<String>,
    values: Vec<(String, String)>,
    products: Vec<String>,
    categories: Vec<String>,
    product_types: Vec<String>,
}

impl KeysByNamespace {
    fn split(keys: &[NaturalKey]) -> Self {
        let mut grouped = Self::default();
        for key in keys {
            let slug = key.slug.clone();
            match &key.namespace {
                Namespace::Attributes => grouped.attributes.push(slug),
                Namespace::AttributeValues { attribute } => {
                    grouped.values.push((attribute.clone(), slug))
                }
                Namespace::Products => grouped.products.push(slug),
                Namespace::Categories => grouped.categories.push(slug),
                Namespace::ProductTypes => grouped.product_types.push(slug),
            }
        }
        grouped
    }
}

fn keyed(namespace: Namespace, slugs: Vec<String>) -> impl Iterator<Item = NaturalKey> {
    slugs
        .into_iter()
        .map(move |slug| NaturalKey::new(namespace.clone(), slug))
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn persisted_slugs(&mut self, bases: &[NaturalKey]) -> StoreResult<HashSet<NaturalKey>> {
        const OP: &str = "persisted_slugs";
        let keys = KeysByNamespace::split(bases);
        let mut found = HashSet::new();

        if !keys.attributes.is_empty() {
            let slugs = Attribute::persisted_slugs(&mut self.tx, &keys.attributes)
                .await
                .map_err(|e| StoreError::database(OP, e))?;
            found.extend(keyed(Namespace::Attributes, slugs));
        }
        if !keys.values.is_empty() {
            let pairs = AttributeValue::persisted_slugs(&mut self.tx, &keys.values)
                .await
                .map_err(|e| StoreError::database(OP, e))?;
            found.extend(pairs.into_iter().map(|(attribute, slug)| {
                NaturalKey::new(Namespace::attribute_values(attribute), slug)
            }));
        }
        if !keys.products.is_empty() {
            let slugs = Product::persisted_slugs(&mut self.tx, &keys.products)
                .await
                .map_err(|e| StoreError::database(OP, e))?;
            found.extend(keyed(Namespace::Products, slugs));
        }
        if !keys.categories.is_empty() {
            let slugs = Category::persisted_slugs(&mut self.tx, &keys.categories)
                .await
                .map_err(|e| StoreError::database(OP, e))?;
            found.extend(keyed(Namespace::Categories, slugs));
        }
        if !keys.product_types.is_empty() {
            let slugs = ProductType::persisted_slugs(&mut self.tx, &keys.product_types)
                .await
                .map_err(|e| StoreError::database(OP, e))?;
            found.extend(keyed(Namespace::ProductTypes, slugs));
        }

        debug!(requested = bases.len(), found = found.len(), "Loaded persisted slugs");
        Ok(found)
    }

    async fn lookup_by_slug(
        &mut self,
        keys: &[NaturalKey],
    ) -> StoreResult<HashMap<NaturalKey, Entity>> {
        const OP: &str = "lookup_by_slug";
        let grouped = KeysByNamespace::split(keys);
        let mut entities: Vec<Entity> = Vec::new();

        if !grouped.attributes.is_empty() {
            let rows = Attribute::find_by_slugs(&mut self.tx, &grouped.attributes)
                .await
                .map_err(|e| StoreError::database(OP, e))?;
            entities.extend(rows.into_iter().map(Entity::Attribute));
        }
        if !grouped.values.is_empty() {
            let rows = AttributeValue::find_by_keys(&mut self.tx, &grouped.values)
                .await
                .map_err(|e| StoreError::database(OP, e))?;
            entities.extend(rows.into_iter().map(Entity::AttributeValue));
        }
        if !grouped.products.is_empty() {
            let rows = Product::find_by_slugs(&mut self.tx, &grouped.products)
                .await
                .map_err(|e| StoreError::database(OP, e))?;
            entities.extend(rows.into_iter().map(Entity::Product));
        }
        if !grouped.categories.is_empty() {
            let rows = Category::find_by_slugs(&mut self.tx, &grouped.categories)
                .await
                .map_err(|e| StoreError::database(OP, e))?;
            entities.extend(rows.into_iter().map(Entity::Category));
        }
        if !grouped.product_types.is_empty() {
            let rows = ProductType::find_by_slugs(&mut self.tx, &grouped.product_types)
                .await
                .map_err(|e| StoreError::database(OP, e))?;
            entities.extend(rows.into_iter().map(Entity::ProductType));
        }

        Ok(entities
            .into_iter()
            .map(|entity| (entity.natural_key(), entity))
            .collect())
    }

    async fn bulk_create(&mut self, entities: &[Entity]) -> StoreResult<u64> {
        const OP: &str = "bulk_create";
        let grouped = EntitiesByKind::split(entities);
        grouped.ensure_writable(OP)?;

        let write_err = |e: sqlx::Error| StoreError::WriteFailed {
            operation: OP.to_string(),
            reason: e.to_string(),
        };

        // Parents first so value and product foreign keys resolve
        let mut rows = Attribute::insert_many(&mut self.tx, &grouped.attributes)
            .await
            .map_err(write_err)?;
        rows += Category::insert_many(&mut self.tx, &grouped.categories)
            .await
            .map_err(write_err)?;
        rows += AttributeValue::insert_many(&mut self.tx, &grouped.values)
            .await
            .map_err(write_err)?;
        rows += Product::insert_many(&mut self.tx, &grouped.products)
            .await
            .map_err(write_err)?;

        debug!(rows, "Bulk create completed");
        Ok(rows)
    }

    async fn bulk_update(&mut self, entities: &[Entity], fields: &[&str]) -> StoreResult<u64> {
        const OP: &str = "bulk_update";
        let grouped = EntitiesByKind::split(entities);
        grouped.ensure_writable(OP)?;

        let write_err = |e: sqlx::Error| StoreError::WriteFailed {
            operation: OP.to_string(),
            reason: e.to_string(),
        };

        let mut rows = Attribute::update_many(&mut self.tx, &grouped.attributes, fields)
            .await
            .map_err(write_err)?;
        rows += Category::update_many(&mut self.tx, &grouped.categories, fields)
            .await
            .map_err(write_err)?;
        rows += AttributeValue::update_many(&mut self.tx, &grouped.values, fields)
            .await
            .map_err(write_err)?;
        rows += Product::update_many(&mut self.tx, &grouped.products, fields)
            .await
            .map_err(write_err)?;

        debug!(rows, fields = ?fields, "Bulk update completed");
        Ok(rows)
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| StoreError::database("commit", e))
    }

    async fn rollback(self) -> StoreResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| StoreError::database("rollback", e))
    }
}
