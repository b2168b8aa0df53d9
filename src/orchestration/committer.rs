//! # Persistence Committer
//!
//! Writes a batch's creates and updates inside the caller's transaction, in
//! chunks of at most `chunk_size` rows per store call. Chunking only bounds
//! statement size; nothing is visible until the transaction commits.

use crate::error::Result;
use crate::models::Entity;
use crate::store::StoreTransaction;
use std::collections::BTreeSet;
use tracing::debug;

/// Entities to write for one batch, already filtered by policy
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitPlan {
    pub creates: Vec<Entity>,
    pub updates: Vec<Entity>,
    /// Union of the columns supplied by the updating items
    pub update_fields: BTreeSet<&'static str>,
    pub value_creates: Vec<Entity>,
    pub value_updates: Vec<Entity>,
    pub value_update_fields: BTreeSet<&'static str>,
}

impl CommitPlan {
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty()
            && self.updates.is_empty()
            && self.value_creates.is_empty()
            && self.value_updates.is_empty()
    }

    pub fn total_rows(&self) -> usize {
        self.creates.len() + self.updates.len() + self.value_creates.len() + self.value_updates.len()
    }
}

/// Rows written per phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    pub created: u64,
    pub updated: u64,
    pub values_created: u64,
    pub values_updated: u64,
    pub store_calls: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct PersistenceCommitter {
    chunk_size: usize,
}

impl PersistenceCommitter {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Top-level creates, top-level updates, nested creates, nested updates.
    /// The first failing store call aborts; the caller rolls back.
    pub async fn commit<T: StoreTransaction>(
        &self,
        tx: &mut T,
        plan: &CommitPlan,
    ) -> Result<CommitStats> {
        let mut stats = CommitStats::default();

        stats.created = self.create_chunked(tx, &plan.creates, &mut stats.store_calls).await?;
        stats.updated = self
            .update_chunked(tx, &plan.updates, &plan.update_fields, &mut stats.store_calls)
            .await?;
        stats.values_created = self
            .create_chunked(tx, &plan.value_creates, &mut stats.store_calls)
            .await?;
        stats.values_updated = self
            .update_chunked(
                tx,
                &plan.value_updates,
                &plan.value_update_fields,
                &mut stats.store_calls,
            )
            .await?;

        debug!(
            created = stats.created,
            updated = stats.updated,
            values_created = stats.values_created,
            values_updated = stats.values_updated,
            store_calls = stats.store_calls,
            chunk_size = self.chunk_size,
            "Batch written"
        );
        Ok(stats)
    }

    async fn create_chunked<T: StoreTransaction>(
        &self,
        tx: &mut T,
        entities: &[Entity],
        calls: &mut usize,
    ) -> Result<u64> {
        let mut written = 0;
        for chunk in entities.chunks(self.chunk_size) {
            written += tx.bulk_create(chunk).await?;
            *calls += 1;
        }
        Ok(written)
    }

    async fn update_chunked<T: StoreTransaction>(
        &self,
        tx: &mut T,
        entities: &[Entity],
        fields: &BTreeSet<&'static str>,
        calls: &mut usize,
    ) -> Result<u64> {
        let fields: Vec<&str> = fields.iter().copied().collect();
        let mut written = 0;
        for chunk in entities.chunks(self.chunk_size) {
            written += tx.bulk_update(chunk, &fields).await?;
            *calls += 1;
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use crate::store::{EntityStore, InMemoryStore};
    use chrono::Utc;
    use uuid::Uuid;

    fn category(slug: &str) -> Entity {
        let now = Utc::now();
        Entity::Category(Category {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            name: slug.to_uppercase(),
            description: None,
            parent_slug: None,
            seo_title: None,
            seo_description: None,
            created_at: now,
            updated_at: now,
        })
    }

    #[tokio::test]
    async fn writes_in_chunks() {
        let store = InMemoryStore::new();
        let plan = CommitPlan {
            creates: (0..5).map(|i| category(&format!("c{i}"))).collect(),
            ..CommitPlan::default()
        };

        let mut tx = store.begin().await.unwrap();
        let stats = PersistenceCommitter::new(2).commit(&mut tx, &plan).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(stats.created, 5);
        assert_eq!(stats.store_calls, 3);
        assert_eq!(store.stats().create_calls, 3);
        assert_eq!(store.snapshot().await.categories.len(), 5);
    }

    #[tokio::test]
    async fn failure_mid_batch_leaves_nothing_after_rollback() {
        let store = InMemoryStore::new();
        store.fail_writes_after(1);
        let plan = CommitPlan {
            creates: (0..4).map(|i| category(&format!("c{i}"))).collect(),
            ..CommitPlan::default()
        };

        let mut tx = store.begin().await.unwrap();
        let result = PersistenceCommitter::new(2).commit(&mut tx, &plan).await;
        assert!(result.is_err());
        tx.rollback().await.unwrap();

        assert!(store.snapshot().await.categories.is_empty());
    }

    #[test]
    fn zero_chunk_size_is_clamped() {
        assert_eq!(PersistenceCommitter::new(0).chunk_size(), 1);
    }
}
