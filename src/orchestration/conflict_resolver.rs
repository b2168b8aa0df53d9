//! # Conflict Resolver
//!
//! Classifies resolved slugs as CREATE or UPDATE against the records read
//! during the batch. Intra-batch duplicates never reach this point: the slug
//! registry has already made every allocated slug unique.

use super::types::Classification;
use crate::models::{Entity, NaturalKey};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ConflictResolver {
    existing: HashMap<NaturalKey, Entity>,
}

impl ConflictResolver {
    pub fn new(existing: HashMap<NaturalKey, Entity>) -> Self {
        Self { existing }
    }

    /// Add records read after the resolver was built
    pub fn extend(&mut self, records: HashMap<NaturalKey, Entity>) {
        self.existing.extend(records);
    }

    pub fn classify(&self, key: &NaturalKey) -> Classification {
        match self.existing.get(key) {
            Some(existing) => Classification::Update {
                existing: existing.clone(),
            },
            None => Classification::Create,
        }
    }

    /// The record `key` would update, if any
    pub fn target(&self, key: &NaturalKey) -> Option<&Entity> {
        self.existing.get(key)
    }

    pub fn known_records(&self) -> usize {
        self.existing.len()
    }
}
