//! # Error Aggregator
//!
//! Owns the per-index error lists for one batch and turns them into a single
//! policy decision once every item has been looked at.

use crate::constants::ErrorPolicy;
use crate::validation::ValidationError;
use std::collections::BTreeMap;

/// What the committer is allowed to do with the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    /// No item failed
    CommitAll,
    /// Some items failed; commit the rest
    CommitPassing,
    /// Some item failed under REJECT_EVERYTHING; write nothing
    RejectAll,
}

impl PolicyDecision {
    pub fn commits(&self) -> bool {
        !matches!(self, Self::RejectAll)
    }
}

/// Append-only `index -> errors` map
#[derive(Debug, Clone, Default)]
pub struct ErrorAggregator {
    len: usize,
    errors: BTreeMap<usize, Vec<ValidationError>>,
}

impl ErrorAggregator {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            errors: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, index: usize, errors: impl IntoIterator<Item = ValidationError>) {
        let mut errors = errors.into_iter().peekable();
        if errors.peek().is_none() {
            return;
        }
        self.errors.entry(index).or_default().extend(errors);
    }

    pub fn errors_for(&self, index: usize) -> &[ValidationError] {
        self.errors.get(&index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn failed_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.errors.keys().copied()
    }

    pub fn failed_count(&self) -> usize {
        self.errors.len()
    }

    /// Evaluate `policy` against everything recorded so far
    pub fn decide(&self, policy: ErrorPolicy) -> PolicyDecision {
        match (self.has_errors(), policy) {
            (false, _) => PolicyDecision::CommitAll,
            (true, ErrorPolicy::RejectEverything) => PolicyDecision::RejectAll,
            (true, ErrorPolicy::RejectFailedRows) => PolicyDecision::CommitPassing,
        }
    }

    /// Error lists aligned to input positions
    pub fn into_lists(mut self) -> Vec<Vec<ValidationError>> {
        (0..self.len)
            .map(|index| self.errors.remove(&index).unwrap_or_default())
            .collect()
    }
}
