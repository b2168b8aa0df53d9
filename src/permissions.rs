//! Capability checks.
//!
//! How permissions are modeled is up to the embedder; the engine only asks
//! whether a caller holds at least one capability from a required set.

use crate::constants::Capability;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Identity and granted capabilities of whoever submitted the batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub id: String,
    pub capabilities: HashSet<Capability>,
}

impl Caller {
    pub fn new(id: impl Into<String>, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            id: id.into(),
            capabilities: capabilities.into_iter().collect(),
        }
    }

    /// Caller holding every capability
    pub fn superuser(id: impl Into<String>) -> Self {
        Self::new(
            id,
            [
                Capability::ManageProductTypesAndAttributes,
                Capability::ManagePageTypesAndAttributes,
                Capability::ManageProducts,
            ],
        )
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

pub trait CapabilityChecker: Send + Sync {
    /// True when `caller` holds any of `required`; an empty set always passes
    fn has_permission(&self, caller: &Caller, required: &[Capability]) -> bool;
}

/// Checks membership in the caller's own granted set
#[derive(Debug, Clone, Copy, Default)]
pub struct GrantedCapabilities;

impl CapabilityChecker for GrantedCapabilities {
    fn has_permission(&self, caller: &Caller, required: &[Capability]) -> bool {
        required.is_empty() || required.iter().any(|capability| caller.has(*capability))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_of_semantics() {
        let caller = Caller::new("staff", [Capability::ManagePageTypesAndAttributes]);
        let checker = GrantedCapabilities;

        assert!(checker.has_permission(
            &caller,
            &[
                Capability::ManageProductTypesAndAttributes,
                Capability::ManagePageTypesAndAttributes
            ]
        ));
        assert!(!checker.has_permission(&caller, &[Capability::ManageProducts]));
        assert!(checker.has_permission(&caller, &[]));
    }

    #[test]
    fn superuser_holds_everything() {
        let caller = Caller::superuser("root");
        assert!(caller.has(Capability::ManageProducts));
        assert_eq!(caller.capabilities.len(), 3);
    }
}
