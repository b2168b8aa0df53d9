use crate::constants::{events, EntityKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Lifecycle event emitted for every committed entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    AttributeCreated,
    AttributeUpdated,
    AttributeValueCreated,
    AttributeValueUpdated,
    ProductCreated,
    ProductUpdated,
    CategoryCreated,
    CategoryUpdated,
}

impl EventKind {
    /// Event for a committed entity of `kind`; product types are never written
    pub fn for_entity(kind: EntityKind, created: bool) -> Option<Self> {
        let event = match (kind, created) {
            (EntityKind::Attribute, true) => Self::AttributeCreated,
            (EntityKind::Attribute, false) => Self::AttributeUpdated,
            (EntityKind::AttributeValue, true) => Self::AttributeValueCreated,
            (EntityKind::AttributeValue, false) => Self::AttributeValueUpdated,
            (EntityKind::Product, true) => Self::ProductCreated,
            (EntityKind::Product, false) => Self::ProductUpdated,
            (EntityKind::Category, true) => Self::CategoryCreated,
            (EntityKind::Category, false) => Self::CategoryUpdated,
            (EntityKind::ProductType, _) => return None,
        };
        Some(event)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AttributeCreated => events::ATTRIBUTE_CREATED,
            Self::AttributeUpdated => events::ATTRIBUTE_UPDATED,
            Self::AttributeValueCreated => events::ATTRIBUTE_VALUE_CREATED,
            Self::AttributeValueUpdated => events::ATTRIBUTE_VALUE_UPDATED,
            Self::ProductCreated => events::PRODUCT_CREATED,
            Self::ProductUpdated => events::PRODUCT_UPDATED,
            Self::CategoryCreated => events::CATEGORY_CREATED,
            Self::CategoryUpdated => events::CATEGORY_UPDATED,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(
            self,
            Self::AttributeCreated
                | Self::AttributeValueCreated
                | Self::ProductCreated
                | Self::CategoryCreated
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Event as delivered to broadcast subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifecycleEvent {
    pub kind: EventKind,
    pub slug: String,
    pub payload: Value,
    pub published_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_events() {
        assert_eq!(
            EventKind::for_entity(EntityKind::AttributeValue, true),
            Some(EventKind::AttributeValueCreated)
        );
        assert_eq!(
            EventKind::for_entity(EntityKind::Category, false),
            Some(EventKind::CategoryUpdated)
        );
        assert_eq!(EventKind::for_entity(EntityKind::ProductType, true), None);
        assert_eq!(EventKind::ProductUpdated.to_string(), "product_updated");
        assert!(!EventKind::ProductUpdated.is_created());
    }
}
