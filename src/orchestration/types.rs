use crate::constants::{fields, EntityKind, ErrorPolicy};
use crate::models::Entity;
use crate::state_machine::ItemState;
use crate::validation::ValidationError;
use serde::Serialize;
use serde_json::{Map, Value};

/// One input item, identified by its position in the batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub index: usize,
    pub fields: Map<String, Value>,
    /// Raw nested values (attribute items only)
    pub values: Vec<Map<String, Value>>,
}

impl BatchItem {
    /// Split a raw item. A `values` list of objects on an attribute item
    /// becomes its nested values; anything else stays in `fields`.
    pub fn new(kind: EntityKind, index: usize, mut fields: Map<String, Value>) -> Self {
        let mut values = Vec::new();
        if kind == EntityKind::Attribute {
            let well_formed = matches!(
                fields.get(fields::VALUES),
                Some(Value::Array(list)) if list.iter().all(Value::is_object)
            );
            if well_formed {
                if let Some(Value::Array(list)) = fields.remove(fields::VALUES) {
                    values = list
                        .into_iter()
                        .filter_map(|value| match value {
                            Value::Object(map) => Some(map),
                            _ => None,
                        })
                        .collect();
                }
            } else if matches!(fields.get(fields::VALUES), Some(Value::Null)) {
                fields.remove(fields::VALUES);
            }
        }
        Self {
            index,
            fields,
            values,
        }
    }
}

/// A homogeneous batch submitted in one call
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    pub kind: EntityKind,
    pub items: Vec<BatchItem>,
    /// Falls back to the configured default when absent
    pub policy: Option<ErrorPolicy>,
}

impl BatchRequest {
    pub fn new(kind: EntityKind, items: Vec<Map<String, Value>>) -> Self {
        let items = items
            .into_iter()
            .enumerate()
            .map(|(index, fields)| BatchItem::new(kind, index, fields))
            .collect();
        Self {
            kind,
            items,
            policy: None,
        }
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Outcome for the input item at the same position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemResult {
    pub instance: Option<Entity>,
    /// Committed nested values, in input order
    pub values: Vec<Entity>,
    pub errors: Vec<ValidationError>,
    pub state: ItemState,
}

impl ItemResult {
    pub fn is_committed(&self) -> bool {
        self.state == ItemState::Committed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult {
    /// Committed top-level entities
    pub count: usize,
    pub results: Vec<ItemResult>,
}

impl BatchResult {
    pub fn empty() -> Self {
        Self {
            count: 0,
            results: Vec::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        self.results.iter().any(|result| !result.errors.is_empty())
    }

    /// Slugs of committed instances, `None` where the instance is absent
    pub fn slugs(&self) -> Vec<Option<&str>> {
        self.results
            .iter()
            .map(|result| result.instance.as_ref().map(Entity::slug))
            .collect()
    }
}

/// Create/update decision for one resolved slug
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Create,
    /// Carries the target's current field values
    Update { existing: Entity },
}

impl Classification {
    pub fn is_create(&self) -> bool {
        matches!(self, Self::Create)
    }
}
