//! # Catalog Models
//!
//! Persisted records keyed by a natural-key slug. Each model owns its SQL
//! (PostgreSQL via SQLx) the same way it owns its fields; the
//! [`store`](crate::store) layer only decides when to call it.
//!
//! Relationships are expressed through natural keys (`attribute_slug`,
//! `product_type_slug`, ...) because a slug is fixed before commit and never
//! renamed by a later item in the same batch.

pub mod attribute;
pub mod attribute_value;
pub mod category;
pub mod product;
pub mod product_type;

pub use attribute::Attribute;
pub use attribute_value::AttributeValue;
pub use category::Category;
pub use product::Product;
pub use product_type::ProductType;

use crate::constants::EntityKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Uniqueness scope of a slug
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Namespace {
    Attributes,
    /// Values are unique per parent attribute
    AttributeValues { attribute: String },
    Products,
    Categories,
    ProductTypes,
}

impl Namespace {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Attributes => EntityKind::Attribute,
            Self::AttributeValues { .. } => EntityKind::AttributeValue,
            Self::Products => EntityKind::Product,
            Self::Categories => EntityKind::Category,
            Self::ProductTypes => EntityKind::ProductType,
        }
    }

    /// Global namespace for `kind`; attribute values have none and yield `None`
    pub fn global(kind: EntityKind) -> Option<Self> {
        match kind {
            EntityKind::Attribute => Some(Self::Attributes),
            EntityKind::Product => Some(Self::Products),
            EntityKind::Category => Some(Self::Categories),
            EntityKind::ProductType => Some(Self::ProductTypes),
            EntityKind::AttributeValue => None,
        }
    }

    pub fn attribute_values(attribute: impl Into<String>) -> Self {
        Self::AttributeValues {
            attribute: attribute.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttributeValues { attribute } => write!(f, "attribute_value[{attribute}]"),
            other => write!(f, "{}", other.kind()),
        }
    }
}

/// A slug together with the namespace it is unique in
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NaturalKey {
    pub namespace: Namespace,
    pub slug: String,
}

impl NaturalKey {
    pub fn new(namespace: Namespace, slug: impl Into<String>) -> Self {
        Self {
            namespace,
            slug: slug.into(),
        }
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.slug)
    }
}

/// Any persisted record the engine reads or writes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Attribute(Attribute),
    AttributeValue(AttributeValue),
    Product(Product),
    Category(Category),
    ProductType(ProductType),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Attribute(_) => EntityKind::Attribute,
            Self::AttributeValue(_) => EntityKind::AttributeValue,
            Self::Product(_) => EntityKind::Product,
            Self::Category(_) => EntityKind::Category,
            Self::ProductType(_) => EntityKind::ProductType,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Self::Attribute(a) => a.id,
            Self::AttributeValue(v) => v.id,
            Self::Product(p) => p.id,
            Self::Category(c) => c.id,
            Self::ProductType(t) => t.id,
        }
    }

    pub fn slug(&self) -> &str {
        match self {
            Self::Attribute(a) => &a.slug,
            Self::AttributeValue(v) => &v.slug,
            Self::Product(p) => &p.slug,
            Self::Category(c) => &c.slug,
            Self::ProductType(t) => &t.slug,
        }
    }

    pub fn natural_key(&self) -> NaturalKey {
        let namespace = match self {
            Self::Attribute(_) => Namespace::Attributes,
            Self::AttributeValue(v) => Namespace::attribute_values(v.attribute_slug.clone()),
            Self::Product(_) => Namespace::Products,
            Self::Category(_) => Namespace::Categories,
            Self::ProductType(_) => Namespace::ProductTypes,
        };
        NaturalKey::new(namespace, self.slug())
    }

    /// Copy `columns` from `source` onto `self`; entities of different kinds are left untouched
    pub fn copy_columns(&mut self, source: &Entity, columns: &[&str]) {
        match (self, source) {
            (Self::Attribute(target), Self::Attribute(source)) => {
                target.copy_columns(source, columns)
            }
            (Self::AttributeValue(target), Self::AttributeValue(source)) => {
                target.copy_columns(source, columns)
            }
            (Self::Product(target), Self::Product(source)) => target.copy_columns(source, columns),
            (Self::Category(target), Self::Category(source)) => {
                target.copy_columns(source, columns)
            }
            _ => {}
        }
    }

    pub fn as_attribute(&self) -> Option<&Attribute> {
        match self {
            Self::Attribute(attribute) => Some(attribute),
            _ => None,
        }
    }
}

#[cfg(feature = "postgres")]
/// Builds `col = u.col, ...` for the listed columns that `allowed` permits.
/// `updated_at` is always refreshed.
pub(crate) fn update_set_clause(columns: &[&str], allowed: &[&str]) -> String {
    let mut assignments: Vec<String> = allowed
        .iter()
        .filter(|column| columns.contains(column))
        .map(|column| format!("{column} = u.{column}"))
        .collect();
    assignments.push("updated_at = u.updated_at".to_string());
    assignments.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "postgres")]
    #[test]
    fn set_clause_only_touches_allowed_columns() {
        let clause = update_set_clause(&["name", "slug", "unit"], &["name", "unit", "value_required"]);
        assert_eq!(
            clause,
            "name = u.name, unit = u.unit, updated_at = u.updated_at"
        );
    }

    #[test]
    fn namespaces_report_their_kind() {
        assert_eq!(Namespace::Attributes.kind(), EntityKind::Attribute);
        assert_eq!(
            Namespace::attribute_values("color").kind(),
            EntityKind::AttributeValue
        );
        assert!(Namespace::global(EntityKind::AttributeValue).is_none());
        assert_eq!(
            NaturalKey::new(Namespace::attribute_values("color"), "red").to_string(),
            "attribute_value[color]:red"
        );
    }
}
