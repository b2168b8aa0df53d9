//! # Item Validation
//!
//! Per-item validation, oblivious to batch position. Each item kind runs a
//! fixed pipeline of small rule functions (see [`rules`]); the first stage
//! that produces errors ends the pipeline for that item. Nested values are
//! validated independently and their errors land on the parent item with a
//! `values.<n>.` path prefix.
//!
//! Business-rule failures are data: a validator returns
//! `Err(Vec<ValidationError>)`, it never fails the call.

pub mod attribute;
pub mod category;
pub mod fields;
pub mod product;
pub mod rules;
pub mod value;

pub use attribute::AttributeDraft;
pub use category::CategoryDraft;
pub use product::ProductDraft;
pub use value::{AdditionalFields, ValueDraft};

use crate::constants::{fields as field_names, AttributeInputType, EntityKind};
use crate::error::{BulkError, Result};
use crate::models::{Attribute, Entity, NaturalKey};
use crate::permissions::{Caller, CapabilityChecker};
use crate::slug::SlugCandidate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Machine-readable class of a [`ValidationError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Required,
    Invalid,
    MutuallyExclusive,
    DuplicatedInputItem,
    NotFound,
    PermissionDenied,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "REQUIRED"),
            Self::Invalid => write!(f, "INVALID"),
            Self::MutuallyExclusive => write!(f, "MUTUALLY_EXCLUSIVE"),
            Self::DuplicatedInputItem => write!(f, "DUPLICATED_INPUT_ITEM"),
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::PermissionDenied => write!(f, "PERMISSION_DENIED"),
        }
    }
}

/// One item-level failure. `path` is absent for item-wide errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub path: Option<String>,
    pub message: String,
    pub code: ErrorCode,
}

impl ValidationError {
    pub fn new(code: ErrorCode, path: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            path: path.map(str::to_string),
            message: message.into(),
            code,
        }
    }

    pub fn required(path: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Required, Some(path), message)
    }

    pub fn invalid(path: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Invalid, Some(path), message)
    }

    pub fn mutually_exclusive(path: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MutuallyExclusive, Some(path), message)
    }

    pub fn duplicated(path: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DuplicatedInputItem, Some(path), message)
    }

    pub fn not_found(path: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, Some(path), message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, None, message)
    }

    /// Re-root this error under `prefix`, e.g. `values.2`
    pub fn nested(mut self, prefix: &str) -> Self {
        self.path = Some(match self.path.take() {
            Some(path) => format!("{prefix}.{path}"),
            None => prefix.to_string(),
        });
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "[{}] {}: {}", self.code, path, self.message),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

/// Path prefix of the nested value at `index`
pub fn value_prefix(index: usize) -> String {
    format!("{}.{index}", field_names::VALUES)
}

/// Related records loaded once per batch before validation
#[derive(Debug, Clone, Default)]
pub struct RelatedEntities {
    /// Parent attributes of standalone values, by slug
    pub attributes: HashMap<String, Attribute>,
    pub product_types: HashSet<String>,
    /// Persisted category slugs
    pub categories: HashSet<String>,
    /// Explicit slugs of category items in the current batch
    pub batch_categories: HashSet<String>,
}

/// Everything a validator may consult besides the item itself
pub struct ValidationContext<'a> {
    pub caller: &'a Caller,
    pub checker: &'a dyn CapabilityChecker,
    pub related: &'a RelatedEntities,
}

impl<'a> ValidationContext<'a> {
    pub fn new(
        caller: &'a Caller,
        checker: &'a dyn CapabilityChecker,
        related: &'a RelatedEntities,
    ) -> Self {
        Self {
            caller,
            checker,
            related,
        }
    }
}

pub type ValidationOutcome = std::result::Result<CleanedItem, Vec<ValidationError>>;

/// A validated item, ready for slug resolution and classification
#[derive(Debug, Clone, PartialEq)]
pub enum CleanedItem {
    Attribute {
        draft: AttributeDraft,
        values: Vec<ValueDraft>,
    },
    AttributeValue(ValueDraft),
    Product(ProductDraft),
    Category(CategoryDraft),
}

impl CleanedItem {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Attribute { .. } => EntityKind::Attribute,
            Self::AttributeValue(_) => EntityKind::AttributeValue,
            Self::Product(_) => EntityKind::Product,
            Self::Category(_) => EntityKind::Category,
        }
    }

    pub fn slug_candidate(&self) -> SlugCandidate {
        match self {
            Self::Attribute { draft, .. } => draft.slug_candidate(),
            Self::AttributeValue(draft) => draft.slug_candidate(),
            Self::Product(draft) => draft.slug_candidate(),
            Self::Category(draft) => draft.slug_candidate(),
        }
    }

    /// Column names this item writes on update
    pub fn supplied_columns(&self) -> Vec<&'static str> {
        match self {
            Self::Attribute { draft, .. } => draft.supplied_columns(),
            Self::AttributeValue(draft) => draft.supplied_columns(),
            Self::Product(draft) => draft.supplied_columns(),
            Self::Category(draft) => draft.supplied_columns(),
        }
    }

    pub fn external_reference(&self) -> Option<&str> {
        match self {
            Self::Attribute { draft, .. } => draft.external_reference.as_deref(),
            Self::AttributeValue(draft) => draft.external_reference.as_deref(),
            Self::Product(draft) => draft.external_reference.as_deref(),
            Self::Category(_) => None,
        }
    }

    /// Nested values, empty for every kind but attributes
    pub fn values(&self) -> &[ValueDraft] {
        match self {
            Self::Attribute { values, .. } => values,
            _ => &[],
        }
    }

    /// Checks that need the record this item targets, if any.
    ///
    /// Covers required-on-create fields and, for attributes submitted without
    /// an `inputType`, the property matrix against the effective input type.
    pub fn check_target(&self, existing: Option<&Entity>) -> Vec<ValidationError> {
        match self {
            Self::Attribute { draft, values } => {
                let existing = existing.and_then(Entity::as_attribute);
                let mut errors = Vec::new();
                if existing.is_none() {
                    errors.extend(draft.missing_for_create());
                }
                if draft.input_type.is_none() {
                    let input_type: AttributeInputType =
                        existing.map(|a| a.input_type).unwrap_or_default();
                    errors.extend(rules::check_property_matrix(
                        draft,
                        !values.is_empty(),
                        input_type,
                    ));
                    for (index, value) in values.iter().enumerate() {
                        let prefix = value_prefix(index);
                        errors.extend(
                            rules::check_value_for_parent(value, input_type)
                                .into_iter()
                                .map(|e| e.nested(&prefix)),
                        );
                    }
                }
                errors
            }
            Self::AttributeValue(draft) if existing.is_none() => draft.missing_for_create(),
            Self::Product(draft) if existing.is_none() => draft.missing_for_create(),
            Self::Category(draft) if existing.is_none() => draft.missing_for_create(),
            _ => Vec::new(),
        }
    }

    /// New record for a CREATE classification
    pub fn build(&self, key: &NaturalKey, now: DateTime<Utc>) -> Result<Entity> {
        let entity = match self {
            Self::Attribute { draft, .. } => Entity::Attribute(draft.build(&key.slug, now)),
            Self::AttributeValue(draft) => {
                let attribute = draft.attribute.as_deref().ok_or_else(|| {
                    BulkError::internal(format!("Value {key} has no parent attribute"))
                })?;
                Entity::AttributeValue(draft.build(attribute, &key.slug, now))
            }
            Self::Product(draft) => Entity::Product(draft.build(&key.slug, now)?),
            Self::Category(draft) => Entity::Category(draft.build(&key.slug, now)),
        };
        Ok(entity)
    }

    /// Existing record overlaid with the supplied fields, for an UPDATE
    pub fn apply(&self, existing: &Entity, now: DateTime<Utc>) -> Result<Entity> {
        let entity = match (self, existing) {
            (Self::Attribute { draft, .. }, Entity::Attribute(current)) => {
                Entity::Attribute(draft.apply(current, now))
            }
            (Self::AttributeValue(draft), Entity::AttributeValue(current)) => {
                Entity::AttributeValue(draft.apply(current, now))
            }
            (Self::Product(draft), Entity::Product(current)) => {
                Entity::Product(draft.apply(current, now))
            }
            (Self::Category(draft), Entity::Category(current)) => {
                Entity::Category(draft.apply(current, now))
            }
            (item, existing) => {
                return Err(BulkError::internal(format!(
                    "Cannot apply a {} item to a {} record",
                    item.kind(),
                    existing.kind()
                )))
            }
        };
        Ok(entity)
    }
}

/// Validate one raw item of the given kind.
///
/// `nested` holds the raw nested values of an attribute item.
pub fn validate_item(
    kind: EntityKind,
    fields: &Map<String, Value>,
    nested: &[Map<String, Value>],
    context: &ValidationContext<'_>,
) -> Result<ValidationOutcome> {
    let outcome = match kind {
        EntityKind::Attribute => attribute::validate(fields, nested, context),
        EntityKind::AttributeValue => value::validate_standalone(fields, context),
        EntityKind::Product => product::validate(fields, context),
        EntityKind::Category => category::validate(fields, context),
        EntityKind::ProductType => {
            return Err(BulkError::internal("Product types cannot be submitted in bulk"))
        }
    };
    Ok(outcome)
}
