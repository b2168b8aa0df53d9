//! # Catalog Constants
//!
//! Enums and fixed tables that define the operational boundaries of the bulk
//! engine: entity kinds, error policies, attribute input types, capabilities
//! and the attribute property configuration matrix.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Slug used when nothing usable survives normalization
pub const SLUG_PLACEHOLDER: &str = "-";

/// Default number of rows written per bulk statement
pub const DEFAULT_CHUNK_SIZE: usize = 2000;

/// Default upper bound on items per call
pub const DEFAULT_MAX_BATCH_SIZE: usize = 10_000;

/// Raw field names as they appear in batch items (camelCase API names)
pub mod fields {
    pub const SLUG: &str = "slug";
    pub const NAME: &str = "name";
    pub const TYPE: &str = "type";
    pub const INPUT_TYPE: &str = "inputType";
    pub const ENTITY_TYPE: &str = "entityType";
    pub const UNIT: &str = "unit";
    pub const VALUE_REQUIRED: &str = "valueRequired";
    pub const VISIBLE_IN_STOREFRONT: &str = "visibleInStorefront";
    pub const FILTERABLE_IN_DASHBOARD: &str = "filterableInDashboard";
    pub const EXTERNAL_REFERENCE: &str = "externalReference";
    pub const VALUES: &str = "values";

    pub const ATTRIBUTE: &str = "attribute";
    pub const VALUE: &str = "value";
    pub const FILE_URL: &str = "fileUrl";
    pub const CONTENT_TYPE: &str = "contentType";
    pub const RICH_TEXT: &str = "richText";
    pub const PLAIN_TEXT: &str = "plainText";
    pub const BOOLEAN: &str = "boolean";
    pub const DATE_TIME: &str = "dateTime";
    pub const ADDITIONAL_FIELDS: &str = "additionalFields";
    pub const REF: &str = "ref";
    pub const CODE: &str = "code";

    pub const PRODUCT_TYPE: &str = "productType";
    pub const CATEGORY: &str = "category";
    pub const DESCRIPTION: &str = "description";
    pub const RATING: &str = "rating";
    pub const WEIGHT: &str = "weight";

    pub const PARENT: &str = "parent";
    pub const SEO_TITLE: &str = "seoTitle";
    pub const SEO_DESCRIPTION: &str = "seoDescription";

    /// Attribute fields that bulk calls refuse outright
    pub const DEPRECATED_ATTRIBUTE_FIELDS: &[&str] = &[
        "storefrontSearchPosition",
        "filterableInStorefront",
        "availableInGrid",
    ];

    /// Value fields that only make sense on swatch attributes
    pub const SWATCH_ONLY_VALUE_FIELDS: &[&str] = &[VALUE, FILE_URL, CONTENT_TYPE];
}

/// Lifecycle event names emitted after commit
pub mod events {
    pub const ATTRIBUTE_CREATED: &str = "attribute_created";
    pub const ATTRIBUTE_UPDATED: &str = "attribute_updated";
    pub const ATTRIBUTE_VALUE_CREATED: &str = "attribute_value_created";
    pub const ATTRIBUTE_VALUE_UPDATED: &str = "attribute_value_updated";
    pub const PRODUCT_CREATED: &str = "product_created";
    pub const PRODUCT_UPDATED: &str = "product_updated";
    pub const CATEGORY_CREATED: &str = "category_created";
    pub const CATEGORY_UPDATED: &str = "category_updated";
}

/// Kinds of entity the engine reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Attribute,
    AttributeValue,
    Product,
    Category,
    /// Looked up for product references, never written
    ProductType,
}

impl EntityKind {
    /// Whether a batch of this kind can be submitted
    pub fn is_batchable(&self) -> bool {
        !matches!(self, Self::ProductType)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attribute => write!(f, "attribute"),
            Self::AttributeValue => write!(f, "attribute_value"),
            Self::Product => write!(f, "product"),
            Self::Category => write!(f, "category"),
            Self::ProductType => write!(f, "product_type"),
        }
    }
}

/// Caller-selected batch error policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Any item error voids the whole batch
    #[default]
    RejectEverything,
    /// Only failing rows are dropped; the rest commit
    RejectFailedRows,
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RejectEverything => write!(f, "REJECT_EVERYTHING"),
            Self::RejectFailedRows => write!(f, "REJECT_FAILED_ROWS"),
        }
    }
}

impl FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "REJECT_EVERYTHING" => Ok(Self::RejectEverything),
            "REJECT_FAILED_ROWS" => Ok(Self::RejectFailedRows),
            _ => Err(format!("Invalid error policy: {s}")),
        }
    }
}

/// Which schema an attribute belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeType {
    ProductType,
    PageType,
}

impl AttributeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductType => "PRODUCT_TYPE",
            Self::PageType => "PAGE_TYPE",
        }
    }

    /// Capability needed to manage attributes of this type
    pub fn required_capability(&self) -> Capability {
        match self {
            Self::ProductType => Capability::ManageProductTypesAndAttributes,
            Self::PageType => Capability::ManagePageTypesAndAttributes,
        }
    }
}

impl FromStr for AttributeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PRODUCT_TYPE" => Ok(Self::ProductType),
            "PAGE_TYPE" => Ok(Self::PageType),
            _ => Err(format!("Invalid attribute type: {s}")),
        }
    }
}

/// How an attribute's values are entered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeInputType {
    #[default]
    Dropdown,
    Multiselect,
    File,
    Reference,
    Numeric,
    RichText,
    PlainText,
    Swatch,
    Boolean,
    Date,
    DateTime,
}

impl AttributeInputType {
    pub const ALL: &'static [AttributeInputType] = &[
        Self::Dropdown,
        Self::Multiselect,
        Self::File,
        Self::Reference,
        Self::Numeric,
        Self::RichText,
        Self::PlainText,
        Self::Swatch,
        Self::Boolean,
        Self::Date,
        Self::DateTime,
    ];

    /// Input types whose values are a predefined list of choices
    pub const TYPES_WITH_CHOICES: &'static [AttributeInputType] =
        &[Self::Dropdown, Self::Multiselect, Self::Swatch];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dropdown => "DROPDOWN",
            Self::Multiselect => "MULTISELECT",
            Self::File => "FILE",
            Self::Reference => "REFERENCE",
            Self::Numeric => "NUMERIC",
            Self::RichText => "RICH_TEXT",
            Self::PlainText => "PLAIN_TEXT",
            Self::Swatch => "SWATCH",
            Self::Boolean => "BOOLEAN",
            Self::Date => "DATE",
            Self::DateTime => "DATE_TIME",
        }
    }

    pub fn has_choices(&self) -> bool {
        Self::TYPES_WITH_CHOICES.contains(self)
    }
}

impl fmt::Display for AttributeInputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttributeInputType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|input_type| input_type.as_str() == s)
            .ok_or_else(|| format!("Invalid input type: {s}"))
    }
}

/// Target of a REFERENCE attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeEntityType {
    Page,
    Product,
    ProductVariant,
}

impl AttributeEntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Page => "PAGE",
            Self::Product => "PRODUCT",
            Self::ProductVariant => "PRODUCT_VARIANT",
        }
    }
}

impl FromStr for AttributeEntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PAGE" => Ok(Self::Page),
            "PRODUCT" => Ok(Self::Product),
            "PRODUCT_VARIANT" => Ok(Self::ProductVariant),
            _ => Err(format!("Invalid entity type: {s}")),
        }
    }
}

/// Permission classes checked by the capability checker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    ManageProductTypesAndAttributes,
    ManagePageTypesAndAttributes,
    ManageProducts,
}

impl Capability {
    /// Capabilities of which the caller needs at least one to submit a batch
    pub fn batch_requirement(kind: EntityKind) -> &'static [Capability] {
        match kind {
            EntityKind::Attribute | EntityKind::AttributeValue => &[
                Self::ManageProductTypesAndAttributes,
                Self::ManagePageTypesAndAttributes,
            ],
            EntityKind::Product | EntityKind::Category | EntityKind::ProductType => {
                &[Self::ManageProducts]
            }
        }
    }
}

/// Attribute property configuration: optional field -> input types allowing it
pub const ATTRIBUTE_PROPERTIES_CONFIGURATION: &[(&str, &[AttributeInputType])] = &[
    (
        fields::FILTERABLE_IN_DASHBOARD,
        &[
            AttributeInputType::Dropdown,
            AttributeInputType::Multiselect,
            AttributeInputType::Numeric,
            AttributeInputType::Swatch,
            AttributeInputType::Boolean,
            AttributeInputType::Date,
            AttributeInputType::DateTime,
        ],
    ),
    (fields::UNIT, &[AttributeInputType::Numeric]),
    (fields::ENTITY_TYPE, &[AttributeInputType::Reference]),
    (fields::VALUES, AttributeInputType::TYPES_WITH_CHOICES),
];

/// Input types allowed to carry `field`, or `None` when the field is unrestricted
pub fn allowed_input_types(field: &str) -> Option<&'static [AttributeInputType]> {
    ATTRIBUTE_PROPERTIES_CONFIGURATION
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, allowed)| *allowed)
}
