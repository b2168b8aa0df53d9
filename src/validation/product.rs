use super::fields::FieldReader;
use super::rules::{self, ensure};
use super::{CleanedItem, ValidationContext, ValidationError, ValidationOutcome};
use crate::constants::{fields, Capability};
use crate::error::{BulkError, Result};
use crate::models::Product;
use crate::slug::SlugCandidate;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

const ALLOWED_FIELDS: &[&str] = &[
    fields::SLUG,
    fields::NAME,
    fields::PRODUCT_TYPE,
    fields::CATEGORY,
    fields::DESCRIPTION,
    fields::RATING,
    fields::WEIGHT,
    fields::EXTERNAL_REFERENCE,
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductDraft {
    pub slug: Option<String>,
    pub name: Option<String>,
    pub product_type: Option<String>,
    pub category: Option<String>,
    pub description: Option<Value>,
    pub rating: Option<f64>,
    pub weight: Option<f64>,
    pub external_reference: Option<String>,
}

impl ProductDraft {
    pub fn parse(raw: &Map<String, Value>) -> std::result::Result<Self, Vec<ValidationError>> {
        let mut reader = FieldReader::new(raw);
        reader.reject_unknown(ALLOWED_FIELDS);

        let draft = Self {
            slug: reader.string(fields::SLUG),
            name: reader.string(fields::NAME),
            product_type: reader.string(fields::PRODUCT_TYPE),
            category: reader.string(fields::CATEGORY),
            description: reader.json(fields::DESCRIPTION),
            rating: reader.non_negative(fields::RATING),
            weight: reader.non_negative(fields::WEIGHT),
            external_reference: reader.string(fields::EXTERNAL_REFERENCE),
        };

        let mut errors = reader.finish();
        errors.extend(rules::check_explicit_slug(draft.slug.as_deref()));
        ensure(errors)?;
        Ok(draft)
    }

    pub fn slug_candidate(&self) -> SlugCandidate {
        SlugCandidate {
            explicit: self.slug.clone(),
            name: self.name.clone(),
            ..SlugCandidate::default()
        }
    }

    pub fn supplied_columns(&self) -> Vec<&'static str> {
        let supplied = [
            ("name", self.name.is_some()),
            ("description", self.description.is_some()),
            ("product_type_slug", self.product_type.is_some()),
            ("category_slug", self.category.is_some()),
            ("rating", self.rating.is_some()),
            ("weight", self.weight.is_some()),
            ("external_reference", self.external_reference.is_some()),
        ];
        supplied
            .into_iter()
            .filter_map(|(column, present)| present.then_some(column))
            .collect()
    }

    pub fn missing_for_create(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.name.as_deref().map_or(true, |n| n.trim().is_empty()) {
            errors.push(ValidationError::required(
                fields::NAME,
                "Name is required to create a product.",
            ));
        }
        if self.product_type.is_none() {
            errors.push(ValidationError::required(
                fields::PRODUCT_TYPE,
                "Product type is required to create a product.",
            ));
        }
        errors
    }

    pub fn build(&self, slug: &str, now: DateTime<Utc>) -> Result<Product> {
        let product_type_slug = self.product_type.clone().ok_or_else(|| {
            BulkError::internal(format!("Product '{slug}' reached create without a product type"))
        })?;

        Ok(Product {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            name: self.name.clone().unwrap_or_default(),
            description: self.description.clone(),
            product_type_slug,
            category_slug: self.category.clone(),
            rating: self.rating,
            weight: self.weight,
            external_reference: self.external_reference.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply(&self, existing: &Product, now: DateTime<Utc>) -> Product {
        let mut updated = existing.clone();
        if let Some(name) = &self.name {
            updated.name = name.clone();
        }
        if self.description.is_some() {
            updated.description = self.description.clone();
        }
        if let Some(product_type) = &self.product_type {
            updated.product_type_slug = product_type.clone();
        }
        if self.category.is_some() {
            updated.category_slug = self.category.clone();
        }
        if self.rating.is_some() {
            updated.rating = self.rating;
        }
        if self.weight.is_some() {
            updated.weight = self.weight;
        }
        if self.external_reference.is_some() {
            updated.external_reference = self.external_reference.clone();
        }
        updated.updated_at = now;
        updated
    }
}

/// Product pipeline: capability, shape, then referenced records
pub fn validate(raw: &Map<String, Value>, context: &ValidationContext<'_>) -> ValidationOutcome {
    ensure(rules::check_capability(context, &[Capability::ManageProducts]))?;

    let draft = ProductDraft::parse(raw)?;

    let mut missing = Vec::new();
    if let Some(product_type) = draft.product_type.as_deref() {
        if !context.related.product_types.contains(product_type) {
            missing.push(ValidationError::not_found(
                fields::PRODUCT_TYPE,
                format!("Product type '{product_type}' does not exist."),
            ));
        }
    }
    if let Some(category) = draft.category.as_deref() {
        if !context.related.categories.contains(category) {
            missing.push(ValidationError::not_found(
                fields::CATEGORY,
                format!("Category '{category}' does not exist."),
            ));
        }
    }
    ensure(missing)?;

    Ok(CleanedItem::Product(draft))
}
