use super::fields::FieldReader;
use super::rules::{self, ensure};
use super::{CleanedItem, ValidationContext, ValidationError, ValidationOutcome};
use crate::constants::{fields, Capability};
use crate::models::Category;
use crate::slug::SlugCandidate;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

const ALLOWED_FIELDS: &[&str] = &[
    fields::SLUG,
    fields::NAME,
    fields::DESCRIPTION,
    fields::PARENT,
    fields::SEO_TITLE,
    fields::SEO_DESCRIPTION,
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryDraft {
    pub slug: Option<String>,
    pub name: Option<String>,
    pub description: Option<Value>,
    pub parent: Option<String>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
}

impl CategoryDraft {
    pub fn parse(raw: &Map<String, Value>) -> Result<Self, Vec<ValidationError>> {
        let mut reader = FieldReader::new(raw);
        reader.reject_unknown(ALLOWED_FIELDS);

        let draft = Self {
            slug: reader.string(fields::SLUG),
            name: reader.string(fields::NAME),
            description: reader.json(fields::DESCRIPTION),
            parent: reader.string(fields::PARENT),
            seo_title: reader.string(fields::SEO_TITLE),
            seo_description: reader.string(fields::SEO_DESCRIPTION),
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
            ("parent_slug", self.parent.is_some()),
            ("seo_title", self.seo_title.is_some()),
            ("seo_description", self.seo_description.is_some()),
        ];
        supplied
            .into_iter()
            .filter_map(|(column, present)| present.then_some(column))
            .collect()
    }

    pub fn missing_for_create(&self) -> Vec<ValidationError> {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => Vec::new(),
            _ => vec![ValidationError::required(
                fields::NAME,
                "Name is required to create a category.",
            )],
        }
    }

    pub fn build(&self, slug: &str, now: DateTime<Utc>) -> Category {
        Category {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            name: self.name.clone().unwrap_or_default(),
            description: self.description.clone(),
            parent_slug: self.parent.clone(),
            seo_title: self.seo_title.clone(),
            seo_description: self.seo_description.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&self, existing: &Category, now: DateTime<Utc>) -> Category {
        let mut updated = existing.clone();
        if let Some(name) = &self.name {
            updated.name = name.clone();
        }
        if self.description.is_some() {
            updated.description = self.description.clone();
        }
        if self.parent.is_some() {
            updated.parent_slug = self.parent.clone();
        }
        if self.seo_title.is_some() {
            updated.seo_title = self.seo_title.clone();
        }
        if self.seo_description.is_some() {
            updated.seo_description = self.seo_description.clone();
        }
        updated.updated_at = now;
        updated
    }
}

/// Category pipeline: capability, shape, self-parenting, parent lookup
pub fn validate(raw: &Map<String, Value>, context: &ValidationContext<'_>) -> ValidationOutcome {
    ensure(rules::check_capability(context, &[Capability::ManageProducts]))?;

    let draft = CategoryDraft::parse(raw)?;

    if let Some(parent) = draft.parent.as_deref() {
        let own_slug = draft
            .slug
            .clone()
            .unwrap_or_else(|| draft.slug_candidate().base_slug());
        if parent == own_slug {
            return Err(vec![ValidationError::invalid(
                fields::PARENT,
                "A category cannot be its own parent.",
            )]);
        }

        let related = context.related;
        if !related.categories.contains(parent) && !related.batch_categories.contains(parent) {
            return Err(vec![ValidationError::not_found(
                fields::PARENT,
                format!("Parent category '{parent}' does not exist."),
            )]);
        }
    }

    Ok(CleanedItem::Category(draft))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::{Caller, GrantedCapabilities};
    use crate::validation::{ErrorCode, RelatedEntities};
    use serde_json::json;

    fn check(raw: Value) -> ValidationOutcome {
        let related = RelatedEntities {
            categories: ["apparel".to_string()].into(),
            batch_categories: ["shoes".to_string()].into(),
            ..RelatedEntities::default()
        };
        let caller = Caller::superuser("admin");
        let context = ValidationContext::new(&caller, &GrantedCapabilities, &related);
        validate(raw.as_object().unwrap(), &context)
    }

    #[test]
    fn parent_may_be_persisted_or_in_batch() {
        assert!(check(json!({"name": "Boots", "parent": "apparel"})).is_ok());
        assert!(check(json!({"name": "Boots", "parent": "shoes"})).is_ok());

        let errors = check(json!({"name": "Boots", "parent": "ghost"})).unwrap_err();
        assert_eq!(errors[0].code, ErrorCode::NotFound);
    }

    #[test]
    fn self_parent_is_invalid() {
        let errors = check(json!({"slug": "shoes", "name": "Shoes", "parent": "shoes"})).unwrap_err();
        assert_eq!(errors[0].code, ErrorCode::Invalid);

        let errors = check(json!({"name": "Apparel", "parent": "apparel"})).unwrap_err();
        assert_eq!(errors[0].path.as_deref(), Some("parent"));
    }

    #[test]
    fn products_capability_required() {
        let related = RelatedEntities::default();
        let caller = Caller::new("attrs", [crate::constants::Capability::ManagePageTypesAndAttributes]);
        let context = ValidationContext::new(&caller, &GrantedCapabilities, &related);
        let errors = validate(json!({"name": "X"}).as_object().unwrap(), &context).unwrap_err();
        assert_eq!(errors[0].code, ErrorCode::PermissionDenied);
    }
}
