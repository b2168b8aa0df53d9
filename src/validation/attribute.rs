use super::fields::FieldReader;
use super::rules::{self, ensure};
use super::{value, value_prefix, CleanedItem, ValidationContext, ValidationOutcome};
use crate::constants::{
    allowed_input_types, fields, AttributeEntityType, AttributeInputType, AttributeType,
};
use crate::models::Attribute;
use crate::slug::SlugCandidate;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

const ALLOWED_FIELDS: &[&str] = &[
    fields::SLUG,
    fields::NAME,
    fields::TYPE,
    fields::INPUT_TYPE,
    fields::ENTITY_TYPE,
    fields::UNIT,
    fields::VALUE_REQUIRED,
    fields::VISIBLE_IN_STOREFRONT,
    fields::FILTERABLE_IN_DASHBOARD,
    fields::EXTERNAL_REFERENCE,
    fields::VALUES,
];

/// Parsed attribute fields; `None` means "not supplied"
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeDraft {
    pub slug: Option<String>,
    pub name: Option<String>,
    pub attribute_type: Option<AttributeType>,
    pub input_type: Option<AttributeInputType>,
    pub entity_type: Option<AttributeEntityType>,
    pub unit: Option<String>,
    pub value_required: Option<bool>,
    pub visible_in_storefront: Option<bool>,
    pub filterable_in_dashboard: Option<bool>,
    pub external_reference: Option<String>,
}

impl AttributeDraft {
    pub fn parse(raw: &Map<String, Value>) -> Result<Self, Vec<super::ValidationError>> {
        let mut reader = FieldReader::new(raw);
        reader.reject_deprecated(fields::DEPRECATED_ATTRIBUTE_FIELDS);

        let known: Vec<&str> = ALLOWED_FIELDS
            .iter()
            .chain(fields::DEPRECATED_ATTRIBUTE_FIELDS)
            .copied()
            .collect();
        reader.reject_unknown(&known);

        let draft = Self {
            slug: reader.string(fields::SLUG),
            name: reader.string(fields::NAME),
            attribute_type: reader.parsed(fields::TYPE),
            input_type: reader.parsed(fields::INPUT_TYPE),
            entity_type: reader.parsed(fields::ENTITY_TYPE),
            unit: reader.string(fields::UNIT),
            value_required: reader.bool(fields::VALUE_REQUIRED),
            visible_in_storefront: reader.bool(fields::VISIBLE_IN_STOREFRONT),
            filterable_in_dashboard: reader.bool(fields::FILTERABLE_IN_DASHBOARD),
            external_reference: reader.string(fields::EXTERNAL_REFERENCE),
        };

        let mut errors = reader.finish();
        errors.extend(rules::check_explicit_slug(draft.slug.as_deref()));
        ensure(errors)?;
        Ok(draft)
    }

    /// Whether a matrix-restricted property is set to a non-empty value
    pub fn sets_property(&self, field: &str, has_values: bool) -> bool {
        match field {
            fields::FILTERABLE_IN_DASHBOARD => self.filterable_in_dashboard == Some(true),
            fields::UNIT => self.unit.as_deref().is_some_and(|u| !u.is_empty()),
            fields::ENTITY_TYPE => self.entity_type.is_some(),
            fields::VALUES => has_values,
            _ => false,
        }
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
            ("attribute_type", self.attribute_type.is_some()),
            ("input_type", self.input_type.is_some()),
            ("entity_type", self.entity_type.is_some()),
            ("unit", self.unit.is_some()),
            ("value_required", self.value_required.is_some()),
            ("visible_in_storefront", self.visible_in_storefront.is_some()),
            ("filterable_in_dashboard", self.filterable_in_dashboard.is_some()),
            ("external_reference", self.external_reference.is_some()),
        ];
        supplied
            .into_iter()
            .filter_map(|(column, present)| present.then_some(column))
            .collect()
    }

    pub fn missing_for_create(&self) -> Vec<super::ValidationError> {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => Vec::new(),
            _ => vec![super::ValidationError::required(
                fields::NAME,
                "Name is required to create an attribute.",
            )],
        }
    }

    pub fn build(&self, slug: &str, now: DateTime<Utc>) -> Attribute {
        let input_type = self.input_type.unwrap_or_default();
        let filterable_by_default = allowed_input_types(fields::FILTERABLE_IN_DASHBOARD)
            .is_some_and(|allowed| allowed.contains(&input_type));

        Attribute {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            name: self.name.clone().unwrap_or_default(),
            attribute_type: self.attribute_type.unwrap_or(AttributeType::ProductType),
            input_type,
            entity_type: self.entity_type,
            unit: self.unit.clone(),
            value_required: self.value_required.unwrap_or(false),
            visible_in_storefront: self.visible_in_storefront.unwrap_or(true),
            filterable_in_dashboard: self
                .filterable_in_dashboard
                .unwrap_or(filterable_by_default),
            external_reference: self.external_reference.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&self, existing: &Attribute, now: DateTime<Utc>) -> Attribute {
        let mut updated = existing.clone();
        if let Some(name) = &self.name {
            updated.name = name.clone();
        }
        if let Some(attribute_type) = self.attribute_type {
            updated.attribute_type = attribute_type;
        }
        if let Some(input_type) = self.input_type {
            updated.input_type = input_type;
        }
        if self.entity_type.is_some() {
            updated.entity_type = self.entity_type;
        }
        if self.unit.is_some() {
            updated.unit = self.unit.clone();
        }
        if let Some(value_required) = self.value_required {
            updated.value_required = value_required;
        }
        if let Some(visible) = self.visible_in_storefront {
            updated.visible_in_storefront = visible;
        }
        if let Some(filterable) = self.filterable_in_dashboard {
            updated.filterable_in_dashboard = filterable;
        }
        if self.external_reference.is_some() {
            updated.external_reference = self.external_reference.clone();
        }
        updated.updated_at = now;
        updated
    }
}

/// Attribute pipeline: capability, shape, combinations, matrix, nested values
pub fn validate(
    raw: &Map<String, Value>,
    nested: &[Map<String, Value>],
    context: &ValidationContext<'_>,
) -> ValidationOutcome {
    let capability = rules::attribute_capability(raw.get(fields::TYPE));
    ensure(rules::check_capability(context, &[capability]))?;

    // Well-formed value lists are split off before validation
    if raw.contains_key(fields::VALUES) {
        return Err(vec![super::ValidationError::invalid(
            fields::VALUES,
            "Values must be a list of objects.",
        )]);
    }

    let draft = AttributeDraft::parse(raw)?;
    ensure(rules::check_attribute_combinations(&draft))?;

    if let Some(input_type) = draft.input_type {
        ensure(rules::check_property_matrix(
            &draft,
            !nested.is_empty(),
            input_type,
        ))?;
    }

    let mut errors = Vec::new();
    let mut values = Vec::with_capacity(nested.len());
    for (index, raw_value) in nested.iter().enumerate() {
        match value::validate_nested(raw_value, draft.input_type) {
            Ok(value) => values.push(value),
            Err(value_errors) => {
                let prefix = value_prefix(index);
                errors.extend(value_errors.into_iter().map(|e| e.nested(&prefix)));
            }
        }
    }
    ensure(errors)?;

    Ok(CleanedItem::Attribute { draft, values })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::{Caller, GrantedCapabilities};
    use crate::validation::{ErrorCode, RelatedEntities};
    use crate::constants::Capability;
    use serde_json::json;

    fn run(raw: Value, nested: Vec<Value>, caller: &Caller) -> ValidationOutcome {
        let related = RelatedEntities::default();
        let context = ValidationContext::new(caller, &GrantedCapabilities, &related);
        let nested: Vec<Map<String, Value>> = nested
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect();
        validate(raw.as_object().unwrap(), &nested, &context)
    }

    fn admin() -> Caller {
        Caller::superuser("admin")
    }

    #[test]
    fn valid_attribute_with_values() {
        let outcome = run(
            json!({"name": "Color", "type": "PRODUCT_TYPE", "inputType": "SWATCH"}),
            vec![json!({"name": "Red", "value": "#ff0000"}), json!({"name": "Blue"})],
            &admin(),
        );
        match outcome.unwrap() {
            CleanedItem::Attribute { draft, values } => {
                assert_eq!(draft.input_type, Some(AttributeInputType::Swatch));
                assert_eq!(values.len(), 2);
            }
            other => panic!("unexpected item {other:?}"),
        }
    }

    #[test]
    fn capability_failure_stops_the_pipeline() {
        let caller = Caller::new("pages", [Capability::ManagePageTypesAndAttributes]);
        let errors = run(
            json!({"name": "Color", "type": "PRODUCT_TYPE", "bogus": 1}),
            vec![],
            &caller,
        )
        .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::PermissionDenied);

        assert!(run(
            json!({"name": "Body", "type": "PAGE_TYPE"}),
            vec![],
            &caller
        )
        .is_ok());
    }

    #[test]
    fn deprecated_and_unknown_fields_are_invalid() {
        let errors = run(
            json!({"name": "Color", "type": "PRODUCT_TYPE", "availableInGrid": true, "colour": 1}),
            vec![],
            &admin(),
        )
        .unwrap_err();
        let paths: Vec<_> = errors.iter().filter_map(|e| e.path.as_deref()).collect();
        assert_eq!(paths, vec!["availableInGrid", "colour"]);
        assert!(errors.iter().all(|e| e.code == ErrorCode::Invalid));
    }

    #[test]
    fn matrix_violation_names_the_field() {
        let errors = run(
            json!({"name": "Size", "type": "PRODUCT_TYPE", "inputType": "DROPDOWN", "unit": "cm"}),
            vec![],
            &admin(),
        )
        .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::Invalid);
        assert_eq!(errors[0].path.as_deref(), Some("unit"));
    }

    #[test]
    fn nested_errors_are_prefixed_and_siblings_still_checked() {
        let errors = run(
            json!({"name": "Color", "type": "PRODUCT_TYPE", "inputType": "DROPDOWN"}),
            vec![
                json!({"name": "Red"}),
                json!({"name": "Blue", "fileUrl": "http://img/blue.png"}),
                json!({"plainText": "no name"}),
            ],
            &admin(),
        )
        .unwrap_err();
        let paths: Vec<_> = errors.iter().filter_map(|e| e.path.as_deref()).collect();
        assert_eq!(paths, vec!["values.1.fileUrl", "values.2.name"]);
    }

    #[test]
    fn malformed_values_list_is_invalid() {
        let errors = run(
            json!({"name": "Color", "type": "PRODUCT_TYPE", "values": "red"}),
            vec![],
            &admin(),
        )
        .unwrap_err();
        assert_eq!(errors[0].path.as_deref(), Some("values"));
    }

    #[test]
    fn supplied_columns_follow_fields() {
        let draft = AttributeDraft {
            name: Some("Color".into()),
            unit: Some("kg".into()),
            ..AttributeDraft::default()
        };
        assert_eq!(draft.supplied_columns(), vec!["name", "unit"]);
    }

    #[test]
    fn build_applies_defaults() {
        let draft = AttributeDraft {
            name: Some("Ref".into()),
            attribute_type: Some(AttributeType::PageType),
            input_type: Some(AttributeInputType::Reference),
            entity_type: Some(AttributeEntityType::Page),
            ..AttributeDraft::default()
        };
        let attribute = draft.build("ref", Utc::now());
        assert_eq!(attribute.slug, "ref");
        assert!(attribute.visible_in_storefront);
        assert!(!attribute.filterable_in_dashboard);
        assert!(!attribute.value_required);
    }
}
