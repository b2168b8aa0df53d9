//! Composable validation rules.
//!
//! Each rule is a plain function returning the errors it found. Validators
//! chain them with [`ensure`], which stops an item's pipeline at the first
//! rule that fails.

use super::{AttributeDraft, ValidationContext, ValidationError, ValueDraft};
use crate::constants::{
    fields, AttributeInputType, AttributeType, Capability, ATTRIBUTE_PROPERTIES_CONFIGURATION,
};
use crate::slug::is_valid_slug;
use serde_json::Value;

/// Turn a rule's findings into a pipeline step
pub fn ensure(errors: Vec<ValidationError>) -> Result<(), Vec<ValidationError>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Capability an attribute item needs, read from its raw `type` field
pub fn attribute_capability(raw_type: Option<&Value>) -> Capability {
    match raw_type.and_then(Value::as_str) {
        Some(raw) if raw == AttributeType::PageType.as_str() => {
            Capability::ManagePageTypesAndAttributes
        }
        _ => Capability::ManageProductTypesAndAttributes,
    }
}

pub fn check_capability(
    context: &ValidationContext<'_>,
    required: &[Capability],
) -> Vec<ValidationError> {
    if context.checker.has_permission(context.caller, required) {
        return Vec::new();
    }
    vec![ValidationError::permission_denied(format!(
        "You have no permission to manage this item. You need one of the following permissions: {required:?}"
    ))]
}

/// Explicit slugs must already be in normalized form
pub fn check_explicit_slug(slug: Option<&str>) -> Vec<ValidationError> {
    match slug {
        Some(slug) if !is_valid_slug(slug) => vec![ValidationError::invalid(
            fields::SLUG,
            format!("'{slug}' is not a valid slug. Use lowercase letters, digits, '-' and '_'."),
        )],
        _ => Vec::new(),
    }
}

pub fn check_attribute_combinations(draft: &AttributeDraft) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if draft.attribute_type.is_none() {
        errors.push(ValidationError::required(
            fields::TYPE,
            "Attribute type is required.",
        ));
    }
    if draft.input_type == Some(AttributeInputType::Reference) && draft.entity_type.is_none() {
        errors.push(ValidationError::required(
            fields::ENTITY_TYPE,
            "Entity type is required when REFERENCE input type is used.",
        ));
    }
    errors
}

/// Optional attribute fields set outside the input types that allow them
pub fn check_property_matrix(
    draft: &AttributeDraft,
    has_values: bool,
    input_type: AttributeInputType,
) -> Vec<ValidationError> {
    ATTRIBUTE_PROPERTIES_CONFIGURATION
        .iter()
        .filter(|(field, allowed)| {
            !allowed.contains(&input_type) && draft.sets_property(field, has_values)
        })
        .map(|(field, _)| {
            ValidationError::invalid(
                field,
                format!("Cannot set {field} on a {input_type} attribute."),
            )
        })
        .collect()
}

/// A value needs a name, or both `additionalFields.ref` and `additionalFields.value`
pub fn check_value_identity(value: &ValueDraft) -> Vec<ValidationError> {
    let has_name = value.name.as_deref().is_some_and(|n| !n.trim().is_empty());
    let has_pair = value.additional.reference.is_some() && value.additional.value.is_some();
    if has_name || has_pair {
        return Vec::new();
    }
    vec![ValidationError::required(
        fields::NAME,
        "Value requires a name or both additionalFields.ref and additionalFields.value.",
    )]
}

/// Swatch-only fields on non-swatch parents, then swatch exclusivity
pub fn check_value_for_parent(
    value: &ValueDraft,
    parent_input_type: AttributeInputType,
) -> Vec<ValidationError> {
    if parent_input_type != AttributeInputType::Swatch {
        return value
            .swatch_fields_supplied()
            .into_iter()
            .map(|field| {
                ValidationError::invalid(
                    field,
                    format!("Cannot define {field} for a {parent_input_type} attribute."),
                )
            })
            .collect();
    }

    if value.value.is_some() && value.file_url.is_some() {
        let message = "Cannot specify both value and file for swatch attribute.";
        return vec![
            ValidationError::mutually_exclusive(fields::VALUE, message),
            ValidationError::mutually_exclusive(fields::FILE_URL, message),
        ];
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::AdditionalFields;
    use serde_json::json;

    #[test]
    fn page_type_needs_page_capability() {
        assert_eq!(
            attribute_capability(Some(&json!("PAGE_TYPE"))),
            Capability::ManagePageTypesAndAttributes
        );
        assert_eq!(
            attribute_capability(Some(&json!("PRODUCT_TYPE"))),
            Capability::ManageProductTypesAndAttributes
        );
        assert_eq!(
            attribute_capability(None),
            Capability::ManageProductTypesAndAttributes
        );
    }

    #[test]
    fn reference_requires_entity_type() {
        let draft = AttributeDraft {
            attribute_type: Some(AttributeType::ProductType),
            input_type: Some(AttributeInputType::Reference),
            ..AttributeDraft::default()
        };
        let errors = check_attribute_combinations(&draft);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path.as_deref(), Some("entityType"));
    }

    #[test]
    fn matrix_flags_unit_on_dropdown() {
        let draft = AttributeDraft {
            unit: Some("kg".into()),
            filterable_in_dashboard: Some(false),
            ..AttributeDraft::default()
        };
        let errors = check_property_matrix(&draft, false, AttributeInputType::Dropdown);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path.as_deref(), Some("unit"));

        assert!(check_property_matrix(&draft, false, AttributeInputType::Numeric).is_empty());
        let errors = check_property_matrix(&draft, true, AttributeInputType::Numeric);
        assert_eq!(errors[0].path.as_deref(), Some("values"));
    }

    #[test]
    fn swatch_rules() {
        let both = ValueDraft {
            name: Some("Red".into()),
            value: Some("#ff0000".into()),
            file_url: Some("http://img/red.png".into()),
            ..ValueDraft::default()
        };
        let errors = check_value_for_parent(&both, AttributeInputType::Swatch);
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| e.code == crate::validation::ErrorCode::MutuallyExclusive));

        let errors = check_value_for_parent(&both, AttributeInputType::Dropdown);
        let paths: Vec<_> = errors.iter().filter_map(|e| e.path.as_deref()).collect();
        assert_eq!(paths, vec!["value", "fileUrl"]);
    }

    #[test]
    fn value_identity() {
        let anonymous = ValueDraft::default();
        assert_eq!(check_value_identity(&anonymous).len(), 1);

        let paired = ValueDraft {
            additional: AdditionalFields {
                reference: Some("R1".into()),
                value: Some("10".into()),
                code: None,
            },
            ..ValueDraft::default()
        };
        assert!(check_value_identity(&paired).is_empty());
    }
}
