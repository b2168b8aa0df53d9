use super::fields::FieldReader;
use super::rules::{self, ensure};
use super::{CleanedItem, ValidationContext, ValidationError, ValidationOutcome};
use crate::constants::{fields, AttributeInputType};
use crate::models::AttributeValue;
use crate::slug::SlugCandidate;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

const ALLOWED_FIELDS: &[&str] = &[
    fields::SLUG,
    fields::NAME,
    fields::VALUE,
    fields::FILE_URL,
    fields::CONTENT_TYPE,
    fields::RICH_TEXT,
    fields::PLAIN_TEXT,
    fields::BOOLEAN,
    fields::DATE_TIME,
    fields::EXTERNAL_REFERENCE,
    fields::ADDITIONAL_FIELDS,
];

const ADDITIONAL_KEYS: &[&str] = &[fields::REF, fields::VALUE, fields::CODE];

/// `additionalFields` of a value: slug inputs kept alongside the record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdditionalFields {
    pub reference: Option<String>,
    pub value: Option<String>,
    pub code: Option<String>,
}

impl AdditionalFields {
    fn parse(raw: &Map<String, Value>) -> Result<Self, Vec<ValidationError>> {
        let mut reader = FieldReader::new(raw);
        reader.reject_unknown(ADDITIONAL_KEYS);
        let parsed = Self {
            reference: reader.string(fields::REF),
            value: reader.string(fields::VALUE),
            code: reader.string(fields::CODE),
        };
        ensure(reader.finish())?;
        Ok(parsed)
    }

    fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (key, field) in [
            (fields::REF, &self.reference),
            (fields::VALUE, &self.value),
            (fields::CODE, &self.code),
        ] {
            if let Some(text) = field {
                map.insert(key.to_string(), Value::String(text.clone()));
            }
        }
        Value::Object(map)
    }

    fn is_empty(&self) -> bool {
        self.reference.is_none() && self.value.is_none() && self.code.is_none()
    }
}

/// Parsed attribute value fields; `None` means "not supplied"
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueDraft {
    pub slug: Option<String>,
    pub name: Option<String>,
    /// Swatch color
    pub value: Option<String>,
    pub file_url: Option<String>,
    pub content_type: Option<String>,
    pub rich_text: Option<Value>,
    pub plain_text: Option<String>,
    pub boolean: Option<bool>,
    pub date_time: Option<DateTime<Utc>>,
    pub external_reference: Option<String>,
    pub additional: AdditionalFields,
    /// Parent attribute slug; only set for standalone values
    pub attribute: Option<String>,
}

impl ValueDraft {
    pub fn parse(raw: &Map<String, Value>, standalone: bool) -> Result<Self, Vec<ValidationError>> {
        let mut reader = FieldReader::new(raw);
        let mut known = ALLOWED_FIELDS.to_vec();
        if standalone {
            known.push(fields::ATTRIBUTE);
        }
        reader.reject_unknown(&known);

        let mut draft = Self {
            slug: reader.string(fields::SLUG),
            name: reader.string(fields::NAME),
            value: reader.string(fields::VALUE),
            file_url: reader.string(fields::FILE_URL),
            content_type: reader.string(fields::CONTENT_TYPE),
            rich_text: reader.json(fields::RICH_TEXT),
            plain_text: reader.string(fields::PLAIN_TEXT),
            boolean: reader.bool(fields::BOOLEAN),
            date_time: reader.datetime(fields::DATE_TIME),
            external_reference: reader.string(fields::EXTERNAL_REFERENCE),
            additional: AdditionalFields::default(),
            attribute: if standalone {
                reader.string(fields::ATTRIBUTE)
            } else {
                None
            },
        };

        if let Some(raw_additional) = reader.object(fields::ADDITIONAL_FIELDS) {
            match AdditionalFields::parse(raw_additional) {
                Ok(additional) => draft.additional = additional,
                Err(errors) => reader.absorb(fields::ADDITIONAL_FIELDS, errors),
            }
        }

        let mut errors = reader.finish();
        errors.extend(rules::check_explicit_slug(draft.slug.as_deref()));
        ensure(errors)?;
        Ok(draft)
    }

    pub fn slug_candidate(&self) -> SlugCandidate {
        SlugCandidate {
            explicit: self.slug.clone(),
            name: self.name.clone(),
            reference: self.additional.reference.clone(),
            value: self.additional.value.clone(),
            code: self.additional.code.clone(),
        }
    }

    /// Swatch-only fields present on this value
    pub fn swatch_fields_supplied(&self) -> Vec<&'static str> {
        [
            (fields::VALUE, self.value.is_some()),
            (fields::FILE_URL, self.file_url.is_some()),
            (fields::CONTENT_TYPE, self.content_type.is_some()),
        ]
        .into_iter()
        .filter_map(|(field, present)| present.then_some(field))
        .collect()
    }

    pub fn supplied_columns(&self) -> Vec<&'static str> {
        let supplied = [
            ("name", self.name.is_some()),
            ("value", self.value.is_some()),
            ("file_url", self.file_url.is_some()),
            ("content_type", self.content_type.is_some()),
            ("rich_text", self.rich_text.is_some()),
            ("plain_text", self.plain_text.is_some()),
            ("boolean", self.boolean.is_some()),
            ("date_time", self.date_time.is_some()),
            ("additional_fields", !self.additional.is_empty()),
            ("external_reference", self.external_reference.is_some()),
        ];
        supplied
            .into_iter()
            .filter_map(|(column, present)| present.then_some(column))
            .collect()
    }

    /// Values have no create-only field beyond their identity
    pub fn missing_for_create(&self) -> Vec<ValidationError> {
        rules::check_value_identity(self)
    }

    fn display_name(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => self.slug_candidate().base_text(),
        }
    }

    pub fn build(&self, attribute_slug: &str, slug: &str, now: DateTime<Utc>) -> AttributeValue {
        AttributeValue {
            id: Uuid::new_v4(),
            attribute_slug: attribute_slug.to_string(),
            slug: slug.to_string(),
            name: self.display_name(),
            value: self.value.clone(),
            file_url: self.file_url.clone(),
            content_type: self.content_type.clone(),
            rich_text: self.rich_text.clone(),
            plain_text: self.plain_text.clone(),
            boolean: self.boolean,
            date_time: self.date_time,
            additional_fields: self.additional.to_json(),
            external_reference: self.external_reference.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&self, existing: &AttributeValue, now: DateTime<Utc>) -> AttributeValue {
        let mut updated = existing.clone();
        if let Some(name) = &self.name {
            updated.name = name.clone();
        }
        if self.value.is_some() {
            updated.value = self.value.clone();
        }
        if self.file_url.is_some() {
            updated.file_url = self.file_url.clone();
        }
        if self.content_type.is_some() {
            updated.content_type = self.content_type.clone();
        }
        if self.rich_text.is_some() {
            updated.rich_text = self.rich_text.clone();
        }
        if self.plain_text.is_some() {
            updated.plain_text = self.plain_text.clone();
        }
        if self.boolean.is_some() {
            updated.boolean = self.boolean;
        }
        if self.date_time.is_some() {
            updated.date_time = self.date_time;
        }
        if !self.additional.is_empty() {
            updated.additional_fields = self.additional.to_json();
        }
        if self.external_reference.is_some() {
            updated.external_reference = self.external_reference.clone();
        }
        updated.updated_at = now;
        updated
    }
}

/// Nested value pipeline. Parent-dependent rules wait until the parent's
/// input type is known.
pub fn validate_nested(
    raw: &Map<String, Value>,
    parent_input_type: Option<AttributeInputType>,
) -> Result<ValueDraft, Vec<ValidationError>> {
    let draft = ValueDraft::parse(raw, false)?;
    ensure(rules::check_value_identity(&draft))?;
    if let Some(input_type) = parent_input_type {
        ensure(rules::check_value_for_parent(&draft, input_type))?;
    }
    Ok(draft)
}

/// Standalone value pipeline: capability of the parent's type, shape,
/// identity, parent lookup, then the parent-dependent rules
pub fn validate_standalone(
    raw: &Map<String, Value>,
    context: &ValidationContext<'_>,
) -> ValidationOutcome {
    let parent = raw
        .get(fields::ATTRIBUTE)
        .and_then(Value::as_str)
        .and_then(|slug| context.related.attributes.get(slug));

    if let Some(parent) = parent {
        ensure(rules::check_capability(
            context,
            &[parent.attribute_type.required_capability()],
        ))?;
    }

    let draft = ValueDraft::parse(raw, true)?;

    let mut required = rules::check_value_identity(&draft);
    if draft.attribute.is_none() {
        required.push(ValidationError::required(
            fields::ATTRIBUTE,
            "Parent attribute is required.",
        ));
    }
    ensure(required)?;

    let parent = parent.ok_or_else(|| {
        vec![ValidationError::not_found(
            fields::ATTRIBUTE,
            format!(
                "Attribute '{}' does not exist.",
                draft.attribute.as_deref().unwrap_or_default()
            ),
        )]
    })?;

    if !parent.input_type.has_choices() {
        return Err(vec![ValidationError::invalid(
            fields::ATTRIBUTE,
            format!(
                "Attribute '{}' of input type {} does not accept predefined values.",
                parent.slug, parent.input_type
            ),
        )]);
    }
    ensure(rules::check_value_for_parent(&draft, parent.input_type))?;

    Ok(CleanedItem::AttributeValue(draft))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{AttributeType, Capability};
    use crate::models::Attribute;
    use crate::permissions::{Caller, GrantedCapabilities};
    use crate::validation::{ErrorCode, RelatedEntities};
    use serde_json::json;

    fn attribute(slug: &str, attribute_type: AttributeType, input_type: AttributeInputType) -> Attribute {
        let now = Utc::now();
        Attribute {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            name: slug.to_string(),
            attribute_type,
            input_type,
            entity_type: None,
            unit: None,
            value_required: false,
            visible_in_storefront: true,
            filterable_in_dashboard: true,
            external_reference: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn related() -> RelatedEntities {
        let mut related = RelatedEntities::default();
        for attr in [
            attribute("color", AttributeType::ProductType, AttributeInputType::Swatch),
            attribute("layout", AttributeType::PageType, AttributeInputType::Dropdown),
            attribute("weight", AttributeType::ProductType, AttributeInputType::Numeric),
        ] {
            related.attributes.insert(attr.slug.clone(), attr);
        }
        related
    }

    fn run(raw: Value, caller: &Caller) -> ValidationOutcome {
        let related = related();
        let context = ValidationContext::new(caller, &GrantedCapabilities, &related);
        validate_standalone(raw.as_object().unwrap(), &context)
    }

    #[test]
    fn standalone_value_checks_parent_capability() {
        let caller = Caller::new("products", [Capability::ManageProductTypesAndAttributes]);
        assert!(run(json!({"attribute": "color", "name": "Red"}), &caller).is_ok());

        let errors = run(json!({"attribute": "layout", "name": "Wide"}), &caller).unwrap_err();
        assert_eq!(errors[0].code, ErrorCode::PermissionDenied);
    }

    #[test]
    fn missing_parent_is_not_found() {
        let errors = run(
            json!({"attribute": "ghost", "name": "Boo"}),
            &Caller::superuser("admin"),
        )
        .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::NotFound);
        assert_eq!(errors[0].path.as_deref(), Some("attribute"));
    }

    #[test]
    fn parent_without_choices_refuses_values() {
        let errors = run(
            json!({"attribute": "weight", "name": "Heavy"}),
            &Caller::superuser("admin"),
        )
        .unwrap_err();
        assert_eq!(errors[0].code, ErrorCode::Invalid);
    }

    #[test]
    fn additional_fields_feed_the_slug() {
        let raw = json!({"additionalFields": {"ref": "SKU-1", "value": "Large"}});
        let draft = validate_nested(raw.as_object().unwrap(), None).unwrap();
        assert_eq!(draft.slug_candidate().base_slug(), "sku-1-large");
        let built = draft.build("size", "sku-1-large", Utc::now());
        assert_eq!(built.name, "SKU-1-Large");
        assert_eq!(built.additional_fields["ref"], "SKU-1");
    }

    #[test]
    fn unknown_additional_keys_are_nested_errors() {
        let raw = json!({"name": "x", "additionalFields": {"ref": "a", "colour": "b"}});
        let errors = validate_nested(raw.as_object().unwrap(), None).unwrap_err();
        assert_eq!(errors[0].path.as_deref(), Some("additionalFields.colour"));
    }

    #[test]
    fn nested_values_refuse_parent_key() {
        let raw = json!({"name": "Red", "attribute": "color"});
        let errors = validate_nested(raw.as_object().unwrap(), None).unwrap_err();
        assert_eq!(errors[0].path.as_deref(), Some("attribute"));
    }
}
