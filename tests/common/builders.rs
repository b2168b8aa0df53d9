//! Builders for raw batch items

#![allow(dead_code)]

use serde_json::{json, Map, Value};

/// Builder for raw attribute items. Defaults to a `PRODUCT_TYPE` attribute.
#[derive(Debug, Clone)]
pub struct AttributeItemBuilder {
    fields: Map<String, Value>,
    values: Vec<Value>,
}

impl AttributeItemBuilder {
    pub fn new(name: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("name".into(), json!(name));
        fields.insert("type".into(), json!("PRODUCT_TYPE"));
        Self {
            fields,
            values: Vec::new(),
        }
    }

    pub fn with_slug(self, slug: &str) -> Self {
        self.with_field("slug", json!(slug))
    }

    pub fn with_input_type(self, input_type: &str) -> Self {
        self.with_field("inputType", json!(input_type))
    }

    pub fn with_external_reference(self, reference: &str) -> Self {
        self.with_field("externalReference", json!(reference))
    }

    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn without_field(mut self, key: &str) -> Self {
        self.fields.remove(key);
        self
    }

    /// Nested value with only a name
    pub fn with_value(mut self, name: &str) -> Self {
        self.values.push(json!({ "name": name }));
        self
    }

    pub fn with_raw_value(mut self, value: Value) -> Self {
        self.values.push(value);
        self
    }

    pub fn build(self) -> Value {
        let mut fields = self.fields;
        if !self.values.is_empty() {
            fields.insert("values".into(), Value::Array(self.values));
        }
        Value::Object(fields)
    }
}

/// Builder for raw product items
#[derive(Debug, Clone)]
pub struct ProductItemBuilder {
    fields: Map<String, Value>,
}

impl ProductItemBuilder {
    pub fn new(name: &str, product_type: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("name".into(), json!(name));
        fields.insert("productType".into(), json!(product_type));
        Self { fields }
    }

    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn build(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Builder for raw category items
#[derive(Debug, Clone)]
pub struct CategoryItemBuilder {
    fields: Map<String, Value>,
}

impl CategoryItemBuilder {
    pub fn new(name: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("name".into(), json!(name));
        Self { fields }
    }

    pub fn with_slug(self, slug: &str) -> Self {
        self.with_field("slug", json!(slug))
    }

    pub fn with_parent(self, parent: &str) -> Self {
        self.with_field("parent", json!(parent))
    }

    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn build(self) -> Value {
        Value::Object(self.fields)
    }
}
