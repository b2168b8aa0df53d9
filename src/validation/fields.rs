//! Typed reads of raw item fields.
//!
//! [`FieldReader`] turns a raw JSON object into typed values and records an
//! INVALID error at the field's path for every value of the wrong shape. JSON
//! `null` reads as absent.

use super::ValidationError;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Maximum allowed size for JSON payload fields (1MB)
const MAX_JSON_SIZE_BYTES: usize = 1024 * 1024;

/// Maximum nesting depth for JSON objects/arrays
const MAX_JSON_DEPTH: usize = 10;

/// Maximum number of keys in a JSON object
const MAX_JSON_KEYS: usize = 1000;

/// Maximum string length for JSON string values
const MAX_JSON_STRING_LENGTH: usize = 10000;

/// Checks a rich-text style JSON payload against size and depth limits
pub fn check_json_payload(value: &Value) -> Result<(), String> {
    let serialized =
        serde_json::to_string(value).map_err(|e| format!("Invalid JSON structure: {e}"))?;

    if serialized.len() > MAX_JSON_SIZE_BYTES {
        return Err(format!(
            "JSON payload too large: {} bytes (max: {})",
            serialized.len(),
            MAX_JSON_SIZE_BYTES
        ));
    }

    check_json_depth(value, 0)
}

fn check_json_depth(value: &Value, current_depth: usize) -> Result<(), String> {
    if current_depth > MAX_JSON_DEPTH {
        return Err(format!(
            "JSON nesting too deep: {current_depth} (max: {MAX_JSON_DEPTH})"
        ));
    }

    match value {
        Value::Object(map) => {
            if map.len() > MAX_JSON_KEYS {
                return Err(format!(
                    "Too many JSON keys: {} (max: {})",
                    map.len(),
                    MAX_JSON_KEYS
                ));
            }
            for val in map.values() {
                check_json_depth(val, current_depth + 1)?;
            }
        }
        Value::Array(arr) => {
            if arr.len() > MAX_JSON_KEYS {
                return Err(format!(
                    "JSON array too large: {} items (max: {})",
                    arr.len(),
                    MAX_JSON_KEYS
                ));
            }
            for item in arr {
                check_json_depth(item, current_depth + 1)?;
            }
        }
        Value::String(s) if s.len() > MAX_JSON_STRING_LENGTH => {
            return Err(format!(
                "JSON string too long: {} chars (max: {})",
                s.len(),
                MAX_JSON_STRING_LENGTH
            ));
        }
        _ => {}
    }

    Ok(())
}

pub struct FieldReader<'a> {
    fields: &'a Map<String, Value>,
    errors: Vec<ValidationError>,
}

impl<'a> FieldReader<'a> {
    pub fn new(fields: &'a Map<String, Value>) -> Self {
        Self {
            fields,
            errors: Vec::new(),
        }
    }

    fn present(&self, key: &str) -> Option<&'a Value> {
        let fields: &'a Map<String, Value> = self.fields;
        fields.get(key).filter(|value| !value.is_null())
    }

    fn invalid(&mut self, key: &str, message: String) {
        self.errors.push(ValidationError::invalid(key, message));
    }

    /// Flag every key outside `allowed`
    pub fn reject_unknown(&mut self, allowed: &[&str]) {
        let fields: &'a Map<String, Value> = self.fields;
        let mut unknown: Vec<&String> = fields
            .keys()
            .filter(|key| !allowed.contains(&key.as_str()))
            .collect();
        unknown.sort();
        for key in unknown {
            self.invalid(key, format!("Unknown field '{key}'."));
        }
    }

    pub fn reject_deprecated(&mut self, deprecated: &[&str]) {
        let fields: &'a Map<String, Value> = self.fields;
        for key in deprecated.iter().filter(|key| fields.contains_key(**key)) {
            self.invalid(
                key,
                format!("Deprecated field '{key}' is not allowed in bulk mutation."),
            );
        }
    }

    pub fn string(&mut self, key: &str) -> Option<String> {
        match self.present(key)? {
            Value::String(s) => Some(s.clone()),
            _ => {
                self.invalid(key, format!("'{key}' must be a string."));
                None
            }
        }
    }

    pub fn bool(&mut self, key: &str) -> Option<bool> {
        match self.present(key)? {
            Value::Bool(b) => Some(*b),
            _ => {
                self.invalid(key, format!("'{key}' must be a boolean."));
                None
            }
        }
    }

    /// Non-negative number
    pub fn non_negative(&mut self, key: &str) -> Option<f64> {
        match self.present(key)?.as_f64() {
            Some(n) if n >= 0.0 => Some(n),
            Some(_) => {
                self.invalid(key, format!("'{key}' cannot be negative."));
                None
            }
            None => {
                self.invalid(key, format!("'{key}' must be a number."));
                None
            }
        }
    }

    /// String parsed through `FromStr`, e.g. an enum given by name
    pub fn parsed<T>(&mut self, key: &str) -> Option<T>
    where
        T: FromStr<Err = String>,
    {
        let raw = self.string(key)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(message) => {
                self.invalid(key, message);
                None
            }
        }
    }

    /// Free-form JSON within size and depth limits
    pub fn json(&mut self, key: &str) -> Option<Value> {
        let value = self.present(key)?;
        match check_json_payload(value) {
            Ok(()) => Some(value.clone()),
            Err(message) => {
                self.invalid(key, message);
                None
            }
        }
    }

    /// RFC 3339 timestamp
    pub fn datetime(&mut self, key: &str) -> Option<DateTime<Utc>> {
        let raw = self.string(key)?;
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(parsed) => Some(parsed.with_timezone(&Utc)),
            Err(e) => {
                self.invalid(key, format!("'{key}' is not an RFC 3339 timestamp: {e}"));
                None
            }
        }
    }

    pub fn object(&mut self, key: &str) -> Option<&'a Map<String, Value>> {
        match self.present(key)? {
            Value::Object(map) => Some(map),
            _ => {
                self.invalid(key, format!("'{key}' must be an object."));
                None
            }
        }
    }

    /// Add errors produced by a nested reader, prefixed with `prefix`
    pub fn absorb(&mut self, prefix: &str, errors: Vec<ValidationError>) {
        self.errors
            .extend(errors.into_iter().map(|error| error.nested(prefix)));
    }

    pub fn finish(self) -> Vec<ValidationError> {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ErrorCode;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn typed_reads_record_shape_errors() {
        let fields = map(json!({
            "name": "Color",
            "valueRequired": "yes",
            "rating": -1,
            "unit": null
        }));
        let mut reader = FieldReader::new(&fields);

        assert_eq!(reader.string("name").as_deref(), Some("Color"));
        assert_eq!(reader.bool("valueRequired"), None);
        assert_eq!(reader.non_negative("rating"), None);
        assert_eq!(reader.string("unit"), None);
        assert_eq!(reader.string("missing"), None);

        let errors = reader.finish();
        let paths: Vec<_> = errors.iter().filter_map(|e| e.path.as_deref()).collect();
        assert_eq!(paths, vec!["valueRequired", "rating"]);
        assert!(errors.iter().all(|e| e.code == ErrorCode::Invalid));
    }

    #[test]
    fn unknown_keys_are_reported_in_order() {
        let fields = map(json!({"name": "x", "zeta": 1, "alpha": 2}));
        let mut reader = FieldReader::new(&fields);
        reader.reject_unknown(&["name"]);
        let errors = reader.finish();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].path.as_deref(), Some("alpha"));
        assert_eq!(errors[1].path.as_deref(), Some("zeta"));
    }

    #[test]
    fn datetime_parsing() {
        let fields = map(json!({"ok": "2024-05-01T10:00:00+02:00", "bad": "yesterday"}));
        let mut reader = FieldReader::new(&fields);
        let parsed = reader.datetime("ok").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-05-01T08:00:00+00:00");
        assert!(reader.datetime("bad").is_none());
        assert_eq!(reader.finish().len(), 1);
    }

    #[test]
    fn json_too_deep() {
        let mut deep = json!({});
        let mut current = &mut deep;
        for i in 0..15 {
            let key = format!("level_{i}");
            *current = json!({ key.clone(): {} });
            current = current.get_mut(&key).unwrap();
        }
        assert!(check_json_payload(&deep).is_err());
        assert!(check_json_payload(&json!({"blocks": [{"text": "hi"}]})).is_ok());
    }
}
