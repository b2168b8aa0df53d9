//! Proptest strategies for raw batch items

#![allow(dead_code)]

use proptest::prelude::*;
use serde_json::{json, Value};

/// Free-form display names, including accents and punctuation
pub fn display_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Za-z][A-Za-z0-9 ]{0,20}",
        "[a-zA-Zéèêàüöß _-]{1,24}",
        Just("Crème Brûlée".to_string()),
        Just("  ".to_string()),
        Just("東京".to_string()),
    ]
}

/// An attribute item that is either valid or missing its required `type`
pub fn attribute_item_strategy() -> impl Strategy<Value = (Value, bool)> {
    ("[A-Z][a-z]{0,6}", any::<bool>()).prop_map(|(name, valid)| {
        let item = if valid {
            json!({ "name": name, "type": "PRODUCT_TYPE" })
        } else {
            json!({ "name": name })
        };
        (item, valid)
    })
}

/// Batches of up to 12 attribute items with their validity flags
pub fn attribute_batch_strategy() -> impl Strategy<Value = Vec<(Value, bool)>> {
    prop::collection::vec(attribute_item_strategy(), 0..12)
}
