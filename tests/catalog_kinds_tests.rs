//! Product, category and standalone attribute value batches

mod common;

use catalog_bulk::{BatchRequest, BulkError, Caller, Capability, EntityKind, ErrorCode, ErrorPolicy};
use common::{items, AttributeItemBuilder, CategoryItemBuilder, Harness, ProductItemBuilder};
use serde_json::json;

#[tokio::test]
async fn products_must_reference_existing_types_and_categories() {
    let harness = Harness::with_product_types().await;
    harness
        .upsert(
            EntityKind::Category,
            vec![CategoryItemBuilder::new("Footwear").build()],
            ErrorPolicy::RejectEverything,
        )
        .await;
    harness.sink.clear();

    let result = harness
        .upsert(
            EntityKind::Product,
            vec![
                ProductItemBuilder::new("Sneaker", "shoes")
                    .with_field("category", json!("footwear"))
                    .build(),
                ProductItemBuilder::new("Cap", "hats").build(),
                ProductItemBuilder::new("Boot", "boots").build(),
                ProductItemBuilder::new("Sock", "shoes")
                    .with_field("category", json!("hosiery"))
                    .build(),
            ],
            ErrorPolicy::RejectFailedRows,
        )
        .await;

    assert_eq!(result.count, 2);
    assert_eq!(result.slugs(), vec![Some("sneaker"), Some("cap"), None, None]);
    assert_eq!(result.results[2].errors[0].code, ErrorCode::NotFound);
    assert_eq!(
        result.results[2].errors[0].path.as_deref(),
        Some("productType")
    );
    assert_eq!(result.results[3].errors[0].path.as_deref(), Some("category"));

    assert_eq!(
        harness.sink.summary(),
        vec!["product_created:sneaker", "product_created:cap"]
    );
    let snapshot = harness.store.snapshot().await;
    assert_eq!(
        snapshot.products["sneaker"].category_slug.as_deref(),
        Some("footwear")
    );
}

#[tokio::test]
async fn product_type_is_only_required_on_create() {
    let harness = Harness::with_product_types().await;
    harness
        .upsert(
            EntityKind::Product,
            vec![ProductItemBuilder::new("Sneaker", "shoes").build()],
            ErrorPolicy::RejectEverything,
        )
        .await;
    harness.sink.clear();

    let result = harness
        .upsert(
            EntityKind::Product,
            vec![
                json!({"slug": "sneaker", "rating": 4.5}),
                json!({"name": "Loafer"}),
            ],
            ErrorPolicy::RejectFailedRows,
        )
        .await;

    assert!(result.results[0].is_committed());
    assert_eq!(result.results[1].errors[0].code, ErrorCode::Required);
    assert_eq!(
        result.results[1].errors[0].path.as_deref(),
        Some("productType")
    );
    assert_eq!(harness.sink.summary(), vec!["product_updated:sneaker"]);

    let snapshot = harness.store.snapshot().await;
    let sneaker = &snapshot.products["sneaker"];
    assert_eq!(sneaker.name, "Sneaker");
    assert_eq!(sneaker.product_type_slug, "shoes");
    assert_eq!(sneaker.rating, Some(4.5));
}

#[tokio::test]
async fn products_missing_a_type_leave_the_slug_to_their_sibling() {
    let harness = Harness::with_product_types().await;
    let result = harness
        .upsert(
            EntityKind::Product,
            vec![
                json!({"name": "Loafer"}),
                ProductItemBuilder::new("Loafer", "shoes").build(),
            ],
            ErrorPolicy::RejectFailedRows,
        )
        .await;

    assert_eq!(result.slugs(), vec![None, Some("loafer")]);
    assert_eq!(result.results[0].errors[0].code, ErrorCode::Required);
    assert_eq!(harness.sink.summary(), vec!["product_created:loafer"]);
}

#[tokio::test]
async fn negative_weight_is_invalid() {
    let harness = Harness::with_product_types().await;
    let result = harness
        .upsert(
            EntityKind::Product,
            vec![ProductItemBuilder::new("Anvil", "shoes")
                .with_field("weight", json!(-1.0))
                .build()],
            ErrorPolicy::RejectFailedRows,
        )
        .await;

    assert_eq!(result.results[0].errors[0].code, ErrorCode::Invalid);
    assert_eq!(result.results[0].errors[0].path.as_deref(), Some("weight"));
}

#[tokio::test]
async fn product_batches_need_manage_products() {
    let harness = Harness::with_product_types().await;
    let caller = Caller::new("attributes", [Capability::ManageProductTypesAndAttributes]);
    let request = BatchRequest::new(
        EntityKind::Product,
        items(vec![ProductItemBuilder::new("Sneaker", "shoes").build()]),
    );

    let err = harness.orchestrator.upsert(&caller, request).await.unwrap_err();
    assert!(matches!(
        err,
        BulkError::PermissionDenied {
            kind: EntityKind::Product,
            ..
        }
    ));
}

#[tokio::test]
async fn category_parent_may_come_later_in_the_batch() {
    let harness = Harness::new();
    let result = harness
        .upsert(
            EntityKind::Category,
            vec![
                CategoryItemBuilder::new("Boots").with_parent("footwear").build(),
                CategoryItemBuilder::new("Footwear").with_slug("footwear").build(),
            ],
            ErrorPolicy::RejectEverything,
        )
        .await;

    assert_eq!(result.count, 2);
    let snapshot = harness.store.snapshot().await;
    assert_eq!(
        snapshot.categories["boots"].parent_slug.as_deref(),
        Some("footwear")
    );
    assert_eq!(
        harness.sink.summary(),
        vec!["category_created:boots", "category_created:footwear"]
    );
}

#[tokio::test]
async fn category_parent_rules() {
    let harness = Harness::new();
    let result = harness
        .upsert(
            EntityKind::Category,
            vec![
                CategoryItemBuilder::new("Shoes").with_parent("shoes").build(),
                CategoryItemBuilder::new("Boots").with_parent("nowhere").build(),
            ],
            ErrorPolicy::RejectFailedRows,
        )
        .await;

    assert_eq!(result.count, 0);
    assert_eq!(result.results[0].errors[0].code, ErrorCode::Invalid);
    assert_eq!(result.results[0].errors[0].path.as_deref(), Some("parent"));
    assert_eq!(result.results[1].errors[0].code, ErrorCode::NotFound);
    assert_eq!(result.results[1].errors[0].path.as_deref(), Some("parent"));
}

#[tokio::test]
async fn category_parent_cycles_are_invalid() {
    let harness = Harness::new();
    let result = harness
        .upsert(
            EntityKind::Category,
            vec![
                CategoryItemBuilder::new("A").with_slug("a").with_parent("b").build(),
                CategoryItemBuilder::new("B").with_slug("b").with_parent("a").build(),
                CategoryItemBuilder::new("Hats").build(),
            ],
            ErrorPolicy::RejectFailedRows,
        )
        .await;

    assert_eq!(result.slugs(), vec![None, None, Some("hats")]);
    for rejected in &result.results[..2] {
        assert_eq!(rejected.errors[0].code, ErrorCode::Invalid);
        assert_eq!(rejected.errors[0].path.as_deref(), Some("parent"));
    }
    let snapshot = harness.store.snapshot().await;
    assert_eq!(snapshot.categories.len(), 1);
    assert_eq!(harness.sink.summary(), vec!["category_created:hats"]);
}

#[tokio::test]
async fn children_of_rejected_batch_parents_are_rejected() {
    let harness = Harness::new();
    let result = harness
        .upsert(
            EntityKind::Category,
            vec![
                CategoryItemBuilder::new("Footwear")
                    .with_slug("footwear")
                    .with_field("bogus", json!(true))
                    .build(),
                CategoryItemBuilder::new("Boots").with_parent("footwear").build(),
                CategoryItemBuilder::new("Hats").build(),
            ],
            ErrorPolicy::RejectFailedRows,
        )
        .await;

    assert_eq!(result.slugs(), vec![None, None, Some("hats")]);
    assert_eq!(result.results[0].errors[0].path.as_deref(), Some("bogus"));
    assert_eq!(result.results[1].errors[0].code, ErrorCode::NotFound);
    assert_eq!(result.results[1].errors[0].path.as_deref(), Some("parent"));
}

#[tokio::test]
async fn category_updates_keep_unsupplied_fields() {
    let harness = Harness::new();
    harness
        .upsert(
            EntityKind::Category,
            vec![CategoryItemBuilder::new("Footwear")
                .with_field("seoTitle", json!("Shoes and boots"))
                .build()],
            ErrorPolicy::RejectEverything,
        )
        .await;
    harness
        .upsert(
            EntityKind::Category,
            vec![CategoryItemBuilder::new("Footwear")
                .with_field("seoDescription", json!("Everything for your feet"))
                .build()],
            ErrorPolicy::RejectEverything,
        )
        .await;

    let snapshot = harness.store.snapshot().await;
    assert_eq!(snapshot.categories.len(), 1);
    let footwear = &snapshot.categories["footwear"];
    assert_eq!(footwear.seo_title.as_deref(), Some("Shoes and boots"));
    assert_eq!(
        footwear.seo_description.as_deref(),
        Some("Everything for your feet")
    );
    assert_eq!(
        harness.sink.summary(),
        vec!["category_created:footwear", "category_updated:footwear"]
    );
}

async fn harness_with_attributes() -> Harness {
    let harness = Harness::new();
    harness
        .upsert(
            EntityKind::Attribute,
            vec![
                AttributeItemBuilder::new("Color")
                    .with_input_type("SWATCH")
                    .with_value("Red")
                    .build(),
                AttributeItemBuilder::new("Weight")
                    .with_input_type("NUMERIC")
                    .build(),
                AttributeItemBuilder::new("Author")
                    .with_field("type", json!("PAGE_TYPE"))
                    .build(),
            ],
            ErrorPolicy::RejectEverything,
        )
        .await;
    harness.sink.clear();
    harness
}

#[tokio::test]
async fn standalone_values_are_checked_against_their_parent() {
    let harness = harness_with_attributes().await;
    let result = harness
        .upsert(
            EntityKind::AttributeValue,
            vec![
                json!({"attribute": "color", "name": "Blue", "value": "#0000ff"}),
                json!({"attribute": "missing", "name": "Ghost"}),
                json!({"attribute": "color", "name": "Sky", "value": "#00f", "fileUrl": "https://cdn/sky.png"}),
                json!({"name": "Orphan"}),
                json!({"attribute": "weight", "name": "Heavy"}),
            ],
            ErrorPolicy::RejectFailedRows,
        )
        .await;

    assert_eq!(result.count, 1);
    assert_eq!(result.slugs()[0], Some("blue"));

    assert_eq!(result.results[1].errors[0].code, ErrorCode::NotFound);
    assert_eq!(result.results[1].errors[0].path.as_deref(), Some("attribute"));

    let exclusive: Vec<Option<&str>> = result.results[2]
        .errors
        .iter()
        .map(|e| e.path.as_deref())
        .collect();
    assert_eq!(exclusive, vec![Some("value"), Some("fileUrl")]);

    assert_eq!(result.results[3].errors[0].code, ErrorCode::Required);
    assert_eq!(result.results[3].errors[0].path.as_deref(), Some("attribute"));

    assert_eq!(result.results[4].errors[0].code, ErrorCode::Invalid);
    assert_eq!(result.results[4].errors[0].path.as_deref(), Some("attribute"));

    assert_eq!(harness.sink.summary(), vec!["attribute_value_created:blue"]);
}

#[tokio::test]
async fn standalone_value_slugs_are_scoped_to_the_parent() {
    let harness = harness_with_attributes().await;
    let result = harness
        .upsert(
            EntityKind::AttributeValue,
            vec![
                json!({"attribute": "color", "name": "Red"}),
                json!({"attribute": "color", "name": "Red"}),
                json!({"attribute": "author", "name": "Red"}),
                json!({"attribute": "color", "additionalFields": {"ref": "REF", "value": "Val"}}),
            ],
            ErrorPolicy::RejectEverything,
        )
        .await;

    assert_eq!(
        result.slugs(),
        vec![Some("red"), Some("red-2"), Some("red"), Some("ref-val")]
    );
    assert_eq!(
        harness.sink.summary(),
        vec![
            "attribute_value_updated:red",
            "attribute_value_created:red-2",
            "attribute_value_created:red",
            "attribute_value_created:ref-val",
        ]
    );
    let snapshot = harness.store.snapshot().await;
    assert_eq!(snapshot.values_of("color").len(), 3);
    assert_eq!(snapshot.values_of("author").len(), 1);
}

#[tokio::test]
async fn standalone_values_need_the_parent_capability() {
    let harness = harness_with_attributes().await;
    let caller = Caller::new("catalog", [Capability::ManageProductTypesAndAttributes]);
    let request = BatchRequest::new(
        EntityKind::AttributeValue,
        items(vec![
            json!({"attribute": "author", "name": "Jane"}),
            json!({"attribute": "color", "name": "Green"}),
        ]),
    )
    .with_policy(ErrorPolicy::RejectFailedRows);

    let result = harness.orchestrator.upsert(&caller, request).await.unwrap();
    assert_eq!(result.results[0].errors[0].code, ErrorCode::PermissionDenied);
    assert!(result.results[1].is_committed());
}
