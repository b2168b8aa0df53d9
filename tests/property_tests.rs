mod common;

use catalog_bulk::models::Namespace;
use catalog_bulk::slug::{is_valid_slug, slugify, SlugCandidate, SlugRegistry};
use catalog_bulk::{EntityKind, ErrorPolicy};
use common::strategies::*;
use common::Harness;
use proptest::prelude::*;
use std::collections::HashSet;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("test runtime")
}

proptest! {
    /// Property: slugify always produces a normalized slug
    #[test]
    fn slugify_output_is_a_valid_slug(input in any::<String>()) {
        let slug = slugify(&input);
        prop_assert!(is_valid_slug(&slug), "{:?} -> {:?}", input, slug);
        prop_assert!(slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_'));
    }

    /// Property: slugify is idempotent
    #[test]
    fn slugify_is_idempotent(input in display_name_strategy()) {
        let once = slugify(&input);
        prop_assert_eq!(slugify(&once), once);
    }

    /// Property: every slug allocated in one namespace is distinct
    #[test]
    fn allocated_slugs_are_unique(names in prop::collection::vec(display_name_strategy(), 0..30)) {
        let mut registry = SlugRegistry::new();
        let namespace = Namespace::Attributes;
        let mut seen = HashSet::new();
        for name in &names {
            let slug = registry
                .resolve(&namespace, &SlugCandidate::from_name(name.clone()))
                .expect("derived slugs never collide");
            prop_assert!(seen.insert(slug));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: results align with the input and only valid items commit
    #[test]
    fn results_align_with_input(batch in attribute_batch_strategy()) {
        let (raw, valid): (Vec<_>, Vec<_>) = batch.into_iter().unzip();
        let valid_count = valid.iter().filter(|v| **v).count();

        runtime().block_on(async {
            let harness = Harness::new();
            let result = harness
                .upsert(EntityKind::Attribute, raw.clone(), ErrorPolicy::RejectFailedRows)
                .await;

            assert_eq!(result.results.len(), raw.len());
            assert_eq!(result.count, valid_count);
            for (item, is_valid) in result.results.iter().zip(&valid) {
                assert_eq!(item.instance.is_some(), *is_valid);
                assert_eq!(item.errors.is_empty(), *is_valid);
            }

            let strict = Harness::new();
            let result = strict
                .upsert(EntityKind::Attribute, raw.clone(), ErrorPolicy::RejectEverything)
                .await;
            let expected = if valid_count == raw.len() { raw.len() } else { 0 };
            assert_eq!(result.results.len(), raw.len());
            assert_eq!(result.count, expected);
        });
    }
}
