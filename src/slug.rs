//! # Slug Resolution
//!
//! Deterministic natural-key generation. A slug is derived from the item's
//! fields, transliterated to ASCII, normalized to `[a-z0-9_-]` and made unique
//! against the slugs allocated earlier in the same batch. A persisted slug is
//! never skipped: the item that resolves to it updates that record.
//!
//! The resolver performs no I/O. [`SlugRegistry`] also keeps the persisted
//! slugs of each namespace, loaded once per batch, so the orchestrator knows
//! which records an item could claim before it allocates anything. Items are
//! resolved sequentially in input order, which is the single-writer discipline
//! the batch-local set needs.

use crate::constants::SLUG_PLACEHOLDER;
use crate::models::Namespace;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Letters NFKD leaves intact that still have a conventional ASCII spelling
const TRANSLITERATIONS: &[(char, &str)] = &[
    ('ß', "ss"),
    ('æ', "ae"),
    ('Æ', "AE"),
    ('ø', "o"),
    ('Ø', "O"),
    ('ł', "l"),
    ('Ł', "L"),
    ('đ', "d"),
    ('Đ', "D"),
    ('þ', "th"),
    ('Þ', "TH"),
    ('œ', "oe"),
    ('Œ', "OE"),
];

/// Fields a slug may be derived from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlugCandidate {
    /// Caller-supplied slug; used verbatim and never suffixed
    pub explicit: Option<String>,
    pub name: Option<String>,
    pub reference: Option<String>,
    pub value: Option<String>,
    pub code: Option<String>,
}

impl SlugCandidate {
    pub fn from_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Raw text the slug is derived from, by field priority
    pub fn base_text(&self) -> String {
        let present = |field: &Option<String>| field.clone().filter(|s| !s.trim().is_empty());
        let (name, reference, value, code) = (
            present(&self.name),
            present(&self.reference),
            present(&self.value),
            present(&self.code),
        );

        match (&reference, &value, &name, &code) {
            (Some(r), Some(v), _, _) => format!("{r}-{v}"),
            (_, _, Some(n), Some(c)) => format!("{n}-{c}"),
            _ => name
                .or(reference)
                .or(value)
                .or(code)
                .unwrap_or_else(|| SLUG_PLACEHOLDER.to_string()),
        }
    }

    /// Normalized slug before any uniqueness suffix
    pub fn base_slug(&self) -> String {
        slugify(&self.base_text())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlugError {
    #[error("Slug '{0}' is used by another item in this batch")]
    DuplicateExplicit(String),
}

/// Convert text to an ASCII approximation
pub fn transliterate(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.nfkd().filter(|c| !is_combining_mark(*c)) {
        if c.is_ascii() {
            out.push(c);
        } else if let Some((_, ascii)) = TRANSLITERATIONS.iter().find(|(from, _)| *from == c) {
            out.push_str(ascii);
        } else if c.is_whitespace() {
            out.push(' ');
        }
    }
    out
}

/// URL-safe slug form of `input`; `"-"` when nothing usable remains
pub fn slugify(input: &str) -> String {
    let ascii = transliterate(input).to_ascii_lowercase();

    let mut slug = String::with_capacity(ascii.len());
    let mut pending_dash = false;
    for c in ascii.chars() {
        if c.is_ascii_whitespace() || c == '-' {
            pending_dash = true;
        } else if c.is_ascii_alphanumeric() || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        }
    }

    let trimmed = slug.trim_matches(|c| c == '-' || c == '_');
    if trimmed.is_empty() {
        SLUG_PLACEHOLDER.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Whether `slug` is already in normalized form
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && slugify(slug) == slug
}

/// First number appended to a derived slug that is already taken
const FIRST_SUFFIX: usize = 2;

/// Split `<base>-<n>` into `base` and `n`; `None` unless `n` is a suffix the
/// resolver could have produced
pub fn split_suffix(slug: &str) -> Option<(&str, usize)> {
    let (base, suffix) = slug.rsplit_once('-')?;
    if base.is_empty() || suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let number: usize = suffix.parse().ok()?;
    (number >= FIRST_SUFFIX).then_some((base, number))
}

/// Pick the slug for `candidate` and record it in `batch_slugs`.
///
/// An explicit slug is taken as is. A derived slug is the first of `base`,
/// `base-2`, `base-3`, ... not yet allocated in this batch. Persisted slugs do
/// not push the suffix further: a persisted candidate is claimed and the item
/// targets that record, so a batch submitted twice updates what it created.
pub fn resolve(
    candidate: &SlugCandidate,
    batch_slugs: &mut HashSet<String>,
) -> Result<String, SlugError> {
    if let Some(explicit) = candidate.explicit.as_deref() {
        if !batch_slugs.insert(explicit.to_string()) {
            return Err(SlugError::DuplicateExplicit(explicit.to_string()));
        }
        return Ok(explicit.to_string());
    }

    let base = candidate.base_slug();
    if batch_slugs.insert(base.clone()) {
        return Ok(base);
    }

    let mut extension = FIRST_SUFFIX;
    loop {
        let suffixed = format!("{base}-{extension}");
        if batch_slugs.insert(suffixed.clone()) {
            return Ok(suffixed);
        }
        extension += 1;
    }
}

/// Persisted and batch-allocated slugs of one namespace
#[derive(Debug, Clone, Default)]
pub struct NamespaceSlugs {
    /// Persisted slugs keyed by the base they extend, with their suffix number
    /// (1 for the base itself)
    persisted: HashMap<String, Vec<(usize, String)>>,
    allocated: HashSet<String>,
}

impl NamespaceSlugs {
    fn add_persisted(&mut self, slug: String) {
        if let Some((base, number)) = split_suffix(&slug) {
            self.persisted
                .entry(base.to_string())
                .or_default()
                .push((number, slug.clone()));
        }
        self.persisted.entry(slug.clone()).or_default().push((1, slug));
    }

    pub fn is_persisted(&self, slug: &str) -> bool {
        self.persisted
            .get(slug)
            .is_some_and(|family| family.iter().any(|(number, _)| *number == 1))
    }

    pub fn allocated(&self) -> &HashSet<String> {
        &self.allocated
    }
}

/// Uniqueness sets for every namespace touched by a batch
#[derive(Debug, Default)]
pub struct SlugRegistry {
    namespaces: HashMap<Namespace, NamespaceSlugs>,
}

impl SlugRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_persisted(&mut self, namespace: Namespace, slug: impl Into<String>) {
        self.namespaces
            .entry(namespace)
            .or_default()
            .add_persisted(slug.into());
    }

    pub fn resolve(
        &mut self,
        namespace: &Namespace,
        candidate: &SlugCandidate,
    ) -> Result<String, SlugError> {
        let slugs = self.namespaces.entry(namespace.clone()).or_default();
        resolve(candidate, &mut slugs.allocated)
    }

    /// Persisted slugs `candidate` can resolve to when at most `competitors`
    /// items allocate in its namespace
    pub fn claimable(
        &self,
        namespace: &Namespace,
        candidate: &SlugCandidate,
        competitors: usize,
    ) -> Vec<String> {
        let Some(slugs) = self.namespaces.get(namespace) else {
            return Vec::new();
        };
        if let Some(explicit) = candidate.explicit.as_deref() {
            return if slugs.is_persisted(explicit) {
                vec![explicit.to_string()]
            } else {
                Vec::new()
            };
        }
        slugs
            .persisted
            .get(&candidate.base_slug())
            .map(|family| {
                family
                    .iter()
                    .filter(|(number, _)| *number <= competitors.max(1))
                    .map(|(_, slug)| slug.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Forget every allocation, keeping the persisted sets
    pub fn clear_allocations(&mut self) {
        for slugs in self.namespaces.values_mut() {
            slugs.allocated.clear();
        }
    }

    pub fn is_allocated(&self, namespace: &Namespace, slug: &str) -> bool {
        self.namespaces
            .get(namespace)
            .is_some_and(|slugs| slugs.allocated.contains(slug))
    }

    pub fn namespace(&self, namespace: &Namespace) -> Option<&NamespaceSlugs> {
        self.namespaces.get(namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_all(names: &[&str]) -> Vec<String> {
        let mut batch = HashSet::new();
        names
            .iter()
            .map(|name| resolve(&SlugCandidate::from_name(*name), &mut batch).unwrap())
            .collect()
    }

    #[test]
    fn duplicate_names_get_numeric_suffixes() {
        assert_eq!(resolve_all(&["Red", "Red", "red"]), vec!["red", "red-2", "red-3"]);
    }

    #[test]
    fn suffix_splitting() {
        assert_eq!(split_suffix("red-2"), Some(("red", 2)));
        assert_eq!(split_suffix("red-2-10"), Some(("red-2", 10)));
        assert_eq!(split_suffix("red-1"), None);
        assert_eq!(split_suffix("red-x"), None);
        assert_eq!(split_suffix("-2"), None);
        assert_eq!(split_suffix("red"), None);
    }

    #[test]
    fn claimable_slugs_stay_within_reach() {
        let mut registry = SlugRegistry::new();
        let namespace = Namespace::Attributes;
        for slug in ["red", "red-2", "red-3", "red-2-2", "reddish"] {
            registry.add_persisted(namespace.clone(), slug);
        }
        let red = SlugCandidate::from_name("Red");

        let mut two = registry.claimable(&namespace, &red, 2);
        two.sort();
        assert_eq!(two, vec!["red", "red-2"]);
        assert_eq!(registry.claimable(&namespace, &red, 1), vec!["red"]);
        assert_eq!(registry.claimable(&namespace, &red, 3).len(), 3);

        let explicit = SlugCandidate {
            explicit: Some("red-2-2".into()),
            ..SlugCandidate::default()
        };
        assert_eq!(registry.claimable(&namespace, &explicit, 5), vec!["red-2-2"]);
        assert!(registry
            .claimable(&Namespace::Products, &red, 5)
            .is_empty());
    }

    #[test]
    fn clearing_allocations_restarts_suffixes() {
        let mut registry = SlugRegistry::new();
        let namespace = Namespace::Attributes;
        let red = SlugCandidate::from_name("Red");
        assert_eq!(registry.resolve(&namespace, &red).unwrap(), "red");
        assert_eq!(registry.resolve(&namespace, &red).unwrap(), "red-2");

        registry.clear_allocations();
        assert!(!registry.is_allocated(&namespace, "red-2"));
        assert_eq!(registry.resolve(&namespace, &red).unwrap(), "red");
    }

    #[test]
    fn field_priority() {
        let candidate = SlugCandidate {
            name: Some("Name".into()),
            reference: Some("REF".into()),
            value: Some("Val".into()),
            code: Some("C1".into()),
            explicit: None,
        };
        assert_eq!(candidate.base_slug(), "ref-val");

        let candidate = SlugCandidate {
            reference: None,
            ..candidate
        };
        assert_eq!(candidate.base_slug(), "name-c1");

        let candidate = SlugCandidate {
            name: None,
            reference: Some("R".into()),
            value: None,
            code: Some("C".into()),
            explicit: None,
        };
        assert_eq!(candidate.base_slug(), "r");

        assert_eq!(SlugCandidate::default().base_slug(), SLUG_PLACEHOLDER);
    }

    #[test]
    fn transliteration_and_normalization() {
        assert_eq!(slugify("Crème Brûlée"), "creme-brulee");
        assert_eq!(slugify("Straße"), "strasse");
        assert_eq!(slugify("  Łódź -- Øresund  "), "lodz-oresund");
        assert_eq!(slugify("a_b  c!!d"), "a_b-cd");
        assert_eq!(slugify("__hidden__"), "hidden");
    }

    #[test]
    fn empty_results_use_placeholder() {
        assert_eq!(slugify("東京"), SLUG_PLACEHOLDER);
        assert_eq!(slugify("!!!"), SLUG_PLACEHOLDER);
        assert_eq!(SlugCandidate::from_name("   ").base_slug(), SLUG_PLACEHOLDER);
    }

    #[test]
    fn explicit_slug_is_never_suffixed() {
        let mut batch = HashSet::new();
        let candidate = SlugCandidate {
            explicit: Some("shoes".into()),
            ..SlugCandidate::default()
        };

        assert_eq!(resolve(&candidate, &mut batch).unwrap(), "shoes");
        assert_eq!(
            resolve(&candidate, &mut batch),
            Err(SlugError::DuplicateExplicit("shoes".into()))
        );
    }

    #[test]
    fn registry_scopes_uniqueness_per_namespace() {
        let mut registry = SlugRegistry::new();
        let color = Namespace::attribute_values("color");
        let size = Namespace::attribute_values("size");
        let red = SlugCandidate::from_name("Red");

        assert_eq!(registry.resolve(&color, &red).unwrap(), "red");
        assert_eq!(registry.resolve(&size, &red).unwrap(), "red");
        assert_eq!(registry.resolve(&color, &red).unwrap(), "red-2");
        assert!(registry.is_allocated(&color, "red-2"));
        assert!(!registry.is_allocated(&size, "red-2"));
    }

    #[test]
    fn valid_slug_check() {
        assert!(is_valid_slug("red-2"));
        assert!(!is_valid_slug("Red"));
        assert!(!is_valid_slug(""));
    }
}
