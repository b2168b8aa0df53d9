//! # Batch Orchestrator
//!
//! Runs one bulk upsert call end to end:
//!
//! 1. Batch gate: caller capability, batch size, empty batch short-circuit
//! 2. One read of related records, then per-item validation
//! 3. In-batch external reference duplicates
//! 4. Nested value slugs, unique within their parent item
//! 5. One persisted-slug read and one lookup of every record an item could
//!    claim; slug allocation in input order, repeated until no
//!    target-dependent check rejects an item
//! 6. One lookup of existing nested values, then CREATE/UPDATE classification
//! 7. Policy decision, chunked commit inside the same transaction
//! 8. Post-commit lifecycle events, in input order
//!
//! Every item carries an [`ItemStateMachine`]; the result reports each item's
//! terminal state next to its instance and errors.

use super::committer::{CommitPlan, PersistenceCommitter};
use super::conflict_resolver::ConflictResolver;
use super::error_aggregator::{ErrorAggregator, PolicyDecision};
use super::types::{BatchItem, BatchRequest, BatchResult, Classification, ItemResult};
use crate::config::BatchConfig;
use crate::constants::{fields, Capability, EntityKind, ErrorPolicy};
use crate::error::{BulkError, Result};
use crate::events::{BroadcastEventSink, EventKind, EventNotifier, EventSink};
use crate::logging::{log_batch_operation, log_item_rejection};
use crate::models::{Entity, Namespace, NaturalKey};
use crate::permissions::{Caller, CapabilityChecker, GrantedCapabilities};
use crate::slug::{self, SlugCandidate, SlugError, SlugRegistry};
use crate::state_machine::{ItemEvent, ItemState, ItemStateMachine};
use crate::store::{EntityStore, StoreTransaction};
use crate::validation::{
    self, value_prefix, CleanedItem, RelatedEntities, ValidationContext, ValidationError,
};
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Working state of one input item during a call
#[derive(Debug)]
struct ItemWork {
    machine: ItemStateMachine,
    cleaned: Option<CleanedItem>,
    key: Option<NaturalKey>,
    value_slugs: Vec<String>,
    value_keys: Vec<NaturalKey>,
    classification: Option<Classification>,
    value_classifications: Vec<Classification>,
    instance: Option<Entity>,
    values: Vec<Entity>,
}

impl ItemWork {
    fn new(index: usize) -> Self {
        Self {
            machine: ItemStateMachine::new(index),
            cleaned: None,
            key: None,
            value_slugs: Vec::new(),
            value_keys: Vec::new(),
            classification: None,
            value_classifications: Vec::new(),
            instance: None,
            values: Vec::new(),
        }
    }

    fn index(&self) -> usize {
        self.machine.index()
    }

    /// Validated and not rejected by any later stage
    fn is_live(&self) -> bool {
        self.machine.state() == ItemState::Validated
    }

    fn reject(
        &mut self,
        aggregator: &mut ErrorAggregator,
        errors: Vec<ValidationError>,
    ) -> Result<()> {
        self.machine.transition(ItemEvent::Reject)?;
        aggregator.record(self.index(), errors);
        Ok(())
    }
}

/// Composes validation, slug resolution, conflict resolution, commit and
/// notification over an [`EntityStore`].
pub struct BatchOrchestrator<S: EntityStore> {
    store: S,
    checker: Arc<dyn CapabilityChecker>,
    notifier: EventNotifier,
    config: BatchConfig,
}

impl<S: EntityStore> BatchOrchestrator<S> {
    pub fn new(store: S, sink: Arc<dyn EventSink>, config: BatchConfig) -> Self {
        Self {
            store,
            checker: Arc::new(GrantedCapabilities),
            notifier: EventNotifier::new(sink),
            config,
        }
    }

    /// Default configuration with a broadcast sink
    pub fn with_defaults(store: S) -> Self {
        Self::new(
            store,
            Arc::new(BroadcastEventSink::default()),
            BatchConfig::default(),
        )
    }

    pub fn with_checker(mut self, checker: Arc<dyn CapabilityChecker>) -> Self {
        self.checker = checker;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn notifier(&self) -> &EventNotifier {
        &self.notifier
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Upsert one homogeneous batch.
    ///
    /// Item failures are reported in the result; `Err` means the whole call
    /// failed and nothing was written.
    #[instrument(skip(self, caller, request), fields(kind = %request.kind, size = request.len(), caller = %caller.id))]
    pub async fn upsert(&self, caller: &Caller, request: BatchRequest) -> Result<BatchResult> {
        let kind = request.kind;
        if !kind.is_batchable() {
            return Err(BulkError::internal(format!(
                "{kind} records cannot be submitted in bulk"
            )));
        }

        let required = Capability::batch_requirement(kind);
        if !self.checker.has_permission(caller, required) {
            warn!(kind = %kind, caller = %caller.id, "Batch rejected: missing capability");
            return Err(BulkError::PermissionDenied {
                kind,
                required: required.to_vec(),
            });
        }

        if request.len() > self.config.max_batch_size {
            return Err(BulkError::BatchTooLarge {
                size: request.len(),
                max: self.config.max_batch_size,
            });
        }

        let policy = request.policy.unwrap_or(self.config.default_error_policy);
        if request.is_empty() {
            debug!("Empty batch, nothing to do");
            return Ok(BatchResult::empty());
        }

        let mut tx = self.store.begin().await?;
        let (mut works, aggregator) = match self.prepare(&mut tx, caller, &request).await {
            Ok(prepared) => prepared,
            Err(error) => return Err(abort(tx, error).await),
        };

        // Evaluated once, after every item has been looked at
        let decision = aggregator.decide(policy);
        debug!(?decision, failed = aggregator.failed_count(), "Policy evaluated");

        let committed_events = match decision {
            PolicyDecision::RejectAll => {
                tx.rollback().await?;
                for work in works.iter_mut() {
                    if work.machine.state() != ItemState::Rejected {
                        work.machine.transition(ItemEvent::DropByPolicy)?;
                    }
                    work.instance = None;
                    work.values.clear();
                }
                Vec::new()
            }
            PolicyDecision::CommitAll | PolicyDecision::CommitPassing => {
                let plan = match build_plan(&mut works) {
                    Ok(plan) => plan,
                    Err(error) => return Err(abort(tx, error).await),
                };
                let committer = PersistenceCommitter::new(self.config.chunk_size);
                if let Err(error) = committer.commit(&mut tx, &plan).await {
                    return Err(abort(tx, error).await);
                }
                tx.commit().await?;

                let mut events = Vec::new();
                for work in works.iter_mut().filter(|w| w.machine.state().is_marked()) {
                    work.machine.transition(ItemEvent::Commit)?;
                    events.extend(item_events(kind, work));
                }
                events
            }
        };

        if !committed_events.is_empty() {
            self.notifier.notify(&committed_events).await;
        }

        Ok(finish(kind, policy, works, aggregator))
    }

    /// Everything up to the policy decision: reads, validation, slugs, classification
    async fn prepare(
        &self,
        tx: &mut S::Transaction,
        caller: &Caller,
        request: &BatchRequest,
    ) -> Result<(Vec<ItemWork>, ErrorAggregator)> {
        let kind = request.kind;
        let mut works: Vec<ItemWork> = request.items.iter().map(|i| ItemWork::new(i.index)).collect();
        let mut aggregator = ErrorAggregator::new(request.len());

        let related = load_related(tx, kind, &request.items).await?;
        let context = ValidationContext::new(caller, self.checker.as_ref(), &related);
        for (work, item) in works.iter_mut().zip(&request.items) {
            match validation::validate_item(kind, &item.fields, &item.values, &context)? {
                Ok(cleaned) => {
                    work.machine.transition(ItemEvent::Validate)?;
                    work.cleaned = Some(cleaned);
                }
                Err(errors) => work.reject(&mut aggregator, errors)?,
            }
        }

        for (index, errors) in external_reference_duplicates(&works) {
            works[index].reject(&mut aggregator, errors)?;
        }

        if kind == EntityKind::Attribute {
            resolve_value_slugs(&mut works, &mut aggregator)?;
        }

        let mut resolver = settle_items(tx, kind, &related, &mut works, &mut aggregator).await?;
        if kind == EntityKind::Attribute {
            load_value_records(tx, &mut works, &mut resolver).await?;
        }

        for work in works.iter_mut().filter(|w| w.is_live()) {
            let key = work
                .key
                .as_ref()
                .ok_or_else(|| BulkError::internal("Live item without a resolved slug"))?;
            let classification = resolver.classify(key);
            let event = if classification.is_create() {
                ItemEvent::MarkCreate
            } else {
                ItemEvent::MarkUpdate
            };
            work.machine.transition(event)?;
            work.classification = Some(classification);
            work.value_classifications = work.value_keys.iter().map(|k| resolver.classify(k)).collect();
        }

        debug!(
            known_records = resolver.known_records(),
            failed = aggregator.failed_count(),
            "Batch classified"
        );
        Ok((works, aggregator))
    }
}

impl<S: EntityStore> std::fmt::Debug for BatchOrchestrator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchOrchestrator")
            .field("config", &self.config)
            .field("notifier", &self.notifier)
            .finish()
    }
}

async fn abort<T: StoreTransaction>(tx: T, error: BulkError) -> BulkError {
    if let Err(rollback_error) = tx.rollback().await {
        warn!(error = %rollback_error, "Rollback after failed batch also failed");
    }
    error
}

/// Read the records items refer to (parent attributes, product types,
/// categories) in one lookup
async fn load_related<T: StoreTransaction>(
    tx: &mut T,
    kind: EntityKind,
    items: &[BatchItem],
) -> Result<RelatedEntities> {
    let mut related = RelatedEntities::default();
    let mut keys = Vec::new();
    let text = |item: &BatchItem, field: &str| {
        item.fields
            .get(field)
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    for item in items {
        match kind {
            EntityKind::AttributeValue => {
                if let Some(attribute) = text(item, fields::ATTRIBUTE) {
                    keys.push(NaturalKey::new(Namespace::Attributes, attribute));
                }
            }
            EntityKind::Product => {
                if let Some(product_type) = text(item, fields::PRODUCT_TYPE) {
                    keys.push(NaturalKey::new(Namespace::ProductTypes, product_type));
                }
                if let Some(category) = text(item, fields::CATEGORY) {
                    keys.push(NaturalKey::new(Namespace::Categories, category));
                }
            }
            EntityKind::Category => {
                if let Some(parent) = text(item, fields::PARENT) {
                    keys.push(NaturalKey::new(Namespace::Categories, parent));
                }
                if let Some(slug) = text(item, fields::SLUG) {
                    related.batch_categories.insert(slug);
                }
            }
            EntityKind::Attribute | EntityKind::ProductType => {}
        }
    }

    keys.sort();
    keys.dedup();
    if keys.is_empty() {
        return Ok(related);
    }

    for (key, entity) in tx.lookup_by_slug(&keys).await? {
        match entity {
            Entity::Attribute(attribute) => {
                related.attributes.insert(attribute.slug.clone(), attribute);
            }
            Entity::ProductType(_) => {
                related.product_types.insert(key.slug);
            }
            Entity::Category(_) => {
                related.categories.insert(key.slug);
            }
            _ => {}
        }
    }
    debug!(
        attributes = related.attributes.len(),
        product_types = related.product_types.len(),
        categories = related.categories.len(),
        "Related records loaded"
    );
    Ok(related)
}

/// Items (and nested values) sharing an external reference with another
/// item of the batch. Every sharer is reported.
fn external_reference_duplicates(works: &[ItemWork]) -> BTreeMap<usize, Vec<ValidationError>> {
    let mut items: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut values: HashMap<&str, Vec<(usize, usize)>> = HashMap::new();

    for work in works.iter().filter(|w| w.is_live()) {
        let Some(cleaned) = &work.cleaned else {
            continue;
        };
        if let Some(reference) = cleaned.external_reference() {
            items.entry(reference).or_default().push(work.index());
        }
        for (position, value) in cleaned.values().iter().enumerate() {
            if let Some(reference) = value.external_reference.as_deref() {
                values
                    .entry(reference)
                    .or_default()
                    .push((work.index(), position));
            }
        }
    }

    let mut duplicates: BTreeMap<usize, Vec<ValidationError>> = BTreeMap::new();
    for (reference, indices) in items.into_iter().filter(|(_, v)| v.len() > 1) {
        for index in indices {
            duplicates.entry(index).or_default().push(ValidationError::duplicated(
                fields::EXTERNAL_REFERENCE,
                format!("External reference '{reference}' is used by more than one item."),
            ));
        }
    }
    for (reference, positions) in values.into_iter().filter(|(_, v)| v.len() > 1) {
        for (index, position) in positions {
            duplicates.entry(index).or_default().push(
                ValidationError::duplicated(
                    fields::EXTERNAL_REFERENCE,
                    format!("External reference '{reference}' is used by more than one value."),
                )
                .nested(&value_prefix(position)),
            );
        }
    }

    // Stable order within each item regardless of hash iteration
    for errors in duplicates.values_mut() {
        errors.sort_by(|a, b| a.path.cmp(&b.path));
    }
    duplicates
}

fn item_namespace(cleaned: &CleanedItem) -> Result<Namespace> {
    match cleaned {
        CleanedItem::AttributeValue(draft) => draft
            .attribute
            .clone()
            .map(Namespace::attribute_values)
            .ok_or_else(|| BulkError::internal("Standalone value without a parent attribute")),
        other => Namespace::global(other.kind())
            .ok_or_else(|| BulkError::internal(format!("No namespace for {}", other.kind()))),
    }
}

/// Slug the persisted-slug read is keyed on
fn base_key(namespace: Namespace, candidate: &SlugCandidate) -> NaturalKey {
    let base = candidate
        .explicit
        .clone()
        .unwrap_or_else(|| candidate.base_slug());
    NaturalKey::new(namespace, base)
}

fn duplicate_slug_error(slug: &str) -> ValidationError {
    ValidationError::duplicated(
        fields::SLUG,
        format!("Slug '{slug}' is used by another item in this batch."),
    )
}

async fn load_persisted<T: StoreTransaction>(
    tx: &mut T,
    registry: &mut SlugRegistry,
    mut bases: Vec<NaturalKey>,
) -> Result<()> {
    bases.sort();
    bases.dedup();
    if bases.is_empty() {
        return Ok(());
    }
    for key in tx.persisted_slugs(&bases).await? {
        registry.add_persisted(key.namespace, key.slug);
    }
    Ok(())
}

/// Read the persisted slug families once, then look up every record a live
/// item could claim, whichever slugs its siblings end up with
async fn load_claimable<T: StoreTransaction>(
    tx: &mut T,
    registry: &mut SlugRegistry,
    works: &[ItemWork],
) -> Result<ConflictResolver> {
    let mut candidates = Vec::new();
    let mut competitors: HashMap<Namespace, usize> = HashMap::new();
    for work in works.iter().filter(|w| w.is_live()) {
        if let Some(cleaned) = &work.cleaned {
            let namespace = item_namespace(cleaned)?;
            *competitors.entry(namespace.clone()).or_default() += 1;
            candidates.push((namespace, cleaned.slug_candidate()));
        }
    }

    let bases = candidates
        .iter()
        .map(|(namespace, candidate)| base_key(namespace.clone(), candidate))
        .collect();
    load_persisted(tx, registry, bases).await?;

    let mut keys = Vec::new();
    for (namespace, candidate) in &candidates {
        let reach = competitors.get(namespace).copied().unwrap_or(1);
        for slug in registry.claimable(namespace, candidate, reach) {
            keys.push(NaturalKey::new(namespace.clone(), slug));
        }
    }
    keys.sort();
    keys.dedup();

    let existing = if keys.is_empty() {
        HashMap::new()
    } else {
        tx.lookup_by_slug(&keys).await?
    };
    Ok(ConflictResolver::new(existing))
}

/// Allocate slugs for every live item, in input order, from a clean slate
fn allocate_item_slugs(
    registry: &mut SlugRegistry,
    works: &mut [ItemWork],
    aggregator: &mut ErrorAggregator,
) -> Result<()> {
    registry.clear_allocations();
    for work in works.iter_mut().filter(|w| w.is_live()) {
        work.key = None;
        let Some(cleaned) = &work.cleaned else {
            continue;
        };
        let namespace = item_namespace(cleaned)?;
        let candidate = cleaned.slug_candidate();
        match registry.resolve(&namespace, &candidate) {
            Ok(slug) => work.key = Some(NaturalKey::new(namespace, slug)),
            Err(SlugError::DuplicateExplicit(slug)) => {
                work.reject(aggregator, vec![duplicate_slug_error(&slug)])?
            }
        }
    }
    Ok(())
}

/// Allocate top-level slugs and run the checks that depend on them.
///
/// A rejection at this stage restarts allocation, so a rejected item never
/// holds a slug a surviving sibling would have taken. Every restart follows
/// at least one rejection, which bounds the loop by the batch size.
async fn settle_items<T: StoreTransaction>(
    tx: &mut T,
    kind: EntityKind,
    related: &RelatedEntities,
    works: &mut [ItemWork],
    aggregator: &mut ErrorAggregator,
) -> Result<ConflictResolver> {
    let mut registry = SlugRegistry::new();
    let resolver = load_claimable(tx, &mut registry, works).await?;

    let mut rounds = 0usize;
    loop {
        rounds += 1;
        allocate_item_slugs(&mut registry, works, aggregator)?;

        if reject_on_target(works, &resolver, aggregator)? {
            continue;
        }
        if kind == EntityKind::Category
            && (reject_dangling_parents(works, related, aggregator)?
                || reject_parent_cycles(works, aggregator)?)
        {
            continue;
        }

        debug!(rounds, known_records = resolver.known_records(), "Slugs settled");
        return Ok(resolver);
    }
}

/// Checks that need the record each live item targets; true if any item failed
fn reject_on_target(
    works: &mut [ItemWork],
    resolver: &ConflictResolver,
    aggregator: &mut ErrorAggregator,
) -> Result<bool> {
    let mut rejected = false;
    for work in works.iter_mut().filter(|w| w.is_live()) {
        let (Some(cleaned), Some(key)) = (&work.cleaned, &work.key) else {
            continue;
        };
        let errors = cleaned.check_target(resolver.target(key));
        if !errors.is_empty() {
            work.reject(aggregator, errors)?;
            rejected = true;
        }
    }
    Ok(rejected)
}

/// Nested value slugs. All values of one item share the namespace of their
/// parent, so uniqueness only spans the item itself and needs no persisted
/// slugs.
fn resolve_value_slugs(works: &mut [ItemWork], aggregator: &mut ErrorAggregator) -> Result<()> {
    for work in works.iter_mut().filter(|w| w.is_live()) {
        let Some(cleaned) = &work.cleaned else {
            continue;
        };
        let mut allocated = HashSet::new();
        let mut slugs = Vec::with_capacity(cleaned.values().len());
        let mut errors = Vec::new();
        for (position, value) in cleaned.values().iter().enumerate() {
            match slug::resolve(&value.slug_candidate(), &mut allocated) {
                Ok(slug) => slugs.push(slug),
                Err(SlugError::DuplicateExplicit(slug)) => {
                    errors.push(duplicate_slug_error(&slug).nested(&value_prefix(position)))
                }
            }
        }
        if errors.is_empty() {
            work.value_slugs = slugs;
        } else {
            work.reject(aggregator, errors)?;
        }
    }
    Ok(())
}

/// Key nested values under their parent's settled slug and read the ones
/// whose parent already exists
async fn load_value_records<T: StoreTransaction>(
    tx: &mut T,
    works: &mut [ItemWork],
    resolver: &mut ConflictResolver,
) -> Result<()> {
    let mut keys = Vec::new();
    for work in works.iter_mut().filter(|w| w.is_live()) {
        let Some(key) = &work.key else {
            continue;
        };
        let namespace = Namespace::attribute_values(key.slug.clone());
        work.value_keys = work
            .value_slugs
            .iter()
            .map(|slug| NaturalKey::new(namespace.clone(), slug.clone()))
            .collect();
        if resolver.target(key).is_some() {
            keys.extend(work.value_keys.iter().cloned());
        }
    }

    if !keys.is_empty() {
        resolver.extend(tx.lookup_by_slug(&keys).await?);
    }
    Ok(())
}

/// Reject categories whose parent only exists as another batch item that
/// did not survive; true if any item failed
fn reject_dangling_parents(
    works: &mut [ItemWork],
    related: &RelatedEntities,
    aggregator: &mut ErrorAggregator,
) -> Result<bool> {
    let live: HashSet<String> = works
        .iter()
        .filter(|w| w.is_live())
        .filter_map(|w| w.key.as_ref().map(|k| k.slug.clone()))
        .collect();

    let mut rejected = false;
    for work in works.iter_mut().filter(|w| w.is_live()) {
        let Some(parent) = category_parent(work) else {
            continue;
        };
        if related.categories.contains(&parent) || live.contains(&parent) {
            continue;
        }
        work.reject(
            aggregator,
            vec![ValidationError::not_found(
                fields::PARENT,
                format!("Parent category '{parent}' is not created by this batch."),
            )],
        )?;
        rejected = true;
    }
    Ok(rejected)
}

/// Reject every category whose parent chain through the batch leads back to
/// itself; true if any item failed
fn reject_parent_cycles(works: &mut [ItemWork], aggregator: &mut ErrorAggregator) -> Result<bool> {
    let parents: HashMap<String, String> = works
        .iter()
        .filter(|w| w.is_live())
        .filter_map(|w| Some((w.key.as_ref()?.slug.clone(), category_parent(w)?)))
        .collect();

    let in_cycle = |start: &str| {
        let mut current = start;
        for _ in 0..parents.len() {
            match parents.get(current) {
                Some(parent) if parent == start => return true,
                Some(parent) => current = parent.as_str(),
                None => return false,
            }
        }
        false
    };
    let cyclic: HashSet<String> = parents
        .keys()
        .filter(|slug| in_cycle(slug.as_str()))
        .cloned()
        .collect();
    if cyclic.is_empty() {
        return Ok(false);
    }

    for work in works.iter_mut().filter(|w| w.is_live()) {
        let Some(slug) = work.key.as_ref().map(|k| k.slug.clone()) else {
            continue;
        };
        if cyclic.contains(&slug) {
            work.reject(
                aggregator,
                vec![ValidationError::invalid(
                    fields::PARENT,
                    format!("Category '{slug}' would become its own ancestor."),
                )],
            )?;
        }
    }
    Ok(true)
}

fn category_parent(work: &ItemWork) -> Option<String> {
    match &work.cleaned {
        Some(CleanedItem::Category(draft)) => draft.parent.clone(),
        _ => None,
    }
}

/// Build the entities to write for every marked item
fn build_plan(works: &mut [ItemWork]) -> Result<CommitPlan> {
    let now = Utc::now();
    let mut plan = CommitPlan::default();

    for work in works.iter_mut().filter(|w| w.machine.state().is_marked()) {
        let (Some(cleaned), Some(key), Some(classification)) =
            (&work.cleaned, &work.key, &work.classification)
        else {
            return Err(BulkError::internal(format!(
                "Item {} was marked without a classification",
                work.machine.index()
            )));
        };

        let instance = match classification {
            Classification::Create => {
                let entity = cleaned.build(key, now)?;
                plan.creates.push(entity.clone());
                entity
            }
            Classification::Update { existing } => {
                let entity = cleaned.apply(existing, now)?;
                plan.updates.push(entity.clone());
                plan.update_fields.extend(cleaned.supplied_columns());
                entity
            }
        };

        let mut values = Vec::with_capacity(work.value_keys.len());
        let nested = cleaned
            .values()
            .iter()
            .zip(&work.value_keys)
            .zip(&work.value_classifications);
        for ((value, value_key), classification) in nested {
            let entity = match classification {
                Classification::Create => {
                    let entity = Entity::AttributeValue(value.build(&key.slug, &value_key.slug, now));
                    plan.value_creates.push(entity.clone());
                    entity
                }
                Classification::Update {
                    existing: Entity::AttributeValue(current),
                } => {
                    let entity = Entity::AttributeValue(value.apply(current, now));
                    plan.value_updates.push(entity.clone());
                    plan.value_update_fields.extend(value.supplied_columns());
                    entity
                }
                Classification::Update { existing } => {
                    return Err(BulkError::internal(format!(
                        "Value {value_key} resolved to a {} record",
                        existing.kind()
                    )))
                }
            };
            values.push(entity);
        }

        work.instance = Some(instance);
        work.values = values;
    }

    Ok(plan)
}

/// Events for one committed item: the item first, then its values
fn item_events(kind: EntityKind, work: &ItemWork) -> Vec<(EventKind, Entity)> {
    let mut events = Vec::with_capacity(1 + work.values.len());
    let created = work
        .classification
        .as_ref()
        .is_some_and(Classification::is_create);
    if let (Some(instance), Some(event)) = (&work.instance, EventKind::for_entity(kind, created)) {
        events.push((event, instance.clone()));
    }
    for (value, classification) in work.values.iter().zip(&work.value_classifications) {
        let event = if classification.is_create() {
            EventKind::AttributeValueCreated
        } else {
            EventKind::AttributeValueUpdated
        };
        events.push((event, value.clone()));
    }
    events
}

fn finish(
    kind: EntityKind,
    policy: ErrorPolicy,
    works: Vec<ItemWork>,
    aggregator: ErrorAggregator,
) -> BatchResult {
    for index in aggregator.failed_indices() {
        log_item_rejection(kind, index, aggregator.errors_for(index));
    }
    let failed = aggregator.failed_count();
    let size = works.len();

    let results: Vec<ItemResult> = works
        .into_iter()
        .zip(aggregator.into_lists())
        .map(|(work, errors)| {
            let committed = work.machine.state() == ItemState::Committed;
            ItemResult {
                instance: work.instance.filter(|_| committed),
                values: if committed { work.values } else { Vec::new() },
                errors,
                state: work.machine.state(),
            }
        })
        .collect();
    let count = results.iter().filter(|r| r.is_committed()).count();

    let status = if count == 0 && failed > 0 {
        "rejected"
    } else if failed > 0 {
        "partial"
    } else {
        "committed"
    };
    log_batch_operation(kind, policy, size, count, failed, status);
    info!(kind = %kind, count, failed, status, "Bulk upsert finished");

    BatchResult { count, results }
}
