//! An in-process datastore speaking the same wire contract as the service.
//!
//! Kinds hold their entities in insertion order. Commits are checked in full
//! before anything is applied, so a failing mutation leaves the data untouched.
//! Every accepted commit is kept so callers can see how mutations were batched.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::datatype::{Property, WireValue};
use crate::error::{GdstoreError, Result};
use crate::interface::{TransactionId, Transport};
use crate::query::KEY_PROPERTY;
use crate::wire::{
    BeginTransactionRequest, CommitRequest, CommitResponse, Direction, Entity, EntityResult, Filter,
    Key, LookupRequest, LookupResponse, MutationResult, PathElement, PropertyFilter, Query,
    QueryResultBatch, RunQueryRequest, RunQueryResponse,
};

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    next_transaction: u64,
    open_transactions: HashSet<TransactionId>,
    kinds: BTreeMap<String, Vec<Entity>>,
    commits: Vec<CommitRequest>,
}

impl MemoryState {
    fn position(&self, key: &Key) -> Option<(&str, usize)> {
        let kind = &key.path.last()?.kind;
        let (kind, entities) = self.kinds.get_key_value(kind)?;
        entities.iter().position(|e| e.key == *key).map(|i| (kind.as_str(), i))
    }
    fn contains(&self, key: &Key) -> bool {
        self.position(key).is_some()
    }
    fn put(&mut self, entity: Entity) {
        match self.position(&entity.key).map(|(k, i)| (k.to_string(), i)) {
            Some((kind, index)) => {
                if let Some(entities) = self.kinds.get_mut(&kind) {
                    entities[index] = entity;
                }
            }
            None => {
                let kind = entity.key.path.last().map(|e| e.kind.clone()).unwrap_or_default();
                self.kinds.entry(kind).or_default().push(entity);
            }
        }
    }
    fn delete(&mut self, key: &Key) {
        if let Some((kind, index)) = self.position(key).map(|(k, i)| (k.to_string(), i)) {
            if let Some(entities) = self.kinds.get_mut(&kind) {
                entities.remove(index);
            }
        }
    }
}

pub struct MemoryTransport {
    state: Mutex<MemoryState>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::starting_at(1)
    }
    /// Auto-assigned ids count up from `first_id`.
    pub fn starting_at(first_id: i64) -> Self {
        Self {
            state: Mutex::new(MemoryState { next_id: first_id, ..Default::default() }),
        }
    }
    pub fn len(&self, kind: &str) -> usize {
        self.state
            .lock()
            .map(|state| state.kinds.get(kind).map_or(0, Vec::len))
            .unwrap_or(0)
    }
    pub fn entities(&self, kind: &str) -> Result<Vec<Entity>> {
        Ok(self.state.lock()?.kinds.get(kind).cloned().unwrap_or_default())
    }
    pub fn commits(&self) -> Result<Vec<CommitRequest>> {
        Ok(self.state.lock()?.commits.clone())
    }
}

fn conflict(status: u16, message: String) -> GdstoreError {
    GdstoreError::Transport { status: Some(status), message }
}

fn complete(key: &Key) -> bool {
    key.path.last().is_some_and(|e| e.id.is_some() || e.name.is_some())
}

// ------------- Query evaluation -------------
fn property_value<'e>(entity: &'e Entity, name: &str) -> Option<&'e WireValue> {
    match entity.properties.get(name) {
        Some(Property::Value(value)) => Some(value),
        _ => None,
    }
}

fn matches_property(entity: &Entity, filter: &PropertyFilter) -> bool {
    if filter.property.name == KEY_PROPERTY {
        return matches!(&filter.value, WireValue::KeyValue(key) if *key == entity.key);
    }
    property_value(entity, &filter.property.name).is_some_and(|value| *value == filter.value)
}

fn matches(entity: &Entity, filter: &Filter) -> bool {
    match filter {
        Filter::PropertyFilter(filter) => matches_property(entity, filter),
        Filter::CompositeFilter(composite) => composite.filters.iter().all(|f| matches(entity, f)),
    }
}

fn rank(value: &WireValue) -> u8 {
    match value {
        WireValue::IntegerValue(_) | WireValue::DoubleValue(_) => 1,
        WireValue::BooleanValue(_) => 2,
        WireValue::StringValue(_) => 3,
        WireValue::DateTimeValue(_) => 4,
        WireValue::BlobKeyValue(_) => 5,
        WireValue::KeyValue(_) => 6,
    }
}

fn compare(a: &WireValue, b: &WireValue) -> Ordering {
    use WireValue::*;
    match (a, b) {
        (IntegerValue(x), IntegerValue(y)) => x.cmp(y),
        (IntegerValue(x), DoubleValue(y)) => (*x as f64).total_cmp(y),
        (DoubleValue(x), IntegerValue(y)) => x.total_cmp(&(*y as f64)),
        (DoubleValue(x), DoubleValue(y)) => x.total_cmp(y),
        (BooleanValue(x), BooleanValue(y)) => x.cmp(y),
        (StringValue(x), StringValue(y))
        | (DateTimeValue(x), DateTimeValue(y))
        | (BlobKeyValue(x), BlobKeyValue(y)) => x.cmp(y),
        (KeyValue(x), KeyValue(y)) => format!("{:?}", x.path).cmp(&format!("{:?}", y.path)),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn evaluate(entities: &[Entity], query: &Query) -> (Vec<Entity>, i32) {
    let mut selected: Vec<Entity> = entities
        .iter()
        .filter(|e| query.filter.as_ref().is_none_or(|f| matches(e, f)))
        .cloned()
        .collect();
    for order in query.order.iter().rev() {
        let name = &order.property.name;
        // entities without the property are not indexed for it
        selected.retain(|e| property_value(e, name).is_some());
        selected.sort_by(|a, b| {
            let ordering = match (property_value(a, name), property_value(b, name)) {
                (Some(x), Some(y)) => compare(x, y),
                _ => Ordering::Equal,
            };
            match order.direction {
                Direction::Ascending => ordering,
                Direction::Descending => ordering.reverse(),
            }
        });
    }
    let offset = query.offset.unwrap_or(0).max(0) as usize;
    let skipped = offset.min(selected.len());
    let mut page: Vec<Entity> = selected.into_iter().skip(offset).collect();
    if let Some(limit) = query.limit {
        page.truncate(limit.max(0) as usize);
    }
    if !query.projection.is_empty() {
        for entity in &mut page {
            entity
                .properties
                .retain(|name, _| query.projection.iter().any(|p| p.property.name == *name));
        }
    }
    (page, skipped as i32)
}

#[async_trait]
impl Transport for MemoryTransport {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn begin_transaction(&self, _request: BeginTransactionRequest) -> Result<TransactionId> {
        let mut state = self.state.lock()?;
        state.next_transaction += 1;
        let transaction = format!("txn-{}", state.next_transaction);
        state.open_transactions.insert(transaction.clone());
        Ok(transaction)
    }

    async fn commit(&self, request: CommitRequest) -> Result<CommitResponse> {
        let mut state = self.state.lock()?;
        if !state.open_transactions.remove(&request.transaction) {
            return Err(conflict(400, format!("unknown transaction {}", request.transaction)));
        }
        let mutation = &request.mutation;
        let mut inserted: HashSet<&Key> = HashSet::with_capacity(mutation.insert.len());
        for entity in &mutation.insert {
            if !complete(&entity.key) {
                return Err(conflict(400, "insert needs a complete key".to_string()));
            }
            if state.contains(&entity.key) || !inserted.insert(&entity.key) {
                return Err(conflict(409, format!("entity already exists: {:?}", entity.key.path)));
            }
        }
        for entity in &mutation.update {
            if !state.contains(&entity.key) {
                return Err(conflict(404, format!("no entity to update: {:?}", entity.key.path)));
            }
        }
        for entity in mutation.upsert.iter().chain(&mutation.update).chain(&mutation.insert) {
            state.put(entity.clone());
        }
        let mut insert_auto_id_keys = Vec::with_capacity(mutation.insert_auto_id.len());
        for entity in &mutation.insert_auto_id {
            let id = state.next_id;
            state.next_id += 1;
            let mut stored = entity.clone();
            let kind = stored.key.path.last().map(|e| e.kind.clone()).unwrap_or_default();
            let last = stored.key.path.len().saturating_sub(1);
            stored.key.path.truncate(last);
            stored.key.path.push(PathElement::with_id(&kind, id));
            insert_auto_id_keys.push(stored.key.clone());
            state.put(stored);
        }
        for key in &mutation.delete {
            state.delete(key);
        }
        let index_updates = (mutation.upsert.len()
            + mutation.update.len()
            + mutation.insert.len()
            + mutation.insert_auto_id.len()
            + mutation.delete.len()) as i32;
        debug!(transaction = %request.transaction, index_updates, "memory commit applied");
        state.commits.push(request.clone());
        Ok(CommitResponse {
            mutation_result: MutationResult { index_updates, insert_auto_id_keys },
        })
    }

    async fn run_query(&self, request: RunQueryRequest) -> Result<RunQueryResponse> {
        let state = self.state.lock()?;
        let kind = request
            .query
            .kinds
            .first()
            .map(|k| k.name.as_str())
            .ok_or_else(|| conflict(400, "query names no kind".to_string()))?;
        let entities = state.kinds.get(kind).map(Vec::as_slice).unwrap_or_default();
        let (page, skipped_results) = evaluate(entities, &request.query);
        let entity_result_type = if request.query.projection.is_empty() { "FULL" } else { "PROJECTION" };
        Ok(RunQueryResponse {
            batch: QueryResultBatch {
                entity_result_type: Some(entity_result_type.to_string()),
                entity_results: page.into_iter().map(|entity| EntityResult { entity }).collect(),
                end_cursor: None,
                more_results: Some("NO_MORE_RESULTS".to_string()),
                skipped_results,
            },
        })
    }

    async fn lookup(&self, request: LookupRequest) -> Result<LookupResponse> {
        let state = self.state.lock()?;
        let mut response = LookupResponse::default();
        for key in request.keys {
            match state.position(&key).and_then(|(kind, i)| state.kinds.get(kind).map(|e| &e[i])) {
                Some(entity) => response.found.push(EntityResult { entity: entity.clone() }),
                None => response.missing.push(EntityResult {
                    entity: Entity { key, properties: BTreeMap::new() },
                }),
            }
        }
        Ok(response)
    }
}
