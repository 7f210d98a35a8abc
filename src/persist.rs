use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::construct::{build_path, Entity};
use crate::datatype::{decode_property, encode, Property};
use crate::wire::{self, CommitRequest, EntityResult, Key, Mutation};

// ------------- Properties -------------
/// Encodes every field of `entity`. The identifier stays in the key.
pub fn to_properties(entity: &Entity) -> BTreeMap<String, Property> {
    entity
        .fields()
        .map(|(field, value)| (field.clone(), Property::from(encode(value))))
        .collect()
}

// ------------- Requests -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// The entity carries a persisted identifier.
    Update,
    /// The caller chose the identifier; fails if it is already taken.
    Insert,
    /// The server assigns the identifier.
    InsertAutoId,
}

impl MutationKind {
    pub fn of(entity: &Entity) -> Self {
        if entity.is_saved() {
            MutationKind::Update
        } else if entity.explicit_id().is_some() {
            MutationKind::Insert
        } else {
            MutationKind::InsertAutoId
        }
    }
}

pub fn build_save(entity: &Entity, kind: &str, transaction: &str) -> CommitRequest {
    let record = wire::Entity {
        key: Key::new(build_path(kind, entity.explicit_id(), entity.id())),
        properties: to_properties(entity),
    };
    let mut mutation = Mutation::default();
    match MutationKind::of(entity) {
        MutationKind::Update => mutation.update.push(record),
        MutationKind::Insert => mutation.insert.push(record),
        MutationKind::InsertAutoId => mutation.insert_auto_id.push(record),
    }
    CommitRequest { transaction: transaction.to_string(), mutation }
}

/// One delete mutation covering every key.
pub fn build_remove(transaction: &str, keys: Vec<Key>) -> CommitRequest {
    CommitRequest {
        transaction: transaction.to_string(),
        mutation: Mutation { delete: keys, ..Default::default() },
    }
}

// ------------- Results -------------
/// Rebuilds a host entity from a stored one, restoring `id` from the first path
/// segment. Properties that do not decode are left out.
pub fn translate(template: &Entity, stored: &wire::Entity) -> Entity {
    let fields = stored
        .properties
        .iter()
        .filter_map(|(name, property)| decode_property(name, property).map(|value| (name.clone(), value)));
    let mut entity = template.make(fields);
    match stored.key.path.first().and_then(|element| element.identifier()) {
        Some(id) => entity.set_id(Some(id)),
        None => warn!(kind = %template.kind(), "stored entity has an incomplete key"),
    }
    entity
}

pub fn translate_batch(template: &Entity, results: &[EntityResult]) -> Vec<Entity> {
    let entities: Vec<Entity> = results.iter().map(|result| translate(template, &result.entity)).collect();
    debug!(kind = %template.kind(), count = entities.len(), "translated results");
    entities
}
