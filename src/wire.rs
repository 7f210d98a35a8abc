//! JSON shapes of the Cloud Datastore API (`v1beta2`).
//!
//! Everything here is a plain serde structure; building and interpreting them
//! is done by the `datatype`, `query` and `persist` modules. Field names follow
//! the API's camelCase members. 64 bit integers travel as JSON strings, as the
//! API requires, but are accepted as numbers too.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::datatype::{Property, WireValue};

// ------------- int64 as string -------------
pub(crate) mod int64 {
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Number(i64),
    }

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Text(text) => text.parse().map_err(de::Error::custom),
            Repr::Number(number) => Ok(number),
        }
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(value: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => serializer.collect_str(v),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
            #[derive(Deserialize)]
            struct Wrapped(#[serde(with = "crate::wire::int64")] i64);
            Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|Wrapped(v)| v))
        }
    }
}

// ------------- Keys -------------
/// One `{kind, id | name}` segment of a key path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathElement {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "int64::option")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl PathElement {
    pub fn incomplete(kind: &str) -> Self {
        Self { kind: kind.to_string(), id: None, name: None }
    }
    pub fn with_id(kind: &str, id: i64) -> Self {
        Self { kind: kind.to_string(), id: Some(id), name: None }
    }
    pub fn with_name(kind: &str, name: &str) -> Self {
        Self { kind: kind.to_string(), id: None, name: Some(name.to_string()) }
    }
    /// Text form of whichever of `id` / `name` is populated.
    pub fn identifier(&self) -> Option<String> {
        match (&self.id, &self.name) {
            (Some(id), _) => Some(id.to_string()),
            (None, Some(name)) => Some(name.clone()),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    #[serde(default)]
    pub path: Vec<PathElement>,
}

impl Key {
    pub fn new(path: Vec<PathElement>) -> Self {
        Self { path }
    }
}

// ------------- Entities -------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub key: Key,
    #[serde(default)]
    pub properties: BTreeMap<String, Property>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityResult {
    pub entity: Entity,
}

// ------------- Queries -------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindExpression {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyReference {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    #[serde(rename = "EQUAL")]
    Equal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompositeOperator {
    #[serde(rename = "AND")]
    And,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyFilter {
    pub property: PropertyReference,
    pub operator: FilterOperator,
    pub value: WireValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeFilter {
    pub operator: CompositeOperator,
    pub filters: Vec<Filter>,
}

/// Exactly one of the two filter forms, serialised under its own member name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Filter {
    PropertyFilter(PropertyFilter),
    CompositeFilter(CompositeFilter),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyOrder {
    pub property: PropertyReference,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyExpression {
    pub property: PropertyReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation_function: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub kinds: Vec<KindExpression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    #[serde(default)]
    pub order: Vec<PropertyOrder>,
    #[serde(default)]
    pub projection: Vec<PropertyExpression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i32>,
}

// ------------- Requests and responses -------------
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginTransactionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isolation_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeginTransactionResponse {
    pub transaction: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mutation {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upsert: Vec<Entity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub update: Vec<Entity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub insert: Vec<Entity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub insert_auto_id: Vec<Entity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delete: Vec<Key>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    pub transaction: String,
    pub mutation: Mutation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResult {
    #[serde(default)]
    pub index_updates: i32,
    #[serde(default)]
    pub insert_auto_id_keys: Vec<Key>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    #[serde(default)]
    pub mutation_result: MutationResult,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_consistency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryRequest {
    pub query: Query,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_options: Option<ReadOptions>,
}

impl RunQueryRequest {
    pub fn new(query: Query) -> Self {
        Self { query, read_options: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResultBatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_result_type: Option<String>,
    #[serde(default)]
    pub entity_results: Vec<EntityResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub more_results: Option<String>,
    #[serde(default)]
    pub skipped_results: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunQueryResponse {
    #[serde(default)]
    pub batch: QueryResultBatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
    pub keys: Vec<Key>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_options: Option<ReadOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupResponse {
    #[serde(default)]
    pub found: Vec<EntityResult>,
    #[serde(default)]
    pub missing: Vec<EntityResult>,
    #[serde(default)]
    pub deferred: Vec<Key>,
}
