//! Query specs and their translation into datastore queries.
//!
//! A [`QuerySpec`] is the framework's generic query: an ordered mapping of field
//! name to equality value. Keys ending in `$` are directives rather than
//! predicates (`sort$`, `limit$`, `skip$`, `fields$`, `all$`, `id$`); they are
//! pulled out into [`Controls`] before the remaining pairs become filters, so
//! none of them ever reaches the wire.

use tracing::debug;

use crate::construct::{Identifier, ID_FIELD};
use crate::datatype::{encode, Value, WireValue};
use crate::error::{GdstoreError, Result};
use crate::wire::{
    CompositeFilter, CompositeOperator, Direction, Filter, FilterOperator, Key, KindExpression,
    PropertyExpression, PropertyFilter, PropertyOrder, PropertyReference, Query,
};

pub const SORT: &str = "sort$";
pub const LIMIT: &str = "limit$";
pub const SKIP: &str = "skip$";
pub const FIELDS: &str = "fields$";
pub const ALL: &str = "all$";
pub const EXPLICIT_ID: &str = "id$";
/// Pseudo-property addressing the entity key in filters.
pub const KEY_PROPERTY: &str = "__key__";

// ------------- QuerySpec -------------
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    entries: Vec<(String, Value)>,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }
    /// Builds a spec from a JSON object, keeping its member order.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::Object(members) => Ok(members
                .into_iter()
                .fold(Self::new(), |spec, (field, value)| spec.with(field, Value::from(value)))),
            serde_json::Value::Null => Ok(Self::new()),
            other => Err(GdstoreError::InvalidQuery(format!("query must be an object, got {}", other))),
        }
    }
    /// Inserts or replaces a pair; a replaced pair keeps its position.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(f, _)| *f == field) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((field, value)),
        }
    }
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }
    pub fn sort(self, field: &str, direction: i32) -> Self {
        self.with(SORT, serde_json::json!({ field: direction }))
    }
    pub fn limit(self, limit: i32) -> Self {
        self.with(LIMIT, limit)
    }
    pub fn skip(self, skip: i32) -> Self {
        self.with(SKIP, skip)
    }
    pub fn fields<I, S>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = fields.into_iter().map(Into::into).collect();
        self.with(FIELDS, serde_json::json!(names))
    }
    pub fn all(self) -> Self {
        self.with(ALL, true)
    }
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.entries.iter().find(|(f, _)| f == field).map(|(_, v)| v)
    }
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        let position = self.entries.iter().position(|(f, _)| f == field)?;
        Some(self.entries.remove(position).1)
    }
    pub fn entries(&self) -> &[(String, Value)] {
        &self.entries
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ------------- Controls -------------
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Controls {
    pub sort: Option<(String, Direction)>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
    pub projection: Vec<String>,
    pub all: bool,
    pub explicit_id: Option<String>,
}

impl Controls {
    /// Removes every `$` directive from `spec`. Zero limits and offsets mean
    /// "not set".
    pub fn extract(spec: &mut QuerySpec) -> Result<Controls> {
        let mut controls = Controls::default();
        if let Some(sort) = spec.remove(SORT) {
            controls.sort = sort_clause(&sort)?;
        }
        if let Some(limit) = spec.remove(LIMIT) {
            controls.limit = count(LIMIT, &limit)?;
        }
        if let Some(skip) = spec.remove(SKIP) {
            controls.offset = count(SKIP, &skip)?;
        }
        if let Some(fields) = spec.remove(FIELDS) {
            controls.projection = field_list(&fields)?;
        }
        if let Some(all) = spec.remove(ALL) {
            controls.all = matches!(all, Value::Boolean(true));
        }
        if let Some(id) = spec.remove(EXPLICIT_ID) {
            controls.explicit_id = id.identifier_text();
        }
        let unknown: Vec<String> = spec
            .entries()
            .iter()
            .filter(|(field, _)| field.ends_with('$'))
            .map(|(field, _)| field.clone())
            .collect();
        for field in unknown {
            debug!(directive = %field, "ignoring unsupported query directive");
            spec.remove(&field);
        }
        Ok(controls)
    }
}

fn sort_clause(sort: &Value) -> Result<Option<(String, Direction)>> {
    let members = match sort {
        Value::Structured(serde_json::Value::Object(members)) => members,
        other => return Err(GdstoreError::InvalidQuery(format!("{} must be an object, got {}", SORT, other))),
    };
    // single key sort: the last named field decides
    Ok(members.iter().last().map(|(field, direction)| {
        let direction = if direction.as_f64() == Some(1.0) {
            Direction::Ascending
        } else {
            Direction::Descending
        };
        (field.clone(), direction)
    }))
}

fn count(directive: &str, value: &Value) -> Result<Option<i32>> {
    match value {
        Value::Number(n) if n.fract() == 0.0 && *n >= 0.0 && *n <= i32::MAX as f64 => {
            Ok(Some(*n as i32).filter(|n| *n > 0))
        }
        other => Err(GdstoreError::InvalidQuery(format!(
            "{} must be a non-negative integer, got {}",
            directive, other
        ))),
    }
}

fn field_list(fields: &Value) -> Result<Vec<String>> {
    match fields {
        Value::Structured(serde_json::Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    GdstoreError::InvalidQuery(format!("{} entries must be field names, got {}", FIELDS, item))
                })
            })
            .collect(),
        Value::Text(field) => Ok(vec![field.clone()]),
        other => Err(GdstoreError::InvalidQuery(format!("{} must be a list, got {}", FIELDS, other))),
    }
}

// ------------- Filters -------------
fn equality(property: &str, value: WireValue) -> Filter {
    Filter::PropertyFilter(PropertyFilter {
        property: PropertyReference { name: property.to_string() },
        operator: FilterOperator::Equal,
        value,
    })
}

/// `id` matches on the key, numeric or named exactly as key paths are built.
fn key_equality(kind: &str, id: &Value) -> Result<Filter> {
    let identifier = id
        .identifier_text()
        .and_then(|text| Identifier::classify(&text))
        .ok_or_else(|| GdstoreError::InvalidQuery(format!("{} cannot be used as an identifier", id)))?;
    let key = Key::new(vec![identifier.path_element(kind)]);
    Ok(equality(KEY_PROPERTY, WireValue::KeyValue(key)))
}

pub fn build_filter(kind: &str, predicates: &[(String, Value)]) -> Result<Option<Filter>> {
    let mut filters = predicates
        .iter()
        .map(|(field, value)| {
            if field == ID_FIELD {
                key_equality(kind, value)
            } else {
                Ok(equality(field, encode(value)))
            }
        })
        .collect::<Result<Vec<Filter>>>()?;
    Ok(match filters.len() {
        0 => None,
        1 => filters.pop(),
        _ => Some(Filter::CompositeFilter(CompositeFilter {
            operator: CompositeOperator::And,
            filters,
        })),
    })
}

// ------------- Query -------------
/// Builds the query for `kind`. `limit_override` forces a result count (load
/// and single removal use 1) and wins over `limit$`.
pub fn build_query(kind: &str, mut spec: QuerySpec, limit_override: Option<i32>) -> Result<(Query, Controls)> {
    let controls = Controls::extract(&mut spec)?;
    let query = Query {
        kinds: vec![KindExpression { name: kind.to_string() }],
        filter: build_filter(kind, spec.entries())?,
        order: controls
            .sort
            .iter()
            .map(|(field, direction)| PropertyOrder {
                property: PropertyReference { name: field.clone() },
                direction: *direction,
            })
            .collect(),
        projection: controls
            .projection
            .iter()
            .map(|field| PropertyExpression {
                property: PropertyReference { name: field.clone() },
                aggregation_function: None,
            })
            .collect(),
        limit: limit_override.or(controls.limit),
        offset: controls.offset,
    };
    debug!(kind = %kind, filtered = query.filter.is_some(), limit = ?query.limit, "query built");
    Ok((query, controls))
}
