use std::collections::BTreeMap;
use std::collections::btree_map::Iter;

// used to print out readable forms of a construct
use std::fmt;
use std::str::FromStr;

// the "standard" regular expression package, compiled once
use lazy_static::lazy_static;
use regex::Regex;

use tracing::debug;

// our own stuff that we need
use crate::datatype::Value;
use crate::error::GdstoreError;
use crate::query::EXPLICIT_ID;
use crate::wire::PathElement;

/// The field that carries the identifier; it lives in the key, never in properties.
pub const ID_FIELD: &str = "id";

lazy_static! {
    static ref NON_DIGIT: Regex = Regex::new(r"[^0-9]").unwrap();
}

// ------------- Identifier -------------
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Id(i64),
    Name(String),
}

impl Identifier {
    /// Digits only means a numeric id, anything else is a name. An empty
    /// identifier is no identifier. Digit strings too long for an i64 can only
    /// be names.
    pub fn classify(text: &str) -> Option<Identifier> {
        if text.is_empty() {
            return None;
        }
        if !NON_DIGIT.is_match(text) {
            if let Ok(id) = text.parse::<i64>() {
                return Some(Identifier::Id(id));
            }
        }
        Some(Identifier::Name(text.to_string()))
    }
    pub fn path_element(&self, kind: &str) -> PathElement {
        match self {
            Identifier::Id(id) => PathElement::with_id(kind, *id),
            Identifier::Name(name) => PathElement::with_name(kind, name),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Identifier::Id(id) => write!(f, "{}", id),
            Identifier::Name(name) => write!(f, "{}", name),
        }
    }
}

// ------------- Key paths -------------
/// Single segment key path for an entity of `kind`. The explicit id wins over
/// the existing one; with neither the path is incomplete and the server assigns.
pub fn build_path(kind: &str, explicit_id: Option<&str>, existing_id: Option<&str>) -> Vec<PathElement> {
    match explicit_id
        .and_then(Identifier::classify)
        .or_else(|| existing_id.and_then(Identifier::classify))
    {
        Some(identifier) => vec![identifier.path_element(kind)],
        None => vec![PathElement::incomplete(kind)],
    }
}

// ------------- Canon -------------
/// Namespace and type of an entity, written `zone/base/name`, `base/name` or `name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Canon {
    zone: Option<String>,
    base: Option<String>,
    name: String,
}

impl Canon {
    pub fn new(base: Option<&str>, name: &str) -> Self {
        Self {
            zone: None,
            base: base.map(str::to_string),
            name: name.to_string(),
        }
    }
    pub fn zone(&self) -> Option<&str> {
        self.zone.as_deref()
    }
    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    /// The datastore kind: `<base>_<name>`, or the bare name without a base.
    pub fn kind(&self) -> String {
        match &self.base {
            Some(base) => format!("{}_{}", base, self.name),
            None => self.name.clone(),
        }
    }
}

impl FromStr for Canon {
    type Err = GdstoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let part = |p: &str| if p.is_empty() || p == "-" { None } else { Some(p.to_string()) };
        let parts: Vec<&str> = s.split('/').collect();
        let (zone, base, name) = match parts.as_slice() {
            [name] => (None, None, *name),
            [base, name] => (None, part(*base), *name),
            [zone, base, name] => (part(*zone), part(*base), *name),
            _ => return Err(GdstoreError::Config(format!("malformed entity canon '{}'", s))),
        };
        if name.is_empty() || name == "-" {
            return Err(GdstoreError::Config(format!("entity canon '{}' has no name", s)));
        }
        Ok(Self { zone, base, name: name.to_string() })
    }
}

impl fmt::Display for Canon {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let dash = |p: &Option<String>| p.clone().unwrap_or_else(|| "-".to_string());
        write!(f, "{}/{}/{}", dash(&self.zone), dash(&self.base), self.name)
    }
}

// ------------- Entity -------------
/// A host entity: canon, identifier and an unordered set of fields.
///
/// `id` is routed out of the field set by `set`/`get` so that it only ever
/// appears in the key. `explicit_id` (the `id$` field) is the client supplied
/// identifier for an insert; it is consumed by a save.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Entity {
    canon: Canon,
    id: Option<String>,
    explicit_id: Option<String>,
    fields: BTreeMap<String, Value>,
}

impl Entity {
    pub fn new(canon: Canon) -> Self {
        Self { canon, ..Default::default() }
    }
    /// A fresh entity of the same canon built from `fields` (the host's `make`).
    pub fn make<I, K>(&self, fields: I) -> Entity
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut entity = Entity::new(self.canon.clone());
        for (field, value) in fields {
            entity.set(field, value);
        }
        entity
    }
    pub fn canon(&self) -> &Canon {
        &self.canon
    }
    pub fn kind(&self) -> String {
        self.canon.kind()
    }
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
    pub fn set_id(&mut self, id: Option<String>) {
        self.id = id.filter(|i| !i.is_empty());
    }
    pub fn explicit_id(&self) -> Option<&str> {
        self.explicit_id.as_deref()
    }
    pub fn set_explicit_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.explicit_id = Some(id.into()).filter(|i| !i.is_empty());
        self
    }
    pub fn take_explicit_id(&mut self) -> Option<String> {
        self.explicit_id.take()
    }
    pub fn is_saved(&self) -> bool {
        self.id.is_some()
    }
    pub fn get(&self, field: &str) -> Option<Value> {
        match field {
            ID_FIELD => self.id.clone().map(Value::Text),
            EXPLICIT_ID => self.explicit_id.clone().map(Value::Text),
            _ => self.fields.get(field).cloned(),
        }
    }
    /// Routes `id` and `id$` to the identifiers. Other `$` directives are not
    /// data and are never stored as fields.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let field = field.into();
        let value = value.into().normalized();
        if field == ID_FIELD {
            self.set_id(value.identifier_text());
        } else if field == EXPLICIT_ID {
            self.explicit_id = value.identifier_text();
        } else if field.ends_with('$') {
            debug!(field = %field, "directive is not an entity field");
        } else {
            self.fields.insert(field, value);
        }
        self
    }
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        match field {
            ID_FIELD => self.id.take().map(Value::Text),
            EXPLICIT_ID => self.explicit_id.take().map(Value::Text),
            _ => self.fields.remove(field),
        }
    }
    pub fn fields(&self) -> Iter<'_, String, Value> {
        self.fields.iter()
    }
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }
    pub fn len(&self) -> usize {
        self.fields.len()
    }
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut s = String::new();
        for (field, value) in self.fields() {
            s += &format!("{}={},", field, value);
        }
        s.pop();
        write!(f, "{}:{} {{{}}}", self.canon, self.id.as_deref().unwrap_or("-"), s)
    }
}
