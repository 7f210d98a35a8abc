// used for the date-time host value
use chrono::{DateTime, SecondsFormat, Utc};
// used for the tagged wire value and structured payloads
use serde::{Deserialize, Deserializer, Serialize, Serializer};
// used to print out readable forms of a value
use std::fmt;

use tracing::warn;

use crate::error::{GdstoreError, Result};
use crate::wire::{int64, Key};

/// Blob text standing in for a field that is present but undefined.
pub const UNDEFINED: &str = "undefined";

// ------------- Host values -------------
/// A field value as the entity framework sees it.
///
/// Numbers are a single `f64` variant because the host has one numeric type;
/// whether a number travels as an integer or a double is decided at encode time.
/// `Structured` holds a JSON object or array; scalars built into it are
/// normalised by [`Value::normalized`] (and `From<serde_json::Value>`).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    Text(String),
    DateTime(DateTime<Utc>),
    Structured(serde_json::Value),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }
    /// Text form used when the value names an identifier: text as is, integral
    /// numbers without a fraction. Anything else has no identifier form.
    pub fn identifier_text(&self) -> Option<String> {
        match self {
            Value::Text(s) if !s.is_empty() => Some(s.clone()),
            // 2^63 itself is out of range; i64::MAX as f64 rounds up to it
            Value::Number(n) if n.fract() == 0.0 && *n >= i64::MIN as f64 && *n < i64::MAX as f64 => {
                Some(format!("{}", *n as i64))
            }
            _ => None,
        }
    }
    /// A `Structured` scalar becomes its like-named variant, so that every value
    /// has exactly one form and survives the wire.
    pub fn normalized(self) -> Value {
        match self {
            Value::Structured(json) if !(json.is_object() || json.is_array()) => Value::from(json),
            other => other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "{}", UNDEFINED),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::DateTime(d) => write!(f, "{}", d.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Structured(j) => write!(f, "{}", j),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self { Value::Boolean(b) }
}
impl From<i32> for Value {
    fn from(n: i32) -> Self { Value::Number(n as f64) }
}
impl From<i64> for Value {
    fn from(n: i64) -> Self { Value::Number(n as f64) }
}
impl From<f64> for Value {
    fn from(n: f64) -> Self { Value::Number(n) }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self { Value::Text(s.to_string()) }
}
impl From<String> for Value {
    fn from(s: String) -> Self { Value::Text(s) }
}
impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self { Value::DateTime(d) }
}
impl From<serde_json::Value> for Value {
    /// Scalars become their like-named variant; only objects and arrays stay structured.
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Text(s),
            structured => Value::Structured(structured),
        }
    }
}

// ------------- Wire values -------------
/// A datastore value: exactly one tag is set and the tag decides the decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WireValue {
    IntegerValue(#[serde(with = "int64")] i64),
    DoubleValue(f64),
    BooleanValue(bool),
    StringValue(String),
    DateTimeValue(String),
    BlobKeyValue(String),
    KeyValue(Key),
}

const WIRE_TAGS: [&str; 7] = [
    "integerValue",
    "doubleValue",
    "booleanValue",
    "stringValue",
    "dateTimeValue",
    "blobKeyValue",
    "keyValue",
];

impl WireValue {
    pub fn tag(&self) -> &'static str {
        match self {
            WireValue::IntegerValue(_) => "integerValue",
            WireValue::DoubleValue(_) => "doubleValue",
            WireValue::BooleanValue(_) => "booleanValue",
            WireValue::StringValue(_) => "stringValue",
            WireValue::DateTimeValue(_) => "dateTimeValue",
            WireValue::BlobKeyValue(_) => "blobKeyValue",
            WireValue::KeyValue(_) => "keyValue",
        }
    }
}

/// A property as it arrives from the datastore.
///
/// The strict form is a single-tag object. Real replies also carry members such
/// as `indexed`, so the first `*Value` member is tried next; whatever still does
/// not parse is kept raw and later dropped with a warning.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Value(WireValue),
    Unrecognized(serde_json::Value),
}

impl From<WireValue> for Property {
    fn from(value: WireValue) -> Self { Property::Value(value) }
}

impl From<serde_json::Value> for Property {
    fn from(raw: serde_json::Value) -> Self {
        if let Ok(value) = serde_json::from_value::<WireValue>(raw.clone()) {
            return Property::Value(value);
        }
        let tagged = raw
            .as_object()
            .and_then(|members| members.iter().find(|(name, _)| name.ends_with("Value")));
        if let Some((name, payload)) = tagged {
            let mut single = serde_json::Map::new();
            single.insert(name.clone(), payload.clone());
            if let Ok(value) = serde_json::from_value::<WireValue>(serde_json::Value::Object(single)) {
                return Property::Value(value);
            }
        }
        Property::Unrecognized(raw)
    }
}

impl Serialize for Property {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Property::Value(value) => value.serialize(serializer),
            Property::Unrecognized(raw) => raw.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Property {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Property::from)
    }
}

// ------------- Codec -------------
/// Mirrors the host's `n === (n|0)` test: only numbers that survive truncation
/// to a signed 32 bit integer count as integers.
pub fn is_int32(n: f64) -> bool {
    n.fract() == 0.0 && n >= i32::MIN as f64 && n <= i32::MAX as f64
}

pub fn encode(value: &Value) -> WireValue {
    match value {
        Value::Structured(j) if !(j.is_object() || j.is_array()) => encode(&Value::from(j.clone())),
        Value::Number(n) if is_int32(*n) => WireValue::IntegerValue(*n as i64),
        Value::Number(n) => WireValue::DoubleValue(*n),
        Value::Boolean(b) => WireValue::BooleanValue(*b),
        Value::Text(s) => WireValue::StringValue(s.clone()),
        Value::DateTime(d) => WireValue::DateTimeValue(d.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        Value::Structured(j) => WireValue::BlobKeyValue(j.to_string()),
        Value::Null => WireValue::BlobKeyValue(serde_json::Value::Null.to_string()),
        Value::Undefined => WireValue::BlobKeyValue(UNDEFINED.to_string()),
    }
}

pub fn decode(value: &WireValue) -> Result<Value> {
    Ok(match value {
        WireValue::IntegerValue(i) => Value::Number(*i as f64),
        WireValue::DoubleValue(d) => Value::Number(*d),
        WireValue::BooleanValue(b) => Value::Boolean(*b),
        WireValue::StringValue(s) => Value::Text(s.clone()),
        WireValue::DateTimeValue(s) => {
            let parsed = DateTime::parse_from_rfc3339(s).map_err(|e| GdstoreError::Decode {
                tag: value.tag(),
                message: format!("'{}': {}", s, e),
            })?;
            Value::DateTime(parsed.with_timezone(&Utc))
        }
        WireValue::BlobKeyValue(s) if s == UNDEFINED => Value::Undefined,
        WireValue::BlobKeyValue(s) => {
            let json: serde_json::Value = serde_json::from_str(s).map_err(|e| GdstoreError::Decode {
                tag: value.tag(),
                message: e.to_string(),
            })?;
            Value::from(json)
        }
        WireValue::KeyValue(key) => match key.path.last().and_then(|element| element.identifier()) {
            Some(identifier) => Value::Text(identifier),
            None => Value::Null,
        },
    })
}

/// Decodes a received property. A field that cannot be decoded is dropped with
/// a warning naming the cause; it never fails the entity it belongs to.
pub fn decode_property(name: &str, property: &Property) -> Option<Value> {
    match property {
        Property::Value(value) => match decode(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(property = %name, error = %e, "malformed value, field dropped");
                None
            }
        },
        Property::Unrecognized(raw) => {
            match malformed_tag(raw) {
                Some((tag, e)) => {
                    warn!(property = %name, tag = %tag, error = %e, "malformed value, field dropped")
                }
                None => warn!(property = %name, raw = %raw, "no recognised value tag, field dropped"),
            }
            None
        }
    }
}

/// The `*Value` member of an unparsable property and why it did not parse,
/// when the member names a known tag.
fn malformed_tag(raw: &serde_json::Value) -> Option<(String, serde_json::Error)> {
    let (tag, payload) = raw.as_object()?.iter().find(|(name, _)| name.ends_with("Value"))?;
    if !WIRE_TAGS.contains(&tag.as_str()) {
        return None;
    }
    let mut single = serde_json::Map::new();
    single.insert(tag.clone(), payload.clone());
    serde_json::from_value::<WireValue>(serde_json::Value::Object(single))
        .err()
        .map(|e| (tag.clone(), e))
}
