use chrono::{TimeZone, Utc};
use gdstore::datatype::{decode, decode_property, encode, Property, Value, WireValue, UNDEFINED};
use gdstore::wire::{Key, PathElement};
use pretty_assertions::assert_eq;
use serde_json::json;

fn round_trip(value: Value) {
    let wire = encode(&value);
    let back = decode(&wire).expect("decodes");
    assert_eq!(back, value, "through {:?}", wire);
}

#[test]
fn every_host_value_survives_the_wire() {
    round_trip(Value::Null);
    round_trip(Value::Undefined);
    round_trip(Value::Boolean(true));
    round_trip(Value::Boolean(false));
    round_trip(Value::Number(0.0));
    round_trip(Value::Number(-17.0));
    round_trip(Value::Number(2147483648.0));
    round_trip(Value::Number(3.25));
    round_trip(Value::Text(String::new()));
    round_trip(Value::Text("Barry".into()));
    round_trip(Value::DateTime(Utc.with_ymd_and_hms(2015, 3, 14, 9, 26, 53).unwrap()));
    round_trip(Value::Structured(json!({"street": "Main", "no": [1, 2, {"flat": null}]})));
    round_trip(Value::Structured(json!([])));
    round_trip(Value::Structured(json!({})));
}

#[test]
fn false_does_not_decode_as_something_else() {
    let wire: WireValue = serde_json::from_value(json!({"booleanValue": false})).expect("parses");
    assert_eq!(decode(&wire).expect("decodes"), Value::Boolean(false));
    let wire: WireValue = serde_json::from_value(json!({"booleanValue": true})).expect("parses");
    assert_eq!(decode(&wire).expect("decodes"), Value::Boolean(true));
}

#[test]
fn numbers_split_on_the_int32_range() {
    assert_eq!(encode(&Value::Number(42.0)), WireValue::IntegerValue(42));
    assert_eq!(encode(&Value::Number(2147483647.0)), WireValue::IntegerValue(2147483647));
    assert_eq!(encode(&Value::Number(-2147483648.0)), WireValue::IntegerValue(-2147483648));
    assert_eq!(encode(&Value::Number(2147483648.0)), WireValue::DoubleValue(2147483648.0));
    assert_eq!(encode(&Value::Number(1e12)), WireValue::DoubleValue(1e12));
    assert_eq!(encode(&Value::Number(0.5)), WireValue::DoubleValue(0.5));
}

#[test]
fn null_and_undefined_are_distinct_blobs() {
    assert_eq!(encode(&Value::Undefined), WireValue::BlobKeyValue(UNDEFINED.to_string()));
    assert_eq!(encode(&Value::Null), WireValue::BlobKeyValue("null".to_string()));
    assert_eq!(
        encode(&Value::Structured(json!({"a": 1}))),
        WireValue::BlobKeyValue(r#"{"a":1}"#.to_string())
    );
}

#[test]
fn wire_json_uses_camel_case_tags_and_string_int64() {
    assert_eq!(
        serde_json::to_value(encode(&Value::Number(7.0))).expect("serializes"),
        json!({"integerValue": "7"})
    );
    assert_eq!(
        serde_json::to_value(encode(&Value::Text("x".into()))).expect("serializes"),
        json!({"stringValue": "x"})
    );
    assert_eq!(
        serde_json::to_value(encode(&Value::DateTime(Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap())))
            .expect("serializes"),
        json!({"dateTimeValue": "2020-01-02T03:04:05Z"})
    );
    // numbers are accepted for integers as well
    let wire: WireValue = serde_json::from_value(json!({"integerValue": 9})).expect("parses");
    assert_eq!(wire, WireValue::IntegerValue(9));
}

#[test]
fn first_value_member_decides_when_extra_members_are_present() {
    let property: Property =
        serde_json::from_value(json!({"indexed": false, "stringValue": "kept"})).expect("parses");
    assert_eq!(
        decode_property("note", &property),
        Some(Value::Text("kept".into()))
    );
}

#[test]
fn unrecognized_tag_drops_the_field() {
    let property: Property = serde_json::from_value(json!({"listValue": [], "meaning": 3})).expect("parses");
    assert!(matches!(property, Property::Unrecognized(_)));
    assert_eq!(decode_property("tags", &property), None);
    let property: Property = serde_json::from_value(json!({"indexed": true})).expect("parses");
    assert_eq!(decode_property("flag", &property), None);
}

#[test]
fn bad_payloads_inside_known_tags_drop_only_that_field() {
    assert!(decode(&WireValue::DateTimeValue("yesterday".into())).is_err());
    assert!(decode(&WireValue::BlobKeyValue("{not json".into())).is_err());
    for raw in [
        json!({"integerValue": "abc"}),
        json!({"dateTimeValue": "yesterday"}),
        json!({"blobKeyValue": "{not json"}),
        json!({"doubleValue": "many"}),
    ] {
        let property: Property = serde_json::from_value(raw.clone()).expect("parses");
        assert_eq!(decode_property("field", &property), None, "{}", raw);
    }
}

#[test]
fn key_values_decode_to_their_identifier() {
    let named = WireValue::KeyValue(Key::new(vec![PathElement::with_name("person", "barry")]));
    assert_eq!(decode(&named).expect("decodes"), Value::Text("barry".into()));
    let numbered = WireValue::KeyValue(Key::new(vec![PathElement::with_id("person", 12)]));
    assert_eq!(decode(&numbered).expect("decodes"), Value::Text("12".into()));
}
