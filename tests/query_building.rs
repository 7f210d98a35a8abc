use gdstore::query::{build_filter, build_query, Controls, QuerySpec};
use gdstore::wire::Direction;
use gdstore::Value;
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn empty_spec_matches_the_whole_kind() {
    let (query, controls) = build_query("person", QuerySpec::new(), None).expect("builds");
    assert_eq!(controls, Controls::default());
    assert_eq!(serde_json::to_value(&query).expect("serializes"), json!({
        "kinds": [{"name": "person"}],
        "order": [],
        "projection": []
    }));
}

#[test]
fn single_predicate_is_not_wrapped() {
    let spec = QuerySpec::new().with("name", "Barry");
    let filter = build_filter("person", spec.entries()).expect("builds");
    assert_eq!(serde_json::to_value(filter).expect("serializes"), json!({
        "propertyFilter": {
            "property": {"name": "name"},
            "operator": "EQUAL",
            "value": {"stringValue": "Barry"}
        }
    }));
}

#[test]
fn several_predicates_are_anded_in_spec_order() {
    let spec = QuerySpec::new().with("name", "Barry").with("age", 30).with("vip", true);
    let filter = build_filter("person", spec.entries()).expect("builds");
    assert_eq!(serde_json::to_value(filter).expect("serializes"), json!({
        "compositeFilter": {
            "operator": "AND",
            "filters": [
                {"propertyFilter": {"property": {"name": "name"}, "operator": "EQUAL", "value": {"stringValue": "Barry"}}},
                {"propertyFilter": {"property": {"name": "age"}, "operator": "EQUAL", "value": {"integerValue": "30"}}},
                {"propertyFilter": {"property": {"name": "vip"}, "operator": "EQUAL", "value": {"booleanValue": true}}}
            ]
        }
    }));
}

#[test]
fn id_filters_on_the_key() {
    let spec = QuerySpec::new().with("id", "123");
    let filter = build_filter("person", spec.entries()).expect("builds");
    assert_eq!(serde_json::to_value(filter).expect("serializes"), json!({
        "propertyFilter": {
            "property": {"name": "__key__"},
            "operator": "EQUAL",
            "value": {"keyValue": {"path": [{"kind": "person", "id": "123"}]}}
        }
    }));
    let spec = QuerySpec::new().with("id", "a1b2");
    let filter = build_filter("person", spec.entries()).expect("builds");
    assert_eq!(serde_json::to_value(filter).expect("serializes"), json!({
        "propertyFilter": {
            "property": {"name": "__key__"},
            "operator": "EQUAL",
            "value": {"keyValue": {"path": [{"kind": "person", "name": "a1b2"}]}}
        }
    }));
}

#[test]
fn control_fields_never_become_filters() {
    let spec = QuerySpec::from_json(json!({
        "a": 1,
        "sort$": {"a": -1},
        "limit$": 5,
        "skip$": 2,
        "fields$": ["a"],
        "all$": true,
        "native$": {"x": 1}
    }))
    .expect("valid spec");
    let (query, controls) = build_query("thing", spec, None).expect("builds");
    assert_eq!(controls.sort, Some(("a".to_string(), Direction::Descending)));
    assert!(controls.all);
    assert_eq!(serde_json::to_value(&query).expect("serializes"), json!({
        "kinds": [{"name": "thing"}],
        "filter": {"propertyFilter": {"property": {"name": "a"}, "operator": "EQUAL", "value": {"integerValue": "1"}}},
        "order": [{"property": {"name": "a"}, "direction": "descending"}],
        "projection": [{"property": {"name": "a"}}],
        "limit": 5,
        "offset": 2
    }));
}

#[test]
fn sort_takes_the_last_named_field() {
    let spec = QuerySpec::from_json(json!({"sort$": {"a": -1, "b": 1}})).expect("valid spec");
    let (query, _) = build_query("thing", spec, None).expect("builds");
    assert_eq!(query.order.len(), 1);
    assert_eq!(query.order[0].property.name, "b");
    assert_eq!(query.order[0].direction, Direction::Ascending);
}

#[test]
fn limit_override_wins_and_zero_means_unset() {
    let (query, _) = build_query("thing", QuerySpec::new().limit(10), Some(1)).expect("builds");
    assert_eq!(query.limit, Some(1));
    let (query, controls) = build_query("thing", QuerySpec::new().limit(0).skip(0), None).expect("builds");
    assert_eq!(query.limit, None);
    assert_eq!(query.offset, None);
    assert_eq!(controls.limit, None);
}

#[test]
fn malformed_controls_are_rejected() {
    assert!(build_query("thing", QuerySpec::new().with("limit$", "ten"), None).is_err());
    assert!(build_query("thing", QuerySpec::new().with("skip$", -1), None).is_err());
    assert!(build_query("thing", QuerySpec::new().with("sort$", "a"), None).is_err());
    assert!(build_query("thing", QuerySpec::new().with("fields$", 3), None).is_err());
    assert!(QuerySpec::from_json(json!([1, 2])).is_err());
}

#[test]
fn spec_builder_replaces_in_place() {
    let mut spec = QuerySpec::new().with("a", 1).with("b", 2);
    spec.insert("a", "one");
    assert_eq!(spec.entries()[0], ("a".to_string(), Value::Text("one".into())));
    assert_eq!(spec.len(), 2);
}
