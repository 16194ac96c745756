// Contract tests for encode-side alias duplication.
use fieldalias::api::{
    AliasRule, AliasShape, DuplicateOptions, EncodeOptions, RuleSet, duplicate_keys,
    duplicate_keys_with, encode_shape, rules_for,
};
use serde::Serialize;
use serde_json::{Map, Value, json};

fn rules(pairs: &[(&str, &str)]) -> RuleSet {
    pairs
        .iter()
        .map(|(old, new)| AliasRule::new(*old, *new).expect("rule"))
        .collect()
}

fn team_rules() -> RuleSet {
    rules(&[("team_id", "fleet_id"), ("team_name", "fleet_name")])
}

const DOCUMENTS: &[&str] = &[
    r#"{"fleet_id":1}"#,
    r#"{"team_id":1}"#,
    r#"{"fleet_id":1,"team_id":2}"#,
    r#"{"name":"fleet_id","fleet_name":"a b","hosts":[{"fleet_id":3},{"id":4}]}"#,
    r#"{"outer":{"fleet_id":{"fleet_id":5}},"list":[[{"team_name":"x"}]]}"#,
    "{\n  \"fleet_id\": 1,\n  \"meta\": {\n    \"fleet_name\": \"n\"\n  }\n}",
    r#"[{"fleet_id":1},{"fleet_id":2},"fleet_id",3]"#,
    r#"{"fleet_id":"say \"hi\"","escaped\"key":1}"#,
    "{}",
    "42",
];

fn objects(value: &Value, out: &mut Vec<Map<String, Value>>) {
    match value {
        Value::Object(map) => {
            out.push(map.clone());
            map.values().for_each(|inner| objects(inner, out));
        }
        Value::Array(items) => items.iter().for_each(|inner| objects(inner, out)),
        _ => {}
    }
}

#[test]
fn output_is_valid_json() {
    for doc in DOCUMENTS {
        let out = duplicate_keys(doc.as_bytes(), &team_rules());
        serde_json::from_slice::<Value>(&out)
            .unwrap_or_else(|err| panic!("{doc}: {err}: {}", String::from_utf8_lossy(&out)));
    }
}

#[test]
fn duplication_is_idempotent() {
    for compact in [false, true] {
        let options = DuplicateOptions {
            compact,
            max_depth: None,
        };
        for doc in DOCUMENTS {
            let once = duplicate_keys_with(doc.as_bytes(), &team_rules(), options);
            let twice = duplicate_keys_with(&once, &team_rules(), options);
            assert_eq!(once, twice, "{doc}");
        }
    }
}

#[test]
fn every_object_carries_both_spellings_with_equal_values() {
    for doc in DOCUMENTS {
        let out = duplicate_keys(doc.as_bytes(), &team_rules());
        let value: Value = serde_json::from_slice(&out).expect("parse");
        let mut all = Vec::new();
        objects(&value, &mut all);
        for map in all {
            for (old, new) in [("team_id", "fleet_id"), ("team_name", "fleet_name")] {
                assert_eq!(
                    map.contains_key(old),
                    map.contains_key(new),
                    "{doc}: {old}/{new}"
                );
            }
        }
    }
}

#[test]
fn existing_alias_is_never_overwritten() {
    let out = duplicate_keys(br#"{"fleet_id":1,"team_id":2}"#, &team_rules());
    assert_eq!(out, br#"{"fleet_id":1,"team_id":2}"#);
}

#[test]
fn inserted_values_are_byte_copies() {
    let doc = r#"{"fleet_id": {"b": [1.50, "xé"], "a": 1e3}}"#;
    let out = String::from_utf8(duplicate_keys(doc.as_bytes(), &team_rules())).expect("utf8");
    assert_eq!(
        out,
        r#"{"fleet_id": {"b": [1.50, "xé"], "a": 1e3},"team_id": {"b": [1.50, "xé"], "a": 1e3}}"#
    );
}

#[test]
fn every_value_type_is_copied_verbatim() {
    let values = [
        "true",
        "false",
        "null",
        "-12",
        "1.5e-3",
        "-0.25E+2",
        r#""say \"hi\"""#,
        r#"[1, "two", null, {"fleet_id": 3}]"#,
        r#"{"inner": {"deep": [true]}, "n": -1}"#,
    ];
    for value in values {
        let doc = format!(r#"{{"fleet_id":{value},"n":1}}"#);
        let out = String::from_utf8(duplicate_keys(doc.as_bytes(), &team_rules())).expect("utf8");
        let inserted = duplicate_keys(value.as_bytes(), &team_rules());
        let inserted = String::from_utf8(inserted).expect("utf8");
        assert_eq!(
            out,
            format!(r#"{{"fleet_id":{inserted},"team_id":{inserted},"n":1}}"#),
            "{value}"
        );
    }
}

#[test]
fn compact_output_drops_input_layout() {
    let doc = "{\n  \"fleet_id\": 1,\n  \"x\": [\n    1\n  ],\n  \"label\": \"a  b\"\n}";
    let out = duplicate_keys_with(
        doc.as_bytes(),
        &team_rules(),
        DuplicateOptions {
            compact: true,
            max_depth: None,
        },
    );
    assert_eq!(
        String::from_utf8(out).expect("utf8"),
        r#"{"fleet_id":1,"team_id":1,"x":[1],"label":"a  b"}"#
    );
}

#[test]
fn default_output_keeps_input_layout() {
    let doc = "{\n  \"fleet_id\": 1\n}";
    let out = duplicate_keys(doc.as_bytes(), &team_rules());
    assert_eq!(
        String::from_utf8(out).expect("utf8"),
        "{\n  \"fleet_id\": 1,\n  \"team_id\": 1\n}"
    );
}

#[test]
fn swapped_rules_duplicate_in_reverse_direction() {
    let forward = team_rules();
    let swapped = forward.swapped();
    let doc = br#"{"team_id":1}"#;
    assert_eq!(
        duplicate_keys(doc, &forward),
        duplicate_keys(doc, &swapped),
    );
    assert_eq!(swapped.canonical_of("fleet_id"), Some("team_id"));
}

#[test]
fn empty_rules_copy_input() {
    let doc = br#"{"fleet_id":1}"#;
    assert_eq!(duplicate_keys(doc, &RuleSet::empty()), doc);
}

#[derive(Serialize)]
struct Fleet {
    fleet_id: u32,
    fleet_name: String,
    hosts: Vec<Host>,
}

#[derive(Serialize)]
struct Host {
    hostname: String,
    fleet_id: u32,
}

impl AliasShape for Host {
    const FIELD_ALIASES: &'static [(&'static str, &'static str)] = &[("team_id", "fleet_id")];
}

impl AliasShape for Fleet {
    const FIELD_ALIASES: &'static [(&'static str, &'static str)] = &[
        ("team_id", "fleet_id"),
        ("team_name", "fleet_name"),
    ];

    fn visit_nested(visitor: &mut fieldalias::api::ShapeVisitor) {
        visitor.visit::<Vec<Host>>();
    }
}

#[test]
fn shape_rules_are_deduplicated_across_nesting() {
    let rules = rules_for::<Fleet>();
    assert_eq!(rules.len(), 2);
    assert_eq!(rules.canonical_of("team_name"), Some("fleet_name"));
}

#[test]
fn encoded_shape_serves_old_and_new_clients() {
    let fleet = Fleet {
        fleet_id: 7,
        fleet_name: "edge".to_string(),
        hosts: vec![Host {
            hostname: "h1".to_string(),
            fleet_id: 7,
        }],
    };
    let out = encode_shape(&fleet, EncodeOptions::compact()).expect("encode");
    let value: Value = serde_json::from_slice(&out).expect("parse");
    assert_eq!(
        value,
        json!({
            "fleet_id": 7,
            "team_id": 7,
            "fleet_name": "edge",
            "team_name": "edge",
            "hosts": [{"hostname": "h1", "fleet_id": 7, "team_id": 7}],
        })
    );
}
