use serde_json::{Map, Value, json};
use ucode::{
    UcodeError,
    envtree::{EnvTree, parse_env_payload, sanitize_identifier, split_prefix},
};

fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("object literal")
}

#[test]
fn sanitize_replaces_foreign_characters() {
    assert_eq!(sanitize_identifier("a-b.c"), "a_b_c");
    assert_eq!(sanitize_identifier("Already_OK_123"), "Already_OK_123");
    assert_eq!(sanitize_identifier("héllo wörld"), "h_llo_w_rld");
    assert_eq!(sanitize_identifier(""), "");
    assert_eq!(sanitize_identifier("$"), "_");
}

#[test]
fn sanitize_is_idempotent() {
    for key in ["a-b", "x y z", "ünï", "__", "9lives", "a.b.c"] {
        let once = sanitize_identifier(key);
        assert_eq!(sanitize_identifier(&once), once);
        assert!(once.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_'));
    }
}

#[test]
fn prefix_splits_on_first_equals_only() {
    assert_eq!(split_prefix(r#"net={"x":5}"#), ("net", r#"{"x":5}"#));
    assert_eq!(split_prefix(r#"{"x":5}"#), ("", r#"{"x":5}"#));
    assert_eq!(split_prefix(r#"={"x":5}"#), ("", r#"{"x":5}"#));
    assert_eq!(split_prefix("a=b=c"), ("a", "b=c"));
}

#[test]
fn tree_is_created_lazily() {
    let mut tree = EnvTree::new();
    assert!(tree.is_empty());
    assert!(tree.clone().into_map().is_none());

    tree.merge("", Map::new());
    assert!(!tree.is_empty());
    assert_eq!(tree.into_map(), Some(Map::new()));
}

#[test]
fn merge_places_keys_at_root_or_under_prefix() {
    let mut tree = EnvTree::new();
    tree.merge("", object(json!({"a": 1, "b-c": 2})));
    tree.merge("my.net", object(json!({"x": 5})));

    assert_eq!(tree.get("a"), Some(&json!(1)));
    assert_eq!(tree.get("b_c"), Some(&json!(2)));
    assert_eq!(tree.get("my_net"), Some(&json!({"x": 5})));
    assert!(tree.get("my.net").is_none());
}

#[test]
fn later_merges_overwrite_and_extend() {
    let mut tree = EnvTree::new();
    tree.merge("net", object(json!({"x": 1, "y": 1})));
    tree.merge("net", object(json!({"x": 2, "z-z": 3})));
    tree.merge("", object(json!({"top": "a"})));
    tree.merge("", object(json!({"top": "b"})));

    assert_eq!(tree.get("net"), Some(&json!({"x": 2, "y": 1, "z_z": 3})));
    assert_eq!(tree.get("top"), Some(&json!("b")));
}

#[test]
fn prefix_replaces_non_object_value() {
    let mut tree = EnvTree::new();
    tree.merge("", object(json!({"net": 42})));
    tree.merge("net", object(json!({"x": 5})));
    assert_eq!(tree.get("net"), Some(&json!({"x": 5})));
}

#[test]
fn payload_must_be_a_single_object() {
    let parsed = parse_env_payload(&b" {\"a\": [1, 2]}\n"[..], 'e').expect("valid payload");
    assert_eq!(parsed, object(json!({"a": [1, 2]})));

    for (payload, fragment) in [
        ("[1, 2]", "found an array"),
        ("\"text\"", "found a string"),
        ("{\"a\": 1} {\"b\": 2}", "trailing data"),
        ("", "no JSON value found"),
    ] {
        let err = parse_env_payload(payload.as_bytes(), 'E').expect_err(payload);
        assert!(matches!(err, UcodeError::Environment { flag: 'E', .. }));
        let message = err.to_string();
        assert!(
            message.starts_with("Option -E must point to a valid JSON object: "),
            "{message}"
        );
        assert!(message.contains(fragment), "{message}");
    }

    for payload in ["{\"a\": ", "{\"a\": 1} garbage", "{oops}"] {
        let err = parse_env_payload(payload.as_bytes(), 'e').expect_err(payload);
        assert!(matches!(err, UcodeError::Environment { flag: 'e', .. }));
    }
}
