use serde_json::json;

use crate::config::Parameters;

#[test]
fn test_from_args_key_value_pairs() {
    let params = Parameters::from_args(["-foo", "32", "--name", "Ada", "-ratio", "0.5"]);

    assert_eq!(params.get::<i64>("foo"), Some(32));
    assert_eq!(params.get::<String>("name"), Some("Ada".to_string()));
    assert_eq!(params.get::<f64>("ratio"), Some(0.5));
    assert_eq!(params.len(), 3);
}

#[test]
fn test_from_args_flags_and_inline_values() {
    let params = Parameters::from_args(["--verbose", "-level=3", "--mode=fast", "-last"]);

    assert_eq!(params.get::<bool>("verbose"), Some(true));
    assert_eq!(params.get::<i64>("level"), Some(3));
    assert_eq!(params.get::<String>("mode"), Some("fast".to_string()));
    assert_eq!(params.get::<bool>("last"), Some(true));
}

#[test]
fn test_from_args_negative_numbers_are_values() {
    let params = Parameters::from_args(["-offset", "-12", "-scale", "-1.5"]);

    assert_eq!(params.get::<i64>("offset"), Some(-12));
    assert_eq!(params.get::<f64>("scale"), Some(-1.5));
}

#[test]
fn test_from_args_ignores_positionals() {
    let params = Parameters::from_args(["stray", "-a", "1", "loose", "--", "-"]);

    assert_eq!(params.keys().collect::<Vec<_>>(), vec!["a"]);
}

#[test]
fn test_from_args_json_literals() {
    let params = Parameters::from_args(["-enabled", "false", "-nothing", "null", "-quoted", "\"42\""]);

    assert_eq!(params.get::<bool>("enabled"), Some(false));
    assert_eq!(params.get_value("nothing"), Some(&json!(null)));
    assert_eq!(params.get::<String>("quoted"), Some("42".to_string()));
}

#[test]
fn test_from_args_keeps_structured_json_as_text() {
    let params = Parameters::from_args(["-ids", "[1,2]", "-table", r#"{"a":1}"#]);

    assert_eq!(params.get::<String>("ids"), Some("[1,2]".to_string()));
    assert_eq!(params.get::<Vec<i64>>("ids"), None);
    assert_eq!(params.get_value("table"), Some(&json!(r#"{"a":1}"#)));
}

#[test]
fn test_typed_access_and_defaults() {
    let mut params = Parameters::new();
    params.set("port", 8080).unwrap();
    params.set("tags", vec!["a", "b"]).unwrap();

    assert_eq!(params.get::<u16>("port"), Some(8080));
    assert_eq!(params.get::<String>("port"), None);
    assert_eq!(params.get_or("missing", 7u32), 7);
    assert_eq!(params.get::<Vec<String>>("tags"), Some(vec!["a".to_string(), "b".to_string()]));
    assert!(params.contains_key("tags"));
    assert_eq!(params.remove("tags"), Some(json!(["a", "b"])));
    assert!(!params.contains_key("tags"));
}

#[test]
fn test_merge_prefers_other() {
    let mut base = Parameters::from_args(["-a", "1", "-b", "2"]);
    let overrides = Parameters::from_args(["-b", "20", "-c", "30"]);
    base.merge(&overrides);

    assert_eq!(base.get::<i64>("a"), Some(1));
    assert_eq!(base.get::<i64>("b"), Some(20));
    assert_eq!(base.get::<i64>("c"), Some(30));
}

#[test]
fn test_serializes_as_plain_map() {
    let params = Parameters::from_args(["-foo", "32"]);
    assert_eq!(serde_json::to_value(&params).unwrap(), json!({ "foo": 32 }));

    let parsed: Parameters = serde_json::from_value(json!({ "name": "x" })).unwrap();
    assert_eq!(parsed.get::<String>("name"), Some("x".to_string()));
}
