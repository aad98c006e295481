//! Tests for the value model: kinds, strict accessors and JSON mapping.

use crate::error::ConversionError;
use crate::value::{Map, Value, ValueType};
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};

#[test]
fn value_type_names_every_kind() {
  let cases = [
    (Value::Null, ValueType::Null, "null"),
    (Value::Bool(true), ValueType::Bool, "bool"),
    (Value::Int(1), ValueType::Int, "int"),
    (Value::Float(1.5), ValueType::Float, "float"),
    (Value::from("a"), ValueType::String, "string"),
    (Value::from(vec![1u8]), ValueType::Blob, "blob"),
    (
      Value::Timestamp(DateTime::<Utc>::UNIX_EPOCH),
      ValueType::Timestamp,
      "timestamp",
    ),
    (Value::Array(vec![]), ValueType::Array, "array"),
    (Value::Map(Map::new()), ValueType::Map, "map"),
  ];
  for (value, kind, name) in cases {
    assert_eq!(value.value_type(), kind);
    assert_eq!(kind.to_string(), name);
  }
}

#[test]
fn default_is_null() {
  assert!(Value::default().is_null());
  assert!(!Value::Int(0).is_null());
}

#[test]
fn strict_accessors_match_only_their_kind() {
  assert_eq!(Value::Int(7).as_int(), Ok(7));
  assert_eq!(Value::Bool(true).as_bool(), Ok(true));
  assert_eq!(Value::from("x").as_str(), Ok("x"));
  assert_eq!(
    Value::from(Bytes::from_static(b"ab")).as_blob(),
    Ok(&Bytes::from_static(b"ab"))
  );

  assert_eq!(
    Value::Float(1.0).as_int(),
    Err(ConversionError::TypeMismatch {
      expected: ValueType::Int,
      actual: ValueType::Float,
    })
  );
  assert!(Value::Int(1).as_str().is_err());
  assert!(Value::Null.as_bool().is_err());
  assert!(Value::from("1").as_array().is_err());
}

#[test]
fn to_json_renders_blobs_and_timestamps_as_strings() {
  let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
  let mut map = Map::new();
  map.insert("blob".to_string(), Value::from(b"hi".to_vec()));
  map.insert("at".to_string(), Value::Timestamp(at));
  map.insert("nan".to_string(), Value::Float(f64::NAN));

  let json = Value::Map(map).to_json();
  assert_eq!(json["blob"], "aGk=");
  assert_eq!(json["at"], "2024-05-01T12:30:00Z");
  assert!(json["nan"].is_null());
}

#[test]
fn from_json_keeps_integers_and_nesting() {
  let json = serde_json::json!({"a": 1, "b": [true, 2.5, null], "c": {"d": "e"}});
  let value = Value::from(json);
  let map = value.as_map().unwrap();
  assert_eq!(map["a"], Value::Int(1));
  assert_eq!(
    map["b"],
    Value::Array(vec![Value::Bool(true), Value::Float(2.5), Value::Null])
  );
  assert_eq!(map["c"].as_map().unwrap()["d"], Value::from("e"));
}

#[test]
fn serde_matches_json_rendering() {
  let value = Value::Array(vec![Value::Int(3), Value::from(b"\x00\x01".to_vec())]);
  let text = serde_json::to_string(&value).unwrap();
  assert_eq!(text, r#"[3,"AAE="]"#);

  let back: Value = serde_json::from_str(&text).unwrap();
  assert_eq!(back, Value::Array(vec![Value::Int(3), Value::from("AAE=")]));
}
