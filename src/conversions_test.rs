//! Tests for the lenient conversion helpers.

use crate::conversions::*;
use crate::error::ConversionError;
use crate::value::{Map, Value, ValueType};
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

#[test]
fn to_bool_follows_emptiness() {
  let mut map = Map::new();
  assert_eq!(to_bool(&Value::Null), Ok(false));
  assert_eq!(to_bool(&Value::from("")), Ok(false));
  assert_eq!(to_bool(&Value::from(Vec::<u8>::new())), Ok(false));
  assert_eq!(to_bool(&Value::Array(vec![])), Ok(false));
  assert_eq!(to_bool(&Value::Map(map.clone())), Ok(false));
  let zero = Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).unwrap();
  assert_eq!(to_bool(&Value::Timestamp(zero)), Ok(false));

  map.insert("k".to_string(), Value::Null);
  assert_eq!(to_bool(&Value::from("x")), Ok(true));
  assert_eq!(to_bool(&Value::from(vec![0u8])), Ok(true));
  assert_eq!(to_bool(&Value::Array(vec![Value::Null])), Ok(true));
  assert_eq!(to_bool(&Value::Map(map)), Ok(true));
  assert_eq!(to_bool(&Value::Int(-3)), Ok(true));
  assert_eq!(to_bool(&Value::Timestamp(DateTime::<Utc>::UNIX_EPOCH)), Ok(true));
  assert_eq!(to_bool(&Value::Float(0.0)), Ok(false));
}

#[test]
fn null_timestamp_is_the_zero_time() {
  let zero = to_timestamp(&Value::Null).unwrap();
  assert_eq!(zero, Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).unwrap());
  assert_eq!(zero.timestamp(), ZERO_TIME_UNIX_SECS);
  assert!(is_zero_time(&zero));
  assert_eq!(to_bool(&Value::Timestamp(zero)), Ok(false));
  assert!(!is_zero_time(&(zero + chrono::TimeDelta::nanoseconds(1))));
}

#[test]
fn to_int_truncates_floats_toward_zero() {
  assert_eq!(to_int(&Value::Float(2.9)), Ok(2));
  assert_eq!(to_int(&Value::Float(-2.9)), Ok(-2));
  assert_eq!(to_int(&Value::Bool(true)), Ok(1));
  assert_eq!(to_int(&Value::Null), Ok(0));
  assert_eq!(to_int(&Value::Float(MIN_CONV_FLOAT64)), Ok(i64::MIN));
}

#[test]
fn to_int_rejects_floats_outside_i64() {
  for f in [MAX_CONV_FLOAT64, 1e19, -1e19, f64::INFINITY, f64::NEG_INFINITY] {
    assert_eq!(
      to_int(&Value::Float(f)),
      Err(ConversionError::OutOfRange {
        value: f,
        to: ValueType::Int,
      })
    );
  }
  let err = to_int(&Value::Float(f64::NAN)).unwrap_err();
  assert!(matches!(err, ConversionError::OutOfRange { .. }));
  assert!(err.to_string().contains("out of bounds"));
}

#[test]
fn to_int_rejects_strings() {
  assert_eq!(
    to_int(&Value::from("12")),
    Err(ConversionError::Unsupported {
      from: ValueType::String,
      to: ValueType::Int,
    })
  );
}

#[test]
fn timestamps_convert_to_unix_seconds() {
  let at = Utc.timestamp_opt(1_700_000_000, 500_000_000).unwrap();
  assert_eq!(to_int(&Value::Timestamp(at)), Ok(1_700_000_000));
  assert_eq!(to_float(&Value::Timestamp(at)), Ok(1_700_000_000.5));
  assert_eq!(to_timestamp(&Value::Float(1_700_000_000.5)), Ok(at));
  assert_eq!(
    to_timestamp(&Value::Int(0)),
    Ok(DateTime::<Utc>::UNIX_EPOCH)
  );
}

#[test]
fn strings_round_trip_through_rfc3339_and_base64() {
  let at = Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap();
  let text = to_string(&Value::Timestamp(at)).unwrap();
  assert_eq!(text, "2023-01-02T03:04:05Z");
  assert_eq!(to_timestamp(&Value::from(text)), Ok(at));

  let encoded = to_string(&Value::from(b"topology".to_vec())).unwrap();
  assert_eq!(to_blob(&Value::from(encoded)), Ok(Bytes::from_static(b"topology")));
}

#[test]
fn parse_failures_name_the_target_kind() {
  let err = to_timestamp(&Value::from("yesterday")).unwrap_err();
  assert!(matches!(
    err,
    ConversionError::Parse {
      to: ValueType::Timestamp,
      ..
    }
  ));
  assert!(to_blob(&Value::from("not base64!")).is_err());
}

#[test]
fn to_string_renders_every_kind() {
  assert_eq!(to_string(&Value::Null).unwrap(), "null");
  assert_eq!(to_string(&Value::Bool(false)).unwrap(), "false");
  assert_eq!(to_string(&Value::Int(-4)).unwrap(), "-4");
  assert_eq!(to_string(&Value::Float(0.25)).unwrap(), "0.25");
  assert_eq!(
    to_string(&Value::Array(vec![Value::Int(1), Value::from("a")])).unwrap(),
    r#"[1,"a"]"#
  );
}

#[test]
fn only_matching_containers_convert() {
  let array = Value::Array(vec![Value::Int(1)]);
  assert_eq!(to_array(&array), Ok(vec![Value::Int(1)]));
  assert!(to_map(&array).is_err());
  assert!(to_array(&Value::Null).is_err());
  assert_eq!(to_map(&Value::Map(Map::new())), Ok(Map::new()));
}

proptest! {
  #[test]
  fn to_int_is_identity_on_ints(v in any::<i64>()) {
    prop_assert_eq!(to_int(&Value::Int(v)), Ok(v));
  }

  #[test]
  fn floats_in_range_truncate(v in -9.2e18f64..9.2e18f64) {
    prop_assert_eq!(to_int(&Value::Float(v)), Ok(v.trunc() as i64));
  }

  #[test]
  fn floats_beyond_range_fail(v in 9.3e18f64..1e300f64, negate in any::<bool>()) {
    let v = if negate { -v } else { v };
    let is_out_of_range = matches!(
      to_int(&Value::Float(v)),
      Err(ConversionError::OutOfRange { .. })
    );
    prop_assert!(is_out_of_range);
  }

  #[test]
  fn string_truthiness_is_non_emptiness(s in ".*") {
    prop_assert_eq!(to_bool(&Value::from(s.as_str())), Ok(!s.is_empty()));
  }

  #[test]
  fn blob_truthiness_is_non_emptiness(b in proptest::collection::vec(any::<u8>(), 0..16)) {
    let expected = !b.is_empty();
    prop_assert_eq!(to_bool(&Value::from(b)), Ok(expected));
  }
}
