use crate::time::LogicalTime;
use crate::tuple::Tuple;
use crate::value::Value;
use chrono::{TimeZone, Utc};

#[test]
fn new_tuple_has_empty_metadata() {
  let tuple = Tuple::default();
  assert!(tuple.data.is_empty());
  assert!(tuple.input_name.is_empty());
  assert_eq!(tuple.time, LogicalTime::minimum());
  assert_eq!(tuple.timestamp, tuple.proc_timestamp);
}

#[test]
fn set_and_get_values() {
  let mut tuple = Tuple::default();
  assert_eq!(tuple.set("count", 3), None);
  assert_eq!(tuple.set("count", 4), Some(Value::Int(3)));
  tuple.set("flag", "yes");

  assert_eq!(tuple.get("count"), Some(&Value::Int(4)));
  assert_eq!(tuple.get_int("count"), Ok(4));
  assert_eq!(tuple.get_bool("flag"), Ok(true));
  assert_eq!(tuple.get_int("missing"), Ok(0));
  assert!(tuple.get_int("flag").is_err());
}

#[test]
fn builders_set_times() {
  let at = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
  let tuple = Tuple::default()
    .with_time(LogicalTime::new(9))
    .with_timestamp(at);
  assert_eq!(tuple.time.as_u64(), 9);
  assert_eq!(tuple.time.next(), LogicalTime::new(10));
  assert_eq!(tuple.timestamp, at);
}

#[test]
fn collects_from_pairs_and_renders_json() {
  let tuple: Tuple = [
    ("a".to_string(), Value::Int(1)),
    ("b".to_string(), Value::from("x")),
  ]
  .into_iter()
  .collect();
  assert_eq!(tuple.to_json(), serde_json::json!({"a": 1, "b": "x"}));
}

#[test]
fn logical_time_saturates_and_displays() {
  assert_eq!(LogicalTime::new(u64::MAX).next(), LogicalTime::new(u64::MAX));
  assert_eq!(LogicalTime::new(5).to_string(), "t5");
}
