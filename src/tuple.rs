//! # Tuples
//!
//! A tuple is one unit of streaming data: an ordered bag of named values plus
//! delivery metadata. Tuples travel through the topology as `Arc<Tuple>` so a
//! fan-out shares one allocation; a node that wants to change a received tuple
//! takes a private copy first (`(*tuple).clone()` or `Arc::make_mut`).

use crate::error::ConversionError;
use crate::time::LogicalTime;
use crate::value::{Map, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One unit of streaming data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tuple {
  /// Named values.
  pub data: Map,
  /// Label of the edge the tuple arrived on; set by the runtime on delivery.
  pub input_name: String,
  /// Event time.
  pub timestamp: DateTime<Utc>,
  /// Time the tuple entered the topology. Set when a source writes the tuple;
  /// until then it is the construction time.
  pub proc_timestamp: DateTime<Utc>,
  /// Logical time assigned by the producing source.
  pub time: LogicalTime,
}

impl Tuple {
  /// Creates a tuple with the given values, stamped with the current time.
  pub fn new(data: Map) -> Self {
    let now = Utc::now();
    Self {
      data,
      input_name: String::new(),
      timestamp: now,
      proc_timestamp: now,
      time: LogicalTime::minimum(),
    }
  }

  /// Sets the logical time.
  pub fn with_time(mut self, time: LogicalTime) -> Self {
    self.time = time;
    self
  }

  /// Sets the event time.
  pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
    self.timestamp = timestamp;
    self
  }

  /// Returns the value stored under `key`.
  pub fn get(&self, key: &str) -> Option<&Value> {
    self.data.get(key)
  }

  /// Stores `value` under `key`, returning the previous value.
  pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
    self.data.insert(key.into(), value.into())
  }

  /// Looks up `key` and coerces it to a bool; a missing key counts as null.
  pub fn get_bool(&self, key: &str) -> Result<bool, ConversionError> {
    crate::conversions::to_bool(self.get(key).unwrap_or(&Value::Null))
  }

  /// Looks up `key` and coerces it to an i64; a missing key counts as null.
  pub fn get_int(&self, key: &str) -> Result<i64, ConversionError> {
    crate::conversions::to_int(self.get(key).unwrap_or(&Value::Null))
  }

  /// Renders the values as a JSON object.
  pub fn to_json(&self) -> serde_json::Value {
    Value::Map(self.data.clone()).to_json()
  }
}

impl Default for Tuple {
  fn default() -> Self {
    Self::new(Map::new())
  }
}

impl FromIterator<(String, Value)> for Tuple {
  fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
    Self::new(iter.into_iter().collect())
  }
}
