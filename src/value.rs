//! # Tuple Values
//!
//! The tagged value type carried inside tuples. Every value has one of nine
//! kinds ([`ValueType`]). Strict accessors (`as_int`, `as_str`, ...) only
//! succeed for the matching kind; lenient coercions between kinds live in
//! [`conversions`](crate::conversions).
//!
//! Values serialize through serde the way they look in JSON: blobs become
//! base64 strings and timestamps RFC 3339 strings. Deserialization goes through
//! `serde_json::Value`, so those two kinds come back as strings.

use crate::error::ConversionError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Ordered map of named values.
pub type Map = BTreeMap<String, Value>;

/// Kind of a [`Value`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
  /// Missing value.
  Null,
  /// Boolean.
  Bool,
  /// Signed 64-bit integer.
  Int,
  /// 64-bit float.
  Float,
  /// UTF-8 string.
  String,
  /// Raw bytes.
  Blob,
  /// UTC timestamp.
  Timestamp,
  /// Ordered list of values.
  Array,
  /// String-keyed map of values.
  Map,
}

impl fmt::Display for ValueType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      ValueType::Null => "null",
      ValueType::Bool => "bool",
      ValueType::Int => "int",
      ValueType::Float => "float",
      ValueType::String => "string",
      ValueType::Blob => "blob",
      ValueType::Timestamp => "timestamp",
      ValueType::Array => "array",
      ValueType::Map => "map",
    };
    f.write_str(s)
  }
}

/// A dynamically typed value.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
  /// Missing value.
  #[default]
  Null,
  /// Boolean.
  Bool(bool),
  /// Signed 64-bit integer.
  Int(i64),
  /// 64-bit float.
  Float(f64),
  /// UTF-8 string.
  String(String),
  /// Raw bytes, cheap to clone.
  Blob(Bytes),
  /// UTC timestamp.
  Timestamp(DateTime<Utc>),
  /// Ordered list of values.
  Array(Vec<Value>),
  /// String-keyed map of values.
  Map(Map),
}

impl Value {
  /// Returns the kind of this value.
  pub fn value_type(&self) -> ValueType {
    match self {
      Value::Null => ValueType::Null,
      Value::Bool(_) => ValueType::Bool,
      Value::Int(_) => ValueType::Int,
      Value::Float(_) => ValueType::Float,
      Value::String(_) => ValueType::String,
      Value::Blob(_) => ValueType::Blob,
      Value::Timestamp(_) => ValueType::Timestamp,
      Value::Array(_) => ValueType::Array,
      Value::Map(_) => ValueType::Map,
    }
  }

  /// Returns `true` for [`Value::Null`].
  pub fn is_null(&self) -> bool {
    matches!(self, Value::Null)
  }

  fn mismatch(&self, expected: ValueType) -> ConversionError {
    ConversionError::TypeMismatch {
      expected,
      actual: self.value_type(),
    }
  }

  /// Returns the boolean if this is a `Bool`.
  pub fn as_bool(&self) -> Result<bool, ConversionError> {
    match self {
      Value::Bool(b) => Ok(*b),
      _ => Err(self.mismatch(ValueType::Bool)),
    }
  }

  /// Returns the integer if this is an `Int`.
  pub fn as_int(&self) -> Result<i64, ConversionError> {
    match self {
      Value::Int(i) => Ok(*i),
      _ => Err(self.mismatch(ValueType::Int)),
    }
  }

  /// Returns the float if this is a `Float`.
  pub fn as_float(&self) -> Result<f64, ConversionError> {
    match self {
      Value::Float(f) => Ok(*f),
      _ => Err(self.mismatch(ValueType::Float)),
    }
  }

  /// Returns the string if this is a `String`.
  pub fn as_str(&self) -> Result<&str, ConversionError> {
    match self {
      Value::String(s) => Ok(s),
      _ => Err(self.mismatch(ValueType::String)),
    }
  }

  /// Returns the bytes if this is a `Blob`.
  pub fn as_blob(&self) -> Result<&Bytes, ConversionError> {
    match self {
      Value::Blob(b) => Ok(b),
      _ => Err(self.mismatch(ValueType::Blob)),
    }
  }

  /// Returns the timestamp if this is a `Timestamp`.
  pub fn as_timestamp(&self) -> Result<DateTime<Utc>, ConversionError> {
    match self {
      Value::Timestamp(t) => Ok(*t),
      _ => Err(self.mismatch(ValueType::Timestamp)),
    }
  }

  /// Returns the elements if this is an `Array`.
  pub fn as_array(&self) -> Result<&[Value], ConversionError> {
    match self {
      Value::Array(a) => Ok(a),
      _ => Err(self.mismatch(ValueType::Array)),
    }
  }

  /// Returns the entries if this is a `Map`.
  pub fn as_map(&self) -> Result<&Map, ConversionError> {
    match self {
      Value::Map(m) => Ok(m),
      _ => Err(self.mismatch(ValueType::Map)),
    }
  }

  /// Renders the value as JSON.
  ///
  /// Blobs become base64 strings, timestamps RFC 3339 strings, and non-finite
  /// floats `null`.
  pub fn to_json(&self) -> serde_json::Value {
    match self {
      Value::Null => serde_json::Value::Null,
      Value::Bool(b) => serde_json::Value::Bool(*b),
      Value::Int(i) => serde_json::Value::from(*i),
      Value::Float(f) => serde_json::Number::from_f64(*f)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null),
      Value::String(s) => serde_json::Value::String(s.clone()),
      Value::Blob(b) => serde_json::Value::String(BASE64.encode(b)),
      Value::Timestamp(t) => {
        serde_json::Value::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
      }
      Value::Array(a) => serde_json::Value::Array(a.iter().map(Value::to_json).collect()),
      Value::Map(m) => serde_json::Value::Object(
        m.iter()
          .map(|(k, v)| (k.clone(), v.to_json()))
          .collect(),
      ),
    }
  }
}

impl From<serde_json::Value> for Value {
  fn from(v: serde_json::Value) -> Self {
    match v {
      serde_json::Value::Null => Value::Null,
      serde_json::Value::Bool(b) => Value::Bool(b),
      serde_json::Value::Number(n) => match n.as_i64() {
        Some(i) => Value::Int(i),
        None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
      },
      serde_json::Value::String(s) => Value::String(s),
      serde_json::Value::Array(a) => Value::Array(a.into_iter().map(Value::from).collect()),
      serde_json::Value::Object(o) => {
        Value::Map(o.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
      }
    }
  }
}

impl Serialize for Value {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      Value::Null => serializer.serialize_unit(),
      Value::Bool(b) => serializer.serialize_bool(*b),
      Value::Int(i) => serializer.serialize_i64(*i),
      Value::Float(f) => serializer.serialize_f64(*f),
      Value::String(s) => serializer.serialize_str(s),
      Value::Blob(b) => serializer.serialize_str(&BASE64.encode(b)),
      Value::Timestamp(t) => {
        serializer.serialize_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
      }
      Value::Array(a) => a.serialize(serializer),
      Value::Map(m) => m.serialize(serializer),
    }
  }
}

impl<'de> Deserialize<'de> for Value {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    serde_json::Value::deserialize(deserializer).map(Value::from)
  }
}

impl From<bool> for Value {
  fn from(v: bool) -> Self {
    Value::Bool(v)
  }
}

impl From<i64> for Value {
  fn from(v: i64) -> Self {
    Value::Int(v)
  }
}

impl From<i32> for Value {
  fn from(v: i32) -> Self {
    Value::Int(i64::from(v))
  }
}

impl From<f64> for Value {
  fn from(v: f64) -> Self {
    Value::Float(v)
  }
}

impl From<&str> for Value {
  fn from(v: &str) -> Self {
    Value::String(v.to_string())
  }
}

impl From<String> for Value {
  fn from(v: String) -> Self {
    Value::String(v)
  }
}

impl From<Vec<u8>> for Value {
  fn from(v: Vec<u8>) -> Self {
    Value::Blob(Bytes::from(v))
  }
}

impl From<Bytes> for Value {
  fn from(v: Bytes) -> Self {
    Value::Blob(v)
  }
}

impl From<DateTime<Utc>> for Value {
  fn from(v: DateTime<Utc>) -> Self {
    Value::Timestamp(v)
  }
}

impl From<Vec<Value>> for Value {
  fn from(v: Vec<Value>) -> Self {
    Value::Array(v)
  }
}

impl From<Map> for Value {
  fn from(v: Map) -> Self {
    Value::Map(v)
  }
}
