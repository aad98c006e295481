//! # Value Conversions
//!
//! Lenient coercions between value kinds, used by box implementations that
//! accept loosely typed input. The rules are close to Python's truthiness and
//! numeric casts:
//!
//! | From \ To | bool | int |
//! |---|---|---|
//! | Null | false | 0 |
//! | Bool | identity | 0/1 |
//! | Int | nonzero | identity |
//! | Float | nonzero | truncated toward zero, range error outside i64 |
//! | String, Blob | nonempty | error |
//! | Timestamp | not the zero time | Unix seconds |
//! | Array, Map | nonempty | error |
//!
//! The remaining helpers follow the same pattern; see each function.

use crate::error::ConversionError;
use crate::value::{Map, Value, ValueType};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};

/// Smallest float accepted by [`to_int`] (`-2^63`).
pub const MIN_CONV_FLOAT64: f64 = -9_223_372_036_854_775_808.0;
/// Exclusive upper bound for [`to_int`] (`2^63`).
pub const MAX_CONV_FLOAT64: f64 = 9_223_372_036_854_775_808.0;
/// Unix seconds of the zero time, `0001-01-01T00:00:00Z`.
pub const ZERO_TIME_UNIX_SECS: i64 = -62_135_596_800;

/// Returns `true` for the zero time, the timestamp that counts as false.
pub fn is_zero_time(t: &DateTime<Utc>) -> bool {
  t.timestamp() == ZERO_TIME_UNIX_SECS && t.timestamp_subsec_nanos() == 0
}

fn unsupported(v: &Value, to: ValueType) -> ConversionError {
  ConversionError::Unsupported {
    from: v.value_type(),
    to,
  }
}

/// Converts a value to a bool.
///
/// Numbers are true when non-zero, strings/blobs/arrays/maps when non-empty,
/// timestamps when they are not the zero time (`0001-01-01T00:00:00Z`), null
/// is false.
pub fn to_bool(v: &Value) -> Result<bool, ConversionError> {
  Ok(match v {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Int(i) => *i != 0,
    Value::Float(f) => *f != 0.0,
    Value::String(s) => !s.is_empty(),
    Value::Blob(b) => !b.is_empty(),
    Value::Timestamp(t) => !is_zero_time(t),
    Value::Array(a) => !a.is_empty(),
    Value::Map(m) => !m.is_empty(),
  })
}

/// Converts a value to an i64.
///
/// Floats are truncated toward zero and must lie in `[-2^63, 2^63)`; NaN and
/// anything outside fails with [`ConversionError::OutOfRange`]. Timestamps
/// become Unix seconds. Strings, blobs, arrays and maps are rejected.
pub fn to_int(v: &Value) -> Result<i64, ConversionError> {
  match v {
    Value::Null => Ok(0),
    Value::Bool(b) => Ok(i64::from(*b)),
    Value::Int(i) => Ok(*i),
    Value::Float(f) => float_to_int(*f),
    Value::Timestamp(t) => Ok(t.timestamp()),
    _ => Err(unsupported(v, ValueType::Int)),
  }
}

fn float_to_int(f: f64) -> Result<i64, ConversionError> {
  if (MIN_CONV_FLOAT64..MAX_CONV_FLOAT64).contains(&f) {
    Ok(f.trunc() as i64)
  } else {
    Err(ConversionError::OutOfRange {
      value: f,
      to: ValueType::Int,
    })
  }
}

/// Converts a value to an f64.
///
/// Timestamps become Unix seconds including the fractional part.
pub fn to_float(v: &Value) -> Result<f64, ConversionError> {
  match v {
    Value::Null => Ok(0.0),
    Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
    Value::Int(i) => Ok(*i as f64),
    Value::Float(f) => Ok(*f),
    Value::Timestamp(t) => {
      Ok(t.timestamp() as f64 + f64::from(t.timestamp_subsec_nanos()) / 1e9)
    }
    _ => Err(unsupported(v, ValueType::Float)),
  }
}

/// Converts a value to a string.
///
/// Every kind has a string form: null is `"null"`, blobs are base64 encoded,
/// timestamps RFC 3339, arrays and maps their JSON text.
pub fn to_string(v: &Value) -> Result<String, ConversionError> {
  Ok(match v {
    Value::Null => "null".to_string(),
    Value::Bool(b) => b.to_string(),
    Value::Int(i) => i.to_string(),
    Value::Float(f) => f.to_string(),
    Value::String(s) => s.clone(),
    Value::Blob(b) => BASE64.encode(b),
    Value::Timestamp(t) => t.to_rfc3339_opts(SecondsFormat::AutoSi, true),
    Value::Array(_) | Value::Map(_) => v.to_json().to_string(),
  })
}

/// Converts a value to a blob.
///
/// Null becomes an empty blob and strings are decoded as standard base64.
pub fn to_blob(v: &Value) -> Result<Bytes, ConversionError> {
  match v {
    Value::Null => Ok(Bytes::new()),
    Value::Blob(b) => Ok(b.clone()),
    Value::String(s) => BASE64
      .decode(s.as_bytes())
      .map(Bytes::from)
      .map_err(|e| ConversionError::Parse {
        input: s.clone(),
        to: ValueType::Blob,
        reason: e.to_string(),
      }),
    _ => Err(unsupported(v, ValueType::Blob)),
  }
}

/// Converts a value to a timestamp.
///
/// Null is the zero time, numbers are Unix seconds, strings are parsed as
/// RFC 3339.
pub fn to_timestamp(v: &Value) -> Result<DateTime<Utc>, ConversionError> {
  match v {
    Value::Null => DateTime::from_timestamp(ZERO_TIME_UNIX_SECS, 0).ok_or(
      ConversionError::OutOfRange {
        value: ZERO_TIME_UNIX_SECS as f64,
        to: ValueType::Timestamp,
      },
    ),
    Value::Int(i) => {
      DateTime::from_timestamp(*i, 0).ok_or(ConversionError::OutOfRange {
        value: *i as f64,
        to: ValueType::Timestamp,
      })
    }
    Value::Float(f) => float_to_timestamp(*f),
    Value::String(s) => DateTime::parse_from_rfc3339(s)
      .map(|t| t.with_timezone(&Utc))
      .map_err(|e| ConversionError::Parse {
        input: s.clone(),
        to: ValueType::Timestamp,
        reason: e.to_string(),
      }),
    Value::Timestamp(t) => Ok(*t),
    _ => Err(unsupported(v, ValueType::Timestamp)),
  }
}

fn float_to_timestamp(f: f64) -> Result<DateTime<Utc>, ConversionError> {
  let out_of_range = ConversionError::OutOfRange {
    value: f,
    to: ValueType::Timestamp,
  };
  let secs = f.floor();
  let secs = float_to_int(secs).map_err(|_| out_of_range.clone())?;
  let nanos = ((f - f.floor()) * 1e9).round().min(999_999_999.0) as u32;
  DateTime::from_timestamp(secs, nanos).ok_or(out_of_range)
}

/// Converts a value to an array. Only arrays convert.
pub fn to_array(v: &Value) -> Result<Vec<Value>, ConversionError> {
  match v {
    Value::Array(a) => Ok(a.clone()),
    _ => Err(unsupported(v, ValueType::Array)),
  }
}

/// Converts a value to a map. Only maps convert.
pub fn to_map(v: &Value) -> Result<Map, ConversionError> {
  match v {
    Value::Map(m) => Ok(m.clone()),
    _ => Err(unsupported(v, ValueType::Map)),
  }
}
