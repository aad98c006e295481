//! Logical timestamps for tuple ordering.
//!
//! Logical time is not wall-clock time; it is a sequence number or batch id a
//! source attaches to the tuples it emits. The default value is the minimum.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical time attached to tuples for ordering and correlation.
#[derive(
  Clone, Copy, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct LogicalTime(pub u64);

impl LogicalTime {
  /// Creates a new logical time from a raw value.
  #[inline]
  pub const fn new(t: u64) -> Self {
    Self(t)
  }

  /// Returns the raw u64 value.
  #[inline]
  pub const fn as_u64(self) -> u64 {
    self.0
  }

  /// Returns the minimum logical time (same as `Default::default()`).
  #[inline]
  pub const fn minimum() -> Self {
    Self(0)
  }

  /// Returns the next logical time, saturating at `u64::MAX`.
  #[inline]
  pub const fn next(self) -> Self {
    Self(self.0.saturating_add(1))
  }
}

impl fmt::Display for LogicalTime {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "t{}", self.0)
  }
}
