//! Runtime configuration.
//!
//! [`TopologyConfig`] is carried by the [`Context`](crate::context::Context)
//! and read by every node wrapper. It is plain serde data, so it can be loaded
//! from JSON; every field has a default.

use crate::error::TopologyError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Topology-wide settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
  /// Number of deliveries a box or sink can buffer before producers wait.
  pub inbox_capacity: usize,
  /// How long an in-flight call may keep running after a stop request, in
  /// milliseconds.
  pub stop_grace_ms: u64,
  /// Buffer size of the failure report broadcast channel.
  pub failure_report_capacity: usize,
}

impl Default for TopologyConfig {
  fn default() -> Self {
    Self {
      inbox_capacity: 1024,
      stop_grace_ms: 5000,
      failure_report_capacity: 64,
    }
  }
}

impl TopologyConfig {
  /// Parses a configuration from JSON. Missing fields take their defaults.
  pub fn from_json_str(s: &str) -> Result<Self, TopologyError> {
    Ok(serde_json::from_str(s)?)
  }

  /// Reads and parses a JSON configuration file.
  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TopologyError> {
    let text = std::fs::read_to_string(path)?;
    Self::from_json_str(&text)
  }

  /// Stop grace period as a `Duration`.
  pub fn stop_grace(&self) -> Duration {
    Duration::from_millis(self.stop_grace_ms)
  }
}

/// Per-node settings passed to `add_source`, `add_box` and `add_sink`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
  /// Overrides [`TopologyConfig::inbox_capacity`] for this node.
  pub inbox_capacity: Option<usize>,
}

/// Per-connection settings passed to `input`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
  /// Label written to `Tuple::input_name` for tuples arriving over this
  /// connection. Defaults to the upstream's name.
  pub input_name: Option<String>,
}

impl InputConfig {
  /// Creates a config that labels incoming tuples with `name`.
  pub fn named(name: impl Into<String>) -> Self {
    Self {
      input_name: Some(name.into()),
    }
  }
}
