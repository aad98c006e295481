//! Node name table.
//!
//! Names are compared case-insensitively across all roles. Lookup and insert
//! happen under one lock, so two concurrent registrations of the same name
//! cannot both succeed and a half-registered node is never visible.

use super::node::NodeCore;
use crate::error::TopologyError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

const MAX_NAME_LEN: usize = 127;

/// Checks that `name` is a valid node identifier.
pub(crate) fn validate_name(name: &str) -> Result<(), TopologyError> {
  let mut chars = name.chars();
  let valid = name.len() <= MAX_NAME_LEN
    && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
  if valid {
    Ok(())
  } else {
    Err(TopologyError::InvalidName(name.to_string()))
  }
}

/// Key under which a name is stored.
pub(crate) fn name_key(name: &str) -> String {
  name.to_ascii_lowercase()
}

#[derive(Default)]
struct Table {
  nodes: HashMap<String, Arc<NodeCore>>,
  /// Keys in registration order.
  order: Vec<String>,
}

#[derive(Default)]
pub(crate) struct Registry {
  table: Mutex<Table>,
}

impl Registry {
  /// Inserts `core` unless its name is already taken.
  pub(crate) fn register(&self, core: Arc<NodeCore>) -> Result<(), TopologyError> {
    let key = name_key(core.name());
    let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
    if table.nodes.contains_key(&key) {
      return Err(TopologyError::NameAlreadyUsed(core.name().to_string()));
    }
    table.order.push(key.clone());
    table.nodes.insert(key, core);
    Ok(())
  }

  pub(crate) fn get(&self, name: &str) -> Option<Arc<NodeCore>> {
    let table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
    table.nodes.get(&name_key(name)).cloned()
  }

  /// All nodes in registration order.
  pub(crate) fn snapshot(&self) -> Vec<Arc<NodeCore>> {
    let table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
    table
      .order
      .iter()
      .filter_map(|key| table.nodes.get(key).cloned())
      .collect()
  }

  pub(crate) fn len(&self) -> usize {
    self
      .table
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .nodes
      .len()
  }
}
