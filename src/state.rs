//! Lifecycle states of nodes and topologies.
//!
//! States only move forward along `Created → Starting → Running → Stopping →
//! Stopped`. The current state is published through a `tokio::sync::watch`
//! channel: readers take snapshots or wait for a target state, and every
//! transition wakes all waiters at once.

use serde::Serialize;
use std::fmt;
use tokio::sync::watch;

/// Lifecycle state, ordered by progression.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
  /// Registered, not started.
  Created,
  /// Start requested; `init` is running.
  Starting,
  /// Accepting and processing tuples.
  Running,
  /// Shutting down; `terminate` is running.
  Stopping,
  /// Terminal.
  Stopped,
}

impl fmt::Display for NodeState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      NodeState::Created => "created",
      NodeState::Starting => "starting",
      NodeState::Running => "running",
      NodeState::Stopping => "stopping",
      NodeState::Stopped => "stopped",
    };
    f.write_str(s)
  }
}

/// Read side of a state machine.
#[derive(Clone, Debug)]
pub struct StateHandle {
  rx: watch::Receiver<NodeState>,
}

impl StateHandle {
  /// Returns the current state.
  pub fn get(&self) -> NodeState {
    *self.rx.borrow()
  }

  /// Waits until the state is at least `target` and returns the state
  /// reached, which may be past `target` (e.g. `Stopped` when waiting for
  /// `Running` on a node whose `init` failed).
  ///
  /// There is no built-in timeout; wrap the call in `tokio::time::timeout`
  /// when a bound is needed.
  pub async fn wait(&self, target: NodeState) -> NodeState {
    let mut rx = self.rx.clone();
    let reached = rx.wait_for(|state| *state >= target).await.map(|state| *state);
    match reached {
      Ok(state) => state,
      // The owner is gone; nothing can move the state anymore.
      Err(_) => *rx.borrow(),
    }
  }
}

/// Write side of a state machine.
#[derive(Debug)]
pub(crate) struct StateMachine {
  tx: watch::Sender<NodeState>,
}

impl StateMachine {
  pub(crate) fn new() -> Self {
    let (tx, _rx) = watch::channel(NodeState::Created);
    Self { tx }
  }

  pub(crate) fn handle(&self) -> StateHandle {
    StateHandle {
      rx: self.tx.subscribe(),
    }
  }

  pub(crate) fn current(&self) -> NodeState {
    *self.tx.borrow()
  }

  /// Moves to `next` if it lies ahead of the current state. Returns `false`
  /// (and leaves the state untouched) otherwise.
  pub(crate) fn advance(&self, next: NodeState) -> bool {
    self.tx.send_if_modified(|state| {
      if next > *state {
        *state = next;
        true
      } else {
        false
      }
    })
  }
}
