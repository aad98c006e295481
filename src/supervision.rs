//! Failure reporting for node failures.
//!
//! The runtime never restarts a failed node. When a node's `init`, `process`,
//! `generate_stream` or `terminate` returns an error or panics, the node stops
//! and a [`FailureReport`] is broadcast to everyone subscribed through
//! [`DefaultTopology::subscribe_failures`](crate::topology::DefaultTopology::subscribe_failures).
//! Recovery is up to the operator: rewire the surviving downstream nodes to
//! another upstream with `input`.

use crate::error::NodeFailure;
use crate::node::NodeType;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Report of a node failure sent to the failure channel.
#[derive(Clone, Debug, Serialize)]
pub struct FailureReport {
  /// Topology the node belongs to.
  pub topology: String,
  /// Node that failed.
  pub node: String,
  /// Role of the failed node.
  pub node_type: NodeType,
  /// Normalized failure.
  pub failure: NodeFailure,
  /// When the failure was observed.
  pub at: DateTime<Utc>,
}

/// Sending side of the failure channel, shared by all nodes of a topology.
#[derive(Clone, Debug)]
pub(crate) struct FailureReporter {
  tx: broadcast::Sender<FailureReport>,
}

impl FailureReporter {
  pub(crate) fn new(capacity: usize) -> Self {
    let (tx, _rx) = broadcast::channel(capacity.max(1));
    Self { tx }
  }

  pub(crate) fn subscribe(&self) -> broadcast::Receiver<FailureReport> {
    self.tx.subscribe()
  }

  /// Publishes a report. Having no subscribers is not an error.
  pub(crate) fn report(&self, report: FailureReport) {
    let _ = self.tx.send(report);
  }
}
