//! Sink that keeps every tuple it receives.

use crate::context::Context;
use crate::error::NodeError;
use crate::node::Sink;
use crate::tuple::Tuple;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

#[derive(Debug)]
struct Collected {
  tuples: Mutex<Vec<Arc<Tuple>>>,
  count: watch::Sender<usize>,
}

/// Sink that stores received tuples in arrival order.
#[derive(Debug)]
pub struct TupleCollectorSink {
  collected: Arc<Collected>,
}

/// Reads what a [`TupleCollectorSink`] has received.
#[derive(Clone, Debug)]
pub struct CollectorHandle {
  collected: Arc<Collected>,
}

impl TupleCollectorSink {
  /// Creates the sink and its handle.
  pub fn new() -> (Self, CollectorHandle) {
    let (count, _rx) = watch::channel(0);
    let collected = Arc::new(Collected {
      tuples: Mutex::new(Vec::new()),
      count,
    });
    (
      Self {
        collected: Arc::clone(&collected),
      },
      CollectorHandle { collected },
    )
  }
}

impl CollectorHandle {
  /// Tuples received so far, in arrival order.
  pub fn tuples(&self) -> Vec<Arc<Tuple>> {
    self
      .collected
      .tuples
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  /// Number of tuples received so far.
  pub fn len(&self) -> usize {
    *self.collected.count.borrow()
  }

  /// Returns `true` if nothing has been received yet.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Waits until at least `n` tuples have been received and returns the
  /// count at that point.
  pub async fn wait(&self, n: usize) -> usize {
    let mut rx = self.collected.count.subscribe();
    let reached = rx.wait_for(|count| *count >= n).await.map(|count| *count);
    match reached {
      Ok(count) => count,
      Err(_) => *rx.borrow(),
    }
  }
}

#[async_trait]
impl Sink for TupleCollectorSink {
  async fn process(&mut self, _ctx: &Context, tuple: Arc<Tuple>) -> Result<(), NodeError> {
    let mut tuples = self
      .collected
      .tuples
      .lock()
      .unwrap_or_else(PoisonError::into_inner);
    tuples.push(tuple);
    let len = tuples.len();
    drop(tuples);
    self.collected.count.send_replace(len);
    Ok(())
  }
}
