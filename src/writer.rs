//! # Writer and Fan-Out
//!
//! A node hands tuples downstream through the [`Writer`] it is given. Behind
//! the writer sits a [`Fanout`]: the producer's current set of subscribers.
//!
//! ## Delivery
//!
//! - Each call to `write` takes a snapshot of the subscriber set and sends the
//!   tuple to every subscriber in it. The snapshot is an `Arc<Vec<_>>` that
//!   wiring replaces copy-on-write, so no lock is held while tuples are sent
//!   and a concurrent `input` call never disturbs a fan-out in progress.
//! - Every downstream node owns one bounded inbox. A producer sends
//!   sequentially, so the order of tuples along one edge is the emission
//!   order. A full inbox makes the producer wait.
//! - A stopped downstream has closed its inbox. Sends to it are dropped
//!   without error and the dead subscriber is pruned.
//! - Tuples written by a source get their `proc_timestamp` set to the time of
//!   the write; boxes pass it on unchanged.

use crate::context::Context;
use crate::error::WriteError;
use crate::tuple::Tuple;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Push interface a node uses to emit tuples.
#[async_trait]
pub trait Writer: Send + Sync {
  /// Delivers `tuple` to every current downstream subscriber.
  async fn write(&self, ctx: &Context, tuple: Arc<Tuple>) -> Result<(), WriteError>;
}

/// A tuple travelling along one edge.
#[derive(Debug)]
pub(crate) struct Delivery {
  /// Label configured for the edge.
  pub(crate) input_name: Arc<str>,
  pub(crate) tuple: Arc<Tuple>,
}

impl Delivery {
  /// Returns the tuple labelled with the edge's input name, copying it only
  /// when the label differs and the tuple is shared.
  pub(crate) fn into_tuple(self) -> Arc<Tuple> {
    let mut tuple = self.tuple;
    if tuple.input_name.as_str() != &*self.input_name {
      Arc::make_mut(&mut tuple).input_name = self.input_name.to_string();
    }
    tuple
  }
}

/// One downstream endpoint of a producer.
#[derive(Clone, Debug)]
pub(crate) struct Subscriber {
  /// Name of the downstream node.
  pub(crate) node: String,
  pub(crate) input_name: Arc<str>,
  pub(crate) inbox: mpsc::Sender<Delivery>,
}

/// Counters shared between a node wrapper and its writer.
#[derive(Debug, Default)]
pub(crate) struct Counters {
  pub(crate) processed: AtomicU64,
  pub(crate) emitted: AtomicU64,
  pub(crate) dropped: AtomicU64,
}

/// The subscriber set of a producing node.
#[derive(Debug, Default)]
pub(crate) struct Fanout {
  subscribers: RwLock<Arc<Vec<Subscriber>>>,
}

impl Fanout {
  pub(crate) fn snapshot(&self) -> Arc<Vec<Subscriber>> {
    self
      .subscribers
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  pub(crate) fn subscribe(&self, subscriber: Subscriber) {
    let mut guard = self
      .subscribers
      .write()
      .unwrap_or_else(PoisonError::into_inner);
    let mut next = Vec::with_capacity(guard.len() + 1);
    next.extend(guard.iter().cloned());
    next.push(subscriber);
    *guard = Arc::new(next);
  }

  /// Removes subscribers whose inbox has been closed.
  pub(crate) fn prune_closed(&self) {
    let mut guard = self
      .subscribers
      .write()
      .unwrap_or_else(PoisonError::into_inner);
    if guard.iter().any(|s| s.inbox.is_closed()) {
      let next: Vec<Subscriber> = guard
        .iter()
        .filter(|s| !s.inbox.is_closed())
        .cloned()
        .collect();
      *guard = Arc::new(next);
    }
  }

  /// Names of the current downstream nodes.
  pub(crate) fn downstream_names(&self) -> Vec<String> {
    self.snapshot().iter().map(|s| s.node.clone()).collect()
  }

  /// Sends `tuple` to every subscriber in the current snapshot. Returns the
  /// number of deliveries that were dropped because the downstream is gone.
  pub(crate) async fn deliver(&self, producer: &str, tuple: &Arc<Tuple>) -> u64 {
    let subscribers = self.snapshot();
    let mut dropped = 0;
    for subscriber in subscribers.iter() {
      let delivery = Delivery {
        input_name: Arc::clone(&subscriber.input_name),
        tuple: Arc::clone(tuple),
      };
      if subscriber.inbox.send(delivery).await.is_err() {
        trace!(
          node = producer,
          downstream = %subscriber.node,
          "downstream stopped, dropping delivery"
        );
        dropped += 1;
      }
    }
    if dropped > 0 {
      self.prune_closed();
    }
    dropped
  }
}

/// The [`Writer`] given to a source or box by its node wrapper.
pub(crate) struct NodeWriter {
  node: String,
  fanout: Arc<Fanout>,
  stop: CancellationToken,
  counters: Arc<Counters>,
  /// Set for sources: written tuples enter the topology here.
  stamps_entry: bool,
}

impl NodeWriter {
  pub(crate) fn new(
    node: String,
    fanout: Arc<Fanout>,
    stop: CancellationToken,
    counters: Arc<Counters>,
    stamps_entry: bool,
  ) -> Self {
    Self {
      node,
      fanout,
      stop,
      counters,
      stamps_entry,
    }
  }
}

#[async_trait]
impl Writer for NodeWriter {
  async fn write(&self, _ctx: &Context, mut tuple: Arc<Tuple>) -> Result<(), WriteError> {
    if self.stop.is_cancelled() {
      return Err(WriteError::Closed(self.node.clone()));
    }
    if self.stamps_entry {
      Arc::make_mut(&mut tuple).proc_timestamp = Utc::now();
    }
    let dropped = self.fanout.deliver(&self.node, &tuple).await;
    self.counters.emitted.fetch_add(1, Ordering::Relaxed);
    if dropped > 0 {
      self.counters.dropped.fetch_add(dropped, Ordering::Relaxed);
    }
    Ok(())
  }
}
