//! # Node Traits
//!
//! This module defines the traits user code implements to take part in a
//! topology. There is one trait per role:
//!
//! - **Source**: no inputs; [`Source::generate_stream`] pushes tuples into the
//!   writer until it returns or the node is stopped.
//! - **Processor** (a *box*): [`Processor::process`] receives one tuple at a
//!   time and may write any number of tuples downstream.
//! - **Sink**: [`Sink::process`] consumes tuples terminally.
//!
//! ## Stateful capability
//!
//! Any implementation may additionally expose [`Stateful`] (`init` and
//! `terminate`). The runtime probes for it through the role trait's
//! `stateful()` method, whose default answers `None`:
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use std::sync::Arc;
//! use streamweave_topology::{Context, NodeError, Sink, Stateful, Tuple};
//!
//! struct FileSink {
//!     open: bool,
//! }
//!
//! #[async_trait]
//! impl Sink for FileSink {
//!     async fn process(&mut self, _ctx: &Context, _t: Arc<Tuple>) -> Result<(), NodeError> {
//!         Ok(())
//!     }
//!
//!     fn stateful(&mut self) -> Option<&mut dyn Stateful> {
//!         Some(self)
//!     }
//! }
//!
//! #[async_trait]
//! impl Stateful for FileSink {
//!     async fn init(&mut self, _ctx: &Context) -> Result<(), NodeError> {
//!         self.open = true;
//!         Ok(())
//!     }
//!
//!     async fn terminate(&mut self, _ctx: &Context) -> Result<(), NodeError> {
//!         self.open = false;
//!         Ok(())
//!     }
//! }
//! ```
//!
//! ## Execution guarantees
//!
//! Each node runs on its own task. Calls into one implementation never
//! overlap, so methods take `&mut self`. Errors and panics raised by any of
//! these methods stop only the node that raised them.

use crate::context::Context;
use crate::error::{NodeError, NodeFailure, Stage};
use crate::tuple::Tuple;
use crate::writer::Writer;
use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Role of a node in the topology.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
  /// Originates tuples.
  Source,
  /// Transforms tuples.
  Box,
  /// Consumes tuples.
  Sink,
}

impl fmt::Display for NodeType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      NodeType::Source => "source",
      NodeType::Box => "box",
      NodeType::Sink => "sink",
    };
    f.write_str(s)
  }
}

/// Optional `init`/`terminate` hooks.
///
/// `init` is called once before the first tuple; `terminate` is called once
/// after the last, including when the node stops because of a failure.
#[async_trait]
pub trait Stateful: Send {
  /// Prepares the node. An error keeps the node from ever running.
  async fn init(&mut self, ctx: &Context) -> Result<(), NodeError>;

  /// Releases whatever `init` acquired.
  async fn terminate(&mut self, ctx: &Context) -> Result<(), NodeError>;
}

/// A node that originates tuples.
#[async_trait]
pub trait Source: Send + 'static {
  /// Writes tuples until the stream is exhausted. Returning `Ok` means the
  /// source is finished; the node then stops normally. The future is dropped
  /// when the node is stopped.
  async fn generate_stream(&mut self, ctx: &Context, writer: &dyn Writer) -> Result<(), NodeError>;

  /// Exposes the [`Stateful`] capability, if implemented.
  fn stateful(&mut self) -> Option<&mut dyn Stateful> {
    None
  }
}

/// A node that transforms tuples (a box).
#[async_trait]
pub trait Processor: Send + 'static {
  /// Handles one tuple. The tuple is shared; copy it before modifying.
  async fn process(
    &mut self,
    ctx: &Context,
    tuple: Arc<Tuple>,
    writer: &dyn Writer,
  ) -> Result<(), NodeError>;

  /// Exposes the [`Stateful`] capability, if implemented.
  fn stateful(&mut self) -> Option<&mut dyn Stateful> {
    None
  }
}

/// A node that consumes tuples.
#[async_trait]
pub trait Sink: Send + 'static {
  /// Handles one tuple.
  async fn process(&mut self, ctx: &Context, tuple: Arc<Tuple>) -> Result<(), NodeError>;

  /// Exposes the [`Stateful`] capability, if implemented.
  fn stateful(&mut self) -> Option<&mut dyn Stateful> {
    None
  }
}

/// Runs a node call, turning a returned error or a panic into a
/// [`NodeFailure`].
pub(crate) async fn guarded<T, F>(stage: Stage, call: F) -> Result<T, NodeFailure>
where
  F: Future<Output = Result<T, NodeError>>,
{
  match AssertUnwindSafe(call).catch_unwind().await {
    Ok(Ok(value)) => Ok(value),
    Ok(Err(e)) => Err(NodeFailure::Error {
      stage,
      message: e.to_string(),
    }),
    Err(payload) => Err(NodeFailure::Panic {
      stage,
      message: panic_message(payload.as_ref()),
    }),
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "non-string panic payload".to_string()
  }
}
