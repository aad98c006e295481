//! # Tuple Emitter
//!
//! A source driven from outside the topology. [`TupleEmitterSource::new`]
//! returns the source together with an [`EmitterHandle`]; every call on the
//! handle is turned into writes by the running source and acknowledged once
//! the tuples have been handed to all downstream inboxes.
//!
//! The source finishes when every handle has been dropped.

use crate::context::Context;
use crate::error::NodeError;
use crate::node::Source;
use crate::time::LogicalTime;
use crate::tuple::Tuple;
use crate::value::Value;
use crate::writer::Writer;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Key of the sequence number in generated tuples.
pub const SEQ_KEY: &str = "seq";

enum EmitRequest {
  Generated {
    count: usize,
    ack: oneshot::Sender<usize>,
  },
  Tuple {
    tuple: Tuple,
    ack: oneshot::Sender<usize>,
  },
}

/// Source that writes tuples on request.
#[derive(Debug)]
pub struct TupleEmitterSource {
  requests: mpsc::UnboundedReceiver<EmitRequest>,
  next: u64,
}

/// Requests writes from a [`TupleEmitterSource`].
#[derive(Clone, Debug)]
pub struct EmitterHandle {
  requests: mpsc::UnboundedSender<EmitRequest>,
}

impl TupleEmitterSource {
  /// Creates the source and its handle.
  pub fn new() -> (Self, EmitterHandle) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
      Self {
        requests: rx,
        next: 0,
      },
      EmitterHandle { requests: tx },
    )
  }

  fn generate(&mut self) -> Tuple {
    let seq = self.next;
    self.next += 1;
    let mut tuple = Tuple::default().with_time(LogicalTime::new(seq));
    tuple.set(SEQ_KEY, Value::Int(seq as i64));
    tuple
  }
}

impl EmitterHandle {
  /// Writes `count` generated tuples carrying an increasing `seq` value.
  ///
  /// Returns how many were written, which is less than `count` if the source
  /// stopped first.
  pub async fn emit_tuples(&self, count: usize) -> usize {
    let (ack, done) = oneshot::channel();
    if self
      .requests
      .send(EmitRequest::Generated { count, ack })
      .is_err()
    {
      return 0;
    }
    done.await.unwrap_or(0)
  }

  /// Writes one caller-built tuple. Returns `false` if the source stopped.
  pub async fn emit(&self, tuple: Tuple) -> bool {
    let (ack, done) = oneshot::channel();
    if self.requests.send(EmitRequest::Tuple { tuple, ack }).is_err() {
      return false;
    }
    done.await.unwrap_or(0) == 1
  }
}

#[async_trait]
impl Source for TupleEmitterSource {
  async fn generate_stream(&mut self, ctx: &Context, writer: &dyn Writer) -> Result<(), NodeError> {
    while let Some(request) = self.requests.recv().await {
      let (tuples, ack) = match request {
        EmitRequest::Generated { count, ack } => {
          let tuples: Vec<Tuple> = (0..count).map(|_| self.generate()).collect();
          (tuples, ack)
        }
        EmitRequest::Tuple { tuple, ack } => (vec![tuple], ack),
      };
      let mut written = 0;
      for tuple in tuples {
        if writer.write(ctx, Arc::new(tuple)).await.is_err() {
          break;
        }
        written += 1;
      }
      let _ = ack.send(written);
    }
    debug!("all emitter handles dropped");
    Ok(())
  }
}
