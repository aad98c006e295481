//! # Node Wrapper
//!
//! [`NodeCore`] is the envelope the runtime puts around every user
//! implementation. It owns the node's state machine, its inbox, its subscriber
//! set and the task that drives it.
//!
//! ## Control path
//!
//! A started node runs on one tokio task:
//!
//! 1. `Created → Starting`; `init` runs if the implementation is stateful.
//! 2. `Starting → Running`; tuples are taken from the inbox one at a time and
//!    handed to `process` (sources run `generate_stream` instead).
//! 3. On a stop request, an exhausted source, or a failure: `→ Stopping`, the
//!    inbox is closed, `terminate` runs once, `→ Stopped`.
//!
//! Every call into user code goes through [`guarded`](crate::node::guarded),
//! so a returned error and a panic produce the same [`NodeFailure`]. Once a
//! stop has been requested, in-flight calls get the configured stop grace
//! before their future is dropped.
//!
//! The state has a single writer: whoever took the node's launch. That is the
//! node's task once started, or the stop path for a node that never started.

use super::Shared;
use super::registry::name_key;
use crate::config::InputConfig;
use crate::context::Context;
use crate::error::{NodeError, NodeFailure, Stage, TopologyError};
use crate::node::{NodeType, Processor, Sink, Source, Stateful, guarded};
use crate::state::{NodeState, StateHandle, StateMachine};
use crate::supervision::{FailureReport, FailureReporter};
use crate::writer::{Counters, Delivery, Fanout, NodeWriter, Subscriber};
use chrono::Utc;
use serde::Serialize;
use std::future::Future;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Everything a node needs to run, taken exactly once by whoever drives it.
pub(crate) enum Launch {
  Source(Box<dyn Source>),
  Box(Box<dyn Processor>, mpsc::Receiver<Delivery>),
  Sink(Box<dyn Sink>, mpsc::Receiver<Delivery>),
}

impl Launch {
  fn node_type(&self) -> NodeType {
    match self {
      Launch::Source(_) => NodeType::Source,
      Launch::Box(..) => NodeType::Box,
      Launch::Sink(..) => NodeType::Sink,
    }
  }
}

/// Records whether `terminate` has been invoked.
#[derive(Debug, Default)]
pub(crate) struct TerminationRecord(AtomicBool);

impl TerminationRecord {
  /// Marks `terminate` as invoked; fails if it already was.
  pub(crate) fn begin(&self) -> Result<(), NodeFailure> {
    if self.0.swap(true, Ordering::AcqRel) {
      Err(NodeFailure::AlreadyTerminated)
    } else {
      Ok(())
    }
  }
}

/// An upstream subscription held by a box or sink.
#[derive(Clone, Debug)]
struct InputRecord {
  key: String,
  upstream: String,
}

pub(crate) struct NodeCore {
  name: String,
  node_type: NodeType,
  topology: String,
  ctx: Context,
  state: StateMachine,
  stop: CancellationToken,
  /// Kept open for the node's lifetime so the inbox only closes on stop.
  inbox: Option<mpsc::Sender<Delivery>>,
  fanout: Option<Arc<Fanout>>,
  inputs: Mutex<Vec<InputRecord>>,
  failure: Mutex<Option<NodeFailure>>,
  launch: Mutex<Option<Launch>>,
  task: Mutex<Option<JoinHandle<()>>>,
  counters: Arc<Counters>,
  terminated: TerminationRecord,
  reporter: FailureReporter,
}

impl NodeCore {
  pub(crate) fn new(
    name: &str,
    shared: &Shared,
    implementation: Implementation,
    inbox_capacity: usize,
  ) -> Self {
    let (inbox, launch) = match implementation {
      Implementation::Source(source) => (None, Launch::Source(source)),
      Implementation::Box(processor) => {
        let (tx, rx) = mpsc::channel(inbox_capacity.max(1));
        (Some(tx), Launch::Box(processor, rx))
      }
      Implementation::Sink(sink) => {
        let (tx, rx) = mpsc::channel(inbox_capacity.max(1));
        (Some(tx), Launch::Sink(sink, rx))
      }
    };
    let node_type = launch.node_type();
    let fanout = match node_type {
      NodeType::Sink => None,
      NodeType::Source | NodeType::Box => Some(Arc::new(Fanout::default())),
    };
    Self {
      name: name.to_string(),
      node_type,
      topology: shared.name.clone(),
      ctx: shared.ctx.clone(),
      state: StateMachine::new(),
      stop: shared.ctx.child_token(),
      inbox,
      fanout,
      inputs: Mutex::new(Vec::new()),
      failure: Mutex::new(None),
      launch: Mutex::new(Some(launch)),
      task: Mutex::new(None),
      counters: Arc::new(Counters::default()),
      terminated: TerminationRecord::default(),
      reporter: shared.reporter.clone(),
    }
  }

  pub(crate) fn name(&self) -> &str {
    &self.name
  }

  pub(crate) fn node_type(&self) -> NodeType {
    self.node_type
  }

  pub(crate) fn state(&self) -> StateHandle {
    self.state.handle()
  }

  pub(crate) fn failure(&self) -> Option<NodeFailure> {
    self
      .failure
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  pub(crate) fn upstream_names(&self) -> Vec<String> {
    self
      .inputs
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .iter()
      .map(|input| input.upstream.clone())
      .collect()
  }

  pub(crate) fn downstream_names(&self) -> Vec<String> {
    self
      .fanout
      .as_ref()
      .map(|fanout| fanout.downstream_names())
      .unwrap_or_default()
  }

  pub(crate) fn status(&self) -> NodeStatus {
    NodeStatus {
      name: self.name.clone(),
      node_type: self.node_type,
      state: self.state.current(),
      processed: self.counters.processed.load(Ordering::Relaxed),
      emitted: self.counters.emitted.load(Ordering::Relaxed),
      dropped: self.counters.dropped.load(Ordering::Relaxed),
      inputs: self.upstream_names(),
      outputs: self.downstream_names(),
      failure: self.failure(),
    }
  }

  /// Spawns the node's task. Returns `false` if the node was already started
  /// or stopped.
  pub(crate) fn start(self: &Arc<Self>) -> bool {
    let launch = self
      .launch
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .take();
    let Some(launch) = launch else {
      return false;
    };
    let core = Arc::clone(self);
    let handle = tokio::spawn(async move { core.run(launch).await });
    *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    true
  }

  /// Requests a stop and waits until the node is `Stopped` and its task has
  /// finished. Safe to call any number of times.
  pub(crate) async fn stop(&self) {
    self.stop.cancel();
    let unstarted = self
      .launch
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .take();
    if let Some(launch) = unstarted {
      drop(launch);
      self.state.advance(NodeState::Stopping);
      self.state.advance(NodeState::Stopped);
      info!(topology = %self.topology, node = %self.name, "stopped node that was never started");
    }
    self.state.handle().wait(NodeState::Stopped).await;
    let task = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(task) = task {
      if let Err(e) = task.await {
        warn!(topology = %self.topology, node = %self.name, error = %e, "node task did not complete");
      }
    }
  }

  /// Subscribes `self` to `upstream`. `requested` is the upstream name as the
  /// caller spelled it.
  pub(crate) fn connect(
    &self,
    upstream: &NodeCore,
    requested: &str,
    config: InputConfig,
  ) -> Result<(), TopologyError> {
    let Some(inbox) = &self.inbox else {
      return Err(TopologyError::SourceHasNoInputs(self.name.clone()));
    };
    let Some(fanout) = &upstream.fanout else {
      return Err(TopologyError::NotAnUpstream(upstream.name.clone()));
    };
    let key = name_key(&upstream.name);
    // Held while the upstream's subscriber set changes so both sides update
    // as one step. Lock order: downstream inputs, then upstream subscribers.
    let mut inputs = self.inputs.lock().unwrap_or_else(PoisonError::into_inner);
    if inputs.iter().any(|input| input.key == key) {
      return Err(TopologyError::InputAlreadyExists {
        node: self.name.clone(),
        upstream: requested.to_string(),
      });
    }
    if self.state.current() >= NodeState::Stopping {
      return Err(TopologyError::NodeStopped(self.name.clone()));
    }
    if upstream.state.current() >= NodeState::Stopping {
      return Err(TopologyError::NodeStopped(upstream.name.clone()));
    }
    let input_name = config.input_name.unwrap_or_else(|| upstream.name.clone());
    fanout.subscribe(Subscriber {
      node: self.name.clone(),
      input_name: Arc::from(input_name.as_str()),
      inbox: inbox.clone(),
    });
    inputs.push(InputRecord {
      key,
      upstream: upstream.name.clone(),
    });
    info!(
      topology = %self.topology,
      node = %self.name,
      upstream = %upstream.name,
      input_name = %input_name,
      "connected input"
    );
    Ok(())
  }

  fn record_failure(&self, failure: NodeFailure) {
    error!(
      topology = %self.topology,
      node = %self.name,
      stage = %failure.stage(),
      error = %failure,
      "node failed"
    );
    {
      let mut slot = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
      if slot.is_none() {
        *slot = Some(failure.clone());
      }
    }
    self.reporter.report(FailureReport {
      topology: self.topology.clone(),
      node: self.name.clone(),
      node_type: self.node_type,
      failure,
      at: Utc::now(),
    });
  }

  fn writer(&self) -> NodeWriter {
    NodeWriter::new(
      self.name.clone(),
      self.fanout.clone().unwrap_or_default(),
      self.stop.clone(),
      Arc::clone(&self.counters),
      self.node_type == NodeType::Source,
    )
  }

  /// Runs a user call, dropping it once a stop has been requested and the
  /// grace period has passed.
  async fn bounded<T, F>(&self, stage: Stage, call: F) -> Result<T, NodeFailure>
  where
    F: Future<Output = Result<T, NodeError>>,
  {
    let stop = self.stop.clone();
    let grace = self.ctx.config().stop_grace();
    tokio::select! {
      result = guarded(stage, call) => result,
      _ = async move {
        stop.cancelled().await;
        tokio::time::sleep(grace).await;
      } => Err(NodeFailure::Aborted { stage }),
    }
  }

  async fn run(self: Arc<Self>, launch: Launch) {
    match launch {
      Launch::Source(source) => self.run_source(source).await,
      Launch::Box(processor, inbox) => self.run_box(processor, inbox).await,
      Launch::Sink(sink, inbox) => self.run_sink(sink, inbox).await,
    }
  }

  /// `Created → Starting`. Returns `false` when a stop was requested before
  /// the task got going; the node is then moved straight to `Stopped`.
  fn begin(&self) -> bool {
    if self.stop.is_cancelled() {
      self.state.advance(NodeState::Stopping);
      self.state.advance(NodeState::Stopped);
      return false;
    }
    self.state.advance(NodeState::Starting);
    debug!(topology = %self.topology, node = %self.name, "node starting");
    true
  }

  async fn init(&self, stateful: Option<&mut dyn Stateful>) -> Result<(), NodeFailure> {
    match stateful {
      Some(stateful) => self.bounded(Stage::Init, stateful.init(&self.ctx)).await,
      None => Ok(()),
    }
  }

  fn enter_running(&self) {
    self.state.advance(NodeState::Running);
    info!(topology = %self.topology, node = %self.name, node_type = %self.node_type, "node running");
  }

  /// `→ Stopping`, close the inbox, `terminate` once, `→ Stopped`.
  async fn finish(
    &self,
    stateful: Option<&mut dyn Stateful>,
    inbox: Option<mpsc::Receiver<Delivery>>,
  ) {
    self.state.advance(NodeState::Stopping);
    self.stop.cancel();
    if let Some(mut inbox) = inbox {
      inbox.close();
    }
    if let Some(stateful) = stateful {
      match self.terminated.begin() {
        Ok(()) => {
          if let Err(failure) = self
            .bounded(Stage::Terminate, stateful.terminate(&self.ctx))
            .await
          {
            self.record_failure(failure);
          }
        }
        Err(failure) => self.record_failure(failure),
      }
    }
    self.state.advance(NodeState::Stopped);
    info!(topology = %self.topology, node = %self.name, "node stopped");
  }

  async fn run_source(&self, mut source: Box<dyn Source>) {
    if !self.begin() {
      return;
    }
    match self.init(source.stateful()).await {
      Ok(()) => {
        self.enter_running();
        let writer = self.writer();
        let generated = tokio::select! {
          biased;
          _ = self.stop.cancelled() => None,
          result = guarded(Stage::GenerateStream, source.generate_stream(&self.ctx, &writer)) => Some(result),
        };
        match generated {
          Some(Ok(())) => debug!(topology = %self.topology, node = %self.name, "source exhausted"),
          Some(Err(failure)) => self.record_failure(failure),
          None => {}
        }
      }
      Err(failure) => self.record_failure(failure),
    }
    self.finish(source.stateful(), None).await;
  }

  async fn run_box(&self, mut processor: Box<dyn Processor>, mut inbox: mpsc::Receiver<Delivery>) {
    if !self.begin() {
      inbox.close();
      return;
    }
    match self.init(processor.stateful()).await {
      Ok(()) => {
        self.enter_running();
        let writer = self.writer();
        loop {
          let delivery = tokio::select! {
            biased;
            _ = self.stop.cancelled() => break,
            delivery = inbox.recv() => match delivery {
              Some(delivery) => delivery,
              None => break,
            },
          };
          let tuple = delivery.into_tuple();
          let processed = self
            .bounded(Stage::Process, processor.process(&self.ctx, tuple, &writer))
            .await;
          if let Err(failure) = processed {
            self.record_failure(failure);
            break;
          }
          self.counters.processed.fetch_add(1, Ordering::Relaxed);
        }
      }
      Err(failure) => self.record_failure(failure),
    }
    self.finish(processor.stateful(), Some(inbox)).await;
  }

  async fn run_sink(&self, mut sink: Box<dyn Sink>, mut inbox: mpsc::Receiver<Delivery>) {
    if !self.begin() {
      inbox.close();
      return;
    }
    match self.init(sink.stateful()).await {
      Ok(()) => {
        self.enter_running();
        loop {
          let delivery = tokio::select! {
            biased;
            _ = self.stop.cancelled() => break,
            delivery = inbox.recv() => match delivery {
              Some(delivery) => delivery,
              None => break,
            },
          };
          let tuple = delivery.into_tuple();
          let processed = self
            .bounded(Stage::Process, sink.process(&self.ctx, tuple))
            .await;
          if let Err(failure) = processed {
            self.record_failure(failure);
            break;
          }
          self.counters.processed.fetch_add(1, Ordering::Relaxed);
        }
      }
      Err(failure) => self.record_failure(failure),
    }
    self.finish(sink.stateful(), Some(inbox)).await;
  }
}

/// A user implementation tagged with its role.
pub(crate) enum Implementation {
  Source(Box<dyn Source>),
  Box(Box<dyn Processor>),
  Sink(Box<dyn Sink>),
}

/// Point-in-time view of a node.
#[derive(Clone, Debug, Serialize)]
pub struct NodeStatus {
  /// Node name as registered.
  pub name: String,
  /// Role.
  pub node_type: NodeType,
  /// Current state.
  pub state: NodeState,
  /// Tuples handled by `process` without error.
  pub processed: u64,
  /// Tuples written by this node.
  pub emitted: u64,
  /// Deliveries from this node dropped because the downstream had stopped.
  pub dropped: u64,
  /// Upstream node names.
  pub inputs: Vec<String>,
  /// Downstream node names.
  pub outputs: Vec<String>,
  /// First failure, if the node failed.
  pub failure: Option<NodeFailure>,
}

/// Handle to a registered node of any role.
#[derive(Clone)]
pub struct Node {
  pub(crate) core: Arc<NodeCore>,
  pub(crate) shared: Arc<Shared>,
}

impl Node {
  /// Name as registered.
  pub fn name(&self) -> &str {
    self.core.name()
  }

  /// Role of the node.
  pub fn node_type(&self) -> NodeType {
    self.core.node_type()
  }

  /// Handle for reading or waiting on the node's state.
  pub fn state(&self) -> StateHandle {
    self.core.state()
  }

  /// First failure recorded for this node, if any.
  pub fn failure(&self) -> Option<NodeFailure> {
    self.core.failure()
  }

  /// Snapshot of state, counters and wiring.
  pub fn status(&self) -> NodeStatus {
    self.core.status()
  }

  /// Stops this node only. Idempotent; returns once the node is `Stopped`.
  pub async fn stop(&self) {
    self.core.stop().await
  }
}

impl std::fmt::Debug for Node {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Node")
      .field("name", &self.core.name())
      .field("node_type", &self.core.node_type())
      .field("state", &self.core.state.current())
      .finish()
  }
}

/// Handle to a source node.
#[derive(Clone, Debug)]
pub struct SourceNode(pub(crate) Node);

/// Handle to a box node.
#[derive(Clone, Debug)]
pub struct BoxNode(pub(crate) Node);

/// Handle to a sink node.
#[derive(Clone, Debug)]
pub struct SinkNode(pub(crate) Node);

impl BoxNode {
  /// Subscribes this box to the node named `upstream`.
  ///
  /// Fails if the upstream does not exist, is a sink, or is already an input
  /// of this box, or if either end has stopped.
  pub fn input(&self, upstream: &str, config: InputConfig) -> Result<(), TopologyError> {
    self.0.shared.connect(&self.0.core, upstream, config)
  }
}

impl SinkNode {
  /// Subscribes this sink to the node named `upstream`.
  ///
  /// Fails if the upstream does not exist, is a sink, or is already an input
  /// of this sink, or if either end has stopped. Calling it after the
  /// previous upstream failed is how a sink is rewired.
  pub fn input(&self, upstream: &str, config: InputConfig) -> Result<(), TopologyError> {
    self.0.shared.connect(&self.0.core, upstream, config)
  }
}

macro_rules! deref_to_node {
  ($($handle:ty),*) => {
    $(
      impl Deref for $handle {
        type Target = Node;

        fn deref(&self) -> &Node {
          &self.0
        }
      }

      impl From<$handle> for Node {
        fn from(handle: $handle) -> Node {
          handle.0
        }
      }
    )*
  };
}

deref_to_node!(SourceNode, BoxNode, SinkNode);
