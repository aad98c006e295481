//! # Topology
//!
//! [`DefaultTopology`] owns a set of named nodes and drives their lifecycle.
//!
//! ## Building
//!
//! Nodes are registered with [`add_source`](DefaultTopology::add_source),
//! [`add_box`](DefaultTopology::add_box) and
//! [`add_sink`](DefaultTopology::add_sink). Names are unique across all roles
//! and compared case-insensitively. Boxes and sinks subscribe to an upstream
//! with `input`:
//!
//! ```rust,no_run
//! use streamweave_topology::nodes::{ForwardBox, TupleCollectorSink, TupleEmitterSource};
//! use streamweave_topology::{Context, DefaultTopology, InputConfig, NodeConfig};
//!
//! # async fn run() -> Result<(), streamweave_topology::TopologyError> {
//! let topology = DefaultTopology::new(Context::default(), "example");
//! let (emitter, handle) = TupleEmitterSource::new();
//! let (collector, collected) = TupleCollectorSink::new();
//!
//! topology.add_source("source", emitter, NodeConfig::default()).await?;
//! let forward = topology.add_box("forward", ForwardBox, NodeConfig::default()).await?;
//! let sink = topology.add_sink("sink", collector, NodeConfig::default()).await?;
//! forward.input("source", InputConfig::default())?;
//! sink.input("forward", InputConfig::default())?;
//!
//! topology.start().await?;
//! handle.emit_tuples(3).await;
//! collected.wait(3).await;
//! topology.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure and recovery
//!
//! A node whose `init`, `process` or `generate_stream` fails stops on its
//! own. Nothing else is torn down and nothing restarts automatically. The
//! failed node keeps its name; surviving downstream nodes can be pointed at
//! another upstream with a new `input` call while the topology runs.

mod node;
mod registry;

pub use node::{BoxNode, Node, NodeStatus, SinkNode, SourceNode};

use crate::config::{InputConfig, NodeConfig};
use crate::context::Context;
use crate::error::{Stage, TopologyError};
use crate::node::{NodeType, Processor, Sink, Source};
use crate::state::{NodeState, StateHandle, StateMachine};
use crate::supervision::{FailureReport, FailureReporter};
use node::{Implementation, NodeCore};
use registry::{Registry, name_key, validate_name};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// State shared by the controller and every node handle.
pub(crate) struct Shared {
  pub(crate) name: String,
  pub(crate) ctx: Context,
  pub(crate) reporter: FailureReporter,
  registry: Registry,
  state: StateMachine,
}

impl Shared {
  /// Wires `downstream` to the node registered as `upstream`.
  pub(crate) fn connect(
    &self,
    downstream: &NodeCore,
    upstream: &str,
    config: InputConfig,
  ) -> Result<(), TopologyError> {
    let producer = self
      .registry
      .get(upstream)
      .ok_or_else(|| TopologyError::NodeNotFound(upstream.to_string()))?;
    downstream.connect(&producer, upstream, config)
  }

  fn handle(self: &Arc<Self>, core: Arc<NodeCore>) -> Node {
    Node {
      core,
      shared: Arc::clone(self),
    }
  }
}

/// Point-in-time view of a topology.
#[derive(Clone, Debug, Serialize)]
pub struct TopologyStatus {
  /// Topology name.
  pub name: String,
  /// Topology-level state.
  pub state: NodeState,
  /// Every node in registration order.
  pub nodes: Vec<NodeStatus>,
}

/// The topology controller.
///
/// Dropping it cancels the topology's [`Context`], which stops every node
/// that is still running. Call [`stop`](Self::stop) to wait for a clean
/// shutdown instead.
pub struct DefaultTopology {
  shared: Arc<Shared>,
}

impl DefaultTopology {
  /// Creates an empty topology.
  pub fn new(ctx: Context, name: impl Into<String>) -> Self {
    let reporter = FailureReporter::new(ctx.config().failure_report_capacity);
    Self {
      shared: Arc::new(Shared {
        name: name.into(),
        ctx,
        reporter,
        registry: Registry::default(),
        state: StateMachine::new(),
      }),
    }
  }

  /// Name of the topology.
  pub fn name(&self) -> &str {
    &self.shared.name
  }

  /// Context handed to every node call.
  pub fn context(&self) -> &Context {
    &self.shared.ctx
  }

  /// Topology-level state. It follows the node state order.
  pub fn state(&self) -> StateHandle {
    self.shared.state.handle()
  }

  /// Registers a source.
  ///
  /// When the topology is already running the source is started right away
  /// and this call returns once it is `Running`.
  pub async fn add_source<S: Source>(
    &self,
    name: &str,
    source: S,
    config: NodeConfig,
  ) -> Result<SourceNode, TopologyError> {
    self
      .add(name, Implementation::Source(Box::new(source)), config)
      .await
      .map(SourceNode)
  }

  /// Registers a box. See [`add_source`](Self::add_source).
  pub async fn add_box<P: Processor>(
    &self,
    name: &str,
    processor: P,
    config: NodeConfig,
  ) -> Result<BoxNode, TopologyError> {
    self
      .add(name, Implementation::Box(Box::new(processor)), config)
      .await
      .map(BoxNode)
  }

  /// Registers a sink. See [`add_source`](Self::add_source).
  pub async fn add_sink<S: Sink>(
    &self,
    name: &str,
    sink: S,
    config: NodeConfig,
  ) -> Result<SinkNode, TopologyError> {
    self
      .add(name, Implementation::Sink(Box::new(sink)), config)
      .await
      .map(SinkNode)
  }

  async fn add(
    &self,
    name: &str,
    implementation: Implementation,
    config: NodeConfig,
  ) -> Result<Node, TopologyError> {
    validate_name(name)?;
    if self.shared.state.current() >= NodeState::Stopping {
      return Err(TopologyError::TopologyStopped(self.shared.name.clone()));
    }
    let capacity = config
      .inbox_capacity
      .unwrap_or(self.shared.ctx.config().inbox_capacity);
    let core = Arc::new(NodeCore::new(name, &self.shared, implementation, capacity));
    self.shared.registry.register(Arc::clone(&core))?;
    debug!(topology = %self.shared.name, node = %name, node_type = %core.node_type(), "node registered");

    // A stop may have begun after the first check and taken its snapshot
    // before this node was registered.
    let topology_state = self.shared.state.current();
    if topology_state >= NodeState::Stopping {
      core.stop().await;
      return Err(TopologyError::TopologyStopped(self.shared.name.clone()));
    }
    if topology_state >= NodeState::Starting {
      core.start();
      if core.state().wait(NodeState::Running).await != NodeState::Running {
        if let Some(failure) = core.failure().filter(|f| f.stage() == Stage::Init) {
          return Err(TopologyError::StartFailed {
            node: core.name().to_string(),
            failure,
          });
        }
        if self.shared.state.current() >= NodeState::Stopping {
          return Err(TopologyError::TopologyStopped(self.shared.name.clone()));
        }
      }
    }
    Ok(self.shared.handle(core))
  }

  /// Wires `downstream` to `upstream` by name.
  pub fn connect(
    &self,
    downstream: &str,
    upstream: &str,
    config: InputConfig,
  ) -> Result<(), TopologyError> {
    let core = self
      .shared
      .registry
      .get(downstream)
      .ok_or_else(|| TopologyError::NodeNotFound(downstream.to_string()))?;
    self.shared.connect(&core, upstream, config)
  }

  /// Looks up a node by name, case-insensitively.
  pub fn node(&self, name: &str) -> Option<Node> {
    self
      .shared
      .registry
      .get(name)
      .map(|core| self.shared.handle(core))
  }

  /// All nodes in registration order.
  pub fn nodes(&self) -> Vec<Node> {
    self
      .shared
      .registry
      .snapshot()
      .into_iter()
      .map(|core| self.shared.handle(core))
      .collect()
  }

  /// Snapshot of the topology and every node in it.
  pub fn status(&self) -> TopologyStatus {
    TopologyStatus {
      name: self.shared.name.clone(),
      state: self.shared.state.current(),
      nodes: self
        .shared
        .registry
        .snapshot()
        .iter()
        .map(|core| core.status())
        .collect(),
    }
  }

  /// Receives a [`FailureReport`] for every node failure from now on.
  pub fn subscribe_failures(&self) -> broadcast::Receiver<FailureReport> {
    self.shared.reporter.subscribe()
  }

  /// Starts every registered node: sinks first, then boxes, then sources.
  ///
  /// Each node is given the chance to reach `Running` before the next one is
  /// started, so no source emits before its consumers can receive. Returns
  /// the first `init` failure; the nodes that did start keep running.
  pub async fn start(&self) -> Result<(), TopologyError> {
    if !self.shared.state.advance(NodeState::Starting) {
      let reached = self.state().wait(NodeState::Running).await;
      if reached == NodeState::Running {
        return Ok(());
      }
      return Err(TopologyError::TopologyStopped(self.shared.name.clone()));
    }
    info!(topology = %self.shared.name, nodes = self.shared.registry.len(), "starting topology");

    let mut cores = self.shared.registry.snapshot();
    cores.sort_by_key(|core| match core.node_type() {
      NodeType::Sink => 0,
      NodeType::Box => 1,
      NodeType::Source => 2,
    });

    let mut first_failure = None;
    for core in cores {
      if !core.start() {
        continue;
      }
      if core.state().wait(NodeState::Running).await == NodeState::Running {
        continue;
      }
      if first_failure.is_some() {
        continue;
      }
      first_failure = core
        .failure()
        .filter(|failure| failure.stage() == Stage::Init)
        .map(|failure| TopologyError::StartFailed {
          node: core.name().to_string(),
          failure,
        });
    }

    if self.shared.state.advance(NodeState::Running) {
      info!(topology = %self.shared.name, "topology running");
    }
    match first_failure {
      Some(err) => {
        warn!(topology = %self.shared.name, error = %err, "topology started with failed nodes");
        Err(err)
      }
      None => Ok(()),
    }
  }

  /// Stops every node and waits until all of them are `Stopped`.
  ///
  /// Sources go first, then the remaining nodes in the order of the current
  /// wiring. Safe to call repeatedly and from several tasks at once; every
  /// caller returns once the topology is `Stopped`.
  pub async fn stop(&self) {
    if !self.shared.state.advance(NodeState::Stopping) {
      self.state().wait(NodeState::Stopped).await;
      return;
    }
    info!(topology = %self.shared.name, "stopping topology");

    loop {
      let cores = self.shared.registry.snapshot();
      for core in stop_order(&cores) {
        core.stop().await;
      }
      // Nodes registered while the stop was in progress.
      if self.shared.registry.len() == cores.len() {
        break;
      }
    }

    self.shared.ctx.cancel();
    self.shared.state.advance(NodeState::Stopped);
    info!(topology = %self.shared.name, "topology stopped");
  }
}

impl Drop for DefaultTopology {
  fn drop(&mut self) {
    self.shared.ctx.cancel();
  }
}

impl std::fmt::Debug for DefaultTopology {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("DefaultTopology")
      .field("name", &self.shared.name)
      .field("state", &self.shared.state.current())
      .field("nodes", &self.shared.registry.len())
      .finish()
  }
}

/// Orders nodes for shutdown with Kahn's algorithm over the current wiring.
///
/// Upstreams come before their downstreams and sources come before other
/// roots. Nodes that sit on a cycle are appended in registration order.
fn stop_order(cores: &[Arc<NodeCore>]) -> Vec<Arc<NodeCore>> {
  let keys: Vec<String> = cores.iter().map(|core| name_key(core.name())).collect();
  let index: HashMap<&str, usize> = keys
    .iter()
    .enumerate()
    .map(|(i, key)| (key.as_str(), i))
    .collect();

  let mut in_degree = vec![0usize; cores.len()];
  let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); cores.len()];
  for (downstream, core) in cores.iter().enumerate() {
    for upstream in core.upstream_names() {
      if let Some(&upstream) = index.get(name_key(&upstream).as_str()) {
        adjacency[upstream].push(downstream);
        in_degree[downstream] += 1;
      }
    }
  }

  let mut roots: Vec<usize> = (0..cores.len()).filter(|&i| in_degree[i] == 0).collect();
  roots.sort_by_key(|&i| cores[i].node_type() != NodeType::Source);
  let mut queue: VecDeque<usize> = roots.into();

  let mut visited = vec![false; cores.len()];
  let mut order = Vec::with_capacity(cores.len());
  while let Some(i) = queue.pop_front() {
    visited[i] = true;
    order.push(Arc::clone(&cores[i]));
    for &next in &adjacency[i] {
      in_degree[next] -= 1;
      if in_degree[next] == 0 {
        queue.push_back(next);
      }
    }
  }

  order.extend(
    cores
      .iter()
      .enumerate()
      .filter(|(i, _)| !visited[*i])
      .map(|(_, core)| Arc::clone(core)),
  );
  order
}
