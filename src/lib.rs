//! # StreamWeave Topology
//!
//! A dataflow runtime for streaming tuples through a graph of named nodes.
//!
//! A topology is made of three kinds of nodes:
//!
//! - **Sources** originate tuples.
//! - **Boxes** transform tuples and write results downstream.
//! - **Sinks** consume tuples.
//!
//! Every node runs on its own task and is isolated from the others: an error
//! or a panic inside one node stops that node only. Downstream nodes that
//! survive can be rewired to another upstream while the topology keeps
//! running.
//!
//! ## Key Features
//!
//! - **Unique, race-free registration**: names are compared case-insensitively
//!   across all roles.
//! - **Observable lifecycle**: every node and the topology itself move through
//!   `Created → Starting → Running → Stopping → Stopped`, and any number of
//!   tasks can wait for a state.
//! - **Single `init`/`terminate`**: lifecycle hooks run exactly once, even when
//!   the node fails or panics.
//! - **Per-edge FIFO**: tuples from one producer reach a consumer in emission
//!   order.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use streamweave_topology::nodes::{ForwardBox, TupleCollectorSink, TupleEmitterSource};
//! use streamweave_topology::{Context, DefaultTopology, InputConfig, NodeConfig};
//!
//! # async fn run() -> Result<(), streamweave_topology::TopologyError> {
//! let topology = DefaultTopology::new(Context::default(), "quick_start");
//! let (source, emitter) = TupleEmitterSource::new();
//! let (sink, collected) = TupleCollectorSink::new();
//!
//! topology.add_source("numbers", source, NodeConfig::default()).await?;
//! let pass = topology.add_box("pass", ForwardBox, NodeConfig::default()).await?;
//! let out = topology.add_sink("out", sink, NodeConfig::default()).await?;
//! pass.input("numbers", InputConfig::default())?;
//! out.input("pass", InputConfig::default())?;
//!
//! topology.start().await?;
//! emitter.emit_tuples(10).await;
//! assert_eq!(collected.wait(10).await, 10);
//! topology.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! The library logs through `tracing` and installs no subscriber.

// Documentation enforcement - treat missing docs as errors
#![deny(missing_docs)]

/// Runtime configuration loaded from JSON.
pub mod config;
/// Topology-scoped context passed to every node call.
pub mod context;
/// Lenient conversions between value kinds.
pub mod conversions;
/// Error types.
pub mod error;
/// Node traits implemented by user code.
pub mod node;
/// Built-in sources, boxes and sinks.
pub mod nodes;
/// Lifecycle states and state handles.
pub mod state;
/// Failure reports for node failures.
pub mod supervision;
/// Logical timestamps for tuple ordering.
pub mod time;
/// Node registry, wiring and the topology controller.
pub mod topology;
/// Tuples: named values plus delivery metadata.
pub mod tuple;
/// The tagged value model.
pub mod value;
/// Writer interface and fan-out delivery.
pub mod writer;

pub use config::{InputConfig, NodeConfig, TopologyConfig};
pub use context::Context;
pub use error::{ConversionError, NodeError, NodeFailure, Stage, TopologyError, WriteError};
pub use node::{NodeType, Processor, Sink, Source, Stateful};
pub use state::{NodeState, StateHandle};
pub use supervision::FailureReport;
pub use time::LogicalTime;
pub use topology::{
  BoxNode, DefaultTopology, Node, NodeStatus, SinkNode, SourceNode, TopologyStatus,
};
pub use tuple::Tuple;
pub use value::{Map, Value, ValueType};
pub use writer::Writer;

#[cfg(test)]
mod conversions_test;
#[cfg(test)]
mod tuple_test;
#[cfg(test)]
mod value_test;
#[cfg(test)]
mod writer_test;
