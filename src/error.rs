//! # Error Handling System
//!
//! Error types for the topology runtime, split along the lines of where a
//! failure is allowed to travel:
//!
//! - **TopologyError**: configuration errors (duplicate names, duplicate inputs,
//!   unknown upstreams, ...) returned synchronously from the call that caused
//!   them. The topology itself is left untouched.
//! - **NodeFailure**: lifecycle errors and recovered panics. These never
//!   propagate to unrelated callers; they drive the failing node to `Stopped`,
//!   are retained on the node and published as a
//!   [`FailureReport`](crate::supervision::FailureReport).
//! - **WriteError**: returned by [`Writer::write`](crate::writer::Writer::write)
//!   when the writing node is already shutting down.
//! - **ConversionError**: value conversion failures, local to the helper call.
//!
//! User-supplied node implementations return the boxed [`NodeError`], so any
//! error type (or a plain `&str`/`String` via `?`) can leave a node call. The
//! wrapper renders it into [`NodeFailure::Error`].

use crate::value::ValueType;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Error type returned by user node implementations.
pub type NodeError = Box<dyn std::error::Error + Send + Sync>;

/// Configuration errors raised by registry and controller calls.
#[derive(Debug, Error)]
pub enum TopologyError {
  /// Another source, box or sink already uses this name (case-insensitive).
  #[error("node name '{0}' is already used")]
  NameAlreadyUsed(String),
  /// The name is not a valid node identifier.
  #[error("invalid node name '{0}': names must start with a letter, contain only letters, digits or '_' and be at most 127 bytes")]
  InvalidName(String),
  /// The downstream node already has an input from this upstream.
  #[error("node '{node}' already has an input from '{upstream}'")]
  InputAlreadyExists {
    /// Downstream node.
    node: String,
    /// Upstream name given to `input`.
    upstream: String,
  },
  /// No node with the given name exists.
  #[error("node '{0}' does not exist")]
  NodeNotFound(String),
  /// Sinks do not emit tuples and cannot be subscribed to.
  #[error("node '{0}' is a sink and cannot be used as an upstream")]
  NotAnUpstream(String),
  /// Sources do not have upstreams.
  #[error("node '{0}' is a source and cannot have inputs")]
  SourceHasNoInputs(String),
  /// One end of the requested connection is already stopped.
  #[error("node '{0}' is already stopped")]
  NodeStopped(String),
  /// The topology is stopping or stopped and accepts no new nodes.
  #[error("topology '{0}' has already been stopped")]
  TopologyStopped(String),
  /// A node failed during `init`.
  #[error("node '{node}' failed to start: {failure}")]
  StartFailed {
    /// Node whose start-up failed.
    node: String,
    /// Normalized failure.
    failure: NodeFailure,
  },
  /// Invalid runtime configuration.
  #[error("invalid configuration: {0}")]
  Config(#[from] serde_json::Error),
  /// Reading a configuration file failed.
  #[error("cannot read configuration: {0}")]
  Io(#[from] std::io::Error),
}

/// Lifecycle call in which a node failure happened.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
  /// `Stateful::init`.
  Init,
  /// `Processor::process` or `Sink::process`.
  Process,
  /// `Source::generate_stream`.
  GenerateStream,
  /// `Stateful::terminate`.
  Terminate,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Stage::Init => "init",
      Stage::Process => "process",
      Stage::GenerateStream => "generate_stream",
      Stage::Terminate => "terminate",
    };
    f.write_str(s)
  }
}

/// A node failure normalized at the node boundary.
///
/// Returned errors and recovered panics end up as the same value so the state
/// machine has one failure transition. The raw panic payload never leaves the
/// wrapper; only its message is kept.
#[derive(Clone, Debug, Eq, Error, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeFailure {
  /// The call returned an error.
  #[error("{stage} returned an error: {message}")]
  Error {
    /// Failing call.
    stage: Stage,
    /// Rendered error.
    message: String,
  },
  /// The call panicked.
  #[error("{stage} panicked: {message}")]
  Panic {
    /// Failing call.
    stage: Stage,
    /// Panic message, when the payload was a string.
    message: String,
  },
  /// The call was still running when the stop grace period ran out.
  #[error("{stage} did not finish within the stop grace period")]
  Aborted {
    /// Call that was dropped.
    stage: Stage,
  },
  /// `terminate` was requested a second time.
  #[error("terminate has already been invoked")]
  AlreadyTerminated,
}

impl NodeFailure {
  /// Returns the stage the failure happened in.
  pub fn stage(&self) -> Stage {
    match self {
      NodeFailure::Error { stage, .. }
      | NodeFailure::Panic { stage, .. }
      | NodeFailure::Aborted { stage } => *stage,
      NodeFailure::AlreadyTerminated => Stage::Terminate,
    }
  }

  /// Returns `true` if the failure was a recovered panic.
  pub fn is_panic(&self) -> bool {
    matches!(self, NodeFailure::Panic { .. })
  }
}

/// Error returned by [`Writer::write`](crate::writer::Writer::write).
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum WriteError {
  /// The writing node has been asked to stop.
  #[error("writer of node '{0}' is closed")]
  Closed(String),
}

/// Value conversion and access errors.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConversionError {
  /// A strict accessor was used on a value of another kind.
  #[error("{actual} value cannot be accessed as {expected}")]
  TypeMismatch {
    /// Requested kind.
    expected: ValueType,
    /// Actual kind of the value.
    actual: ValueType,
  },
  /// No conversion is defined between the two kinds.
  #[error("cannot convert {from} to {to}")]
  Unsupported {
    /// Kind of the input value.
    from: ValueType,
    /// Requested kind.
    to: ValueType,
  },
  /// The numeric value does not fit the target kind.
  #[error("{value} is out of bounds for {to} conversion")]
  OutOfRange {
    /// Rejected value.
    value: f64,
    /// Requested kind.
    to: ValueType,
  },
  /// A string could not be parsed into the target kind.
  #[error("cannot parse {input:?} as {to}: {reason}")]
  Parse {
    /// Rejected input.
    input: String,
    /// Requested kind.
    to: ValueType,
    /// Parser message.
    reason: String,
  },
}
