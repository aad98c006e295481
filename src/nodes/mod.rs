//! # Built-in Nodes
//!
//! Small, general-purpose node implementations:
//!
//! - **Sources**: [`TupleEmitterSource`] writes tuples on request from an
//!   [`EmitterHandle`].
//! - **Boxes**: [`ForwardBox`] passes tuples through; [`MapBox`] applies a
//!   closure.
//! - **Sinks**: [`TupleCollectorSink`] keeps everything it receives for
//!   inspection through a [`CollectorHandle`].

pub mod collector;
pub mod emitter;
pub mod forward;
pub mod map;

pub use collector::{CollectorHandle, TupleCollectorSink};
pub use emitter::{EmitterHandle, SEQ_KEY, TupleEmitterSource};
pub use forward::ForwardBox;
pub use map::MapBox;
