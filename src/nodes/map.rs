//! # Map Box
//!
//! A box that applies a closure to each input tuple. The closure receives the
//! shared tuple by reference and returns:
//!
//! - `Ok(Some(tuple))` to write a new tuple downstream,
//! - `Ok(None)` to drop the input,
//! - `Err(_)` to fail the box (it stops, like any other processing error).

use crate::context::Context;
use crate::error::NodeError;
use crate::node::Processor;
use crate::tuple::Tuple;
use crate::writer::Writer;
use async_trait::async_trait;
use std::sync::Arc;

/// Box driven by a closure.
pub struct MapBox<F> {
  function: F,
}

impl<F> MapBox<F>
where
  F: FnMut(&Tuple) -> Result<Option<Tuple>, NodeError> + Send + 'static,
{
  /// Wraps `function`.
  pub fn new(function: F) -> Self {
    Self { function }
  }
}

impl<F> std::fmt::Debug for MapBox<F> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MapBox").finish_non_exhaustive()
  }
}

#[async_trait]
impl<F> Processor for MapBox<F>
where
  F: FnMut(&Tuple) -> Result<Option<Tuple>, NodeError> + Send + 'static,
{
  async fn process(
    &mut self,
    ctx: &Context,
    tuple: Arc<Tuple>,
    writer: &dyn Writer,
  ) -> Result<(), NodeError> {
    if let Some(mapped) = (self.function)(&tuple)? {
      writer.write(ctx, Arc::new(mapped)).await?;
    }
    Ok(())
  }
}
