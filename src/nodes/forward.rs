//! Pass-through box.

use crate::context::Context;
use crate::error::NodeError;
use crate::node::Processor;
use crate::tuple::Tuple;
use crate::writer::Writer;
use async_trait::async_trait;
use std::sync::Arc;

/// Box that re-delivers every input tuple unchanged.
///
/// The tuple is forwarded as the same `Arc`; each downstream edge relabels it
/// with its own input name on arrival.
#[derive(Clone, Copy, Debug, Default)]
pub struct ForwardBox;

#[async_trait]
impl Processor for ForwardBox {
  async fn process(
    &mut self,
    ctx: &Context,
    tuple: Arc<Tuple>,
    writer: &dyn Writer,
  ) -> Result<(), NodeError> {
    writer.write(ctx, tuple).await?;
    Ok(())
  }
}
