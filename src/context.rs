//! Topology-scoped context.
//!
//! One [`Context`] is created per topology and handed unchanged to every
//! lifecycle and processing call. It carries the runtime configuration and the
//! topology's cancellation token, which is cancelled when the topology has
//! stopped or is dropped.

use crate::config::TopologyConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct ContextInner {
  config: TopologyConfig,
  cancel: CancellationToken,
}

/// Shared handle passed to every node call. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Context {
  inner: Arc<ContextInner>,
}

impl Context {
  /// Creates a context with the given configuration.
  pub fn new(config: TopologyConfig) -> Self {
    Self {
      inner: Arc::new(ContextInner {
        config,
        cancel: CancellationToken::new(),
      }),
    }
  }

  /// Returns the runtime configuration.
  pub fn config(&self) -> &TopologyConfig {
    &self.inner.config
  }

  /// Returns `true` once the owning topology has shut down.
  pub fn is_cancelled(&self) -> bool {
    self.inner.cancel.is_cancelled()
  }

  /// Completes once the owning topology has shut down.
  pub async fn cancelled(&self) {
    self.inner.cancel.cancelled().await
  }

  pub(crate) fn cancel(&self) {
    self.inner.cancel.cancel();
  }

  /// Token for a single node; cancelled together with the context.
  pub(crate) fn child_token(&self) -> CancellationToken {
    self.inner.cancel.child_token()
  }
}

impl Default for Context {
  fn default() -> Self {
    Self::new(TopologyConfig::default())
  }
}
