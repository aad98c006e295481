//! End-to-end failure isolation and manual recovery.
//!
//! A box in the middle of `source -> box -> sink` panics. The box stops on its
//! own, the source and sink keep running, and the sink is rewired straight to
//! the source without restarting anything.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use streamweave_topology::nodes::{SEQ_KEY, TupleCollectorSink, TupleEmitterSource};
use streamweave_topology::{
  Context, DefaultTopology, InputConfig, NodeConfig, NodeError, NodeState, Processor, Stage,
  Tuple, Writer,
};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

/// Forwards tuples but panics on the configured call.
struct PanicAt {
  call: usize,
  seen: Arc<AtomicUsize>,
}

#[async_trait]
impl Processor for PanicAt {
  async fn process(
    &mut self,
    ctx: &Context,
    tuple: Arc<Tuple>,
    writer: &dyn Writer,
  ) -> Result<(), NodeError> {
    let n = self.seen.fetch_add(1, Ordering::SeqCst) + 1;
    if n == self.call {
      panic!("box failed on call {n}");
    }
    writer.write(ctx, tuple).await?;
    Ok(())
  }
}

#[tokio::test]
async fn sink_recovers_by_rewiring_to_the_source() {
  let _ = tracing_subscriber::fmt().with_test_writer().try_init();

  let topology = DefaultTopology::new(Context::default(), "recovery");
  let mut failures = topology.subscribe_failures();
  let (source, emitter) = TupleEmitterSource::new();
  let (sink, collected) = TupleCollectorSink::new();
  let seen = Arc::new(AtomicUsize::new(0));

  let source_node = topology
    .add_source("source", source, NodeConfig::default())
    .await
    .unwrap();
  let box_node = topology
    .add_box(
      "box",
      PanicAt {
        call: 1,
        seen: Arc::clone(&seen),
      },
      NodeConfig::default(),
    )
    .await
    .unwrap();
  let sink_node = topology
    .add_sink("sink", sink, NodeConfig::default())
    .await
    .unwrap();
  box_node.input("source", InputConfig::default()).unwrap();
  sink_node.input("box", InputConfig::default()).unwrap();

  topology.start().await.unwrap();
  assert_eq!(emitter.emit_tuples(5).await, 5);

  assert_eq!(
    timeout(WAIT, box_node.state().wait(NodeState::Stopped))
      .await
      .unwrap(),
    NodeState::Stopped
  );
  let report = timeout(WAIT, failures.recv()).await.unwrap().unwrap();
  assert_eq!(report.node, "box");
  assert!(report.failure.is_panic());
  assert_eq!(report.failure.stage(), Stage::Process);
  assert_eq!(seen.load(Ordering::SeqCst), 1);

  // The rest of the topology is untouched.
  assert_eq!(source_node.state().get(), NodeState::Running);
  assert_eq!(sink_node.state().get(), NodeState::Running);
  assert!(collected.is_empty());

  sink_node.input("source", InputConfig::default()).unwrap();
  assert_eq!(emitter.emit_tuples(3).await, 3);
  assert_eq!(timeout(WAIT, collected.wait(3)).await.unwrap(), 3);

  timeout(WAIT, topology.stop()).await.unwrap();
  let tuples = collected.tuples();
  assert_eq!(tuples.len(), 3);
  assert!(tuples.iter().all(|t| t.input_name == "source"));
  let seqs: Vec<i64> = tuples.iter().map(|t| t.get_int(SEQ_KEY).unwrap()).collect();
  assert_eq!(seqs, vec![5, 6, 7]);

  let status = topology.status();
  assert!(status.nodes.iter().all(|n| n.state == NodeState::Stopped));
  assert_eq!(
    status
      .nodes
      .iter()
      .find(|n| n.name == "box")
      .and_then(|n| n.failure.clone())
      .map(|f| f.stage()),
    Some(Stage::Process)
  );
}

#[tokio::test]
async fn rewired_sink_keeps_its_name_and_inputs() {
  let topology = DefaultTopology::new(Context::default(), "rewire");
  let (first, first_emitter) = TupleEmitterSource::new();
  let (second, second_emitter) = TupleEmitterSource::new();
  let (sink, collected) = TupleCollectorSink::new();

  let first = topology
    .add_source("first", first, NodeConfig::default())
    .await
    .unwrap();
  topology
    .add_source("second", second, NodeConfig::default())
    .await
    .unwrap();
  let sink = topology
    .add_sink("sink", sink, NodeConfig::default())
    .await
    .unwrap();
  sink.input("first", InputConfig::named("primary")).unwrap();
  topology.start().await.unwrap();

  first_emitter.emit_tuples(2).await;
  timeout(WAIT, collected.wait(2)).await.unwrap();

  // Dropping the only handle exhausts the first source.
  drop(first_emitter);
  assert_eq!(
    timeout(WAIT, first.state().wait(NodeState::Stopped))
      .await
      .unwrap(),
    NodeState::Stopped
  );
  assert!(first.failure().is_none());

  sink.input("second", InputConfig::named("backup")).unwrap();
  second_emitter.emit_tuples(1).await;
  timeout(WAIT, collected.wait(3)).await.unwrap();

  let labels: Vec<String> = collected
    .tuples()
    .iter()
    .map(|t| t.input_name.clone())
    .collect();
  assert_eq!(labels, vec!["primary", "primary", "backup"]);
  assert_eq!(sink.status().inputs, vec!["first", "second"]);
  timeout(WAIT, topology.stop()).await.unwrap();
}
