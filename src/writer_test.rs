//! Tests for fan-out delivery and the node writer.

use crate::context::Context;
use crate::error::WriteError;
use crate::tuple::Tuple;
use crate::value::Value;
use crate::writer::{Counters, Delivery, Fanout, NodeWriter, Subscriber, Writer};
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn subscriber(node: &str, label: &str, capacity: usize) -> (Subscriber, mpsc::Receiver<Delivery>) {
  let (tx, rx) = mpsc::channel(capacity);
  (
    Subscriber {
      node: node.to_string(),
      input_name: Arc::from(label),
      inbox: tx,
    },
    rx,
  )
}

fn numbered(n: i64) -> Arc<Tuple> {
  let mut tuple = Tuple::default();
  tuple.set("n", n);
  Arc::new(tuple)
}

#[test]
fn into_tuple_relabels_without_touching_other_holders() {
  let original = numbered(1);
  let delivery = Delivery {
    input_name: Arc::from("left"),
    tuple: Arc::clone(&original),
  };
  let received = delivery.into_tuple();
  assert_eq!(received.input_name, "left");
  assert!(original.input_name.is_empty());
  assert_eq!(received.get("n"), Some(&Value::Int(1)));
}

#[test]
fn into_tuple_keeps_allocation_when_label_matches() {
  let mut tuple = Tuple::default();
  tuple.input_name = "src".to_string();
  let tuple = Arc::new(tuple);
  let delivery = Delivery {
    input_name: Arc::from("src"),
    tuple: Arc::clone(&tuple),
  };
  assert!(Arc::ptr_eq(&delivery.into_tuple(), &tuple));
}

#[tokio::test]
async fn deliver_reaches_every_subscriber_in_order() {
  let fanout = Fanout::default();
  let (a, mut a_rx) = subscriber("a", "src", 8);
  let (b, mut b_rx) = subscriber("b", "src", 8);
  fanout.subscribe(a);
  fanout.subscribe(b);
  assert_eq!(fanout.downstream_names(), vec!["a", "b"]);

  for n in 0..5 {
    assert_eq!(fanout.deliver("src", &numbered(n)).await, 0);
  }
  for rx in [&mut a_rx, &mut b_rx] {
    for n in 0..5 {
      let tuple = rx.recv().await.unwrap().into_tuple();
      assert_eq!(tuple.get_int("n"), Ok(n));
    }
  }
}

#[tokio::test]
async fn closed_subscribers_are_dropped_and_pruned() {
  let fanout = Fanout::default();
  let (live, mut live_rx) = subscriber("live", "src", 8);
  let (dead, dead_rx) = subscriber("dead", "src", 8);
  fanout.subscribe(live);
  fanout.subscribe(dead);
  drop(dead_rx);

  assert_eq!(fanout.deliver("src", &numbered(1)).await, 1);
  assert_eq!(fanout.downstream_names(), vec!["live"]);
  assert!(live_rx.recv().await.is_some());
}

#[tokio::test]
async fn snapshot_is_unaffected_by_later_subscriptions() {
  let fanout = Fanout::default();
  let (first, _first_rx) = subscriber("first", "src", 1);
  fanout.subscribe(first);
  let before = fanout.snapshot();
  let (second, _second_rx) = subscriber("second", "src", 1);
  fanout.subscribe(second);
  assert_eq!(before.len(), 1);
  assert_eq!(fanout.snapshot().len(), 2);
}

#[tokio::test]
async fn node_writer_counts_and_closes_on_stop() {
  let fanout = Arc::new(Fanout::default());
  let (sub, mut rx) = subscriber("sink", "src", 4);
  fanout.subscribe(sub);
  let stop = CancellationToken::new();
  let counters = Arc::new(Counters::default());
  let writer = NodeWriter::new(
    "src".to_string(),
    Arc::clone(&fanout),
    stop.clone(),
    Arc::clone(&counters),
    false,
  );
  let ctx = Context::default();

  writer.write(&ctx, numbered(1)).await.unwrap();
  assert_eq!(counters.emitted.load(Ordering::Relaxed), 1);
  assert_eq!(rx.recv().await.unwrap().into_tuple().input_name, "src");

  drop(rx);
  writer.write(&ctx, numbered(2)).await.unwrap();
  assert_eq!(counters.dropped.load(Ordering::Relaxed), 1);

  stop.cancel();
  assert_eq!(
    writer.write(&ctx, numbered(3)).await,
    Err(WriteError::Closed("src".to_string()))
  );
  assert_eq!(counters.emitted.load(Ordering::Relaxed), 2);
}

fn writer_for(fanout: &Arc<Fanout>, stamps_entry: bool) -> NodeWriter {
  NodeWriter::new(
    "node".to_string(),
    Arc::clone(fanout),
    CancellationToken::new(),
    Arc::new(Counters::default()),
    stamps_entry,
  )
}

#[tokio::test]
async fn source_writes_stamp_the_entry_time() {
  let long_ago = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
  let mut tuple = Tuple::default();
  tuple.proc_timestamp = long_ago;
  tuple.timestamp = long_ago;
  let tuple = Arc::new(tuple);
  let ctx = Context::default();

  let fanout = Arc::new(Fanout::default());
  let (sub, mut rx) = subscriber("down", "node", 4);
  fanout.subscribe(sub);

  let before = Utc::now();
  writer_for(&fanout, true)
    .write(&ctx, Arc::clone(&tuple))
    .await
    .unwrap();
  let stamped = rx.recv().await.unwrap().into_tuple();
  assert!(stamped.proc_timestamp >= before);
  assert_eq!(stamped.timestamp, long_ago);
  assert_eq!(tuple.proc_timestamp, long_ago);

  writer_for(&fanout, false)
    .write(&ctx, Arc::clone(&tuple))
    .await
    .unwrap();
  let forwarded = rx.recv().await.unwrap().into_tuple();
  assert_eq!(forwarded.proc_timestamp, long_ago);
}
