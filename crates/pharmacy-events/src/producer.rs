//! Buffered, fire-and-forget producer.
//!
//! [`BufferedProducer::enqueue`] pushes into a bounded local channel and
//! returns at once. A background task drains the channel through a
//! [`Transport`], bounding every send by [`DeliveryConfig::timeout`] and
//! reporting the outcome to the [`PipelineObserver`]. Dropping every producer
//! handle closes the channel; the task then flushes what is left and exits.

use std::{sync::Arc, time::Duration};

use tokio::{
  sync::mpsc::{self, error::TrySendError},
  task::JoinHandle,
};

use crate::{
  broker::{BrokerProducer, EnqueueError, Transport},
  message::OutboundRecord,
  observer::{PipelineObserver, PipelineSignal},
};

pub const DEFAULT_CAPACITY: usize = 1024;
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub struct DeliveryConfig {
  /// Maximum number of records waiting for delivery.
  pub capacity: usize,
  /// Upper bound on a single network send.
  pub timeout:  Duration,
}

impl Default for DeliveryConfig {
  fn default() -> Self {
    Self {
      capacity: DEFAULT_CAPACITY,
      timeout:  DEFAULT_DELIVERY_TIMEOUT,
    }
  }
}

/// Counters returned once the delivery task has drained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
  pub delivered: u64,
  pub failed:    u64,
}

/// The enqueue side of the local send buffer. Cheap to clone.
#[derive(Debug, Clone)]
pub struct BufferedProducer {
  tx: mpsc::Sender<OutboundRecord>,
}

/// Owns the background delivery task.
#[derive(Debug)]
pub struct DeliveryHandle {
  join: JoinHandle<DeliveryStats>,
}

impl BufferedProducer {
  /// Start the delivery task on the current runtime.
  pub fn spawn<T: Transport>(
    transport: T,
    config: DeliveryConfig,
    observer: Arc<dyn PipelineObserver>,
  ) -> (Self, DeliveryHandle) {
    let (tx, rx) = mpsc::channel(config.capacity.max(1));
    let join = tokio::spawn(deliver_all(transport, rx, config.timeout, observer));
    (Self { tx }, DeliveryHandle { join })
  }
}

impl BrokerProducer for BufferedProducer {
  fn enqueue(&self, record: OutboundRecord) -> Result<(), EnqueueError> {
    self.tx.try_send(record).map_err(|e| match e {
      TrySendError::Full(_) => EnqueueError::QueueFull,
      TrySendError::Closed(_) => EnqueueError::Closed,
    })
  }
}

impl DeliveryHandle {
  /// Wait until every producer handle is dropped and the buffer is drained.
  pub async fn flushed(self) -> DeliveryStats {
    match self.join.await {
      Ok(stats) => stats,
      Err(e) => {
        tracing::error!(target: "pharmacy::events", error = %e, "delivery task failed");
        DeliveryStats::default()
      }
    }
  }
}

async fn deliver_all<T: Transport>(
  transport: T,
  mut rx: mpsc::Receiver<OutboundRecord>,
  timeout: Duration,
  observer: Arc<dyn PipelineObserver>,
) -> DeliveryStats {
  let mut stats = DeliveryStats::default();

  while let Some(record) = rx.recv().await {
    let outcome = tokio::time::timeout(timeout, transport.deliver(&record)).await;
    let signal = match outcome {
      Ok(Ok(())) => {
        stats.delivered += 1;
        PipelineSignal::Delivered { topic: record.topic }
      }
      Ok(Err(e)) => {
        stats.failed += 1;
        PipelineSignal::DeliveryFailed { topic: record.topic, reason: e.to_string() }
      }
      Err(_) => {
        stats.failed += 1;
        PipelineSignal::DeliveryFailed {
          topic:  record.topic,
          reason: format!("timed out after {timeout:?}"),
        }
      }
    };
    observer.observe(&signal);
  }

  stats
}

#[cfg(test)]
mod tests {
  use bytes::Bytes;

  use super::*;
  use crate::{memory::MemoryBroker, observer::MemoryObserver};

  fn record(payload: &'static str) -> OutboundRecord {
    OutboundRecord {
      topic:   "t".into(),
      key:     None,
      payload: Bytes::from_static(payload.as_bytes()),
    }
  }

  /// A transport whose sends never complete.
  struct Stalled;

  impl Transport for Stalled {
    type Error = std::io::Error;

    async fn deliver(&self, _record: &OutboundRecord) -> Result<(), std::io::Error> {
      std::future::pending().await
    }
  }

  #[tokio::test]
  async fn records_reach_the_broker() {
    let broker = MemoryBroker::new();
    let observer = Arc::new(MemoryObserver::new());
    let (producer, delivery) =
      BufferedProducer::spawn(broker.clone(), DeliveryConfig::default(), observer.clone());

    producer.enqueue(record("a")).unwrap();
    producer.enqueue(record("b")).unwrap();
    drop(producer);

    let stats = delivery.flushed().await;
    assert_eq!(stats, DeliveryStats { delivered: 2, failed: 0 });
    assert_eq!(broker.records("t"), vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
    assert_eq!(observer.count(|s| matches!(s, PipelineSignal::Delivered { .. })), 2);
  }

  #[tokio::test]
  async fn full_buffer_is_reported_without_blocking() {
    let config = DeliveryConfig { capacity: 1, timeout: Duration::from_secs(60) };
    let (producer, _delivery) =
      BufferedProducer::spawn(Stalled, config, Arc::new(MemoryObserver::new()));

    // One record may be taken by the stalled task, one fills the buffer.
    let results: Vec<_> = (0..3).map(|_| producer.enqueue(record("x"))).collect();
    assert!(results.contains(&Err(EnqueueError::QueueFull)), "got {results:?}");
  }

  #[tokio::test]
  async fn timed_out_delivery_is_observed() {
    let observer = Arc::new(MemoryObserver::new());
    let config = DeliveryConfig { capacity: 4, timeout: Duration::from_millis(10) };
    let (producer, delivery) = BufferedProducer::spawn(Stalled, config, observer.clone());

    producer.enqueue(record("x")).unwrap();
    drop(producer);

    let stats = delivery.flushed().await;
    assert_eq!(stats, DeliveryStats { delivered: 0, failed: 1 });
    assert!(matches!(
      observer.signals().as_slice(),
      [PipelineSignal::DeliveryFailed { reason, .. }] if reason.starts_with("timed out")
    ));
  }

  #[tokio::test]
  async fn broker_rejection_is_observed() {
    let broker = MemoryBroker::new();
    broker.set_unavailable(true);
    let observer = Arc::new(MemoryObserver::new());
    let (producer, delivery) =
      BufferedProducer::spawn(broker, DeliveryConfig::default(), observer.clone());

    producer.enqueue(record("x")).unwrap();
    drop(producer);

    assert_eq!(delivery.flushed().await.failed, 1);
    assert_eq!(observer.count(|s| matches!(s, PipelineSignal::DeliveryFailed { .. })), 1);
  }
}
