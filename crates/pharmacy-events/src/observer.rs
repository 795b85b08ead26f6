//! Structured observability sink for the event pipeline.
//!
//! Every swallowed failure and every processed message is reported as a
//! [`PipelineSignal`]. Production wiring uses [`TracingObserver`]; tests use
//! [`MemoryObserver`] and assert on the recorded signals.

use parking_lot::Mutex;

/// Something that happened inside the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineSignal {
  /// An event was accepted into the local send buffer.
  Published { topic: String, kind: &'static str },
  /// An event could not be serialised or enqueued. The triggering action
  /// still succeeded.
  PublishFailed { topic: String, kind: &'static str, reason: String },
  /// The broker acknowledged a record.
  Delivered { topic: String },
  /// The broker rejected a record, or delivery timed out.
  DeliveryFailed { topic: String, reason: String },
  /// The consumer loop processed a message.
  Consumed { topic: String, partition: i32, offset: i64, value: String },
  /// The cursor was committed past a processed message.
  Committed { topic: String, partition: i32, offset: i64 },
  CommitFailed { topic: String, partition: i32, offset: i64, reason: String },
  /// A transient read error; the loop continues.
  ReadFailed { reason: String },
  /// Releasing the subscription failed. The loop stops regardless.
  CloseFailed { reason: String },
  /// The consumer loop released its subscription and returned.
  ConsumerStopped { processed: u64 },
}

pub trait PipelineObserver: Send + Sync + 'static {
  fn observe(&self, signal: &PipelineSignal);
}

// ─── Tracing ─────────────────────────────────────────────────────────────────

/// Emits every signal as a `tracing` event under the `pharmacy::events`
/// target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
  fn observe(&self, signal: &PipelineSignal) {
    match signal {
      PipelineSignal::Published { topic, kind } => {
        tracing::debug!(target: "pharmacy::events", %topic, kind, "event enqueued");
      }
      PipelineSignal::PublishFailed { topic, kind, reason } => {
        tracing::warn!(target: "pharmacy::events", %topic, kind, %reason, "failed to publish event");
      }
      PipelineSignal::Delivered { topic } => {
        tracing::debug!(target: "pharmacy::events", %topic, "event delivered");
      }
      PipelineSignal::DeliveryFailed { topic, reason } => {
        tracing::warn!(target: "pharmacy::events", %topic, %reason, "event delivery failed");
      }
      PipelineSignal::Consumed { topic, partition, offset, value } => {
        tracing::info!(target: "pharmacy::events", %topic, partition, offset, %value, "message consumed");
      }
      PipelineSignal::Committed { topic, partition, offset } => {
        tracing::trace!(target: "pharmacy::events", %topic, partition, offset, "cursor committed");
      }
      PipelineSignal::CommitFailed { topic, partition, offset, reason } => {
        tracing::error!(target: "pharmacy::events", %topic, partition, offset, %reason, "failed to commit cursor");
      }
      PipelineSignal::ReadFailed { reason } => {
        tracing::error!(target: "pharmacy::events", %reason, "error reading message");
      }
      PipelineSignal::CloseFailed { reason } => {
        tracing::warn!(target: "pharmacy::events", %reason, "failed to release subscription");
      }
      PipelineSignal::ConsumerStopped { processed } => {
        tracing::info!(target: "pharmacy::events", processed, "consumer stopped");
      }
    }
  }
}

// ─── Memory ──────────────────────────────────────────────────────────────────

/// Records every signal in order.
#[derive(Debug, Default)]
pub struct MemoryObserver {
  signals: Mutex<Vec<PipelineSignal>>,
}

impl MemoryObserver {
  pub fn new() -> Self { Self::default() }

  /// A snapshot of everything observed so far.
  pub fn signals(&self) -> Vec<PipelineSignal> { self.signals.lock().clone() }

  pub fn count(&self, matches: impl Fn(&PipelineSignal) -> bool) -> usize {
    self.signals.lock().iter().filter(|s| matches(s)).count()
  }
}

impl PipelineObserver for MemoryObserver {
  fn observe(&self, signal: &PipelineSignal) { self.signals.lock().push(signal.clone()); }
}
