//! Broker capability traits.
//!
//! Three seams separate the pipeline from any concrete broker:
//!
//! - [`BrokerProducer`]: the non-blocking local enqueue used on the request
//!   path.
//! - [`Transport`]: the network send performed by the background delivery
//!   task.
//! - [`BrokerConsumer`]: subscription, pull, cursor commit and release.

use std::future::Future;

use thiserror::Error;

use crate::message::{ConsumedMessage, OutboundRecord};

/// The local send buffer refused a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EnqueueError {
  #[error("send buffer is full")]
  QueueFull,
  #[error("producer is closed")]
  Closed,
}

/// Hands records to a broker client for asynchronous delivery.
///
/// `enqueue` must return without waiting on the network.
pub trait BrokerProducer: Send + Sync {
  fn enqueue(&self, record: OutboundRecord) -> Result<(), EnqueueError>;
}

/// Sends a single record over the network and waits for the broker's
/// acknowledgement.
pub trait Transport: Send + Sync + 'static {
  type Error: std::error::Error + Send + Sync + 'static;

  fn deliver<'a>(
    &'a self,
    record: &'a OutboundRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

/// A consumer-group member owned by exactly one task.
pub trait BrokerConsumer: Send {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Join the consumer group for `topics`. Reading starts at the group's
  /// committed cursor, or at the earliest record when none is committed.
  fn subscribe<'a>(
    &'a mut self,
    topics: &'a [String],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Wait, without timeout, for the next message.
  ///
  /// Must be cancel-safe: dropping the future before it resolves must not
  /// lose a message.
  fn next_message(
    &mut self,
  ) -> impl Future<Output = Result<ConsumedMessage, Self::Error>> + Send + '_;

  /// Commit the cursor past `message`.
  fn commit<'a>(
    &'a mut self,
    message: &'a ConsumedMessage,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Leave the group and release the subscription.
  fn close(self) -> impl Future<Output = Result<(), Self::Error>> + Send
  where
    Self: Sized;
}
