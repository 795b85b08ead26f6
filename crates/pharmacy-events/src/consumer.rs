//! The Event Consumer Loop.
//!
//! A [`ConsumerLoop`] exists only once its subscription has succeeded, so a
//! startup failure surfaces from [`ConsumerLoop::subscribe`] and no task is
//! ever spawned for it. Once running, the loop alternates between waiting
//! (without timeout) for the next message or for shutdown, and processing
//! and committing what it received. Processing and commit are never raced
//! against shutdown: a message that has been pulled is always finished.

use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tokio::{sync::watch, task::JoinHandle};

use crate::{
  broker::BrokerConsumer,
  message::ConsumedMessage,
  observer::{PipelineObserver, PipelineSignal},
  shutdown::Shutdown,
};

/// Pause after a failed read before pulling again.
pub const DEFAULT_READ_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum SubscribeError {
  #[error("no topics to subscribe to")]
  NoTopics,
  #[error("subscription failed: {0}")]
  Broker(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
  Running,
  Stopped,
}

/// Counters returned when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
  pub processed:       u64,
  pub commit_failures: u64,
  pub read_errors:     u64,
}

/// A subscribed consumer, ready to run.
pub struct ConsumerLoop<C> {
  consumer:     C,
  shutdown:     Shutdown,
  observer:     Arc<dyn PipelineObserver>,
  read_backoff: Duration,
}

impl<C: BrokerConsumer> ConsumerLoop<C> {
  /// Subscribe `consumer` to `topics`.
  ///
  /// On failure the consumer is closed and the error returned; the caller
  /// decides whether that is fatal.
  pub async fn subscribe(
    mut consumer: C,
    topics: Vec<String>,
    shutdown: Shutdown,
    observer: Arc<dyn PipelineObserver>,
  ) -> Result<Self, SubscribeError> {
    let failure = if topics.is_empty() {
      SubscribeError::NoTopics
    } else {
      match consumer.subscribe(&topics).await {
        Ok(()) => {
          tracing::info!(target: "pharmacy::events", ?topics, "consumer subscribed");
          return Ok(Self {
            consumer,
            shutdown,
            observer,
            read_backoff: DEFAULT_READ_BACKOFF,
          });
        }
        Err(e) => SubscribeError::Broker(Box::new(e)),
      }
    };

    if let Err(e) = consumer.close().await {
      observer.observe(&PipelineSignal::CloseFailed { reason: e.to_string() });
    }
    Err(failure)
  }

  pub fn with_read_backoff(mut self, backoff: Duration) -> Self {
    self.read_backoff = backoff;
    self
  }

  /// Run until shutdown, then release the subscription.
  pub async fn run(self) -> ConsumerStats {
    let Self { mut consumer, mut shutdown, observer, read_backoff } = self;
    let mut stats = ConsumerStats::default();

    loop {
      let next = tokio::select! {
        biased;
        _ = shutdown.cancelled() => break,
        next = consumer.next_message() => next,
      };

      match next {
        Ok(message) => {
          process(&message, observer.as_ref());
          stats.processed += 1;

          match consumer.commit(&message).await {
            Ok(()) => observer.observe(&PipelineSignal::Committed {
              topic:     message.topic,
              partition: message.partition,
              offset:    message.offset,
            }),
            Err(e) => {
              stats.commit_failures += 1;
              observer.observe(&PipelineSignal::CommitFailed {
                topic:     message.topic,
                partition: message.partition,
                offset:    message.offset,
                reason:    e.to_string(),
              });
            }
          }
        }
        Err(e) => {
          stats.read_errors += 1;
          observer.observe(&PipelineSignal::ReadFailed { reason: e.to_string() });

          tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(read_backoff) => {}
          }
        }
      }
    }

    if let Err(e) = consumer.close().await {
      observer.observe(&PipelineSignal::CloseFailed { reason: e.to_string() });
    }
    observer.observe(&PipelineSignal::ConsumerStopped { processed: stats.processed });
    stats
  }
}

impl<C: BrokerConsumer + 'static> ConsumerLoop<C> {
  /// Run the loop on a dedicated task.
  pub fn spawn(self) -> ConsumerHandle {
    let (state_tx, state) = watch::channel(ConsumerState::Running);
    let join = tokio::spawn(async move {
      let stats = self.run().await;
      state_tx.send_replace(ConsumerState::Stopped);
      stats
    });
    ConsumerHandle { join, state }
  }
}

fn process(message: &ConsumedMessage, observer: &dyn PipelineObserver) {
  observer.observe(&PipelineSignal::Consumed {
    topic:     message.topic.clone(),
    partition: message.partition,
    offset:    message.offset,
    value:     message.value_lossy(),
  });
}

// ─── Handle ──────────────────────────────────────────────────────────────────

/// The spawned consumer task.
#[derive(Debug)]
pub struct ConsumerHandle {
  join:  JoinHandle<ConsumerStats>,
  state: watch::Receiver<ConsumerState>,
}

impl ConsumerHandle {
  pub fn state(&self) -> ConsumerState { *self.state.borrow() }

  /// A receiver that observes the transition to [`ConsumerState::Stopped`].
  pub fn watch_state(&self) -> watch::Receiver<ConsumerState> { self.state.clone() }

  /// Wait for the loop to stop and its subscription to be released.
  pub async fn join(self) -> ConsumerStats {
    match self.join.await {
      Ok(stats) => stats,
      Err(e) => {
        tracing::error!(target: "pharmacy::events", error = %e, "consumer task failed");
        ConsumerStats::default()
      }
    }
  }
}
