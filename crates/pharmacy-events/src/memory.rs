//! An in-process broker.
//!
//! Each topic is a single partition (partition `0`) with absolute offsets.
//! Consumer groups keep one committed cursor per topic, so a restarted
//! consumer in the same group resumes after the last commit. Used by the
//! default server configuration and by every test in the workspace.
//!
//! Records are released once every group that has subscribed to a topic has
//! committed past them, and each topic keeps at most `retention` records
//! regardless. A reader that falls behind the earliest retained record skips
//! forward to it.

use std::{
  collections::{HashMap, VecDeque},
  sync::Arc,
};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;

use crate::{
  broker::{BrokerConsumer, Transport},
  message::{ConsumedMessage, OutboundRecord},
};

const PARTITION: i32 = 0;

/// Records kept per topic when no consumer group releases them earlier.
pub const DEFAULT_RETENTION: usize = 10_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryError {
  #[error("broker is unavailable")]
  Unavailable,
  #[error("consumer has no subscription")]
  NotSubscribed,
  #[error("unknown topic {0:?}")]
  UnknownTopic(String),
}

// ─── Broker ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct StoredRecord {
  key:       Option<Bytes>,
  payload:   Bytes,
  timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Partition {
  /// Offset of `records[0]`.
  base:    i64,
  records: VecDeque<StoredRecord>,
  /// Every group that has subscribed, with its committed cursor if any.
  groups:  HashMap<String, Option<i64>>,
}

impl Partition {
  fn get(&self, offset: i64) -> Option<&StoredRecord> {
    let index = offset.checked_sub(self.base)?;
    self.records.get(usize::try_from(index).ok()?)
  }

  /// Drop records every group has committed past, then enforce the cap.
  fn compact(&mut self, retention: usize) {
    let base = self.base;
    let floor = self.groups.values().map(|cursor| cursor.unwrap_or(base)).min();
    if let Some(floor) = floor {
      while self.base < floor && self.records.pop_front().is_some() {
        self.base += 1;
      }
    }
    while self.records.len() > retention {
      self.records.pop_front();
      self.base += 1;
    }
  }
}

#[derive(Debug, Default)]
struct BrokerState {
  topics:        HashMap<String, Partition>,
  subscriptions: usize,
  unavailable:   bool,
}

#[derive(Debug)]
struct Inner {
  state:     Mutex<BrokerState>,
  appended:  Notify,
  retention: usize,
}

/// A shared in-memory broker. Clones refer to the same topics.
#[derive(Debug, Clone)]
pub struct MemoryBroker {
  inner: Arc<Inner>,
}

impl Default for MemoryBroker {
  fn default() -> Self { Self::with_retention(DEFAULT_RETENTION) }
}

impl MemoryBroker {
  pub fn new() -> Self { Self::default() }

  /// A broker keeping at most `retention` records per topic (at least one).
  pub fn with_retention(retention: usize) -> Self {
    Self {
      inner: Arc::new(Inner {
        state:     Mutex::default(),
        appended:  Notify::new(),
        retention: retention.max(1),
      }),
    }
  }

  /// A new, unsubscribed member of consumer group `group`.
  pub fn consumer(&self, group: impl Into<String>) -> MemoryConsumer {
    MemoryConsumer {
      broker:     self.clone(),
      group:      group.into(),
      positions:  Vec::new(),
      next_topic: 0,
      subscribed: false,
    }
  }

  /// Every payload still retained on `topic`, in offset order.
  pub fn records(&self, topic: &str) -> Vec<Bytes> {
    let state = self.inner.state.lock();
    state
      .topics
      .get(topic)
      .map(|partition| partition.records.iter().map(|r| r.payload.clone()).collect())
      .unwrap_or_default()
  }

  /// Offset of the earliest record still retained on `topic`.
  pub fn earliest_offset(&self, topic: &str) -> i64 {
    let state = self.inner.state.lock();
    state.topics.get(topic).map_or(0, |partition| partition.base)
  }

  /// The committed cursor of `group` on `topic`, if any.
  pub fn committed_offset(&self, group: &str, topic: &str) -> Option<i64> {
    let state = self.inner.state.lock();
    state.topics.get(topic)?.groups.get(group).copied().flatten()
  }

  /// Number of consumers currently holding a subscription.
  pub fn active_subscriptions(&self) -> usize { self.inner.state.lock().subscriptions }

  /// Make every delivery fail until switched back. Records already stored
  /// stay readable.
  pub fn set_unavailable(&self, unavailable: bool) {
    self.inner.state.lock().unavailable = unavailable;
  }

  fn append(&self, record: &OutboundRecord) -> Result<(), MemoryError> {
    {
      let mut state = self.inner.state.lock();
      if state.unavailable {
        return Err(MemoryError::Unavailable);
      }
      let partition = state.topics.entry(record.topic.clone()).or_default();
      partition.records.push_back(StoredRecord {
        key:       record.key.clone(),
        payload:   record.payload.clone(),
        timestamp: Utc::now(),
      });
      partition.compact(self.inner.retention);
    }
    self.inner.appended.notify_waiters();
    Ok(())
  }
}

impl Transport for MemoryBroker {
  type Error = MemoryError;

  async fn deliver(&self, record: &OutboundRecord) -> Result<(), MemoryError> {
    self.append(record)
  }
}

// ─── Consumer ────────────────────────────────────────────────────────────────

/// A consumer-group member reading from a [`MemoryBroker`].
#[derive(Debug)]
pub struct MemoryConsumer {
  broker:     MemoryBroker,
  group:      String,
  /// `(topic, next offset to read)` per subscribed topic.
  positions:  Vec<(String, i64)>,
  next_topic: usize,
  subscribed: bool,
}

impl MemoryConsumer {
  /// Take the next unread record, rotating across topics. Never awaits, so
  /// a position only moves when a message is actually returned.
  fn poll_ready(&mut self) -> Option<ConsumedMessage> {
    let state = self.broker.inner.state.lock();
    let count = self.positions.len();

    for step in 0..count {
      let index = (self.next_topic + step) % count;
      let (topic, position) = &mut self.positions[index];

      let Some(partition) = state.topics.get(topic.as_str()) else {
        continue;
      };
      // Released while we were behind.
      if *position < partition.base {
        *position = partition.base;
      }
      let Some(record) = partition.get(*position) else {
        continue;
      };

      let message = ConsumedMessage {
        topic:     topic.clone(),
        partition: PARTITION,
        offset:    *position,
        key:       record.key.clone(),
        payload:   record.payload.clone(),
        timestamp: record.timestamp,
      };
      *position += 1;
      self.next_topic = (index + 1) % count;
      return Some(message);
    }
    None
  }

  fn release(&mut self) {
    if std::mem::take(&mut self.subscribed) {
      let mut state = self.broker.inner.state.lock();
      state.subscriptions = state.subscriptions.saturating_sub(1);
    }
  }
}

impl BrokerConsumer for MemoryConsumer {
  type Error = MemoryError;

  async fn subscribe(&mut self, topics: &[String]) -> Result<(), MemoryError> {
    let mut state = self.broker.inner.state.lock();

    self.positions = topics
      .iter()
      .map(|topic| {
        let partition = state.topics.entry(topic.clone()).or_default();
        let committed = *partition.groups.entry(self.group.clone()).or_default();
        let cursor = committed.unwrap_or(partition.base).max(partition.base);
        (topic.clone(), cursor)
      })
      .collect();
    self.next_topic = 0;

    if !self.subscribed {
      self.subscribed = true;
      state.subscriptions += 1;
    }
    Ok(())
  }

  async fn next_message(&mut self) -> Result<ConsumedMessage, MemoryError> {
    if !self.subscribed || self.positions.is_empty() {
      return Err(MemoryError::NotSubscribed);
    }

    let broker = self.broker.clone();
    loop {
      // Register interest before checking, so an append between the check
      // and the await still wakes us.
      let notified = broker.inner.appended.notified();
      tokio::pin!(notified);
      notified.as_mut().enable();

      if let Some(message) = self.poll_ready() {
        return Ok(message);
      }
      notified.await;
    }
  }

  async fn commit(&mut self, message: &ConsumedMessage) -> Result<(), MemoryError> {
    if !self.positions.iter().any(|(topic, _)| *topic == message.topic) {
      return Err(MemoryError::UnknownTopic(message.topic.clone()));
    }
    let retention = self.broker.inner.retention;
    let mut state = self.broker.inner.state.lock();
    let partition = state.topics.entry(message.topic.clone()).or_default();
    partition.groups.insert(self.group.clone(), Some(message.offset + 1));
    partition.compact(retention);
    Ok(())
  }

  async fn close(mut self) -> Result<(), MemoryError> {
    self.release();
    Ok(())
  }
}

impl Drop for MemoryConsumer {
  fn drop(&mut self) { self.release(); }
}
