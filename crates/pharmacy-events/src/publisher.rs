//! The Event Publisher.
//!
//! [`EventPublisher::publish`] serialises a [`DomainEvent`] to JSON and hands
//! it to a [`BrokerProducer`]. It returns as soon as the record is in the
//! local send buffer. Request handlers use the best-effort helpers, which
//! report failures to the observer and return nothing.

use std::sync::Arc;

use bytes::Bytes;
use serde::Deserialize;
use thiserror::Error;

use crate::{
  broker::{BrokerProducer, EnqueueError},
  event::{DomainEvent, LoginEvent, MedicineAction, MedicineEvent, RegistrationEvent},
  message::OutboundRecord,
  observer::{PipelineObserver, PipelineSignal},
};

#[derive(Debug, Error)]
pub enum PublishError {
  #[error("failed to serialise event: {0}")]
  Serialization(#[from] serde_json::Error),
  #[error("failed to enqueue event: {0}")]
  Enqueue(#[from] EnqueueError),
}

/// Topic names for each event family.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EventTopics {
  pub login:        String,
  pub registration: String,
  pub medicine:     String,
}

impl Default for EventTopics {
  fn default() -> Self {
    Self {
      login:        "login-events".into(),
      registration: "registration-events".into(),
      medicine:     "medicine-events".into(),
    }
  }
}

/// Fire-and-forget publisher shared by every request handler. Cheap to
/// clone.
#[derive(Clone)]
pub struct EventPublisher {
  producer: Arc<dyn BrokerProducer>,
  topics:   EventTopics,
  observer: Arc<dyn PipelineObserver>,
}

impl std::fmt::Debug for EventPublisher {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("EventPublisher").field("topics", &self.topics).finish_non_exhaustive()
  }
}

impl EventPublisher {
  pub fn new(
    producer: Arc<dyn BrokerProducer>,
    topics: EventTopics,
    observer: Arc<dyn PipelineObserver>,
  ) -> Self {
    Self { producer, topics, observer }
  }

  /// Serialise `event` and enqueue it on `topic`.
  ///
  /// Never waits for the broker. Both outcomes are also reported to the
  /// observer.
  pub fn publish(&self, topic: &str, event: &DomainEvent) -> Result<(), PublishError> {
    let result = self.enqueue(topic, event);
    let signal = match &result {
      Ok(()) => PipelineSignal::Published { topic: topic.to_owned(), kind: event.kind() },
      Err(e) => PipelineSignal::PublishFailed {
        topic:  topic.to_owned(),
        kind:   event.kind(),
        reason: e.to_string(),
      },
    };
    self.observer.observe(&signal);
    result
  }

  fn enqueue(&self, topic: &str, event: &DomainEvent) -> Result<(), PublishError> {
    let payload = serde_json::to_vec(event)?;
    self.producer.enqueue(OutboundRecord {
      topic:   topic.to_owned(),
      key:     Some(Bytes::from(event.key())),
      payload: Bytes::from(payload),
    })?;
    Ok(())
  }

  // ─── Best-effort helpers ─────────────────────────────────────────────────

  /// Publish a login attempt on the login topic.
  pub fn login_attempt(&self, username: &str, success: bool) {
    let event = if success { LoginEvent::succeeded(username) } else { LoginEvent::failed(username) };
    let _ = self.publish(&self.topics.login, &event.into());
  }

  pub fn registered(&self, username: &str) {
    let _ = self.publish(&self.topics.registration, &RegistrationEvent::new(username).into());
  }

  /// Publish a medicine state change performed by `user`.
  pub fn medicine_changed(&self, action: MedicineAction, medicine_id: i64, user: &str) {
    let event = MedicineEvent::new(action, medicine_id, user);
    let _ = self.publish(&self.topics.medicine, &event.into());
  }
}

#[cfg(test)]
mod tests {
  use parking_lot::Mutex;

  use super::*;
  use crate::observer::MemoryObserver;

  #[derive(Default)]
  struct Recording {
    records: Mutex<Vec<OutboundRecord>>,
  }

  impl BrokerProducer for Recording {
    fn enqueue(&self, record: OutboundRecord) -> Result<(), EnqueueError> {
      self.records.lock().push(record);
      Ok(())
    }
  }

  struct Rejecting(EnqueueError);

  impl BrokerProducer for Rejecting {
    fn enqueue(&self, _record: OutboundRecord) -> Result<(), EnqueueError> { Err(self.0) }
  }

  #[test]
  fn publish_enqueues_json_with_key() {
    let producer = Arc::new(Recording::default());
    let observer = Arc::new(MemoryObserver::new());
    let publisher = EventPublisher::new(producer.clone(), EventTopics::default(), observer.clone());

    publisher.medicine_changed(MedicineAction::Created, 7, "alice");

    let records = producer.records.lock();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].topic, "medicine-events");
    assert_eq!(records[0].key.as_deref(), Some(&b"7"[..]));

    let json: serde_json::Value = serde_json::from_slice(&records[0].payload).unwrap();
    assert_eq!(json["event"], "medicine.created");
    assert_eq!(json["user"], "alice");

    assert_eq!(observer.signals(), vec![PipelineSignal::Published {
      topic: "medicine-events".into(),
      kind:  "medicine.created",
    }]);
  }

  #[test]
  fn helpers_use_configured_topics() {
    let producer = Arc::new(Recording::default());
    let topics = EventTopics {
      login:        "l".into(),
      registration: "r".into(),
      medicine:     "m".into(),
    };
    let publisher = EventPublisher::new(producer.clone(), topics, Arc::new(MemoryObserver::new()));

    publisher.login_attempt("bob", false);
    publisher.registered("bob");

    let records = producer.records.lock();
    let topics: Vec<&str> = records.iter().map(|r| r.topic.as_str()).collect();
    assert_eq!(topics, ["l", "r"]);

    let login: serde_json::Value = serde_json::from_slice(&records[0].payload).unwrap();
    assert_eq!(login["success"], false);
  }

  #[test]
  fn enqueue_failure_is_returned_and_observed() {
    let observer = Arc::new(MemoryObserver::new());
    let publisher = EventPublisher::new(
      Arc::new(Rejecting(EnqueueError::QueueFull)),
      EventTopics::default(),
      observer.clone(),
    );

    let err = publisher
      .publish("t", &RegistrationEvent::new("alice").into())
      .unwrap_err();
    assert!(matches!(err, PublishError::Enqueue(EnqueueError::QueueFull)));

    // The helper swallows the same failure.
    publisher.registered("alice");

    assert_eq!(observer.count(|s| matches!(s, PipelineSignal::PublishFailed { .. })), 2);
  }

  #[test]
  fn topics_fill_missing_fields_from_defaults() {
    let topics: EventTopics = serde_json::from_str(r#"{"login":"auth"}"#).unwrap();
    assert_eq!(topics.login, "auth");
    assert_eq!(topics.medicine, "medicine-events");
  }
}
