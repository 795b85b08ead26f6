//! Records moving through the broker in each direction.

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// A serialised event waiting in the local send buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRecord {
  pub topic:   String,
  pub key:     Option<Bytes>,
  pub payload: Bytes,
}

/// A message pulled from a subscribed topic.
///
/// `partition` and `offset` identify the cursor position to commit after
/// processing.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumedMessage {
  pub topic:     String,
  pub partition: i32,
  pub offset:    i64,
  pub key:       Option<Bytes>,
  pub payload:   Bytes,
  pub timestamp: DateTime<Utc>,
}

impl ConsumedMessage {
  /// The payload as text, with invalid UTF-8 replaced.
  pub fn value_lossy(&self) -> String { String::from_utf8_lossy(&self.payload).into_owned() }
}
