//! AMQP broker backend (`amqp` feature).
//!
//! Topics map to routing keys on a durable topic exchange. A consumer group
//! maps to one durable queue per topic, named `{group}.{topic}`, so members
//! of the same group compete for messages and separate groups each get a
//! copy. Committing a message acknowledges its delivery.

use bytes::Bytes;
use chrono::Utc;
use futures::{
  StreamExt as _, future,
  stream::{self, BoxStream, SelectAll},
};
use lapin::{
  BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
  message::Delivery,
  options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, ConfirmSelectOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
  },
  types::{FieldTable, ShortString},
};
use thiserror::Error;

use crate::{
  broker::{BrokerConsumer, Transport},
  message::{ConsumedMessage, OutboundRecord},
};

const REPLY_SUCCESS: u16 = 200;

#[derive(Debug, Error)]
pub enum AmqpError {
  #[error(transparent)]
  Lapin(#[from] lapin::Error),
  #[error("broker rejected the message")]
  Nacked,
  #[error("delivery stream closed")]
  StreamClosed,
  #[error("consumer has no subscription")]
  NotSubscribed,
}

async fn open_channel(url: &str, exchange: &str) -> Result<(Connection, Channel), AmqpError> {
  let connection = Connection::connect(url, ConnectionProperties::default()).await?;
  let channel = connection.create_channel().await?;
  channel
    .exchange_declare(
      exchange,
      ExchangeKind::Topic,
      ExchangeDeclareOptions { durable: true, ..Default::default() },
      FieldTable::default(),
    )
    .await?;
  Ok((connection, channel))
}

// ─── Transport ───────────────────────────────────────────────────────────────

/// Publishes records with publisher confirms enabled.
pub struct AmqpTransport {
  _connection: Connection,
  channel:     Channel,
  exchange:    String,
}

impl AmqpTransport {
  pub async fn connect(url: &str, exchange: impl Into<String>) -> Result<Self, AmqpError> {
    let exchange = exchange.into();
    let (connection, channel) = open_channel(url, &exchange).await?;
    channel.confirm_select(ConfirmSelectOptions::default()).await?;
    tracing::info!(target: "pharmacy::events", %exchange, "amqp producer connected");
    Ok(Self { _connection: connection, channel, exchange })
  }
}

impl Transport for AmqpTransport {
  type Error = AmqpError;

  async fn deliver(&self, record: &OutboundRecord) -> Result<(), AmqpError> {
    let mut properties = BasicProperties::default().with_content_type("application/json".into());
    if let Some(key) = &record.key {
      properties =
        properties.with_message_id(ShortString::from(String::from_utf8_lossy(key).into_owned()));
    }

    let confirmation = self
      .channel
      .basic_publish(
        &self.exchange,
        &record.topic,
        BasicPublishOptions::default(),
        &record.payload,
        properties,
      )
      .await?
      .await?;

    if confirmation.is_nack() { Err(AmqpError::Nacked) } else { Ok(()) }
  }
}

// ─── Consumer ────────────────────────────────────────────────────────────────

/// One queue's deliveries, followed by a single `None` once the broker ends
/// the stream.
type DeliveryStream = BoxStream<'static, Option<Result<Delivery, lapin::Error>>>;

fn queue_name(group: &str, topic: &str) -> String { format!("{group}.{topic}") }

/// A consumer-group member reading from per-topic group queues.
///
/// When any delivery stream ends (connection drop, channel error or a
/// broker-side cancel) the read that sees it fails, and the next read
/// reconnects and consumes every subscribed topic again. Unacknowledged
/// deliveries from the old channel are redelivered by the broker.
pub struct AmqpConsumer {
  url:        String,
  connection: Connection,
  channel:    Channel,
  exchange:   String,
  group:      String,
  topics:     Vec<String>,
  streams:    SelectAll<DeliveryStream>,
  stale:      bool,
}

impl AmqpConsumer {
  pub async fn connect(
    url: &str,
    exchange: impl Into<String>,
    group: impl Into<String>,
  ) -> Result<Self, AmqpError> {
    let exchange = exchange.into();
    let (connection, channel) = open_channel(url, &exchange).await?;
    Ok(Self {
      url: url.to_owned(),
      connection,
      channel,
      exchange,
      group: group.into(),
      topics: Vec::new(),
      streams: SelectAll::new(),
      stale: false,
    })
  }

  /// Declare and bind the group queue for `topic` and start consuming it.
  async fn consume(&mut self, topic: &str) -> Result<(), AmqpError> {
    let queue = queue_name(&self.group, topic);
    self
      .channel
      .queue_declare(
        &queue,
        QueueDeclareOptions { durable: true, ..Default::default() },
        FieldTable::default(),
      )
      .await?;
    self
      .channel
      .queue_bind(&queue, &self.exchange, topic, QueueBindOptions::default(), FieldTable::default())
      .await?;

    let consumer = self
      .channel
      .basic_consume(&queue, &queue, BasicConsumeOptions::default(), FieldTable::default())
      .await?;
    self
      .streams
      .push(consumer.map(Some).chain(stream::once(future::ready(None))).boxed());
    tracing::debug!(target: "pharmacy::events", %queue, %topic, "queue bound");
    Ok(())
  }

  /// Replace the connection and channel, then consume every subscribed topic
  /// again. Leaves the consumer stale if any step fails.
  async fn reconnect(&mut self) -> Result<(), AmqpError> {
    self.streams = SelectAll::new();
    let (connection, channel) = open_channel(&self.url, &self.exchange).await?;
    let previous = std::mem::replace(&mut self.connection, connection);
    self.channel = channel;
    if let Err(e) = previous.close(REPLY_SUCCESS, "reconnecting").await {
      tracing::debug!(target: "pharmacy::events", error = %e, "previous connection already closed");
    }

    for topic in self.topics.clone() {
      self.consume(&topic).await?;
    }
    self.stale = false;
    tracing::info!(target: "pharmacy::events", topics = ?self.topics, "amqp consumer reconnected");
    Ok(())
  }
}

impl BrokerConsumer for AmqpConsumer {
  type Error = AmqpError;

  async fn subscribe(&mut self, topics: &[String]) -> Result<(), AmqpError> {
    self.streams = SelectAll::new();
    for topic in topics {
      self.consume(topic).await?;
    }
    self.topics = topics.to_vec();
    self.stale = false;
    Ok(())
  }

  async fn next_message(&mut self) -> Result<ConsumedMessage, AmqpError> {
    if self.topics.is_empty() {
      return Err(AmqpError::NotSubscribed);
    }
    if self.stale {
      self.reconnect().await?;
    }

    let delivery = match self.streams.next().await {
      Some(Some(Ok(delivery))) => delivery,
      Some(Some(Err(e))) => {
        self.stale = true;
        return Err(e.into());
      }
      Some(None) | None => {
        self.stale = true;
        return Err(AmqpError::StreamClosed);
      }
    };

    Ok(ConsumedMessage {
      topic:     delivery.routing_key.as_str().to_owned(),
      partition: 0,
      offset:    delivery.delivery_tag as i64,
      key:       delivery
        .properties
        .message_id()
        .as_ref()
        .map(|id| Bytes::from(id.as_str().to_owned())),
      payload:   Bytes::from(delivery.data),
      timestamp: Utc::now(),
    })
  }

  async fn commit(&mut self, message: &ConsumedMessage) -> Result<(), AmqpError> {
    self
      .channel
      .basic_ack(message.offset as u64, BasicAckOptions::default())
      .await?;
    Ok(())
  }

  async fn close(self) -> Result<(), AmqpError> {
    self.channel.close(REPLY_SUCCESS, "consumer stopped").await?;
    self.connection.close(REPLY_SUCCESS, "consumer stopped").await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;

  const BROKER_URL_VAR: &str = "PHARMACY_TEST_AMQP_URL";

  #[test]
  fn group_queues_are_named_per_topic() {
    assert_eq!(queue_name("my-group", "medicine-events"), "my-group.medicine-events");
  }

  #[tokio::test]
  async fn unreachable_broker_fails_to_connect() {
    let attempt = tokio::time::timeout(
      Duration::from_secs(10),
      AmqpConsumer::connect("amqp://127.0.0.1:1/%2f", "pharmacy", "my-group"),
    )
    .await;
    assert!(!matches!(attempt, Ok(Ok(_))));
  }

  fn record(topic: &str, payload: &'static str) -> OutboundRecord {
    OutboundRecord {
      topic:   topic.into(),
      key:     Some(Bytes::from_static(b"k")),
      payload: Bytes::from_static(payload.as_bytes()),
    }
  }

  async fn read(consumer: &mut AmqpConsumer) -> Result<ConsumedMessage, AmqpError> {
    tokio::time::timeout(Duration::from_secs(5), consumer.next_message())
      .await
      .expect("read timed out")
  }

  #[tokio::test]
  #[ignore = "needs an AMQP broker at PHARMACY_TEST_AMQP_URL"]
  async fn consumes_again_after_the_queue_is_cancelled() {
    let url = std::env::var(BROKER_URL_VAR).expect("PHARMACY_TEST_AMQP_URL");
    let exchange = "pharmacy-test";
    let topic = "medicine-events".to_owned();

    let transport = AmqpTransport::connect(&url, exchange).await.unwrap();
    let mut consumer = AmqpConsumer::connect(&url, exchange, "reconnect-test").await.unwrap();
    consumer.subscribe(std::slice::from_ref(&topic)).await.unwrap();

    transport.deliver(&record(&topic, "first")).await.unwrap();
    let first = read(&mut consumer).await.unwrap();
    assert_eq!(first.value_lossy(), "first");
    assert_eq!(first.key.as_deref(), Some(&b"k"[..]));
    consumer.commit(&first).await.unwrap();

    // Deleting the queue makes the broker cancel our consumer.
    let (admin, channel) = open_channel(&url, exchange).await.unwrap();
    channel
      .queue_delete(&queue_name("reconnect-test", &topic), Default::default())
      .await
      .unwrap();
    assert!(matches!(read(&mut consumer).await, Err(AmqpError::StreamClosed)));

    // The next read redeclares the queue before waiting on it, so publish
    // from another task once it exists again.
    let publisher = tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(500)).await;
      transport.deliver(&record("medicine-events", "second")).await.unwrap();
    });
    let second = read(&mut consumer).await.unwrap();
    assert_eq!(second.value_lossy(), "second");
    consumer.commit(&second).await.unwrap();

    publisher.await.unwrap();
    admin.close(REPLY_SUCCESS, "done").await.unwrap();
    consumer.close().await.unwrap();
  }
}
