//! Domain event publishing and consumption for the pharmacy service.
//!
//! Publishing is fire-and-forget: [`EventPublisher`] serialises a
//! [`DomainEvent`] and hands it to a [`BrokerProducer`], which only enqueues
//! locally. Network delivery happens on a background task owned by
//! [`BufferedProducer`] and is reported to a [`PipelineObserver`], never to
//! the caller.
//!
//! Consumption is a long-running [`ConsumerLoop`] that pulls from a
//! [`BrokerConsumer`], records each message, commits its cursor and stops
//! cooperatively when its [`Shutdown`] fires.
//!
//! # Wiring
//!
//! ```rust,ignore
//! let broker = MemoryBroker::default();
//! let observer: Arc<dyn PipelineObserver> = Arc::new(TracingObserver);
//! let (producer, delivery) = BufferedProducer::spawn(broker.clone(), DeliveryConfig::default(), observer.clone());
//! let publisher = EventPublisher::new(Arc::new(producer), EventTopics::default(), observer.clone());
//!
//! let (trigger, shutdown) = shutdown::channel();
//! let consumer = ConsumerLoop::subscribe(broker.consumer("my-group"), vec!["medicine-events".into()], shutdown, observer)
//!   .await?
//!   .spawn();
//! ```

pub mod broker;
pub mod consumer;
pub mod event;
pub mod memory;
pub mod message;
pub mod observer;
pub mod producer;
pub mod publisher;
pub mod shutdown;

#[cfg(feature = "amqp")]
pub mod amqp;

pub use broker::{BrokerConsumer, BrokerProducer, EnqueueError, Transport};
pub use consumer::{ConsumerHandle, ConsumerLoop, ConsumerState, ConsumerStats, SubscribeError};
pub use event::{DomainEvent, LoginEvent, MedicineAction, MedicineEvent, RegistrationEvent};
pub use memory::{MemoryBroker, MemoryConsumer};
pub use message::{ConsumedMessage, OutboundRecord};
pub use observer::{MemoryObserver, PipelineObserver, PipelineSignal, TracingObserver};
pub use producer::{BufferedProducer, DeliveryConfig, DeliveryHandle, DeliveryStats};
pub use publisher::{EventPublisher, EventTopics, PublishError};
pub use shutdown::{Shutdown, ShutdownTrigger};
