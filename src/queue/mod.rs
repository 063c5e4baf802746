//! Typed message-queue abstraction used by the relay.
//!
//! The relay only talks to [`MessageQueue`] and [`QueueConnector`]; the AMQP
//! adapter in [`amqp`] is one implementation, test doubles are another.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

pub mod amqp;

pub use amqp::AmqpConnector;

// ---

/// One message handed to the consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    // ---
    /// Broker-assigned tag used to ack/nack this delivery.
    pub tag: u64,
    pub body: Vec<u8>,
    pub redelivered: bool,
    /// Previous failed delivery attempts, when the broker reports them.
    pub delivery_count: Option<u32>,
}

pub type DeliveryStream = BoxStream<'static, Result<Delivery, QueueError>>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("{0}")]
    Other(String),
}

/// Connected queue channel.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Declare `name` as a durable queue (no-op if it already exists).
    async fn declare_queue(&self, name: &str) -> Result<(), QueueError>;

    /// Start consuming `queue` with manual acknowledgement.
    async fn consume(&self, queue: &str) -> Result<DeliveryStream, QueueError>;

    async fn ack(&self, tag: u64) -> Result<(), QueueError>;

    async fn nack(&self, tag: u64, requeue: bool) -> Result<(), QueueError>;

    /// Publish a persistent message straight to `queue`.
    async fn publish(&self, queue: &str, body: &[u8]) -> Result<(), QueueError>;

    /// Close the channel and the underlying connection.
    async fn close(&self) -> Result<(), QueueError>;
}

/// Opens connections for the relay's `start()`.
#[async_trait]
pub trait QueueConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn MessageQueue>, QueueError>;
}
