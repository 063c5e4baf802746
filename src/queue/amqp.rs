//! RabbitMQ adapter for [`MessageQueue`] built on `lapin`.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::{
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
        BasicQosOptions, QueueDeclareOptions,
    },
    types::{AMQPValue, FieldTable},
    BasicProperties, Channel, Connection, ConnectionProperties,
};

use super::{Delivery, DeliveryStream, MessageQueue, QueueConnector, QueueError};
use crate::config::Config;

// ---

/// Header quorum queues use to report previous delivery attempts.
const DELIVERY_COUNT_HEADER: &str = "x-delivery-count";

/// Quorum queues are the only RabbitMQ queues that stamp the delivery count.
const QUEUE_TYPE_ARG: &str = "x-queue-type";
const QUORUM: &str = "quorum";

/// AMQP reply code for a normal close.
const REPLY_SUCCESS: u16 = 200;

const PERSISTENT: u8 = 2;

#[derive(Debug, Clone)]
pub struct AmqpConnector {
    uri: String,
    prefetch: u16,
    consumer_tag: String,
}

impl AmqpConnector {
    // ---
    pub fn from_config(config: &Config) -> Self {
        Self {
            uri: config.amqp_uri(),
            prefetch: config.relay_prefetch,
            consumer_tag: format!("fieldflow-relay-{}", uuid::Uuid::new_v4()),
        }
    }
}

#[async_trait]
impl QueueConnector for AmqpConnector {
    async fn connect(&self) -> Result<Arc<dyn MessageQueue>, QueueError> {
        // ---
        let connection = Connection::connect(&self.uri, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        channel
            .basic_qos(self.prefetch, BasicQosOptions::default())
            .await?;

        tracing::debug!(prefetch = self.prefetch, "AMQP channel open");
        Ok(Arc::new(AmqpQueue {
            connection,
            channel,
            consumer_tag: self.consumer_tag.clone(),
        }))
    }
}

struct AmqpQueue {
    connection: Connection,
    channel: Channel,
    consumer_tag: String,
}

#[async_trait]
impl MessageQueue for AmqpQueue {
    async fn declare_queue(&self, name: &str) -> Result<(), QueueError> {
        // ---
        let options = QueueDeclareOptions {
            durable: true,
            exclusive: false,
            auto_delete: false,
            ..QueueDeclareOptions::default()
        };
        self.channel
            .queue_declare(name, options, declare_arguments())
            .await?;
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<DeliveryStream, QueueError> {
        // ---
        // no_ack stays false: every delivery is settled explicitly
        let consumer = self
            .channel
            .basic_consume(
                queue,
                &self.consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        Ok(consumer
            .map(|item| item.map(into_delivery).map_err(QueueError::from))
            .boxed())
    }

    async fn ack(&self, tag: u64) -> Result<(), QueueError> {
        self.channel
            .basic_ack(tag, BasicAckOptions::default())
            .await?;
        Ok(())
    }

    async fn nack(&self, tag: u64, requeue: bool) -> Result<(), QueueError> {
        self.channel
            .basic_nack(
                tag,
                BasicNackOptions {
                    multiple: false,
                    requeue,
                },
            )
            .await?;
        Ok(())
    }

    async fn publish(&self, queue: &str, body: &[u8]) -> Result<(), QueueError> {
        // ---
        let properties = BasicProperties::default().with_delivery_mode(PERSISTENT);
        self.channel
            .basic_publish("", queue, BasicPublishOptions::default(), body, properties)
            .await?
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), QueueError> {
        // ---
        let channel = self.channel.close(REPLY_SUCCESS, "relay stopped").await;
        let connection = self.connection.close(REPLY_SUCCESS, "relay stopped").await;
        channel?;
        connection?;
        Ok(())
    }
}

fn declare_arguments() -> FieldTable {
    // ---
    let mut arguments = FieldTable::default();
    arguments.insert(QUEUE_TYPE_ARG.into(), AMQPValue::LongString(QUORUM.into()));
    arguments
}

fn into_delivery(delivery: lapin::message::Delivery) -> Delivery {
    // ---
    let delivery_count = delivery
        .properties
        .headers()
        .as_ref()
        .and_then(|headers| {
            headers
                .inner()
                .iter()
                .find(|(key, _)| key.as_str() == DELIVERY_COUNT_HEADER)
                .and_then(|(_, value)| header_as_u32(value))
        });

    Delivery {
        tag: delivery.delivery_tag,
        body: delivery.data,
        redelivered: delivery.redelivered,
        delivery_count,
    }
}

fn header_as_u32(value: &AMQPValue) -> Option<u32> {
    // ---
    match value {
        AMQPValue::ShortShortUInt(v) => Some(u32::from(*v)),
        AMQPValue::ShortUInt(v) => Some(u32::from(*v)),
        AMQPValue::LongUInt(v) => Some(*v),
        AMQPValue::ShortShortInt(v) => u32::try_from(*v).ok(),
        AMQPValue::ShortInt(v) => u32::try_from(*v).ok(),
        AMQPValue::LongInt(v) => u32::try_from(*v).ok(),
        AMQPValue::LongLongInt(v) => u32::try_from(*v).ok(),
        _ => None,
    }
}
