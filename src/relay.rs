//! Reliable relay from the telemetry queue to a [`ReadingSink`].
//!
//! Lifecycle: `Idle → Connected → Consuming → Stopped`. Every delivery is
//! handled on its own task and settled explicitly:
//! - sink accepted the reading → ack
//! - decode failure or sink failure → nack with requeue, or, once the broker
//!   reports `max_redeliveries` previous attempts and a dead-letter queue is
//!   configured, publish to the dead-letter queue and ack the original.
//!
//! A failed `start()` is logged and leaves the relay `Idle`; errors never
//! propagate to the host. When the broker stream errors or ends the relay
//! drops back to `Connected` and `start()` reconnects it.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::models::Reading;
use crate::queue::{Delivery, DeliveryStream, MessageQueue, QueueConnector, QueueError};
use crate::sink::{ReadingSink, SinkError};

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    Connected,
    Consuming,
    Stopped,
}

/// How a delivery was settled with the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Ack,
    Requeue,
    DeadLetter,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("message body is not UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("message body is not a reading: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub queue: String,
    pub dead_letter_queue: Option<String>,
    pub max_redeliveries: u32,
    pub reconnect_delay: Duration,
}

impl RelaySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            queue: config.rabbitmq_queue.clone(),
            dead_letter_queue: config.relay_dead_letter_queue.clone(),
            max_redeliveries: config.relay_max_redeliveries,
            reconnect_delay: Duration::from_secs(config.relay_reconnect_secs),
        }
    }

    /// Settlement for a delivery that could not be forwarded.
    pub fn settle_failure(&self, delivery_count: Option<u32>) -> Settlement {
        // ---
        match (delivery_count, &self.dead_letter_queue) {
            (Some(count), Some(_)) if count >= self.max_redeliveries => Settlement::DeadLetter,
            _ => Settlement::Requeue,
        }
    }
}

pub struct MessageRelay {
    connector: Arc<dyn QueueConnector>,
    sink: Arc<dyn ReadingSink>,
    settings: RelaySettings,
    state: Arc<watch::Sender<RelayState>>,
    inner: Mutex<RelayInner>,
}

struct RelayInner {
    queue: Option<Arc<dyn MessageQueue>>,
    cancel: CancellationToken,
    consumer: Option<JoinHandle<()>>,
}

impl MessageRelay {
    // ---
    pub fn new(
        connector: Arc<dyn QueueConnector>,
        sink: Arc<dyn ReadingSink>,
        settings: RelaySettings,
    ) -> Self {
        let (state, _) = watch::channel(RelayState::Idle);
        Self {
            connector,
            sink,
            settings,
            state: Arc::new(state),
            inner: Mutex::new(RelayInner {
                queue: None,
                cancel: CancellationToken::new(),
                consumer: None,
            }),
        }
    }

    pub fn state(&self) -> RelayState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change, including the consumer
    /// dropping back to `Connected` when the broker stream ends.
    pub fn watch_state(&self) -> watch::Receiver<RelayState> {
        self.state.subscribe()
    }

    /// Connect, declare the queue(s) and begin consuming.
    ///
    /// Acts from `Idle`, or from `Connected` after the consumer lost its
    /// stream, in which case the old connection is closed and a new one is
    /// opened. Otherwise returns the current state unchanged.
    pub async fn start(&self) -> RelayState {
        // ---
        let mut inner = self.inner.lock().await;
        match self.state() {
            RelayState::Idle => {}
            RelayState::Connected => {
                info!("Reconnecting queue relay");
                self.release(&mut inner).await;
            }
            state => {
                debug!("Relay start ignored in state {:?}", state);
                return state;
            }
        }

        let queue = match self.connector.connect().await {
            Ok(queue) => queue,
            Err(err) => {
                error!("Failed to start queue relay: {}", err);
                return self.set_state(RelayState::Idle);
            }
        };
        self.set_state(RelayState::Connected);

        let deliveries = match self.subscribe(queue.as_ref()).await {
            Ok(deliveries) => deliveries,
            Err(err) => {
                error!("Failed to start queue relay: {}", err);
                close_quietly(queue.as_ref()).await;
                return self.set_state(RelayState::Idle);
            }
        };

        let handler = Arc::new(DeliveryHandler {
            queue: Arc::clone(&queue),
            sink: Arc::clone(&self.sink),
            settings: self.settings.clone(),
        });
        let cancel = CancellationToken::new();
        // Consuming must be visible before the consumer can drop back from it
        self.set_state(RelayState::Consuming);
        inner.consumer = Some(tokio::spawn(consume(
            deliveries,
            handler,
            cancel.clone(),
            Arc::clone(&self.state),
        )));
        inner.cancel = cancel;
        inner.queue = Some(queue);

        info!("Queue relay started on queue {}", self.settings.queue);
        RelayState::Consuming
    }

    /// Stop consuming, let in-flight deliveries settle, then close the
    /// channel and connection. Close errors are ignored. Idempotent.
    pub async fn stop(&self) {
        // ---
        let mut inner = self.inner.lock().await;
        if self.state() == RelayState::Stopped {
            return;
        }

        info!("Stopping queue relay");
        self.release(&mut inner).await;
        self.set_state(RelayState::Stopped);
    }

    /// Restart consumption whenever the broker stream is lost, retrying
    /// every `reconnect_delay` until it succeeds. Runs until `cancel` fires
    /// or the relay is stopped.
    pub async fn supervise(self: Arc<Self>, cancel: CancellationToken) {
        // ---
        let mut state = self.watch_state();
        let retry = self.settings.reconnect_delay;

        loop {
            let current = *state.borrow_and_update();
            match current {
                RelayState::Stopped => return,
                RelayState::Connected => {
                    if !self.reconnect(retry, &cancel).await {
                        return;
                    }
                }
                RelayState::Idle | RelayState::Consuming => {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        changed = state.changed() => if changed.is_err() { return },
                    }
                }
            }
        }
    }

    /// Retry `start()` until consuming again. False once supervision should
    /// end.
    async fn reconnect(&self, retry: Duration, cancel: &CancellationToken) -> bool {
        // ---
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(retry) => {}
            }
            match self.start().await {
                RelayState::Consuming => return true,
                RelayState::Stopped => return false,
                _ => warn!("Queue relay reconnect failed; retrying in {:?}", retry),
            }
        }
    }

    /// Cancel the consumer, wait for it to drain, and close the queue.
    async fn release(&self, inner: &mut RelayInner) {
        // ---
        inner.cancel.cancel();
        if let Some(consumer) = inner.consumer.take() {
            if let Err(err) = consumer.await {
                debug!("Relay consumer task ended abnormally: {}", err);
            }
        }
        if let Some(queue) = inner.queue.take() {
            close_quietly(queue.as_ref()).await;
        }
    }

    fn set_state(&self, state: RelayState) -> RelayState {
        self.state.send_replace(state);
        state
    }

    async fn subscribe(&self, queue: &dyn MessageQueue) -> Result<DeliveryStream, QueueError> {
        // ---
        queue.declare_queue(&self.settings.queue).await?;
        if let Some(dead_letter) = &self.settings.dead_letter_queue {
            queue.declare_queue(dead_letter).await?;
        }
        queue.consume(&self.settings.queue).await
    }
}

async fn close_quietly(queue: &dyn MessageQueue) {
    if let Err(err) = queue.close().await {
        debug!("Ignoring error while closing queue: {}", err);
    }
}

async fn consume(
    mut deliveries: DeliveryStream,
    handler: Arc<DeliveryHandler>,
    cancel: CancellationToken,
    state: Arc<watch::Sender<RelayState>>,
) {
    // ---
    let mut in_flight = JoinSet::new();

    let stream_lost = loop {
        tokio::select! {
            _ = cancel.cancelled() => break false,
            next = deliveries.next() => match next {
                Some(Ok(delivery)) => {
                    let handler = Arc::clone(&handler);
                    in_flight.spawn(async move { handler.handle(delivery).await });
                }
                Some(Err(err)) => {
                    error!("Queue consumer failed: {}", err);
                    break true;
                }
                None => {
                    warn!("Queue consumer stream ended");
                    break true;
                }
            },
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(err) = joined {
                    error!("Delivery handler task failed: {}", err);
                }
            }
        }
    };

    while let Some(joined) = in_flight.join_next().await {
        if let Err(err) = joined {
            error!("Delivery handler task failed: {}", err);
        }
    }

    if stream_lost {
        state.send_if_modified(|current| {
            let consuming = *current == RelayState::Consuming;
            if consuming {
                *current = RelayState::Connected;
            }
            consuming
        });
    }
    debug!("Queue consumer loop finished");
}

/// Forwards and settles single deliveries.
pub struct DeliveryHandler {
    queue: Arc<dyn MessageQueue>,
    sink: Arc<dyn ReadingSink>,
    settings: RelaySettings,
}

impl DeliveryHandler {
    // ---
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        sink: Arc<dyn ReadingSink>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            queue,
            sink,
            settings,
        }
    }

    pub async fn handle(&self, delivery: Delivery) -> Settlement {
        // ---
        let settlement = match self.forward(&delivery.body).await {
            Ok(()) => Settlement::Ack,
            Err(err) => {
                error!(
                    tag = delivery.tag,
                    redelivered = delivery.redelivered,
                    "Error processing queue message: {}",
                    err
                );
                self.settings.settle_failure(delivery.delivery_count)
            }
        };

        match settlement {
            Settlement::Ack => self.ack(delivery.tag).await,
            Settlement::Requeue => self.requeue(delivery.tag).await,
            Settlement::DeadLetter => return self.dead_letter(&delivery).await,
        }
        settlement
    }

    async fn forward(&self, body: &[u8]) -> Result<(), RelayError> {
        // ---
        let text = std::str::from_utf8(body).map_err(DecodeError::from)?;
        serde_json::from_str::<Reading>(text).map_err(DecodeError::from)?;
        self.sink.forward(text).await?;
        Ok(())
    }

    async fn dead_letter(&self, delivery: &Delivery) -> Settlement {
        // ---
        let Some(dead_letter) = &self.settings.dead_letter_queue else {
            self.requeue(delivery.tag).await;
            return Settlement::Requeue;
        };

        match self.queue.publish(dead_letter, &delivery.body).await {
            Ok(()) => {
                warn!(
                    tag = delivery.tag,
                    attempts = ?delivery.delivery_count,
                    "Message moved to dead-letter queue {}",
                    dead_letter
                );
                self.ack(delivery.tag).await;
                Settlement::DeadLetter
            }
            Err(err) => {
                error!("Failed to dead-letter message {}: {}", delivery.tag, err);
                self.requeue(delivery.tag).await;
                Settlement::Requeue
            }
        }
    }

    async fn ack(&self, tag: u64) {
        if let Err(err) = self.queue.ack(tag).await {
            warn!("Failed to ack message {}: {}", tag, err);
        }
    }

    async fn requeue(&self, tag: u64) {
        if let Err(err) = self.queue.nack(tag, true).await {
            warn!("Failed to nack message {}: {}", tag, err);
        }
    }
}
