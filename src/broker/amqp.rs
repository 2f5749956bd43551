//! AMQP implementation of the broker client, backed by `lapin`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, BasicQosOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tracing::{debug, info, warn};

use super::error::BrokerError;
use super::message::Delivery;
use super::stop::StopToken;
use super::{Broker, DeliveryHandler, CONTENT_TYPE_JSON};

/// Bounded retry budget for the initial connection.
const CONNECT_ATTEMPTS: u32 = 10;
const CONNECT_BACKOFF_INITIAL: Duration = Duration::from_millis(500);
const CONNECT_BACKOFF_MAX: Duration = Duration::from_secs(16);

/// Broker client over AMQP 0.9.1.
///
/// Owns one connection and a channel reserved for publishing; every
/// `consume` call opens its own channel so that the prefetch window of one
/// consumer never throttles another. Queues are declared durable,
/// on demand, on both the publish and the consume path.
pub struct AmqpBroker {
    connection: Connection,
    publish_channel: Channel,
    closed: AtomicBool,
}

impl AmqpBroker {
    /// Connect to the broker at `url`, retrying with exponential backoff.
    ///
    /// Fails with [`BrokerError::Connect`] once the bounded attempt budget
    /// is spent; the caller is expected to treat that as fatal.
    pub async fn connect(url: &str) -> Result<Self, BrokerError> {
        let mut backoff = CONNECT_BACKOFF_INITIAL;
        let mut last_error = String::new();

        for attempt in 1..=CONNECT_ATTEMPTS {
            match Connection::connect(url, ConnectionProperties::default()).await {
                Ok(connection) => {
                    let publish_channel =
                        connection
                            .create_channel()
                            .await
                            .map_err(|e| BrokerError::Connect {
                                attempts: attempt,
                                reason: format!("channel open failed: {e}"),
                            })?;
                    info!(attempt, "connected to broker");
                    return Ok(Self {
                        connection,
                        publish_channel,
                        closed: AtomicBool::new(false),
                    });
                }
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < CONNECT_ATTEMPTS {
                        warn!(
                            attempt,
                            backoff_ms = backoff.as_millis() as u64,
                            error = %last_error,
                            "broker connection failed, retrying"
                        );
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(CONNECT_BACKOFF_MAX);
                    }
                }
            }
        }

        Err(BrokerError::Connect {
            attempts: CONNECT_ATTEMPTS,
            reason: last_error,
        })
    }

    async fn declare_queue(channel: &Channel, queue: &str) -> Result<(), lapin::Error> {
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl Broker for AmqpBroker {
    async fn publish(
        &self,
        destination: &str,
        body: &[u8],
        reply_to: Option<&str>,
        correlation_id: &str,
    ) -> Result<(), BrokerError> {
        let publish_error = |reason: String| BrokerError::Publish {
            destination: destination.to_string(),
            reason,
        };

        Self::declare_queue(&self.publish_channel, destination)
            .await
            .map_err(|e| publish_error(format!("queue declare failed: {e}")))?;

        let mut properties = BasicProperties::default()
            .with_content_type(CONTENT_TYPE_JSON.to_string().into())
            .with_correlation_id(correlation_id.to_string().into());
        if let Some(reply_to) = reply_to {
            properties = properties.with_reply_to(reply_to.to_string().into());
        }

        // Default direct exchange: routing key is the queue name.
        let confirm = self
            .publish_channel
            .basic_publish("", destination, BasicPublishOptions::default(), body, properties)
            .await
            .map_err(|e| publish_error(e.to_string()))?;
        confirm.await.map_err(|e| publish_error(e.to_string()))?;

        debug!(destination, correlation_id, "message published");
        Ok(())
    }

    async fn consume(
        &self,
        source: &str,
        handler: Arc<dyn DeliveryHandler>,
        mut stop: StopToken,
    ) -> Result<(), BrokerError> {
        let consume_error = |reason: String| BrokerError::Consume {
            src: source.to_string(),
            reason,
        };

        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| consume_error(format!("channel open failed: {e}")))?;
        Self::declare_queue(&channel, source)
            .await
            .map_err(|e| consume_error(format!("queue declare failed: {e}")))?;
        // One unacknowledged delivery at a time: handling is serialized per
        // queue, and an unacked message survives a crash for redelivery.
        channel
            .basic_qos(1, BasicQosOptions::default())
            .await
            .map_err(|e| consume_error(format!("qos failed: {e}")))?;

        let mut deliveries = channel
            .basic_consume(
                source,
                "",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| consume_error(e.to_string()))?;

        info!(queue = source, "consumer registered");

        loop {
            tokio::select! {
                _ = stop.stopped() => {
                    info!(queue = source, "consumer stopped");
                    return Ok(());
                }
                next = deliveries.next() => match next {
                    Some(Ok(delivery)) => {
                        handler.handle(Delivery::from_amqp(source, delivery)).await;
                    }
                    Some(Err(e)) => return Err(consume_error(e.to_string())),
                    None => {
                        // Stream end means the channel or connection went
                        // away; only a deliberate close is a clean exit.
                        if self.closed.load(Ordering::SeqCst) {
                            return Ok(());
                        }
                        return Err(consume_error("delivery stream ended".to_string()));
                    }
                }
            }
        }
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.connection.close(200, "client shutdown").await {
            debug!(error = %e, "broker connection close");
        }
        info!("broker connection closed");
    }
}
