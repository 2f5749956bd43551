//! An inbound delivery and its acknowledgment handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lapin::options::BasicAckOptions;

use super::error::BrokerError;

/// One message handed to a [`DeliveryHandler`](super::DeliveryHandler).
///
/// Carries the protocol metadata the broker round-trips unchanged: the
/// correlation id linking a response back to its request, and the reply
/// destination a responder publishes to. Acknowledgment is explicit: a
/// delivery dropped without [`ack`](Self::ack) returns to its queue.
pub struct Delivery {
    /// Queue this delivery was consumed from.
    pub source: String,
    /// Raw message body.
    pub body: Vec<u8>,
    /// Correlation id, empty when the publisher supplied none.
    pub correlation_id: String,
    /// Where a response to this message should be sent, if the publisher
    /// expects one.
    pub reply_to: Option<String>,
    /// Whether this delivery was handed out before and not acknowledged.
    pub redelivered: bool,
    acker: Acker,
}

enum Acker {
    Amqp(lapin::acker::Acker),
    Memory(Arc<AtomicBool>),
}

impl Delivery {
    pub(crate) fn from_amqp(source: &str, delivery: lapin::message::Delivery) -> Self {
        let correlation_id = delivery
            .properties
            .correlation_id()
            .as_ref()
            .map(|value| value.as_str().to_string())
            .unwrap_or_default();
        let reply_to = delivery
            .properties
            .reply_to()
            .as_ref()
            .map(|value| value.as_str().to_string());

        Self {
            source: source.to_string(),
            body: delivery.data,
            correlation_id,
            reply_to,
            redelivered: delivery.redelivered,
            acker: Acker::Amqp(delivery.acker),
        }
    }

    pub(crate) fn from_memory(
        source: &str,
        body: Vec<u8>,
        correlation_id: String,
        reply_to: Option<String>,
        redelivered: bool,
        acked: Arc<AtomicBool>,
    ) -> Self {
        Self {
            source: source.to_string(),
            body,
            correlation_id,
            reply_to,
            redelivered,
            acker: Acker::Memory(acked),
        }
    }

    /// Acknowledge this delivery, removing it from its queue.
    pub async fn ack(&self) -> Result<(), BrokerError> {
        match &self.acker {
            Acker::Amqp(acker) => acker.ack(BasicAckOptions::default()).await.map_err(|e| {
                BrokerError::Consume {
                    src: self.source.clone(),
                    reason: format!("acknowledge failed: {e}"),
                }
            }),
            Acker::Memory(acked) => {
                acked.store(true, Ordering::SeqCst);
                Ok(())
            }
        }
    }
}
