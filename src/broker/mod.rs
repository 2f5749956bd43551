//! Broker client — connection lifecycle, topology declaration, publishing
//! and a prefetch-1 consumption loop with explicit acknowledgment.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Broker (trait)                          │
//! │  publish(destination, body, reply_to, correlation_id)       │
//! │  consume(source, handler, stop) / close()                   │
//! └─────────────────────────────────────────────────────────────┘
//!          │                                  │
//!          ▼                                  ▼
//! ┌─────────────────┐              ┌─────────────────────┐
//! │   AmqpBroker    │              │   InMemoryBroker    │
//! │ (lapin, deploy) │              │ (tests, one process)│
//! └─────────────────┘              └─────────────────────┘
//! ```
//!
//! Delivery is at-least-once: a message is removed from its queue only when
//! the handler acknowledges it, so a crash between delivery and ack causes
//! redelivery. Handlers must tolerate reprocessing. `consume` never
//! acknowledges on the handler's behalf.
//!
//! Prefetch is fixed at 1: a consumer holds at most one unacknowledged
//! delivery, which serializes handling per queue. This is the only ordering
//! guarantee the broker layer provides, and it holds per queue, not across
//! queues.

mod amqp;
mod error;
mod memory;
mod message;
mod stop;

pub use amqp::AmqpBroker;
pub use error::BrokerError;
pub use memory::InMemoryBroker;
pub use message::Delivery;
pub use stop::{stop_channel, StopHandle, StopToken};

use std::sync::Arc;

use async_trait::async_trait;

/// Content type tag applied to every published message.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// A message broker client.
///
/// Implementations declare missing topology on both the publish and the
/// consume path, so the two services need no shared setup step and no
/// knowledge of each other's addresses: a request carries the reply
/// destination with it.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Publish `body` to `destination`, tagged with the correlation id and,
    /// when present, a reply destination.
    ///
    /// Topology-declaration failure and send failure are both reported as
    /// [`BrokerError::Publish`]; the caller decides whether to surface or
    /// log-and-drop.
    async fn publish(
        &self,
        destination: &str,
        body: &[u8],
        reply_to: Option<&str>,
        correlation_id: &str,
    ) -> Result<(), BrokerError>;

    /// Consume deliveries from `source` one at a time until the stop token
    /// fires or the connection closes.
    ///
    /// Each delivery is handed to `handler`, which decides acknowledgment.
    /// Returns `Ok(())` on a clean stop and [`BrokerError::Consume`] when
    /// the delivery stream fails, which is fatal to the worker that owns it.
    async fn consume(
        &self,
        source: &str,
        handler: Arc<dyn DeliveryHandler>,
        stop: StopToken,
    ) -> Result<(), BrokerError>;

    /// Release the connection. Idempotent; safe on an already-closed client.
    async fn close(&self);
}

/// Processes one delivery at a time from a consumed queue.
///
/// The handler owns the acknowledgment decision via [`Delivery::ack`]. A
/// delivery released without acknowledgment is redelivered, so handlers that
/// discard a message (poison input, unknown order) still ack it.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    async fn handle(&self, delivery: Delivery);
}
