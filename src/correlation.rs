//! Correlation handler — maps payment responses back onto local orders and
//! drives their terminal transition.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::broker::{Broker, BrokerError, Delivery, DeliveryHandler, StopToken};
use crate::messages::{PaymentOutcome, PaymentResponse};
use crate::order::{OrderStatus, Transition};
use crate::store::Store;

/// Sole owner of the Pending → terminal transition.
///
/// Everything it consumes was published at-least-once, so every path is a
/// safe no-op on repetition: a duplicate response finds a terminal order and
/// changes nothing, an unknown or unrecognizable response is discarded.
/// Nothing is ever retried or dead-lettered.
pub struct CorrelationHandler {
    store: Arc<dyn Store>,
}

impl CorrelationHandler {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Consume payment responses from `queue` until stopped.
    pub async fn run(
        self: Arc<Self>,
        broker: Arc<dyn Broker>,
        queue: &str,
        stop: StopToken,
    ) -> Result<(), BrokerError> {
        broker.consume(queue, self, stop).await
    }

    async fn ack(delivery: &Delivery) {
        if let Err(e) = delivery.ack().await {
            warn!(correlation_id = %delivery.correlation_id, error = %e, "acknowledge failed");
        }
    }
}

#[async_trait]
impl DeliveryHandler for CorrelationHandler {
    async fn handle(&self, delivery: Delivery) {
        let correlation_id = delivery.correlation_id.clone();

        let response: PaymentResponse = match serde_json::from_slice(&delivery.body) {
            Ok(response) => response,
            Err(e) => {
                warn!(correlation_id, error = %e, "discarding undecodable payment response");
                Self::ack(&delivery).await;
                return;
            }
        };

        let status = match response.outcome() {
            Some(PaymentOutcome::Success) => OrderStatus::Confirmed,
            Some(PaymentOutcome::Failed) => OrderStatus::Canceled,
            None => {
                warn!(
                    correlation_id,
                    order_id = %response.order_id,
                    payment_status = %response.payment_status,
                    "discarding payment response with unrecognized status"
                );
                Self::ack(&delivery).await;
                return;
            }
        };

        match self.store.update_order_status(&response.order_id, status).await {
            Ok(Transition::Applied) => {
                info!(
                    correlation_id,
                    order_id = %response.order_id,
                    status = ?status,
                    "order resolved"
                );
            }
            Ok(Transition::AlreadyTerminal) => {
                debug!(
                    correlation_id,
                    order_id = %response.order_id,
                    "duplicate payment response ignored"
                );
            }
            Err(e) => {
                warn!(
                    correlation_id,
                    order_id = %response.order_id,
                    error = %e,
                    "discarding payment response that matches no order"
                );
            }
        }

        Self::ack(&delivery).await;
    }
}
