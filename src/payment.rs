//! Payment worker — consumes payment requests, applies the approval rule,
//! replies on the request's reply-to destination.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::broker::{Broker, BrokerError, Delivery, DeliveryHandler, StopToken};
use crate::config::PaymentConfig;
use crate::messages::{PaymentOutcome, PaymentRequest, PaymentResponse};

/// Stand-in payment oracle.
///
/// No gateway is modeled: the decision is deterministic and side-effect-free
/// beyond the response it publishes. The worker learns where to respond from
/// each inbound delivery's reply-to, so it never holds the order service's
/// address.
pub struct PaymentWorker {
    broker: Arc<dyn Broker>,
    threshold: f64,
}

impl PaymentWorker {
    pub fn new(broker: Arc<dyn Broker>, config: PaymentConfig) -> Self {
        Self {
            broker,
            threshold: config.approval_threshold,
        }
    }

    /// The approval rule: success iff the amount is at or below the
    /// threshold.
    pub fn decide(&self, request: &PaymentRequest) -> PaymentOutcome {
        if request.total_price <= self.threshold {
            PaymentOutcome::Success
        } else {
            PaymentOutcome::Failed
        }
    }

    /// Consume payment requests from `queue` until stopped.
    ///
    /// Blocks for the life of the worker; a consume failure is fatal to the
    /// owning process.
    pub async fn run(self: Arc<Self>, queue: &str, stop: StopToken) -> Result<(), BrokerError> {
        let broker = Arc::clone(&self.broker);
        broker.consume(queue, self, stop).await
    }

    async fn ack(delivery: &Delivery) {
        if let Err(e) = delivery.ack().await {
            warn!(correlation_id = %delivery.correlation_id, error = %e, "acknowledge failed");
        }
    }
}

#[async_trait]
impl DeliveryHandler for PaymentWorker {
    /// At-least-once, best-effort handling: every path acknowledges. A
    /// request that cannot be decoded is a poison message, dropped without a
    /// response. A response publish failure is logged and the request still
    /// acked, silently losing the response.
    async fn handle(&self, delivery: Delivery) {
        let correlation_id = delivery.correlation_id.clone();

        let request: PaymentRequest = match serde_json::from_slice(&delivery.body) {
            Ok(request) => request,
            Err(e) => {
                warn!(correlation_id, error = %e, "discarding undecodable payment request");
                Self::ack(&delivery).await;
                return;
            }
        };

        let outcome = self.decide(&request);
        match outcome {
            PaymentOutcome::Success => {
                info!(correlation_id, order_id = %request.order_id, "payment successful");
            }
            PaymentOutcome::Failed => {
                info!(
                    correlation_id,
                    order_id = %request.order_id,
                    total_price = request.total_price,
                    "payment failed: insufficient funds"
                );
            }
        }

        match delivery.reply_to.as_deref() {
            Some(reply_to) => {
                let response = PaymentResponse::new(&request.order_id, outcome);
                match serde_json::to_vec(&response) {
                    Ok(body) => {
                        if let Err(e) = self
                            .broker
                            .publish(reply_to, &body, None, &correlation_id)
                            .await
                        {
                            warn!(
                                correlation_id,
                                order_id = %request.order_id,
                                error = %e,
                                "payment response not published"
                            );
                        } else {
                            debug!(correlation_id, order_id = %request.order_id, "payment response published");
                        }
                    }
                    Err(e) => {
                        warn!(correlation_id, error = %e, "payment response encode failed");
                    }
                }
            }
            None => {
                warn!(
                    correlation_id,
                    order_id = %request.order_id,
                    "payment request carries no reply destination, response dropped"
                );
            }
        }

        Self::ack(&delivery).await;
    }
}
