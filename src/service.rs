//! Order service — validates, prices and persists orders, then requests
//! payment over the broker.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::broker::{Broker, BrokerError};
use crate::config::MessageRoutes;
use crate::messages::PaymentRequest;
use crate::order::Order;
use crate::store::{Store, StoreError};

/// Input for order creation, as decoded from the HTTP body.
///
/// Deliberately carries no price field: the total is always computed from
/// reference data.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrder {
    pub customer_id: String,
    pub product_id: String,
    pub quantity: u32,
}

/// Failures of the order operations, with their HTTP mapping.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Client input problem: unresolvable reference or unusable quantity.
    /// Never retried.
    #[error("invalid order request: {0}")]
    Validation(String),
    /// Lookup of an order that does not exist.
    #[error("order {0} not found")]
    NotFound(String),
    /// The order was persisted but its payment request was not queued.
    #[error("payment request could not be queued: {0}")]
    Publish(BrokerError),
    /// Store fault other than a missing key.
    #[error("store failure: {0}")]
    Store(StoreError),
}

impl OrderError {
    /// Map this error to an HTTP status code.
    ///
    /// Publish failures surface as 400 like validation failures: the
    /// caller-visible contract is a 4xx with the error message, with only
    /// missing orders (404) and store faults (500) split out.
    pub fn status_code(&self) -> u16 {
        match self {
            OrderError::Validation(_) => 400,
            OrderError::NotFound(_) => 404,
            OrderError::Publish(_) => 400,
            OrderError::Store(_) => 500,
        }
    }
}

/// Creates and serves orders. The only writer of the Pending state; the
/// terminal transition belongs exclusively to the correlation handler.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    broker: Arc<dyn Broker>,
    routes: MessageRoutes,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, broker: Arc<dyn Broker>, routes: MessageRoutes) -> Self {
        Self {
            store,
            broker,
            routes,
        }
    }

    /// Validate, price and persist a new order, then publish its payment
    /// request tagged with `correlation_id` and this service's response
    /// queue as the reply destination.
    ///
    /// Returns the order in `Pending` state; its final disposition is read
    /// later via [`get_order`](Self::get_order). A publish failure after
    /// persistence is surfaced to the caller, but the Pending order remains;
    /// with no reconciliation sweep it stays Pending until a response
    /// arrives, which for this order never will.
    pub async fn create_order(
        &self,
        request: CreateOrder,
        correlation_id: &str,
    ) -> Result<Order, OrderError> {
        if request.quantity == 0 {
            return Err(OrderError::Validation("quantity must be at least 1".to_string()));
        }

        self.store
            .get_customer(&request.customer_id)
            .await
            .map_err(|e| match e {
                StoreError::CustomerNotFound(id) => {
                    OrderError::Validation(format!("unknown customer {id}"))
                }
                other => OrderError::Store(other),
            })?;

        let product = self
            .store
            .get_product(&request.product_id)
            .await
            .map_err(|e| match e {
                StoreError::ProductNotFound(id) => {
                    OrderError::Validation(format!("unknown product {id}"))
                }
                other => OrderError::Store(other),
            })?;

        let order = Order::new(
            &request.customer_id,
            &request.product_id,
            request.quantity,
            product.price,
        );
        self.store
            .create_order(order.clone())
            .await
            .map_err(OrderError::Store)?;

        let payment = PaymentRequest {
            order_id: order.id.clone(),
            total_price: order.total_price,
        };
        let body = serde_json::to_vec(&payment).map_err(|e| {
            OrderError::Publish(BrokerError::Publish {
                destination: self.routes.payment_requests.clone(),
                reason: format!("encode failed: {e}"),
            })
        })?;

        if let Err(e) = self
            .broker
            .publish(
                &self.routes.payment_requests,
                &body,
                Some(&self.routes.payment_responses),
                correlation_id,
            )
            .await
        {
            warn!(
                order_id = %order.id,
                correlation_id,
                error = %e,
                "payment request not published, order stays Pending"
            );
            return Err(OrderError::Publish(e));
        }

        info!(
            order_id = %order.id,
            correlation_id,
            total_price = order.total_price,
            "order created, payment requested"
        );
        Ok(order)
    }

    /// Read-through lookup of one order.
    pub async fn get_order(&self, id: &str) -> Result<Order, OrderError> {
        self.store.get_order(id).await.map_err(|e| match e {
            StoreError::OrderNotFound(id) => OrderError::NotFound(id),
            other => OrderError::Store(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{DeliveryHandler, StopToken};
    use crate::order::{Customer, OrderStatus, Product};
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Captures publishes; optionally fails them all.
    #[derive(Default)]
    struct RecordingBroker {
        published: Mutex<Vec<(String, Vec<u8>, Option<String>, String)>>,
        fail_publish: bool,
    }

    #[async_trait]
    impl Broker for RecordingBroker {
        async fn publish(
            &self,
            destination: &str,
            body: &[u8],
            reply_to: Option<&str>,
            correlation_id: &str,
        ) -> Result<(), BrokerError> {
            if self.fail_publish {
                return Err(BrokerError::Publish {
                    destination: destination.to_string(),
                    reason: "broker unavailable".to_string(),
                });
            }
            self.published.lock().unwrap().push((
                destination.to_string(),
                body.to_vec(),
                reply_to.map(str::to_string),
                correlation_id.to_string(),
            ));
            Ok(())
        }

        async fn consume(
            &self,
            _source: &str,
            _handler: std::sync::Arc<dyn DeliveryHandler>,
            _stop: StopToken,
        ) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn close(&self) {}
    }

    fn routes() -> MessageRoutes {
        MessageRoutes {
            payment_requests: "payment-requests".to_string(),
            payment_responses: "payment-responses".to_string(),
        }
    }

    async fn seeded_store() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store
            .create_customer(Customer {
                id: "1".to_string(),
                name: "Luke Skywalker".to_string(),
                email: "mail@naboo.com".to_string(),
            })
            .await
            .unwrap();
        store
            .create_product(Product {
                id: "1".to_string(),
                name: "Iphone".to_string(),
                price: 100.0,
            })
            .await
            .unwrap();
        store
    }

    fn create(quantity: u32) -> CreateOrder {
        CreateOrder {
            customer_id: "1".to_string(),
            product_id: "1".to_string(),
            quantity,
        }
    }

    #[tokio::test]
    async fn creates_pending_order_and_publishes_correlated_request() {
        let store = seeded_store().await;
        let broker = Arc::new(RecordingBroker::default());
        let service = OrderService::new(store.clone(), broker.clone(), routes());

        let order = service.create_order(create(5), "req-42").await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_price, 500.0);

        let persisted = store.get_order(&order.id).await.unwrap();
        assert_eq!(persisted.status, OrderStatus::Pending);

        let published = broker.published.lock().unwrap().clone();
        assert_eq!(published.len(), 1);
        let (destination, body, reply_to, correlation_id) = &published[0];
        assert_eq!(destination, "payment-requests");
        assert_eq!(reply_to.as_deref(), Some("payment-responses"));
        assert_eq!(correlation_id, "req-42");

        let request: PaymentRequest = serde_json::from_slice(body).unwrap();
        assert_eq!(request.order_id, order.id);
        assert_eq!(request.total_price, 500.0);
    }

    #[tokio::test]
    async fn unknown_customer_fails_validation_with_no_side_effects() {
        let store = seeded_store().await;
        let broker = Arc::new(RecordingBroker::default());
        let service = OrderService::new(store.clone(), broker.clone(), routes());

        let request = CreateOrder {
            customer_id: "999".to_string(),
            product_id: "1".to_string(),
            quantity: 1,
        };
        let err = service.create_order(request, "req-1").await.unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));
        assert_eq!(err.status_code(), 400);

        assert_eq!(store.order_count().await, 0);
        assert!(broker.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_product_fails_validation_with_no_side_effects() {
        let store = seeded_store().await;
        let broker = Arc::new(RecordingBroker::default());
        let service = OrderService::new(store.clone(), broker.clone(), routes());

        let request = CreateOrder {
            customer_id: "1".to_string(),
            product_id: "999".to_string(),
            quantity: 1,
        };
        let err = service.create_order(request, "req-1").await.unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));
        assert_eq!(store.order_count().await, 0);
        assert!(broker.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_quantity_fails_validation() {
        let store = seeded_store().await;
        let broker = Arc::new(RecordingBroker::default());
        let service = OrderService::new(store.clone(), broker.clone(), routes());

        let err = service.create_order(create(0), "req-1").await.unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn publish_failure_surfaces_but_order_stays_persisted() {
        let store = seeded_store().await;
        let broker = Arc::new(RecordingBroker {
            fail_publish: true,
            ..RecordingBroker::default()
        });
        let service = OrderService::new(store.clone(), broker, routes());

        let err = service.create_order(create(2), "req-1").await.unwrap_err();
        assert!(matches!(err, OrderError::Publish(_)));
        assert_eq!(err.status_code(), 400);

        // The Pending order survives the failed publish.
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn get_order_maps_missing_to_not_found() {
        let store = seeded_store().await;
        let broker = Arc::new(RecordingBroker::default());
        let service = OrderService::new(store, broker, routes());

        let err = service.get_order("missing").await.unwrap_err();
        assert!(matches!(err, OrderError::NotFound(id) if id == "missing"));
    }
}
