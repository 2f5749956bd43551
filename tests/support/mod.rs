//! Shared fixture: a complete two-service system wired over the in-memory
//! broker, with both consumers running as background tasks.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use order_relay::broker::{stop_channel, BrokerError, InMemoryBroker, StopHandle};
use order_relay::config::{MessageRoutes, PaymentConfig};
use order_relay::order::{Customer, Order, OrderStatus, Product};
use order_relay::store::InMemoryStore;
use order_relay::{CorrelationHandler, CreateOrder, OrderService, PaymentWorker, Store};

pub const REQUEST_QUEUE: &str = "payment-requests";
pub const RESPONSE_QUEUE: &str = "payment-responses";
pub const UNIT_PRICE: f64 = 100.0;

pub struct TestSystem {
    pub broker: InMemoryBroker,
    pub store: Arc<InMemoryStore>,
    pub orders: OrderService,
    stop: StopHandle,
    workers: Vec<tokio::task::JoinHandle<Result<(), BrokerError>>>,
}

impl TestSystem {
    /// Both services, default approval threshold.
    pub async fn start() -> Self {
        Self::start_with(1000.0, true).await
    }

    /// Both services with a custom threshold.
    pub async fn start_with_threshold(threshold: f64) -> Self {
        Self::start_with(threshold, true).await
    }

    /// Order side only — requests pile up unanswered, responses can be
    /// injected by hand.
    pub async fn start_order_side_only() -> Self {
        Self::start_with(1000.0, false).await
    }

    async fn start_with(threshold: f64, with_payment_worker: bool) -> Self {
        let broker = InMemoryBroker::new();
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
                price: UNIT_PRICE,
            })
            .await
            .unwrap();

        let routes = MessageRoutes {
            payment_requests: REQUEST_QUEUE.to_string(),
            payment_responses: RESPONSE_QUEUE.to_string(),
        };
        let orders = OrderService::new(store.clone(), Arc::new(broker.clone()), routes);

        let (stop, stop_token) = stop_channel();
        let mut workers = Vec::new();

        if with_payment_worker {
            let worker = Arc::new(PaymentWorker::new(
                Arc::new(broker.clone()),
                PaymentConfig {
                    approval_threshold: threshold,
                },
            ));
            let stop_token = stop_token.clone();
            workers.push(tokio::spawn(async move {
                worker.run(REQUEST_QUEUE, stop_token).await
            }));
        }

        let correlation = Arc::new(CorrelationHandler::new(store.clone()));
        let correlation_broker = Arc::new(broker.clone());
        workers.push(tokio::spawn(async move {
            correlation
                .run(correlation_broker, RESPONSE_QUEUE, stop_token)
                .await
        }));

        Self {
            broker,
            store,
            orders,
            stop,
            workers,
        }
    }

    /// Place an order for the seeded customer/product with a fresh request id.
    pub async fn place_order(&self, quantity: u32) -> Order {
        self.orders
            .create_order(
                CreateOrder {
                    customer_id: "1".to_string(),
                    product_id: "1".to_string(),
                    quantity,
                },
                &Uuid::new_v4().to_string(),
            )
            .await
            .expect("order creation should succeed")
    }

    /// Poll until the order reaches `status` or a deadline passes.
    pub async fn wait_for_status(&self, order_id: &str, status: OrderStatus) -> Order {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let order = self.store.get_order(order_id).await.unwrap();
            if order.status == status {
                return order;
            }
            if Instant::now() > deadline {
                panic!(
                    "order {order_id} did not reach {status:?} in time (still {:?})",
                    order.status
                );
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Assert the order still has `status` after letting the system settle.
    pub async fn assert_status_stays(&self, order_id: &str, status: OrderStatus) {
        tokio::time::sleep(Duration::from_millis(150)).await;
        let order = self.store.get_order(order_id).await.unwrap();
        assert_eq!(order.status, status);
    }

    /// Stop both consumers and wait for them to exit cleanly.
    pub async fn shutdown(self) {
        self.stop.stop();
        for worker in self.workers {
            worker.await.unwrap().unwrap();
        }
    }
}
