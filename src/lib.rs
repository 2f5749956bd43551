pub mod broker;
pub mod config;
pub mod correlation;
pub mod http;
pub mod messages;
pub mod order;
pub mod payment;
pub mod service;
pub mod store;

pub use broker::{Broker, BrokerError, Delivery, DeliveryHandler, StopHandle, StopToken};
pub use config::Config;
pub use correlation::CorrelationHandler;
pub use messages::{PaymentOutcome, PaymentRequest, PaymentResponse};
pub use order::{Customer, Order, OrderStatus, Product, Transition};
pub use payment::PaymentWorker;
pub use service::{CreateOrder, OrderError, OrderService};
pub use store::{Store, StoreError};
