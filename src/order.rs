//! Domain entities: orders and the reference data they are validated against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of an order.
///
/// `Pending` is the only initial state. `Confirmed` and `Canceled` are
/// terminal: once an order reaches either, no further transition applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Canceled,
}

impl OrderStatus {
    /// Whether this status admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Canceled)
    }
}

/// Outcome of applying a status transition to an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// The order moved to the new status.
    Applied,
    /// The order was already in a terminal status; nothing changed.
    ///
    /// Redelivered payment responses land here, so callers treat this as a
    /// quiet no-op rather than an error.
    AlreadyTerminal,
}

/// An order as persisted and served over the HTTP boundary.
///
/// `total_price` is always computed from reference data at creation; it is
/// never taken from client input.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub total_price: f64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a new `Pending` order, pricing it from the product's unit price.
    pub fn new(customer_id: &str, product_id: &str, quantity: u32, unit_price: f64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            customer_id: customer_id.to_string(),
            product_id: product_id.to_string(),
            quantity,
            total_price: f64::from(quantity) * unit_price,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a terminal status transition.
    ///
    /// Transitions are monotonic and one-shot: `Pending` may move to a
    /// terminal status exactly once; a terminal order ignores every further
    /// request, including a repeat of the transition it already took.
    pub fn apply(&mut self, status: OrderStatus) -> Transition {
        if self.status.is_terminal() {
            return Transition::AlreadyTerminal;
        }
        self.status = status;
        self.updated_at = Utc::now();
        Transition::Applied
    }
}

/// Reference data: a customer an order may be placed for.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Reference data: a product with the unit price orders are priced from.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: f64,
}
