//! Reference-data / order store — the persistence collaborator behind a
//! trait seam.
//!
//! The core never serializes across orders itself: correctness of the
//! terminal transition rests on [`Store::update_order_status`] being an
//! atomic, order-id-scoped read-modify-write, which every implementation
//! must provide.

mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::order::{Customer, Order, OrderStatus, Product, Transition};

/// Failures reported by a [`Store`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("customer {0} not found")]
    CustomerNotFound(String),
    #[error("product {0} not found")]
    ProductNotFound(String),
    #[error("order {0} not found")]
    OrderNotFound(String),
    #[error("{entity} {id} already exists")]
    AlreadyExists { entity: &'static str, id: String },
}

/// CRUD operations the core consumes.
///
/// Reads fail with the matching NotFound variant on an absent key; creates
/// fail with `AlreadyExists` on a duplicate (the seeding path relies on
/// being able to ignore that).
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_customer(&self, customer: Customer) -> Result<(), StoreError>;
    async fn get_customer(&self, id: &str) -> Result<Customer, StoreError>;

    async fn create_product(&self, product: Product) -> Result<(), StoreError>;
    async fn get_product(&self, id: &str) -> Result<Product, StoreError>;

    async fn create_order(&self, order: Order) -> Result<(), StoreError>;
    async fn get_order(&self, id: &str) -> Result<Order, StoreError>;

    /// Apply a status transition to one order atomically.
    ///
    /// Returns the transition outcome so the caller can tell a first
    /// application from an idempotent re-application to an already-terminal
    /// order.
    async fn update_order_status(
        &self,
        id: &str,
        status: OrderStatus,
    ) -> Result<Transition, StoreError>;
}
