//! In-memory store adapter.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Store, StoreError};
use crate::order::{Customer, Order, OrderStatus, Product, Transition};

#[derive(Default)]
struct State {
    customers: HashMap<String, Customer>,
    products: HashMap<String, Product>,
    orders: HashMap<String, Order>,
}

/// A thread-safe in-memory store.
///
/// All tables live behind one `Arc<RwLock<..>>`, so
/// [`update_order_status`](Store::update_order_status) is a single
/// write-locked read-modify-write, the atomic per-order update the core
/// depends on. `Clone` shares the underlying state.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted orders. Useful in tests asserting that a failed
    /// operation left no orders behind.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_customer(&self, customer: Customer) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.customers.contains_key(&customer.id) {
            return Err(StoreError::AlreadyExists {
                entity: "customer",
                id: customer.id,
            });
        }
        state.customers.insert(customer.id.clone(), customer);
        Ok(())
    }

    async fn get_customer(&self, id: &str) -> Result<Customer, StoreError> {
        self.state
            .read()
            .await
            .customers
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::CustomerNotFound(id.to_string()))
    }

    async fn create_product(&self, product: Product) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.products.contains_key(&product.id) {
            return Err(StoreError::AlreadyExists {
                entity: "product",
                id: product.id,
            });
        }
        state.products.insert(product.id.clone(), product);
        Ok(())
    }

    async fn get_product(&self, id: &str) -> Result<Product, StoreError> {
        self.state
            .read()
            .await
            .products
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::ProductNotFound(id.to_string()))
    }

    async fn create_order(&self, order: Order) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.orders.contains_key(&order.id) {
            return Err(StoreError::AlreadyExists {
                entity: "order",
                id: order.id,
            });
        }
        state.orders.insert(order.id.clone(), order);
        Ok(())
    }

    async fn get_order(&self, id: &str) -> Result<Order, StoreError> {
        self.state
            .read()
            .await
            .orders
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::OrderNotFound(id.to_string()))
    }

    async fn update_order_status(
        &self,
        id: &str,
        status: OrderStatus,
    ) -> Result<Transition, StoreError> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(id)
            .ok_or_else(|| StoreError::OrderNotFound(id.to_string()))?;
        Ok(order.apply(status))
    }
}
