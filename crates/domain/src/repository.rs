//! Storage ports for orders and inventory.
//!
//! The traits live here so the services stay free of any persistence
//! technology; the `repository` crate provides the in-memory and
//! Postgres implementations.

use async_trait::async_trait;
use common::{OrderId, OrderItemId, StoreId, VariantId};
use thiserror::Error;

use crate::inventory::{InventoryLevel, StockChange};
use crate::order::{Order, OrderStatus};

/// Errors surfaced by repository implementations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The variant has no inventory record.
    #[error("No inventory record for variant {0}")]
    InventoryNotFound(VariantId),

    /// An adjustment or deduction would have driven a quantity negative.
    #[error(
        "Insufficient stock for variant {variant_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        variant_id: VariantId,
        requested: i64,
        available: i64,
    },

    /// A compare-and-set status write found a different status than the
    /// caller expected. The losing writer of two concurrent transitions
    /// sees this.
    #[error("Status conflict for order {order_id}: expected {expected}, found {actual}")]
    StatusConflict {
        order_id: OrderId,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    /// Stored data could not be mapped back into domain types.
    #[error("Corrupt stored data: {0}")]
    Corrupt(String),

    /// The storage backend failed.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl RepositoryError {
    /// Wraps a backend driver error.
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }

    /// Wraps a row-mapping failure.
    pub fn corrupt(err: impl std::fmt::Display) -> Self {
        Self::Corrupt(err.to_string())
    }
}

/// Result type for repository operations.
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Order persistence port.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persists a new order atomically.
    ///
    /// The order row, every item row and every stock deduction (one per
    /// item carrying a variant id) commit together or not at all. A
    /// deduction that would drive a quantity negative aborts the whole
    /// insert with [`RepositoryError::InsufficientStock`].
    ///
    /// Returns the applied stock changes so the caller can evaluate
    /// threshold crossings after commit.
    async fn insert_order(&self, order: &Order) -> RepositoryResult<Vec<StockChange>>;

    /// Loads an order with its items.
    async fn fetch_order(&self, order_id: OrderId) -> RepositoryResult<Option<Order>>;

    /// Loads every order belonging to a store, newest first.
    async fn orders_for_store(&self, store_id: StoreId) -> RepositoryResult<Vec<Order>>;

    /// Moves an order from `expected` to `next` status.
    ///
    /// The write is a compare-and-set: it applies only while the stored
    /// status still equals `expected`, otherwise the call fails with
    /// [`RepositoryError::StatusConflict`].
    ///
    /// Returns the order as stored after the transition.
    async fn transition_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> RepositoryResult<Order>;

    /// Moves an order status and stamps the named items as returned, in
    /// one transaction. Same compare-and-set rule as
    /// [`transition_status`](OrderRepository::transition_status).
    ///
    /// Returns the order as stored after the return.
    async fn record_return(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        item_ids: &[OrderItemId],
    ) -> RepositoryResult<Order>;
}

/// Inventory persistence port.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    /// Loads the level for a variant.
    async fn level(&self, variant_id: VariantId) -> RepositoryResult<Option<InventoryLevel>>;

    /// Inserts or replaces the level for a variant.
    ///
    /// An existing record keeps its ID; only quantity, store and
    /// timestamp change. Returns the record as stored.
    async fn put_level(&self, level: &InventoryLevel) -> RepositoryResult<InventoryLevel>;

    /// Atomically applies `delta` to a variant's quantity.
    ///
    /// The read-modify-write runs under a write lock on the variant's
    /// record, so concurrent adjustments to the same variant serialize
    /// while disjoint variants proceed independently. A result below
    /// zero is rejected with [`RepositoryError::InsufficientStock`] and
    /// leaves the record untouched; a missing record yields
    /// [`RepositoryError::InventoryNotFound`].
    async fn adjust(&self, variant_id: VariantId, delta: i64) -> RepositoryResult<StockChange>;
}
