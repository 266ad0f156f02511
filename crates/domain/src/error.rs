//! Domain error types.

use common::{OrderId, VariantId};
use thiserror::Error;

use crate::inventory::InventoryError;
use crate::order::OrderError;
use crate::repository::RepositoryError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An order rule was violated.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// An inventory rule was violated.
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// The order does not exist, or belongs to a different store than
    /// the caller asked about.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The variant has no inventory record.
    #[error("No inventory record for variant {0}")]
    InventoryNotFound(VariantId),

    /// The storage layer failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
