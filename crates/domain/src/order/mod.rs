//! Order entity, status machine and lifecycle service.

mod draft;
mod order;
mod service;
mod status;
mod value_objects;

pub use draft::{NewOrder, NewOrderItem};
pub use order::{Order, OrderItem};
pub use service::{InventoryImpact, ItemImpact, OrdersService};
pub use status::OrderStatus;
pub use value_objects::Address;

use common::{OrderId, OrderItemId, VariantId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The creation input was invalid. Every violation is listed.
    #[error("Order validation failed: {}", violations.join("; "))]
    Validation { violations: Vec<String> },

    /// One or more variants had less stock than the order requested.
    #[error("Insufficient stock for {} variant(s)", shortfalls.len())]
    InsufficientStock { shortfalls: Vec<StockShortfall> },

    /// A plain status write tried to move backward along the
    /// fulfillment chain.
    #[error("Invalid status transition: {from} to {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    /// A plain status write targeted a status owned by a workflow.
    #[error("Status {status} is only reachable through the cancel or return workflow")]
    WorkflowOnly { status: OrderStatus },

    /// The order can no longer be cancelled.
    #[error("Cannot cancel an order in {status} status; delivered orders go through the return flow")]
    CannotCancel { status: OrderStatus },

    /// The order is not in a returnable status.
    #[error("Cannot return items from an order in {status} status")]
    CannotReturn { status: OrderStatus },

    /// A return named an item the order does not contain.
    #[error("Item {item_id} does not belong to order {order_id}")]
    ItemNotInOrder {
        order_id: OrderId,
        item_id: OrderItemId,
    },

    /// A return named an item that was already returned.
    #[error("Item {item_id} has already been returned")]
    ItemAlreadyReturned { item_id: OrderItemId },
}

/// One variant that could not cover the quantity an order requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockShortfall {
    /// The variant that is short.
    pub variant_id: VariantId,

    /// Quantity the order requested across all of its lines.
    pub requested: i64,

    /// Quantity actually on hand (zero when no record exists).
    pub available: i64,
}
