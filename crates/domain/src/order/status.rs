//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// Status transitions:
/// ```text
/// Pending ──► Paid ──► Processing ──► Shipped ──► Delivered
///    │          │           │                         │
///    └──────────┴───────────┴──► Cancelled            ├──► PartiallyReturned ──► Returned
///                                                     └──► Returned
/// ```
///
/// Plain status writes move forward along the fulfillment chain and may
/// skip ahead (e.g. `Paid` straight to `Shipped`). `Cancelled`,
/// `Returned` and `PartiallyReturned` are only reachable through the
/// cancel/return workflows, which carry the inventory restoration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order placed, stock deducted, awaiting payment.
    #[default]
    Pending,

    /// Payment confirmed.
    Paid,

    /// Order is being picked and packed.
    Processing,

    /// Order handed to the carrier.
    Shipped,

    /// Order received by the customer.
    Delivered,

    /// Order cancelled before shipment, stock restored (terminal).
    Cancelled,

    /// Every item returned, stock restored (terminal).
    Returned,

    /// Some items returned; the rest remain with the customer.
    PartiallyReturned,
}

impl OrderStatus {
    /// Position along the fulfillment chain; `None` for workflow statuses.
    fn rank(&self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Paid => Some(1),
            OrderStatus::Processing => Some(2),
            OrderStatus::Shipped => Some(3),
            OrderStatus::Delivered => Some(4),
            OrderStatus::Cancelled | OrderStatus::Returned | OrderStatus::PartiallyReturned => None,
        }
    }

    /// Returns true if a plain status write may move an order from this
    /// status to `next`. Skipping ahead is allowed, moving backward is not.
    pub fn can_advance_to(&self, next: OrderStatus) -> bool {
        match (self.rank(), next.rank()) {
            (Some(current), Some(next)) => next > current,
            _ => false,
        }
    }

    /// Returns true if the order can be cancelled in this status.
    ///
    /// Once shipped, an order can no longer be cancelled; delivered goods
    /// go through the return flow instead.
    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Paid | OrderStatus::Processing
        )
    }

    /// Returns true if items can be returned in this status.
    pub fn can_return(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::PartiallyReturned)
    }

    /// Returns true if this status is only reachable through the
    /// cancel/return workflows, never through a plain status write.
    pub fn is_workflow_target(&self) -> bool {
        matches!(
            self,
            OrderStatus::Cancelled | OrderStatus::Returned | OrderStatus::PartiallyReturned
        )
    }

    /// Returns true if this is a terminal status (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Returned)
    }

    /// Returns the wire form of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Returned => "RETURNED",
            OrderStatus::PartiallyReturned => "PARTIALLY_RETURNED",
        }
    }

    /// Parses the wire form of a status.
    pub fn parse(s: &str) -> Option<OrderStatus> {
        match s {
            "PENDING" => Some(OrderStatus::Pending),
            "PAID" => Some(OrderStatus::Paid),
            "PROCESSING" => Some(OrderStatus::Processing),
            "SHIPPED" => Some(OrderStatus::Shipped),
            "DELIVERED" => Some(OrderStatus::Delivered),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            "RETURNED" => Some(OrderStatus::Returned),
            "PARTIALLY_RETURNED" => Some(OrderStatus::PartiallyReturned),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
