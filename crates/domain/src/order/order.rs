//! The order entity and its line items.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, OrderItemId, ProductId, StoreId, UserId, VariantId};
use serde::{Deserialize, Serialize};

use super::value_objects::Address;
use super::OrderStatus;

/// A customer order.
///
/// Orders are store-scoped and carry denormalized snapshots of
/// everything they reference (product names, prices, addresses), so a
/// delivered order reads the same even after the catalog changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// The unique order ID.
    pub id: OrderId,

    /// The store this order was placed against.
    pub store_id: StoreId,

    /// The customer who placed the order.
    pub user_id: UserId,

    /// Current lifecycle status.
    pub status: OrderStatus,

    /// Order total in cents.
    pub total: Money,

    /// Where the order ships to.
    pub shipping_address: Address,

    /// Where the order is billed to (defaults to the shipping address).
    pub billing_address: Address,

    /// The line items. Immutable after creation except for return stamps.
    pub items: Vec<OrderItem>,

    /// When the order was placed.
    pub created_at: DateTime<Utc>,

    /// When the order was last modified.
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Looks up a line item by ID.
    pub fn item(&self, item_id: OrderItemId) -> Option<&OrderItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    /// Items that have not been returned yet.
    pub fn outstanding_items(&self) -> impl Iterator<Item = &OrderItem> {
        self.items.iter().filter(|item| !item.is_returned())
    }

    /// Returns true if every line item has been returned.
    pub fn all_returned(&self) -> bool {
        self.items.iter().all(OrderItem::is_returned)
    }

    /// Sum of the line totals.
    pub fn items_total(&self) -> Money {
        self.items.iter().map(OrderItem::line_total).sum()
    }

    /// Number of line items.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

/// A single line within an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    /// The unique line item ID.
    pub id: OrderItemId,

    /// The inventory-tracked variant this line deducts from.
    ///
    /// `None` for lines with no stock tracking (services, fees).
    pub variant_id: Option<VariantId>,

    /// The catalog product, if known.
    pub product_id: Option<ProductId>,

    /// Product name snapshot at order time.
    pub product_name: String,

    /// SKU snapshot at order time.
    pub sku: String,

    /// Price per unit in cents at order time.
    pub unit_price: Money,

    /// Quantity ordered. Always greater than zero.
    pub quantity: u32,

    /// When this line was returned, if it has been.
    pub returned_at: Option<DateTime<Utc>>,
}

impl OrderItem {
    /// Returns the total price for this line (quantity * unit_price).
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }

    /// Returns true if this line has been returned.
    pub fn is_returned(&self) -> bool {
        self.returned_at.is_some()
    }
}
