//! Order creation input.

use chrono::Utc;
use common::{Money, OrderId, OrderItemId, ProductId, StoreId, UserId, VariantId};
use serde::{Deserialize, Serialize};

use super::order::{Order, OrderItem};
use super::value_objects::Address;
use super::{OrderError, OrderStatus};

/// Input for creating an order.
///
/// Everything the caller supplies, before any validation. Validation
/// collects every violation in one pass so a client fixing a broken
/// request sees the whole list at once instead of one failure per retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    /// The customer placing the order.
    pub user_id: UserId,

    /// The requested line items.
    pub items: Vec<NewOrderItem>,

    /// Where to ship. Required, but optional here so validation can
    /// report its absence alongside the other violations.
    pub shipping_address: Option<Address>,

    /// Where to bill. Defaults to the shipping address.
    pub billing_address: Option<Address>,

    /// Explicit order total. When absent the total is the sum of the
    /// line totals.
    pub total: Option<Money>,
}

/// A requested line item within a [`NewOrder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderItem {
    /// The inventory-tracked variant to deduct, if any.
    pub variant_id: Option<VariantId>,

    /// The catalog product, if known.
    pub product_id: Option<ProductId>,

    /// Product name snapshot.
    pub product_name: String,

    /// SKU snapshot.
    pub sku: String,

    /// Quantity requested. Must be greater than zero.
    pub quantity: u32,

    /// Price per unit in cents.
    pub unit_price: Money,
}

impl NewOrder {
    /// Validates the draft, collecting every violation.
    pub fn validate(&self) -> Result<(), OrderError> {
        let mut violations = Vec::new();

        if self.items.is_empty() {
            violations.push("order must contain at least one item".to_string());
        }
        if self.shipping_address.is_none() {
            violations.push("shipping address is required".to_string());
        }
        for (index, item) in self.items.iter().enumerate() {
            if item.quantity == 0 {
                violations.push(format!(
                    "item {} ({}): quantity must be greater than zero",
                    index, item.sku
                ));
            }
            if item.unit_price.is_negative() {
                violations.push(format!(
                    "item {} ({}): unit price must not be negative",
                    index, item.sku
                ));
            }
        }
        if let Some(total) = self.total {
            if total.is_negative() {
                violations.push("total must not be negative".to_string());
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(OrderError::Validation { violations })
        }
    }

    /// Validates the draft and assembles a `Pending` order for `store_id`.
    ///
    /// The total is the explicit total when one was supplied, otherwise
    /// the sum of the line totals. Billing falls back to shipping.
    pub fn into_order(self, store_id: StoreId) -> Result<Order, OrderError> {
        self.validate()?;

        let items: Vec<OrderItem> = self
            .items
            .into_iter()
            .map(|item| OrderItem {
                id: OrderItemId::new(),
                variant_id: item.variant_id,
                product_id: item.product_id,
                product_name: item.product_name,
                sku: item.sku,
                unit_price: item.unit_price,
                quantity: item.quantity,
                returned_at: None,
            })
            .collect();

        let total = self
            .total
            .unwrap_or_else(|| items.iter().map(OrderItem::line_total).sum());

        // validate() guarantees the shipping address is present
        let shipping_address = self
            .shipping_address
            .ok_or_else(|| OrderError::Validation {
                violations: vec!["shipping address is required".to_string()],
            })?;
        let billing_address = self
            .billing_address
            .unwrap_or_else(|| shipping_address.clone());

        let now = Utc::now();
        Ok(Order {
            id: OrderId::new(),
            store_id,
            user_id: self.user_id,
            status: OrderStatus::Pending,
            total,
            shipping_address,
            billing_address,
            items,
            created_at: now,
            updated_at: now,
        })
    }
}
