//! Inventory levels and stock adjustment.

mod service;
mod thresholds;

pub use service::InventoryService;
pub use thresholds::StockThresholds;

use chrono::{DateTime, Utc};
use common::{InventoryId, StoreId, VariantId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// On-hand stock for one product variant.
///
/// There is exactly one record per variant. The quantity never goes
/// negative; any write that would take it below zero is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryLevel {
    /// The unique inventory record ID.
    pub id: InventoryId,

    /// The variant this record tracks.
    pub variant_id: VariantId,

    /// The store the stock belongs to.
    pub store_id: StoreId,

    /// Units on hand.
    pub quantity: i64,

    /// When the quantity last changed.
    pub updated_at: DateTime<Utc>,
}

impl InventoryLevel {
    /// Creates a fresh record for a variant.
    pub fn new(variant_id: VariantId, store_id: StoreId, quantity: i64) -> Self {
        Self {
            id: InventoryId::new(),
            variant_id,
            store_id,
            quantity,
            updated_at: Utc::now(),
        }
    }
}

/// The before/after quantities of one applied adjustment.
///
/// Threshold evaluation runs over these after the write has committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChange {
    /// The adjusted variant.
    pub variant_id: VariantId,

    /// The store the stock belongs to.
    pub store_id: StoreId,

    /// Quantity before the adjustment.
    pub previous: i64,

    /// Quantity after the adjustment.
    pub current: i64,
}

impl StockChange {
    /// Signed difference applied by the adjustment.
    pub fn delta(&self) -> i64 {
        self.current - self.previous
    }

    /// Returns true if the adjustment removed stock.
    pub fn is_decrease(&self) -> bool {
        self.current < self.previous
    }
}

/// Errors that can occur during inventory operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// A level write asked for a negative quantity.
    #[error("Inventory quantity must not be negative: {quantity}")]
    NegativeQuantity { quantity: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_change_delta() {
        let change = StockChange {
            variant_id: VariantId::new(),
            store_id: StoreId::new(),
            previous: 5,
            current: 3,
        };
        assert_eq!(change.delta(), -2);
        assert!(change.is_decrease());
    }

    #[test]
    fn test_stock_change_increase() {
        let change = StockChange {
            variant_id: VariantId::new(),
            store_id: StoreId::new(),
            previous: 3,
            current: 5,
        };
        assert_eq!(change.delta(), 2);
        assert!(!change.is_decrease());
    }
}
