//! Stock threshold bands and crossing detection.

use serde::{Deserialize, Serialize};

use crate::event::DomainEvent;

use super::StockChange;

/// Quantity boundaries that decide when stock alerts fire.
///
/// Quantities divide into four bands: normal, low (at or below
/// `low_stock`), critical (at or below `critical_stock`) and out of
/// stock (exactly zero). Alerts fire when a decrease moves a variant
/// into a worse band, never while it merely stays there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockThresholds {
    /// At or below this quantity a variant counts as low on stock.
    pub low_stock: i64,

    /// At or below this quantity a variant counts as critically low.
    pub critical_stock: i64,
}

/// Severity bands, worst first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum StockBand {
    Out,
    Critical,
    Low,
    Normal,
}

impl StockThresholds {
    /// Creates thresholds with the given boundaries.
    pub fn new(low_stock: i64, critical_stock: i64) -> Self {
        Self {
            low_stock,
            critical_stock,
        }
    }

    /// Returns true if the quantity counts as out of stock.
    pub fn is_out_of_stock(&self, quantity: i64) -> bool {
        quantity <= 0
    }

    /// Returns true if the quantity counts as low on stock.
    pub fn is_low_stock(&self, quantity: i64) -> bool {
        quantity <= self.low_stock
    }

    /// Returns true if the quantity counts as critically low.
    pub fn is_critical_stock(&self, quantity: i64) -> bool {
        quantity <= self.critical_stock
    }

    /// The low-stock boundary.
    pub fn low_stock_threshold(&self) -> i64 {
        self.low_stock
    }

    fn band(&self, quantity: i64) -> StockBand {
        if quantity <= 0 {
            StockBand::Out
        } else if quantity <= self.critical_stock {
            StockBand::Critical
        } else if quantity <= self.low_stock {
            StockBand::Low
        } else {
            StockBand::Normal
        }
    }

    /// Evaluates a stock change against the bands.
    ///
    /// Emits at most one event, and only when a decrease lands the
    /// quantity in a worse band than it started in: `out-of-stock` when
    /// it hits exactly zero, otherwise `low-stock` (flagging whether the
    /// critical boundary was crossed too). Increases and same-band
    /// movements are silent, so repeated sales inside the low band do
    /// not re-alert.
    pub fn crossing(&self, change: &StockChange) -> Option<DomainEvent> {
        if !change.is_decrease() {
            return None;
        }
        if self.band(change.current) >= self.band(change.previous) {
            return None;
        }
        if change.current == 0 {
            Some(DomainEvent::out_of_stock(change.variant_id, change.store_id))
        } else {
            Some(DomainEvent::low_stock(
                change.variant_id,
                change.store_id,
                change.current,
                self.low_stock,
                self.is_critical_stock(change.current),
            ))
        }
    }
}

impl Default for StockThresholds {
    fn default() -> Self {
        Self {
            low_stock: 10,
            critical_stock: 3,
        }
    }
}
