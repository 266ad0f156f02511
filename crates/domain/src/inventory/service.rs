//! Inventory level administration and adjustment.

use std::sync::Arc;

use common::{StoreId, VariantId};

use crate::error::{DomainError, Result};
use crate::event::EventSink;
use crate::repository::{InventoryRepository, RepositoryError};

use super::{InventoryError, InventoryLevel, StockChange, StockThresholds};

/// Service for reading and changing stock levels.
pub struct InventoryService<R: InventoryRepository> {
    repo: Arc<R>,
    sink: Arc<dyn EventSink>,
    thresholds: StockThresholds,
}

impl<R: InventoryRepository> InventoryService<R> {
    /// Creates a new inventory service.
    pub fn new(repo: Arc<R>, sink: Arc<dyn EventSink>, thresholds: StockThresholds) -> Self {
        Self {
            repo,
            sink,
            thresholds,
        }
    }

    /// The thresholds this service alerts against.
    pub fn thresholds(&self) -> StockThresholds {
        self.thresholds
    }

    /// Loads the level for a variant.
    #[tracing::instrument(skip(self))]
    pub async fn level(&self, variant_id: VariantId) -> Result<InventoryLevel> {
        self.repo
            .level(variant_id)
            .await?
            .ok_or(DomainError::InventoryNotFound(variant_id))
    }

    /// Sets a variant's quantity outright.
    ///
    /// An administrative write for provisioning and corrections; it
    /// creates the record when missing and emits no threshold events.
    /// Negative quantities are rejected.
    #[tracing::instrument(skip(self))]
    pub async fn set_level(
        &self,
        store_id: StoreId,
        variant_id: VariantId,
        quantity: i64,
    ) -> Result<InventoryLevel> {
        if quantity < 0 {
            return Err(InventoryError::NegativeQuantity { quantity }.into());
        }

        let stored = self
            .repo
            .put_level(&InventoryLevel::new(variant_id, store_id, quantity))
            .await?;
        tracing::info!(variant_id = %variant_id, quantity, "inventory level set");
        Ok(stored)
    }

    /// Applies a signed delta to a variant's quantity.
    ///
    /// Negative for deductions, positive for restorations. The
    /// repository serializes concurrent adjustments to the same variant
    /// and rejects any result below zero. After a successful decrease,
    /// at most one threshold crossing event goes out.
    #[tracing::instrument(skip(self))]
    pub async fn adjust(&self, variant_id: VariantId, delta: i64) -> Result<StockChange> {
        let change = match self.repo.adjust(variant_id, delta).await {
            Ok(change) => change,
            Err(e @ RepositoryError::InsufficientStock { .. }) => {
                metrics::counter!("inventory_adjustment_rejections_total").increment(1);
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        metrics::counter!("inventory_adjustments_total").increment(1);
        tracing::info!(
            variant_id = %variant_id,
            delta,
            previous = change.previous,
            current = change.current,
            "inventory adjusted"
        );

        if let Some(event) = self.thresholds.crossing(&change) {
            self.sink.publish(event).await;
        }

        Ok(change)
    }
}
