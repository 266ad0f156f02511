//! Order lifecycle orchestration.

use std::sync::Arc;
use std::time::Instant;

use common::{OrderId, OrderItemId, StoreId, VariantId};
use serde::Serialize;

use crate::error::{DomainError, Result};
use crate::event::{DomainEvent, EventSink};
use crate::inventory::StockThresholds;
use crate::repository::{InventoryRepository, OrderRepository, RepositoryError};

use super::{NewOrder, Order, OrderError, OrderItem, OrderStatus, StockShortfall};

/// Service for creating orders and moving them through their lifecycle.
///
/// Every operation is store-scoped: an order that belongs to a
/// different store than the caller named is reported as not found.
/// Domain events go out through the sink only after the repository
/// write has committed.
pub struct OrdersService<R: OrderRepository + InventoryRepository> {
    repo: Arc<R>,
    sink: Arc<dyn EventSink>,
    thresholds: StockThresholds,
}

impl<R: OrderRepository + InventoryRepository> OrdersService<R> {
    /// Creates a new orders service.
    pub fn new(repo: Arc<R>, sink: Arc<dyn EventSink>, thresholds: StockThresholds) -> Self {
        Self {
            repo,
            sink,
            thresholds,
        }
    }

    /// Creates an order, deducting stock for every inventory-tracked item.
    ///
    /// Validation and the advisory stock check run first and report every
    /// violation/shortfall they find. The insert itself is the
    /// enforcement point: the order, its items and all deductions commit
    /// in one transaction, so a concurrent exhaustion between check and
    /// insert still fails cleanly with nothing persisted.
    #[tracing::instrument(skip(self, draft), fields(user_id = %draft.user_id))]
    pub async fn create_order(&self, store_id: StoreId, draft: NewOrder) -> Result<Order> {
        let start = Instant::now();

        let order = draft.into_order(store_id)?;
        self.check_stock(&order).await?;

        let changes = match self.repo.insert_order(&order).await {
            Ok(changes) => changes,
            Err(RepositoryError::InsufficientStock {
                variant_id,
                requested,
                available,
            }) => {
                // lost the race between the advisory check and the insert
                return Err(OrderError::InsufficientStock {
                    shortfalls: vec![StockShortfall {
                        variant_id,
                        requested,
                        available,
                    }],
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        };

        metrics::counter!("orders_created_total").increment(1);
        metrics::histogram!("order_creation_duration_seconds")
            .record(start.elapsed().as_secs_f64());
        tracing::info!(
            order_id = %order.id,
            store_id = %store_id,
            total = %order.total,
            items = order.item_count(),
            "order created"
        );

        self.sink.publish(DomainEvent::order_created(&order)).await;
        for change in &changes {
            if let Some(event) = self.thresholds.crossing(change) {
                self.sink.publish(event).await;
            }
        }

        Ok(order)
    }

    /// Loads an order scoped to a store.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, store_id: StoreId, order_id: OrderId) -> Result<Order> {
        let order = self
            .repo
            .fetch_order(order_id)
            .await?
            .ok_or(DomainError::OrderNotFound(order_id))?;
        if order.store_id != store_id {
            return Err(DomainError::OrderNotFound(order_id));
        }
        Ok(order)
    }

    /// Loads every order for a store, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn orders_for_store(&self, store_id: StoreId) -> Result<Vec<Order>> {
        Ok(self.repo.orders_for_store(store_id).await?)
    }

    /// Writes a new status onto an order.
    ///
    /// Plain writes move forward along the fulfillment chain only;
    /// cancel/return statuses are rejected here because only their
    /// workflows restore stock. Writing the current status again is a
    /// no-op and emits nothing. The repository write is a
    /// compare-and-set, so a concurrent transition surfaces as a
    /// status conflict rather than a lost update.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        store_id: StoreId,
        order_id: OrderId,
        next: OrderStatus,
    ) -> Result<Order> {
        let order = self.get_order(store_id, order_id).await?;

        if order.status == next {
            tracing::debug!(order_id = %order_id, status = %next, "status unchanged, nothing to do");
            return Ok(order);
        }
        if next.is_workflow_target() {
            return Err(OrderError::WorkflowOnly { status: next }.into());
        }
        if !order.status.can_advance_to(next) {
            return Err(OrderError::IllegalTransition {
                from: order.status,
                to: next,
            }
            .into());
        }

        let updated = self
            .repo
            .transition_status(order_id, order.status, next)
            .await?;

        metrics::counter!("order_status_transitions_total").increment(1);
        tracing::info!(order_id = %order_id, from = %order.status, to = %next, "order status changed");

        self.sink
            .publish(DomainEvent::status_changed(&updated, order.status))
            .await;
        Ok(updated)
    }

    /// Cancels an order and restores the stock of every tracked item.
    ///
    /// Only orders that have not shipped can be cancelled; delivered
    /// goods go through the return flow. Restoration is best-effort per
    /// item: a failure is logged and skipped, the cancellation stands.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, store_id: StoreId, order_id: OrderId) -> Result<Order> {
        let order = self.get_order(store_id, order_id).await?;

        if !order.status.can_cancel() {
            return Err(OrderError::CannotCancel {
                status: order.status,
            }
            .into());
        }

        let updated = self
            .repo
            .transition_status(order_id, order.status, OrderStatus::Cancelled)
            .await?;

        metrics::counter!("orders_cancelled_total").increment(1);

        let items: Vec<&OrderItem> = order.items.iter().collect();
        self.restore_items(&items).await;

        tracing::info!(order_id = %order_id, items = order.item_count(), "order cancelled");

        self.sink
            .publish(DomainEvent::status_changed(&updated, order.status))
            .await;
        Ok(updated)
    }

    /// Returns items from a delivered order, restoring their stock.
    ///
    /// With no item ids (or an empty list) every outstanding item is
    /// returned and the order becomes `Returned`; a subset moves it to
    /// `PartiallyReturned` until nothing outstanding remains. Duplicate
    /// ids in the request are collapsed. Restoration is best-effort per
    /// item, as with cancellation.
    #[tracing::instrument(skip(self, item_ids))]
    pub async fn return_order(
        &self,
        store_id: StoreId,
        order_id: OrderId,
        item_ids: Option<Vec<OrderItemId>>,
    ) -> Result<Order> {
        let order = self.get_order(store_id, order_id).await?;

        if !order.status.can_return() {
            return Err(OrderError::CannotReturn {
                status: order.status,
            }
            .into());
        }

        let item_ids = item_ids.filter(|ids| !ids.is_empty());
        let targets: Vec<&OrderItem> = match &item_ids {
            None => order.outstanding_items().collect(),
            Some(ids) => {
                let mut targets: Vec<&OrderItem> = Vec::with_capacity(ids.len());
                for &item_id in ids {
                    let item = order
                        .item(item_id)
                        .ok_or(OrderError::ItemNotInOrder { order_id, item_id })?;
                    if item.is_returned() {
                        return Err(OrderError::ItemAlreadyReturned { item_id }.into());
                    }
                    if !targets.iter().any(|t| t.id == item_id) {
                        targets.push(item);
                    }
                }
                targets
            }
        };

        let target_ids: Vec<OrderItemId> = targets.iter().map(|item| item.id).collect();
        let outstanding_after = order
            .outstanding_items()
            .filter(|item| !target_ids.contains(&item.id))
            .count();
        let next = if outstanding_after == 0 {
            OrderStatus::Returned
        } else {
            OrderStatus::PartiallyReturned
        };

        let updated = self
            .repo
            .record_return(order_id, order.status, next, &target_ids)
            .await?;

        metrics::counter!("orders_returned_total").increment(1);

        self.restore_items(&targets).await;

        tracing::info!(
            order_id = %order_id,
            returned = target_ids.len(),
            status = %next,
            "order items returned"
        );

        self.sink
            .publish(DomainEvent::status_changed(&updated, order.status))
            .await;
        Ok(updated)
    }

    /// Reports what an order did to inventory and where that stands now.
    #[tracing::instrument(skip(self))]
    pub async fn inventory_impact(
        &self,
        store_id: StoreId,
        order_id: OrderId,
    ) -> Result<InventoryImpact> {
        let order = self.get_order(store_id, order_id).await?;
        let cancelled = order.status == OrderStatus::Cancelled;

        let mut items = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let on_hand = match item.variant_id {
                Some(variant_id) => self
                    .repo
                    .level(variant_id)
                    .await?
                    .map(|level| level.quantity),
                None => None,
            };
            items.push(ItemImpact {
                item_id: item.id,
                variant_id: item.variant_id,
                sku: item.sku.clone(),
                quantity: item.quantity,
                restored: cancelled || item.is_returned(),
                on_hand,
            });
        }

        Ok(InventoryImpact {
            order_id: order.id,
            status: order.status,
            items,
        })
    }

    /// Advisory stock check before the transactional insert.
    ///
    /// Aggregates the requested quantity per variant across all lines
    /// and reports every shortfall at once. A variant without an
    /// inventory record counts as zero available.
    async fn check_stock(&self, order: &Order) -> Result<()> {
        let mut requested: Vec<(VariantId, i64)> = Vec::new();
        for item in &order.items {
            if let Some(variant_id) = item.variant_id {
                match requested.iter_mut().find(|(v, _)| *v == variant_id) {
                    Some((_, quantity)) => *quantity += item.quantity as i64,
                    None => requested.push((variant_id, item.quantity as i64)),
                }
            }
        }

        let mut shortfalls = Vec::new();
        for (variant_id, quantity) in requested {
            let available = self
                .repo
                .level(variant_id)
                .await?
                .map(|level| level.quantity)
                .unwrap_or(0);
            if available < quantity {
                shortfalls.push(StockShortfall {
                    variant_id,
                    requested: quantity,
                    available,
                });
            }
        }

        if shortfalls.is_empty() {
            Ok(())
        } else {
            Err(OrderError::InsufficientStock { shortfalls }.into())
        }
    }

    /// Puts stock back for each tracked item, logging and continuing on
    /// failure. One bad item never blocks the rest of the restoration.
    async fn restore_items(&self, items: &[&OrderItem]) {
        for item in items {
            let Some(variant_id) = item.variant_id else {
                continue;
            };
            match self.repo.adjust(variant_id, item.quantity as i64).await {
                Ok(_) => {
                    metrics::counter!("inventory_restorations_total").increment(1);
                }
                Err(e) => {
                    metrics::counter!("inventory_restoration_failures_total").increment(1);
                    tracing::warn!(
                        variant_id = %variant_id,
                        quantity = item.quantity,
                        error = %e,
                        "failed to restore stock, continuing"
                    );
                }
            }
        }
    }
}

/// What an order did to inventory, per line item.
#[derive(Debug, Clone, Serialize)]
pub struct InventoryImpact {
    /// The order reported on.
    pub order_id: OrderId,

    /// The order's current status.
    pub status: OrderStatus,

    /// One entry per line item.
    pub items: Vec<ItemImpact>,
}

/// Inventory effect of one line item.
#[derive(Debug, Clone, Serialize)]
pub struct ItemImpact {
    /// The line item.
    pub item_id: OrderItemId,

    /// The variant the line deducted from, if tracked.
    pub variant_id: Option<VariantId>,

    /// SKU snapshot.
    pub sku: String,

    /// Quantity the line deducted.
    pub quantity: u32,

    /// True when the deduction has been given back (order cancelled or
    /// this item returned).
    pub restored: bool,

    /// Current on-hand quantity for the variant, when one is tracked.
    pub on_hand: Option<i64>,
}
