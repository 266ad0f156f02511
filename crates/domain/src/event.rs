//! Domain events and the emission boundary.
//!
//! Events are published after the transaction that caused them has
//! committed. Publication is best-effort: a sink never returns an error
//! to the caller, and a crash between commit and publish drops the
//! notification.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, StoreId, UserId, VariantId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::order::{Order, OrderStatus};

/// Events the commerce core publishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DomainEvent {
    /// An order was created and its stock deducted.
    OrderCreated(OrderCreatedData),

    /// An order moved to a different status.
    OrderStatusChanged(OrderStatusChangedData),

    /// A variant's stock dropped into the low or critical band.
    InventoryLowStock(InventoryLowStockData),

    /// A variant's stock hit exactly zero.
    InventoryOutOfStock(InventoryOutOfStockData),

    /// A news article went live.
    NewsPublished(NewsPublishedData),
}

impl DomainEvent {
    /// The dotted event name used by listeners and logs.
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::OrderCreated(_) => "order.created",
            DomainEvent::OrderStatusChanged(_) => "order.status-changed",
            DomainEvent::InventoryLowStock(_) => "inventory.low-stock",
            DomainEvent::InventoryOutOfStock(_) => "inventory.out-of-stock",
            DomainEvent::NewsPublished(_) => "news.published",
        }
    }

    /// Builds an `order.created` event from a freshly persisted order.
    pub fn order_created(order: &Order) -> Self {
        DomainEvent::OrderCreated(OrderCreatedData {
            order_id: order.id,
            store_id: order.store_id,
            user_id: order.user_id,
            total: order.total,
            item_count: order.item_count(),
            created_at: order.created_at,
        })
    }

    /// Builds an `order.status-changed` event for an order that just
    /// moved from `previous` to its current status.
    pub fn status_changed(order: &Order, previous: OrderStatus) -> Self {
        DomainEvent::OrderStatusChanged(OrderStatusChangedData {
            order_id: order.id,
            store_id: order.store_id,
            previous,
            current: order.status,
            changed_at: order.updated_at,
        })
    }

    /// Builds an `inventory.low-stock` event.
    pub fn low_stock(
        variant_id: VariantId,
        store_id: StoreId,
        quantity: i64,
        threshold: i64,
        critical: bool,
    ) -> Self {
        DomainEvent::InventoryLowStock(InventoryLowStockData {
            variant_id,
            store_id,
            quantity,
            threshold,
            critical,
            observed_at: Utc::now(),
        })
    }

    /// Builds an `inventory.out-of-stock` event.
    pub fn out_of_stock(variant_id: VariantId, store_id: StoreId) -> Self {
        DomainEvent::InventoryOutOfStock(InventoryOutOfStockData {
            variant_id,
            store_id,
            observed_at: Utc::now(),
        })
    }

    /// Builds a `news.published` event.
    pub fn news_published(title: impl Into<String>, slug: impl Into<String>) -> Self {
        DomainEvent::NewsPublished(NewsPublishedData {
            title: title.into(),
            slug: slug.into(),
            published_at: Utc::now(),
        })
    }
}

/// Data for the `order.created` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreatedData {
    /// The new order.
    pub order_id: OrderId,

    /// The store the order was placed against.
    pub store_id: StoreId,

    /// The customer who placed it.
    pub user_id: UserId,

    /// Order total.
    pub total: Money,

    /// Number of line items.
    pub item_count: usize,

    /// When the order was placed.
    pub created_at: DateTime<Utc>,
}

/// Data for the `order.status-changed` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusChangedData {
    /// The order that changed.
    pub order_id: OrderId,

    /// The store the order belongs to.
    pub store_id: StoreId,

    /// Status before the change.
    pub previous: OrderStatus,

    /// Status after the change.
    pub current: OrderStatus,

    /// When the change happened.
    pub changed_at: DateTime<Utc>,
}

/// Data for the `inventory.low-stock` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryLowStockData {
    /// The variant running low.
    pub variant_id: VariantId,

    /// The store the stock belongs to.
    pub store_id: StoreId,

    /// Quantity after the triggering adjustment.
    pub quantity: i64,

    /// The configured low-stock boundary.
    pub threshold: i64,

    /// True when the quantity is at or below the critical boundary.
    pub critical: bool,

    /// When the crossing was observed.
    pub observed_at: DateTime<Utc>,
}

/// Data for the `inventory.out-of-stock` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryOutOfStockData {
    /// The variant that sold out.
    pub variant_id: VariantId,

    /// The store the stock belongs to.
    pub store_id: StoreId,

    /// When the stock hit zero.
    pub observed_at: DateTime<Utc>,
}

/// Data for the `news.published` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsPublishedData {
    /// Article title.
    pub title: String,

    /// URL slug of the article.
    pub slug: String,

    /// When the article went live.
    pub published_at: DateTime<Utc>,
}

/// Boundary through which the services publish domain events.
///
/// Publication is infallible by contract; implementations deal with
/// their own failures (typically by logging) and never surface them to
/// the publishing transaction.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Publishes one event.
    async fn publish(&self, event: DomainEvent);
}

/// Sink that records every published event, for tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: RwLock<Vec<DomainEvent>>,
}

impl RecordingSink {
    /// Creates an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every event published so far.
    pub async fn events(&self) -> Vec<DomainEvent> {
        self.events.read().await.clone()
    }

    /// Returns the names of every event published so far, in order.
    pub async fn names(&self) -> Vec<&'static str> {
        self.events.read().await.iter().map(DomainEvent::name).collect()
    }

    /// Number of events published so far.
    pub async fn count(&self) -> usize {
        self.events.read().await.len()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn publish(&self, event: DomainEvent) {
        self.events.write().await.push(event);
    }
}
