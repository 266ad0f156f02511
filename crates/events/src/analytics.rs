//! Purchase analytics capture.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, StoreId};
use domain::DomainEvent;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::listener::EventListener;

/// One recorded purchase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PurchaseFact {
    /// The order behind the purchase.
    pub order_id: OrderId,

    /// The store it was placed against.
    pub store_id: StoreId,

    /// Order total.
    pub total: Money,

    /// Number of line items.
    pub item_count: usize,

    /// When the order was placed.
    pub occurred_at: DateTime<Utc>,
}

/// Running totals over the recorded facts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnalyticsSummary {
    /// Orders recorded.
    pub orders: u64,

    /// Line items across those orders.
    pub items: u64,

    /// Revenue across those orders.
    pub revenue: Money,
}

/// Boundary the analytics listener records purchases through.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    /// Records one purchase.
    async fn record_purchase(&self, fact: PurchaseFact) -> Result<()>;
}

/// Listener that turns `order.created` events into purchase facts.
///
/// Every other event passes through untouched; queries over the
/// captured data live behind the sink.
pub struct AnalyticsListener {
    sink: Arc<dyn AnalyticsSink>,
}

impl AnalyticsListener {
    /// Creates a listener over the given analytics boundary.
    pub fn new(sink: Arc<dyn AnalyticsSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl EventListener for AnalyticsListener {
    fn name(&self) -> &'static str {
        "AnalyticsListener"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<()> {
        let DomainEvent::OrderCreated(data) = event else {
            return Ok(());
        };
        self.sink
            .record_purchase(PurchaseFact {
                order_id: data.order_id,
                store_id: data.store_id,
                total: data.total,
                item_count: data.item_count,
                occurred_at: data.created_at,
            })
            .await
    }
}

/// Sink that accumulates facts in memory.
#[derive(Clone, Default)]
pub struct InMemoryAnalyticsSink {
    facts: Arc<RwLock<Vec<PurchaseFact>>>,
}

impl InMemoryAnalyticsSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every recorded fact.
    pub async fn facts(&self) -> Vec<PurchaseFact> {
        self.facts.read().await.clone()
    }

    /// Totals over everything recorded so far.
    pub async fn summary(&self) -> AnalyticsSummary {
        let facts = self.facts.read().await;
        AnalyticsSummary {
            orders: facts.len() as u64,
            items: facts.iter().map(|f| f.item_count as u64).sum(),
            revenue: facts.iter().map(|f| f.total).sum(),
        }
    }
}

#[async_trait]
impl AnalyticsSink for InMemoryAnalyticsSink {
    async fn record_purchase(&self, fact: PurchaseFact) -> Result<()> {
        self.facts.write().await.push(fact);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use common::{UserId, VariantId};
    use domain::event::OrderCreatedData;

    use super::*;

    fn created(total_cents: i64, item_count: usize) -> DomainEvent {
        DomainEvent::OrderCreated(OrderCreatedData {
            order_id: OrderId::new(),
            store_id: StoreId::new(),
            user_id: UserId::new(),
            total: Money::from_cents(total_cents),
            item_count,
            created_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn purchases_accumulate() {
        let sink = Arc::new(InMemoryAnalyticsSink::new());
        let listener = AnalyticsListener::new(sink.clone());

        listener.handle(&created(2000, 2)).await.unwrap();
        listener.handle(&created(599, 1)).await.unwrap();

        let summary = sink.summary().await;
        assert_eq!(summary.orders, 2);
        assert_eq!(summary.items, 3);
        assert_eq!(summary.revenue, Money::from_cents(2599));
        assert_eq!(sink.facts().await.len(), 2);
    }

    #[tokio::test]
    async fn other_events_are_ignored() {
        let sink = Arc::new(InMemoryAnalyticsSink::new());
        let listener = AnalyticsListener::new(sink.clone());

        listener
            .handle(&DomainEvent::out_of_stock(VariantId::new(), StoreId::new()))
            .await
            .unwrap();
        listener
            .handle(&DomainEvent::news_published("Launch", "launch"))
            .await
            .unwrap();

        assert_eq!(sink.summary().await.orders, 0);
    }
}
