use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, OrderItemId, StoreId, VariantId};
use domain::inventory::{InventoryLevel, StockChange};
use domain::order::{Order, OrderStatus};
use domain::repository::{
    InventoryRepository, OrderRepository, RepositoryError, RepositoryResult,
};
use tokio::sync::RwLock;

#[derive(Default)]
struct MemoryState {
    orders: HashMap<OrderId, Order>,
    inventory: HashMap<VariantId, InventoryLevel>,
}

/// In-memory repository implementation.
///
/// Backs tests and database-less deployments with the same contracts as
/// the PostgreSQL implementation. A single lock over the whole state
/// makes order creation all-or-nothing and serializes adjustments; the
/// per-row locking the database gives us is not worth reproducing here.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryRepository {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Drops every order and inventory record.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.orders.clear();
        state.inventory.clear();
    }
}

#[async_trait]
impl OrderRepository for InMemoryRepository {
    async fn insert_order(&self, order: &Order) -> RepositoryResult<Vec<StockChange>> {
        let mut state = self.state.write().await;

        // aggregate requested quantity per variant across the lines
        let mut deductions: Vec<(VariantId, i64)> = Vec::new();
        for item in &order.items {
            let Some(variant_id) = item.variant_id else {
                continue;
            };
            match deductions.iter_mut().find(|(v, _)| *v == variant_id) {
                Some((_, quantity)) => *quantity += item.quantity as i64,
                None => deductions.push((variant_id, item.quantity as i64)),
            }
        }
        deductions.retain(|(_, quantity)| *quantity > 0);

        // verify every deduction fits before touching anything
        for (variant_id, requested) in &deductions {
            let available = state
                .inventory
                .get(variant_id)
                .map(|level| level.quantity)
                .unwrap_or(0);
            if available < *requested {
                return Err(RepositoryError::InsufficientStock {
                    variant_id: *variant_id,
                    requested: *requested,
                    available,
                });
            }
        }

        let mut changes = Vec::with_capacity(deductions.len());
        for (variant_id, requested) in deductions {
            if let Some(level) = state.inventory.get_mut(&variant_id) {
                let previous = level.quantity;
                level.quantity -= requested;
                level.updated_at = Utc::now();
                changes.push(StockChange {
                    variant_id,
                    store_id: level.store_id,
                    previous,
                    current: level.quantity,
                });
            }
        }

        state.orders.insert(order.id, order.clone());
        Ok(changes)
    }

    async fn fetch_order(&self, order_id: OrderId) -> RepositoryResult<Option<Order>> {
        Ok(self.state.read().await.orders.get(&order_id).cloned())
    }

    async fn orders_for_store(&self, store_id: StoreId) -> RepositoryResult<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|order| order.store_id == store_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn transition_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> RepositoryResult<Order> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or(RepositoryError::OrderNotFound(order_id))?;

        if order.status != expected {
            return Err(RepositoryError::StatusConflict {
                order_id,
                expected,
                actual: order.status,
            });
        }

        order.status = next;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn record_return(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        item_ids: &[OrderItemId],
    ) -> RepositoryResult<Order> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or(RepositoryError::OrderNotFound(order_id))?;

        if order.status != expected {
            return Err(RepositoryError::StatusConflict {
                order_id,
                expected,
                actual: order.status,
            });
        }

        let now = Utc::now();
        for item in order.items.iter_mut() {
            if item_ids.contains(&item.id) && item.returned_at.is_none() {
                item.returned_at = Some(now);
            }
        }
        order.status = next;
        order.updated_at = now;
        Ok(order.clone())
    }
}

#[async_trait]
impl InventoryRepository for InMemoryRepository {
    async fn level(&self, variant_id: VariantId) -> RepositoryResult<Option<InventoryLevel>> {
        Ok(self.state.read().await.inventory.get(&variant_id).cloned())
    }

    async fn put_level(&self, level: &InventoryLevel) -> RepositoryResult<InventoryLevel> {
        let mut state = self.state.write().await;
        let stored = match state.inventory.get_mut(&level.variant_id) {
            Some(existing) => {
                existing.store_id = level.store_id;
                existing.quantity = level.quantity;
                existing.updated_at = Utc::now();
                existing.clone()
            }
            None => {
                state.inventory.insert(level.variant_id, level.clone());
                level.clone()
            }
        };
        Ok(stored)
    }

    async fn adjust(&self, variant_id: VariantId, delta: i64) -> RepositoryResult<StockChange> {
        let mut state = self.state.write().await;
        let level = state
            .inventory
            .get_mut(&variant_id)
            .ok_or(RepositoryError::InventoryNotFound(variant_id))?;

        let previous = level.quantity;
        let current = previous + delta;
        if current < 0 {
            return Err(RepositoryError::InsufficientStock {
                variant_id,
                requested: -delta,
                available: previous,
            });
        }

        level.quantity = current;
        level.updated_at = Utc::now();
        Ok(StockChange {
            variant_id,
            store_id: level.store_id,
            previous,
            current,
        })
    }
}

#[cfg(test)]
mod tests {
    use common::{Money, ProductId, UserId};
    use domain::order::{Address, OrderItem};

    use super::*;

    fn test_address() -> Address {
        Address {
            full_name: "Test Buyer".to_string(),
            line1: "1 Test Street".to_string(),
            line2: None,
            city: "Testville".to_string(),
            region: None,
            postal_code: "00000".to_string(),
            country: "US".to_string(),
        }
    }

    fn test_item(variant_id: Option<VariantId>, quantity: u32) -> OrderItem {
        OrderItem {
            id: OrderItemId::new(),
            variant_id,
            product_id: Some(ProductId::new()),
            product_name: "Widget".to_string(),
            sku: "WID-001".to_string(),
            unit_price: Money::from_cents(1000),
            quantity,
            returned_at: None,
        }
    }

    fn test_order(store_id: StoreId, items: Vec<OrderItem>) -> Order {
        let now = Utc::now();
        let total = items.iter().map(OrderItem::line_total).sum();
        Order {
            id: OrderId::new(),
            store_id,
            user_id: UserId::new(),
            status: OrderStatus::Pending,
            total,
            shipping_address: test_address(),
            billing_address: test_address(),
            items,
            created_at: now,
            updated_at: now,
        }
    }

    async fn seed_level(repo: &InMemoryRepository, store_id: StoreId, quantity: i64) -> VariantId {
        let variant_id = VariantId::new();
        repo.put_level(&InventoryLevel::new(variant_id, store_id, quantity))
            .await
            .unwrap();
        variant_id
    }

    #[tokio::test]
    async fn insert_order_deducts_stock() {
        let repo = InMemoryRepository::new();
        let store_id = StoreId::new();
        let variant_id = seed_level(&repo, store_id, 5).await;

        let order = test_order(store_id, vec![test_item(Some(variant_id), 2)]);
        let changes = repo.insert_order(&order).await.unwrap();

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].previous, 5);
        assert_eq!(changes[0].current, 3);
        assert_eq!(repo.level(variant_id).await.unwrap().unwrap().quantity, 3);
        assert!(repo.fetch_order(order.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn insert_order_aggregates_lines_for_same_variant() {
        let repo = InMemoryRepository::new();
        let store_id = StoreId::new();
        let variant_id = seed_level(&repo, store_id, 5).await;

        let order = test_order(
            store_id,
            vec![
                test_item(Some(variant_id), 2),
                test_item(Some(variant_id), 3),
            ],
        );
        let changes = repo.insert_order(&order).await.unwrap();

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].current, 0);
    }

    #[tokio::test]
    async fn insert_order_is_all_or_nothing() {
        let repo = InMemoryRepository::new();
        let store_id = StoreId::new();
        let plentiful = seed_level(&repo, store_id, 100).await;
        let scarce = seed_level(&repo, store_id, 1).await;

        let order = test_order(
            store_id,
            vec![test_item(Some(plentiful), 2), test_item(Some(scarce), 5)],
        );
        let result = repo.insert_order(&order).await;

        assert!(matches!(
            result,
            Err(RepositoryError::InsufficientStock { .. })
        ));
        // nothing persisted, nothing deducted
        assert!(repo.fetch_order(order.id).await.unwrap().is_none());
        assert_eq!(repo.level(plentiful).await.unwrap().unwrap().quantity, 100);
        assert_eq!(repo.level(scarce).await.unwrap().unwrap().quantity, 1);
    }

    #[tokio::test]
    async fn insert_order_rejects_missing_inventory_record() {
        let repo = InMemoryRepository::new();
        let store_id = StoreId::new();

        let order = test_order(store_id, vec![test_item(Some(VariantId::new()), 1)]);
        let result = repo.insert_order(&order).await;

        assert!(matches!(
            result,
            Err(RepositoryError::InsufficientStock { available: 0, .. })
        ));
    }

    #[tokio::test]
    async fn untracked_items_skip_inventory() {
        let repo = InMemoryRepository::new();
        let store_id = StoreId::new();

        let order = test_order(store_id, vec![test_item(None, 3)]);
        let changes = repo.insert_order(&order).await.unwrap();

        assert!(changes.is_empty());
        assert!(repo.fetch_order(order.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn adjust_applies_delta() {
        let repo = InMemoryRepository::new();
        let variant_id = seed_level(&repo, StoreId::new(), 10).await;

        let change = repo.adjust(variant_id, -4).await.unwrap();
        assert_eq!(change.previous, 10);
        assert_eq!(change.current, 6);

        let change = repo.adjust(variant_id, 2).await.unwrap();
        assert_eq!(change.current, 8);
    }

    #[tokio::test]
    async fn adjust_rejects_negative_result() {
        let repo = InMemoryRepository::new();
        let variant_id = seed_level(&repo, StoreId::new(), 3).await;

        let result = repo.adjust(variant_id, -5).await;
        assert!(matches!(
            result,
            Err(RepositoryError::InsufficientStock {
                requested: 5,
                available: 3,
                ..
            })
        ));
        // rejected adjustment leaves the quantity untouched
        assert_eq!(repo.level(variant_id).await.unwrap().unwrap().quantity, 3);
    }

    #[tokio::test]
    async fn adjust_unknown_variant() {
        let repo = InMemoryRepository::new();
        let result = repo.adjust(VariantId::new(), 1).await;
        assert!(matches!(result, Err(RepositoryError::InventoryNotFound(_))));
    }

    #[tokio::test]
    async fn put_level_keeps_existing_record_id() {
        let repo = InMemoryRepository::new();
        let store_id = StoreId::new();
        let variant_id = VariantId::new();

        let first = repo
            .put_level(&InventoryLevel::new(variant_id, store_id, 5))
            .await
            .unwrap();
        let second = repo
            .put_level(&InventoryLevel::new(variant_id, store_id, 9))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 9);
    }

    #[tokio::test]
    async fn transition_status_applies_when_expected_matches() {
        let repo = InMemoryRepository::new();
        let store_id = StoreId::new();
        let order = test_order(store_id, vec![test_item(None, 1)]);
        repo.insert_order(&order).await.unwrap();

        let updated = repo
            .transition_status(order.id, OrderStatus::Pending, OrderStatus::Paid)
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn transition_status_conflicts_on_stale_expectation() {
        let repo = InMemoryRepository::new();
        let store_id = StoreId::new();
        let order = test_order(store_id, vec![test_item(None, 1)]);
        repo.insert_order(&order).await.unwrap();

        repo.transition_status(order.id, OrderStatus::Pending, OrderStatus::Paid)
            .await
            .unwrap();

        let result = repo
            .transition_status(order.id, OrderStatus::Pending, OrderStatus::Processing)
            .await;
        assert!(matches!(
            result,
            Err(RepositoryError::StatusConflict {
                expected: OrderStatus::Pending,
                actual: OrderStatus::Paid,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn transition_status_unknown_order() {
        let repo = InMemoryRepository::new();
        let result = repo
            .transition_status(OrderId::new(), OrderStatus::Pending, OrderStatus::Paid)
            .await;
        assert!(matches!(result, Err(RepositoryError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn record_return_stamps_named_items() {
        let repo = InMemoryRepository::new();
        let store_id = StoreId::new();
        let items = vec![test_item(None, 1), test_item(None, 2)];
        let first_id = items[0].id;
        let mut order = test_order(store_id, items);
        order.status = OrderStatus::Delivered;
        repo.insert_order(&order).await.unwrap();

        let updated = repo
            .record_return(
                order.id,
                OrderStatus::Delivered,
                OrderStatus::PartiallyReturned,
                &[first_id],
            )
            .await
            .unwrap();

        assert_eq!(updated.status, OrderStatus::PartiallyReturned);
        assert!(updated.item(first_id).unwrap().is_returned());
        assert_eq!(updated.outstanding_items().count(), 1);
    }

    #[tokio::test]
    async fn orders_for_store_scopes_and_sorts() {
        let repo = InMemoryRepository::new();
        let store_a = StoreId::new();
        let store_b = StoreId::new();

        let mut older = test_order(store_a, vec![test_item(None, 1)]);
        older.created_at = Utc::now() - chrono::Duration::minutes(5);
        let newer = test_order(store_a, vec![test_item(None, 1)]);
        let elsewhere = test_order(store_b, vec![test_item(None, 1)]);

        repo.insert_order(&older).await.unwrap();
        repo.insert_order(&newer).await.unwrap();
        repo.insert_order(&elsewhere).await.unwrap();

        let orders = repo.orders_for_store(store_a).await.unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].id, newer.id);
        assert_eq!(orders[1].id, older.id);
    }

    #[tokio::test]
    async fn concurrent_adjustments_never_oversell() {
        let repo = InMemoryRepository::new();
        let variant_id = seed_level(&repo, StoreId::new(), 5).await;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let repo = repo.clone();
            handles.push(tokio::spawn(
                async move { repo.adjust(variant_id, -1).await },
            ));
        }

        let mut succeeded = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(RepositoryError::InsufficientStock { .. }) => rejected += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(succeeded, 5);
        assert_eq!(rejected, 5);
        assert_eq!(repo.level(variant_id).await.unwrap().unwrap().quantity, 0);
    }
}
