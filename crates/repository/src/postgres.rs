use std::collections::HashMap;

use async_trait::async_trait;
use common::{InventoryId, Money, OrderId, OrderItemId, ProductId, StoreId, UserId, VariantId};
use domain::inventory::{InventoryLevel, StockChange};
use domain::order::{Address, Order, OrderItem, OrderStatus};
use domain::repository::{
    InventoryRepository, OrderRepository, RepositoryError, RepositoryResult,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// PostgreSQL-backed repository implementation.
///
/// Order creation and stock adjustments run inside transactions; the
/// rows being deducted are taken with `SELECT ... FOR UPDATE` so
/// concurrent writers to the same variant serialize instead of
/// overselling.
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a repository over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database and returns a repository over a fresh pool.
    pub async fn connect(database_url: &str) -> RepositoryResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(RepositoryError::backend)?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_order(row: &PgRow, items: Vec<OrderItem>) -> RepositoryResult<Order> {
        let status_text: String = row.try_get("status").map_err(RepositoryError::corrupt)?;
        let status = OrderStatus::parse(&status_text).ok_or_else(|| {
            RepositoryError::corrupt(format!("unknown order status {status_text:?}"))
        })?;
        let shipping_json: serde_json::Value = row
            .try_get("shipping_address")
            .map_err(RepositoryError::corrupt)?;
        let shipping_address: Address =
            serde_json::from_value(shipping_json).map_err(RepositoryError::corrupt)?;
        let billing_json: serde_json::Value = row
            .try_get("billing_address")
            .map_err(RepositoryError::corrupt)?;
        let billing_address: Address =
            serde_json::from_value(billing_json).map_err(RepositoryError::corrupt)?;

        Ok(Order {
            id: OrderId::from_uuid(
                row.try_get::<Uuid, _>("id")
                    .map_err(RepositoryError::corrupt)?,
            ),
            store_id: StoreId::from_uuid(
                row.try_get::<Uuid, _>("store_id")
                    .map_err(RepositoryError::corrupt)?,
            ),
            user_id: UserId::from_uuid(
                row.try_get::<Uuid, _>("user_id")
                    .map_err(RepositoryError::corrupt)?,
            ),
            status,
            total: Money::from_cents(
                row.try_get::<i64, _>("total_cents")
                    .map_err(RepositoryError::corrupt)?,
            ),
            shipping_address,
            billing_address,
            items,
            created_at: row
                .try_get("created_at")
                .map_err(RepositoryError::corrupt)?,
            updated_at: row
                .try_get("updated_at")
                .map_err(RepositoryError::corrupt)?,
        })
    }

    fn row_to_item(row: &PgRow) -> RepositoryResult<OrderItem> {
        Ok(OrderItem {
            id: OrderItemId::from_uuid(
                row.try_get::<Uuid, _>("id")
                    .map_err(RepositoryError::corrupt)?,
            ),
            variant_id: row
                .try_get::<Option<Uuid>, _>("variant_id")
                .map_err(RepositoryError::corrupt)?
                .map(VariantId::from_uuid),
            product_id: row
                .try_get::<Option<Uuid>, _>("product_id")
                .map_err(RepositoryError::corrupt)?
                .map(ProductId::from_uuid),
            product_name: row
                .try_get("product_name")
                .map_err(RepositoryError::corrupt)?,
            sku: row.try_get("sku").map_err(RepositoryError::corrupt)?,
            unit_price: Money::from_cents(
                row.try_get::<i64, _>("unit_price_cents")
                    .map_err(RepositoryError::corrupt)?,
            ),
            quantity: row
                .try_get::<i32, _>("quantity")
                .map_err(RepositoryError::corrupt)? as u32,
            returned_at: row
                .try_get("returned_at")
                .map_err(RepositoryError::corrupt)?,
        })
    }

    fn row_to_level(row: &PgRow) -> RepositoryResult<InventoryLevel> {
        Ok(InventoryLevel {
            id: InventoryId::from_uuid(
                row.try_get::<Uuid, _>("id")
                    .map_err(RepositoryError::corrupt)?,
            ),
            variant_id: VariantId::from_uuid(
                row.try_get::<Uuid, _>("variant_id")
                    .map_err(RepositoryError::corrupt)?,
            ),
            store_id: StoreId::from_uuid(
                row.try_get::<Uuid, _>("store_id")
                    .map_err(RepositoryError::corrupt)?,
            ),
            quantity: row.try_get("quantity").map_err(RepositoryError::corrupt)?,
            updated_at: row
                .try_get("updated_at")
                .map_err(RepositoryError::corrupt)?,
        })
    }

    async fn fetch_items(&self, order_id: OrderId) -> RepositoryResult<Vec<OrderItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, variant_id, product_id, product_name, sku, unit_price_cents, quantity, returned_at
            FROM order_items
            WHERE order_id = $1
            ORDER BY line_no ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::backend)?;

        rows.iter().map(Self::row_to_item).collect()
    }
}

#[async_trait]
impl OrderRepository for PostgresRepository {
    async fn insert_order(&self, order: &Order) -> RepositoryResult<Vec<StockChange>> {
        let shipping_json =
            serde_json::to_value(&order.shipping_address).map_err(RepositoryError::corrupt)?;
        let billing_json =
            serde_json::to_value(&order.billing_address).map_err(RepositoryError::corrupt)?;

        let mut tx = self.pool.begin().await.map_err(RepositoryError::backend)?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, store_id, user_id, status, total_cents, shipping_address, billing_address, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.store_id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.total.cents())
        .bind(shipping_json)
        .bind(billing_json)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::backend)?;

        for (line_no, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, line_no, variant_id, product_id, product_name, sku, unit_price_cents, quantity, returned_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(order.id.as_uuid())
            .bind(line_no as i32)
            .bind(item.variant_id.map(|id| id.as_uuid()))
            .bind(item.product_id.map(|id| id.as_uuid()))
            .bind(&item.product_name)
            .bind(&item.sku)
            .bind(item.unit_price.cents())
            .bind(item.quantity as i32)
            .bind(item.returned_at)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::backend)?;
        }

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

        let mut changes = Vec::with_capacity(deductions.len());
        for (variant_id, requested) in deductions {
            // lock the inventory row for the rest of the transaction
            let row = sqlx::query(
                "SELECT store_id, quantity FROM inventory WHERE variant_id = $1 FOR UPDATE",
            )
            .bind(variant_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(RepositoryError::backend)?;

            let Some(row) = row else {
                // untracked variant: nothing to deduct from
                return Err(RepositoryError::InsufficientStock {
                    variant_id,
                    requested,
                    available: 0,
                });
            };

            let previous: i64 = row.try_get("quantity").map_err(RepositoryError::corrupt)?;
            let store_id = StoreId::from_uuid(
                row.try_get::<Uuid, _>("store_id")
                    .map_err(RepositoryError::corrupt)?,
            );

            if previous < requested {
                return Err(RepositoryError::InsufficientStock {
                    variant_id,
                    requested,
                    available: previous,
                });
            }

            let current = previous - requested;
            sqlx::query("UPDATE inventory SET quantity = $2, updated_at = now() WHERE variant_id = $1")
                .bind(variant_id.as_uuid())
                .bind(current)
                .execute(&mut *tx)
                .await
                .map_err(RepositoryError::backend)?;

            changes.push(StockChange {
                variant_id,
                store_id,
                previous,
                current,
            });
        }

        tx.commit().await.map_err(RepositoryError::backend)?;
        Ok(changes)
    }

    async fn fetch_order(&self, order_id: OrderId) -> RepositoryResult<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, store_id, user_id, status, total_cents, shipping_address, billing_address, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::backend)?;

        match row {
            Some(row) => {
                let items = self.fetch_items(order_id).await?;
                Ok(Some(Self::row_to_order(&row, items)?))
            }
            None => Ok(None),
        }
    }

    async fn orders_for_store(&self, store_id: StoreId) -> RepositoryResult<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, store_id, user_id, status, total_cents, shipping_address, billing_address, created_at, updated_at
            FROM orders
            WHERE store_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(store_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::backend)?;

        let mut orders = rows
            .iter()
            .map(|row| Self::row_to_order(row, Vec::new()))
            .collect::<RepositoryResult<Vec<Order>>>()?;

        if orders.is_empty() {
            return Ok(orders);
        }

        // one items query for the whole page, grouped by order
        let order_ids: Vec<Uuid> = orders.iter().map(|order| order.id.as_uuid()).collect();
        let item_rows = sqlx::query(
            r#"
            SELECT id, order_id, variant_id, product_id, product_name, sku, unit_price_cents, quantity, returned_at
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY line_no ASC
            "#,
        )
        .bind(&order_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::backend)?;

        let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in &item_rows {
            let order_id = OrderId::from_uuid(
                row.try_get::<Uuid, _>("order_id")
                    .map_err(RepositoryError::corrupt)?,
            );
            by_order.entry(order_id).or_default().push(Self::row_to_item(row)?);
        }
        for order in &mut orders {
            if let Some(items) = by_order.remove(&order.id) {
                order.items = items;
            }
        }

        Ok(orders)
    }

    async fn transition_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> RepositoryResult<Order> {
        let result = sqlx::query(
            "UPDATE orders SET status = $3, updated_at = now() WHERE id = $1 AND status = $2",
        )
        .bind(order_id.as_uuid())
        .bind(expected.as_str())
        .bind(next.as_str())
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::backend)?;

        if result.rows_affected() == 0 {
            // distinguish a missing order from losing the race
            let stored = self
                .fetch_order(order_id)
                .await?
                .ok_or(RepositoryError::OrderNotFound(order_id))?;
            return Err(RepositoryError::StatusConflict {
                order_id,
                expected,
                actual: stored.status,
            });
        }

        self.fetch_order(order_id)
            .await?
            .ok_or(RepositoryError::OrderNotFound(order_id))
    }

    async fn record_return(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        item_ids: &[OrderItemId],
    ) -> RepositoryResult<Order> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::backend)?;

        let result = sqlx::query(
            "UPDATE orders SET status = $3, updated_at = now() WHERE id = $1 AND status = $2",
        )
        .bind(order_id.as_uuid())
        .bind(expected.as_str())
        .bind(next.as_str())
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::backend)?;

        if result.rows_affected() == 0 {
            // the losing update took no row locks, safe to read outside
            drop(tx);
            let stored = self
                .fetch_order(order_id)
                .await?
                .ok_or(RepositoryError::OrderNotFound(order_id))?;
            return Err(RepositoryError::StatusConflict {
                order_id,
                expected,
                actual: stored.status,
            });
        }

        let ids: Vec<Uuid> = item_ids.iter().map(|id| id.as_uuid()).collect();
        sqlx::query(
            r#"
            UPDATE order_items
            SET returned_at = now()
            WHERE order_id = $1 AND id = ANY($2) AND returned_at IS NULL
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(&ids)
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::backend)?;

        tx.commit().await.map_err(RepositoryError::backend)?;

        self.fetch_order(order_id)
            .await?
            .ok_or(RepositoryError::OrderNotFound(order_id))
    }
}

#[async_trait]
impl InventoryRepository for PostgresRepository {
    async fn level(&self, variant_id: VariantId) -> RepositoryResult<Option<InventoryLevel>> {
        let row = sqlx::query(
            "SELECT id, variant_id, store_id, quantity, updated_at FROM inventory WHERE variant_id = $1",
        )
        .bind(variant_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::backend)?;

        row.map(|row| Self::row_to_level(&row)).transpose()
    }

    async fn put_level(&self, level: &InventoryLevel) -> RepositoryResult<InventoryLevel> {
        let row = sqlx::query(
            r#"
            INSERT INTO inventory (id, variant_id, store_id, quantity, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (variant_id) DO UPDATE SET
                store_id = EXCLUDED.store_id,
                quantity = EXCLUDED.quantity,
                updated_at = EXCLUDED.updated_at
            RETURNING id, variant_id, store_id, quantity, updated_at
            "#,
        )
        .bind(level.id.as_uuid())
        .bind(level.variant_id.as_uuid())
        .bind(level.store_id.as_uuid())
        .bind(level.quantity)
        .bind(level.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::backend)?;

        Self::row_to_level(&row)
    }

    async fn adjust(&self, variant_id: VariantId, delta: i64) -> RepositoryResult<StockChange> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::backend)?;

        let row = sqlx::query(
            "SELECT store_id, quantity FROM inventory WHERE variant_id = $1 FOR UPDATE",
        )
        .bind(variant_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(RepositoryError::backend)?
        .ok_or(RepositoryError::InventoryNotFound(variant_id))?;

        let previous: i64 = row.try_get("quantity").map_err(RepositoryError::corrupt)?;
        let store_id = StoreId::from_uuid(
            row.try_get::<Uuid, _>("store_id")
                .map_err(RepositoryError::corrupt)?,
        );

        let current = previous + delta;
        if current < 0 {
            return Err(RepositoryError::InsufficientStock {
                variant_id,
                requested: -delta,
                available: previous,
            });
        }

        sqlx::query("UPDATE inventory SET quantity = $2, updated_at = now() WHERE variant_id = $1")
            .bind(variant_id.as_uuid())
            .bind(current)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::backend)?;

        tx.commit().await.map_err(RepositoryError::backend)?;

        Ok(StockChange {
            variant_id,
            store_id,
            previous,
            current,
        })
    }
}
