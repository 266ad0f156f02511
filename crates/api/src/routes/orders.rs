//! Order lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Money, OrderId, OrderItemId, ProductId, StoreId, UserId, VariantId};
use domain::{
    Address, InventoryImpact, InventoryRepository, NewOrder, NewOrderItem, Order, OrderRepository,
    OrderStatus,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: String,
    pub items: Vec<OrderItemRequest>,
    pub shipping_address: Option<Address>,
    pub billing_address: Option<Address>,
    pub total_cents: Option<i64>,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub variant_id: Option<String>,
    pub product_id: Option<String>,
    pub product_name: String,
    pub sku: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Deserialize, Default)]
pub struct ReturnRequest {
    pub item_ids: Option<Vec<String>>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub store_id: String,
    pub user_id: String,
    pub status: String,
    pub total_cents: i64,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub items: Vec<OrderItemResponse>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub id: String,
    pub variant_id: Option<String>,
    pub product_id: Option<String>,
    pub product_name: String,
    pub sku: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
    pub returned: bool,
    pub returned_at: Option<String>,
}

fn order_response(order: &Order) -> OrderResponse {
    let items = order
        .items
        .iter()
        .map(|item| OrderItemResponse {
            id: item.id.to_string(),
            variant_id: item.variant_id.map(|id| id.to_string()),
            product_id: item.product_id.map(|id| id.to_string()),
            product_name: item.product_name.clone(),
            sku: item.sku.clone(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price.cents(),
            line_total_cents: item.line_total().cents(),
            returned: item.is_returned(),
            returned_at: item.returned_at.map(|at| at.to_rfc3339()),
        })
        .collect();

    OrderResponse {
        id: order.id.to_string(),
        store_id: order.store_id.to_string(),
        user_id: order.user_id.to_string(),
        status: order.status.as_str().to_string(),
        total_cents: order.total.cents(),
        shipping_address: order.shipping_address.clone(),
        billing_address: order.billing_address.clone(),
        items,
        created_at: order.created_at.to_rfc3339(),
        updated_at: order.updated_at.to_rfc3339(),
    }
}

impl CreateOrderRequest {
    fn into_draft(self) -> Result<NewOrder, ApiError> {
        let user_id: UserId = parse_id(&self.user_id, "user_id")?;

        let mut items = Vec::with_capacity(self.items.len());
        for item in self.items {
            let variant_id = match &item.variant_id {
                Some(raw) => Some(parse_id::<VariantId>(raw, "variant_id")?),
                None => None,
            };
            let product_id = match &item.product_id {
                Some(raw) => Some(parse_id::<ProductId>(raw, "product_id")?),
                None => None,
            };
            items.push(NewOrderItem {
                variant_id,
                product_id,
                product_name: item.product_name,
                sku: item.sku,
                quantity: item.quantity,
                unit_price: Money::from_cents(item.unit_price_cents),
            });
        }

        Ok(NewOrder {
            user_id,
            items,
            shipping_address: self.shipping_address,
            billing_address: self.billing_address,
            total: self.total_cents.map(Money::from_cents),
        })
    }
}

// -- Handlers --

/// POST /stores/:store_id/orders/create — place a new order.
#[tracing::instrument(skip(state, req))]
pub async fn create<R: OrderRepository + InventoryRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(store_id): Path<String>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let store_id: StoreId = parse_id(&store_id, "store_id")?;
    let draft = req.into_draft()?;

    let order = state.orders.create_order(store_id, draft).await?;

    Ok((StatusCode::CREATED, Json(order_response(&order))))
}

/// GET /stores/:store_id/orders — list the store's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<R: OrderRepository + InventoryRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(store_id): Path<String>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let store_id: StoreId = parse_id(&store_id, "store_id")?;

    let orders = state.orders.orders_for_store(store_id).await?;
    let responses = orders.iter().map(order_response).collect();

    Ok(Json(responses))
}

/// GET /stores/:store_id/orders/:id — load one order.
#[tracing::instrument(skip(state))]
pub async fn get<R: OrderRepository + InventoryRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path((store_id, id)): Path<(String, String)>,
) -> Result<Json<OrderResponse>, ApiError> {
    let store_id: StoreId = parse_id(&store_id, "store_id")?;
    let order_id: OrderId = parse_id(&id, "order id")?;

    let order = state.orders.get_order(store_id, order_id).await?;

    Ok(Json(order_response(&order)))
}

/// PUT /stores/:store_id/orders/:id/status — move an order along the
/// fulfillment chain.
#[tracing::instrument(skip(state, req))]
pub async fn update_status<R: OrderRepository + InventoryRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path((store_id, id)): Path<(String, String)>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let store_id: StoreId = parse_id(&store_id, "store_id")?;
    let order_id: OrderId = parse_id(&id, "order id")?;
    let next = OrderStatus::parse(&req.status)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown order status: {}", req.status)))?;

    let order = state.orders.update_status(store_id, order_id, next).await?;

    Ok(Json(order_response(&order)))
}

/// POST /stores/:store_id/orders/:id/cancel — cancel an order and
/// restore its stock.
#[tracing::instrument(skip(state))]
pub async fn cancel<R: OrderRepository + InventoryRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path((store_id, id)): Path<(String, String)>,
) -> Result<Json<OrderResponse>, ApiError> {
    let store_id: StoreId = parse_id(&store_id, "store_id")?;
    let order_id: OrderId = parse_id(&id, "order id")?;

    let order = state.orders.cancel_order(store_id, order_id).await?;

    Ok(Json(order_response(&order)))
}

/// POST /stores/:store_id/orders/:id/return — return delivered items.
///
/// Without `item_ids` every outstanding item is returned.
#[tracing::instrument(skip(state, req))]
pub async fn return_items<R: OrderRepository + InventoryRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path((store_id, id)): Path<(String, String)>,
    Json(req): Json<ReturnRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let store_id: StoreId = parse_id(&store_id, "store_id")?;
    let order_id: OrderId = parse_id(&id, "order id")?;

    let item_ids = match &req.item_ids {
        None => None,
        Some(raw_ids) => {
            let mut ids = Vec::with_capacity(raw_ids.len());
            for raw in raw_ids {
                ids.push(parse_id::<OrderItemId>(raw, "item id")?);
            }
            Some(ids)
        }
    };

    let order = state.orders.return_order(store_id, order_id, item_ids).await?;

    Ok(Json(order_response(&order)))
}

/// GET /stores/:store_id/orders/:id/inventory-impact — report what the
/// order deducted and what has been restored.
#[tracing::instrument(skip(state))]
pub async fn inventory_impact<R: OrderRepository + InventoryRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path((store_id, id)): Path<(String, String)>,
) -> Result<Json<InventoryImpact>, ApiError> {
    let store_id: StoreId = parse_id(&store_id, "store_id")?;
    let order_id: OrderId = parse_id(&id, "order id")?;

    let impact = state.orders.inventory_impact(store_id, order_id).await?;

    Ok(Json(impact))
}

pub(crate) fn parse_id<T: From<Uuid>>(raw: &str, field: &str) -> Result<T, ApiError> {
    let uuid = Uuid::parse_str(raw)
        .map_err(|e| ApiError::BadRequest(format!("Invalid {field}: {e}")))?;
    Ok(T::from(uuid))
}
