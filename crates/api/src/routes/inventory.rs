//! Inventory level endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{StoreId, VariantId};
use domain::{InventoryLevel, InventoryRepository, OrderRepository, StockThresholds};
use serde::{Deserialize, Serialize};

use super::orders::parse_id;
use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct SetLevelRequest {
    pub quantity: i64,
}

#[derive(Deserialize)]
pub struct AdjustRequest {
    pub delta: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct LevelResponse {
    pub variant_id: String,
    pub store_id: String,
    pub quantity: i64,
    pub low_stock: bool,
    pub critical_stock: bool,
    pub out_of_stock: bool,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct AdjustResponse {
    pub variant_id: String,
    pub previous: i64,
    pub current: i64,
    pub delta: i64,
}

fn level_response(level: &InventoryLevel, thresholds: StockThresholds) -> LevelResponse {
    LevelResponse {
        variant_id: level.variant_id.to_string(),
        store_id: level.store_id.to_string(),
        quantity: level.quantity,
        low_stock: thresholds.is_low_stock(level.quantity),
        critical_stock: thresholds.is_critical_stock(level.quantity),
        out_of_stock: thresholds.is_out_of_stock(level.quantity),
        updated_at: level.updated_at.to_rfc3339(),
    }
}

// -- Handlers --

/// GET /stores/:store_id/inventory/:variant_id — current level with
/// threshold flags.
#[tracing::instrument(skip(state))]
pub async fn get<R: OrderRepository + InventoryRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path((store_id, variant_id)): Path<(String, String)>,
) -> Result<Json<LevelResponse>, ApiError> {
    let _store_id: StoreId = parse_id(&store_id, "store_id")?;
    let variant_id: VariantId = parse_id(&variant_id, "variant_id")?;

    let level = state.inventory.level(variant_id).await?;

    Ok(Json(level_response(&level, state.inventory.thresholds())))
}

/// PUT /stores/:store_id/inventory/:variant_id — set the quantity
/// outright, creating the record when missing.
#[tracing::instrument(skip(state, req))]
pub async fn put<R: OrderRepository + InventoryRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path((store_id, variant_id)): Path<(String, String)>,
    Json(req): Json<SetLevelRequest>,
) -> Result<Json<LevelResponse>, ApiError> {
    let store_id: StoreId = parse_id(&store_id, "store_id")?;
    let variant_id: VariantId = parse_id(&variant_id, "variant_id")?;

    let level = state
        .inventory
        .set_level(store_id, variant_id, req.quantity)
        .await?;

    Ok(Json(level_response(&level, state.inventory.thresholds())))
}

/// POST /stores/:store_id/inventory/:variant_id/adjust — apply a signed
/// delta to the quantity.
#[tracing::instrument(skip(state, req))]
pub async fn adjust<R: OrderRepository + InventoryRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path((store_id, variant_id)): Path<(String, String)>,
    Json(req): Json<AdjustRequest>,
) -> Result<Json<AdjustResponse>, ApiError> {
    let _store_id: StoreId = parse_id(&store_id, "store_id")?;
    let variant_id: VariantId = parse_id(&variant_id, "variant_id")?;

    let change = state.inventory.adjust(variant_id, req.delta).await?;

    Ok(Json(AdjustResponse {
        variant_id: change.variant_id.to_string(),
        previous: change.previous,
        current: change.current,
        delta: change.delta(),
    }))
}
