//! HTTP API server with observability for the commerce platform.
//!
//! Provides store-scoped REST endpoints for the order lifecycle and
//! inventory administration, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use domain::{
    EventSink, InventoryRepository, InventoryService, OrderRepository, OrdersService,
    StockThresholds,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<R: OrderRepository + InventoryRepository> {
    pub orders: OrdersService<R>,
    pub inventory: InventoryService<R>,
}

impl<R: OrderRepository + InventoryRepository> AppState<R> {
    /// Wires both services over one repository and one event sink.
    pub fn new(repo: Arc<R>, sink: Arc<dyn EventSink>, thresholds: StockThresholds) -> Self {
        Self {
            orders: OrdersService::new(repo.clone(), sink.clone(), thresholds),
            inventory: InventoryService::new(repo, sink, thresholds),
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<R: OrderRepository + InventoryRepository + 'static>(
    state: Arc<AppState<R>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/stores/{store_id}/orders/create",
            post(routes::orders::create::<R>),
        )
        .route("/stores/{store_id}/orders", get(routes::orders::list::<R>))
        .route(
            "/stores/{store_id}/orders/{id}",
            get(routes::orders::get::<R>),
        )
        .route(
            "/stores/{store_id}/orders/{id}/status",
            put(routes::orders::update_status::<R>),
        )
        .route(
            "/stores/{store_id}/orders/{id}/cancel",
            post(routes::orders::cancel::<R>),
        )
        .route(
            "/stores/{store_id}/orders/{id}/return",
            post(routes::orders::return_items::<R>),
        )
        .route(
            "/stores/{store_id}/orders/{id}/inventory-impact",
            get(routes::orders::inventory_impact::<R>),
        )
        .route(
            "/stores/{store_id}/inventory/{variant_id}",
            get(routes::inventory::get::<R>),
        )
        .route(
            "/stores/{store_id}/inventory/{variant_id}",
            put(routes::inventory::put::<R>),
        )
        .route(
            "/stores/{store_id}/inventory/{variant_id}/adjust",
            post(routes::inventory::adjust::<R>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
