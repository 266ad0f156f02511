//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use domain::{EventSink, StockThresholds};
use events::EventBus;
use metrics_exporter_prometheus::PrometheusHandle;
use repository::InMemoryRepository;
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> axum::Router {
    let repo = Arc::new(InMemoryRepository::new());
    let sink: Arc<dyn EventSink> = Arc::new(EventBus::new());
    let state = Arc::new(api::AppState::new(repo, sink, StockThresholds::new(10, 3)));
    api::create_app(state, get_metrics_handle())
}

/// Sends one request and decodes the JSON response body.
async fn request(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn seed(app: &axum::Router, store_id: Uuid, variant_id: Uuid, quantity: i64) {
    let (status, _) = request(
        app,
        "PUT",
        &format!("/stores/{store_id}/inventory/{variant_id}"),
        Some(json!({ "quantity": quantity })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

fn address_json() -> serde_json::Value {
    json!({
        "full_name": "Ada Lovelace",
        "line1": "12 Analytical Row",
        "city": "London",
        "postal_code": "N1 7AA",
        "country": "GB",
    })
}

fn order_body(
    user_id: Uuid,
    variant_id: Uuid,
    quantity: u32,
    unit_price_cents: i64,
) -> serde_json::Value {
    json!({
        "user_id": user_id,
        "items": [{
            "variant_id": variant_id,
            "product_name": "Widget",
            "sku": "SKU-001",
            "quantity": quantity,
            "unit_price_cents": unit_price_cents,
        }],
        "shipping_address": address_json(),
    })
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let (status, json) = request(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_create_order() {
    let app = setup();
    let store_id = Uuid::new_v4();
    let variant_id = Uuid::new_v4();
    seed(&app, store_id, variant_id, 10).await;

    let (status, order) = request(
        &app,
        "POST",
        &format!("/stores/{store_id}/orders/create"),
        Some(order_body(Uuid::new_v4(), variant_id, 2, 1000)),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["total_cents"], 2000);
    assert_eq!(order["items"].as_array().unwrap().len(), 1);
    assert_eq!(order["items"][0]["line_total_cents"], 2000);
    assert!(order["id"].as_str().is_some());

    // The creation deducted the ordered quantity
    let (status, level) = request(
        &app,
        "GET",
        &format!("/stores/{store_id}/inventory/{variant_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(level["quantity"], 8);
}

#[tokio::test]
async fn test_create_and_get_order() {
    let app = setup();
    let store_id = Uuid::new_v4();
    let variant_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();
    seed(&app, store_id, variant_id, 10).await;

    let (_, created) = request(
        &app,
        "POST",
        &format!("/stores/{store_id}/orders/create"),
        Some(order_body(user_id, variant_id, 2, 1000)),
    )
    .await;
    let order_id = created["id"].as_str().unwrap();

    let (status, order) = request(
        &app,
        "GET",
        &format!("/stores/{store_id}/orders/{order_id}"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["id"], order_id);
    assert_eq!(order["user_id"], user_id.to_string());
    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["shipping_address"]["full_name"], "Ada Lovelace");
    // Billing defaults to the shipping address
    assert_eq!(order["billing_address"]["city"], "London");
}

#[tokio::test]
async fn test_create_order_validation_failure() {
    let app = setup();
    let store_id = Uuid::new_v4();

    let (status, json) = request(
        &app,
        "POST",
        &format!("/stores/{store_id}/orders/create"),
        Some(json!({ "user_id": Uuid::new_v4(), "items": [] })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    // Missing items and missing shipping address are reported together
    assert_eq!(json["violations"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_create_order_insufficient_stock() {
    let app = setup();
    let store_id = Uuid::new_v4();
    let variant_id = Uuid::new_v4();
    seed(&app, store_id, variant_id, 1).await;

    let (status, json) = request(
        &app,
        "POST",
        &format!("/stores/{store_id}/orders/create"),
        Some(order_body(Uuid::new_v4(), variant_id, 5, 1000)),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let shortfalls = json["shortfalls"].as_array().unwrap();
    assert_eq!(shortfalls.len(), 1);
    assert_eq!(shortfalls[0]["requested"], 5);
    assert_eq!(shortfalls[0]["available"], 1);

    // Nothing was deducted
    let (_, level) = request(
        &app,
        "GET",
        &format!("/stores/{store_id}/inventory/{variant_id}"),
        None,
    )
    .await;
    assert_eq!(level["quantity"], 1);
}

#[tokio::test]
async fn test_create_order_with_invalid_user_id() {
    let app = setup();
    let store_id = Uuid::new_v4();

    let (status, _) = request(
        &app,
        "POST",
        &format!("/stores/{store_id}/orders/create"),
        Some(json!({
            "user_id": "not-a-uuid",
            "items": [],
            "shipping_address": address_json(),
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_nonexistent_order() {
    let app = setup();
    let store_id = Uuid::new_v4();
    let fake_id = Uuid::new_v4();

    let (status, _) = request(
        &app,
        "GET",
        &format!("/stores/{store_id}/orders/{fake_id}"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_orders_scoped_to_store() {
    let app = setup();
    let store_a = Uuid::new_v4();
    let store_b = Uuid::new_v4();
    let variant_id = Uuid::new_v4();
    seed(&app, store_a, variant_id, 10).await;

    let (_, created) = request(
        &app,
        "POST",
        &format!("/stores/{store_a}/orders/create"),
        Some(order_body(Uuid::new_v4(), variant_id, 1, 500)),
    )
    .await;
    let order_id = created["id"].as_str().unwrap();

    // Another store cannot see the order
    let (status, _) = request(
        &app,
        "GET",
        &format!("/stores/{store_b}/orders/{order_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list_a) = request(&app, "GET", &format!("/stores/{store_a}/orders"), None).await;
    let (_, list_b) = request(&app, "GET", &format!("/stores/{store_b}/orders"), None).await;
    assert_eq!(list_a.as_array().unwrap().len(), 1);
    assert_eq!(list_b.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_update_status() {
    let app = setup();
    let store_id = Uuid::new_v4();
    let variant_id = Uuid::new_v4();
    seed(&app, store_id, variant_id, 10).await;

    let (_, created) = request(
        &app,
        "POST",
        &format!("/stores/{store_id}/orders/create"),
        Some(order_body(Uuid::new_v4(), variant_id, 1, 1000)),
    )
    .await;
    let order_id = created["id"].as_str().unwrap();
    let status_uri = format!("/stores/{store_id}/orders/{order_id}/status");

    let (status, order) =
        request(&app, "PUT", &status_uri, Some(json!({ "status": "PAID" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "PAID");

    // Backward writes are conflicts
    let (status, _) =
        request(&app, "PUT", &status_uri, Some(json!({ "status": "PENDING" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Cancelled is only reachable through its workflow
    let (status, _) = request(
        &app,
        "PUT",
        &status_uri,
        Some(json!({ "status": "CANCELLED" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Unknown status strings are rejected up front
    let (status, _) =
        request(&app, "PUT", &status_uri, Some(json!({ "status": "LOST" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancel_restores_stock() {
    let app = setup();
    let store_id = Uuid::new_v4();
    let variant_id = Uuid::new_v4();
    seed(&app, store_id, variant_id, 5).await;

    let (_, created) = request(
        &app,
        "POST",
        &format!("/stores/{store_id}/orders/create"),
        Some(order_body(Uuid::new_v4(), variant_id, 2, 1000)),
    )
    .await;
    let order_id = created["id"].as_str().unwrap();
    let cancel_uri = format!("/stores/{store_id}/orders/{order_id}/cancel");

    let (status, order) = request(&app, "POST", &cancel_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "CANCELLED");

    let (_, level) = request(
        &app,
        "GET",
        &format!("/stores/{store_id}/inventory/{variant_id}"),
        None,
    )
    .await;
    assert_eq!(level["quantity"], 5);

    // Cancelled is terminal
    let (status, _) = request(&app, "POST", &cancel_uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_return_flow() {
    let app = setup();
    let store_id = Uuid::new_v4();
    let first_variant = Uuid::new_v4();
    let second_variant = Uuid::new_v4();
    seed(&app, store_id, first_variant, 10).await;
    seed(&app, store_id, second_variant, 10).await;

    let (_, created) = request(
        &app,
        "POST",
        &format!("/stores/{store_id}/orders/create"),
        Some(json!({
            "user_id": Uuid::new_v4(),
            "items": [
                {
                    "variant_id": first_variant,
                    "product_name": "Widget",
                    "sku": "SKU-001",
                    "quantity": 2,
                    "unit_price_cents": 1000,
                },
                {
                    "variant_id": second_variant,
                    "product_name": "Gadget",
                    "sku": "SKU-002",
                    "quantity": 1,
                    "unit_price_cents": 2500,
                },
            ],
            "shipping_address": address_json(),
        })),
    )
    .await;
    let order_id = created["id"].as_str().unwrap();
    let first_item = created["items"][0]["id"].as_str().unwrap();
    let return_uri = format!("/stores/{store_id}/orders/{order_id}/return");

    // Returns need a delivered order
    let (status, _) = request(&app, "POST", &return_uri, Some(json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = request(
        &app,
        "PUT",
        &format!("/stores/{store_id}/orders/{order_id}/status"),
        Some(json!({ "status": "DELIVERED" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Returning one of two items leaves the order partially returned
    let (status, order) = request(
        &app,
        "POST",
        &return_uri,
        Some(json!({ "item_ids": [first_item] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "PARTIALLY_RETURNED");
    assert_eq!(order["items"][0]["returned"], true);
    assert_eq!(order["items"][1]["returned"], false);

    let (_, level) = request(
        &app,
        "GET",
        &format!("/stores/{store_id}/inventory/{first_variant}"),
        None,
    )
    .await;
    assert_eq!(level["quantity"], 10);

    // Returning the rest completes the return
    let (status, order) = request(&app, "POST", &return_uri, Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "RETURNED");

    let (_, level) = request(
        &app,
        "GET",
        &format!("/stores/{store_id}/inventory/{second_variant}"),
        None,
    )
    .await;
    assert_eq!(level["quantity"], 10);
}

#[tokio::test]
async fn test_inventory_level_lifecycle() {
    let app = setup();
    let store_id = Uuid::new_v4();
    let variant_id = Uuid::new_v4();
    let level_uri = format!("/stores/{store_id}/inventory/{variant_id}");

    // Unknown variants are 404s
    let (status, _) = request(&app, "GET", &level_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, level) = request(&app, "PUT", &level_uri, Some(json!({ "quantity": 20 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(level["quantity"], 20);
    assert_eq!(level["low_stock"], false);

    // Negative quantities are rejected
    let (status, _) = request(&app, "PUT", &level_uri, Some(json!({ "quantity": -1 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, change) = request(
        &app,
        "POST",
        &format!("{level_uri}/adjust"),
        Some(json!({ "delta": -12 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(change["previous"], 20);
    assert_eq!(change["current"], 8);
    assert_eq!(change["delta"], -12);

    let (_, level) = request(&app, "GET", &level_uri, None).await;
    assert_eq!(level["low_stock"], true);
    assert_eq!(level["critical_stock"], false);
    assert_eq!(level["out_of_stock"], false);

    // An adjustment that would go negative changes nothing
    let (status, json) = request(
        &app,
        "POST",
        &format!("{level_uri}/adjust"),
        Some(json!({ "delta": -20 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["shortfalls"][0]["available"], 8);

    let (_, level) = request(&app, "GET", &level_uri, None).await;
    assert_eq!(level["quantity"], 8);
}

#[tokio::test]
async fn test_inventory_impact_after_cancel() {
    let app = setup();
    let store_id = Uuid::new_v4();
    let variant_id = Uuid::new_v4();
    seed(&app, store_id, variant_id, 5).await;

    let (_, created) = request(
        &app,
        "POST",
        &format!("/stores/{store_id}/orders/create"),
        Some(order_body(Uuid::new_v4(), variant_id, 2, 1000)),
    )
    .await;
    let order_id = created["id"].as_str().unwrap();
    let impact_uri = format!("/stores/{store_id}/orders/{order_id}/inventory-impact");

    let (_, impact) = request(&app, "GET", &impact_uri, None).await;
    assert_eq!(impact["status"], "PENDING");
    assert_eq!(impact["items"][0]["restored"], false);
    assert_eq!(impact["items"][0]["on_hand"], 3);

    let (status, _) = request(
        &app,
        "POST",
        &format!("/stores/{store_id}/orders/{order_id}/cancel"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, impact) = request(&app, "GET", &impact_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(impact["status"], "CANCELLED");
    assert_eq!(impact["items"][0]["restored"], true);
    assert_eq!(impact["items"][0]["on_hand"], 5);
}

#[tokio::test]
async fn test_invalid_store_id() {
    let app = setup();

    let (status, json) = request(&app, "GET", "/stores/not-a-uuid/orders", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("store_id"));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    let store_id = Uuid::new_v4();
    let variant_id = Uuid::new_v4();
    seed(&app, store_id, variant_id, 10).await;

    let (status, _) = request(
        &app,
        "POST",
        &format!("/stores/{store_id}/orders/create"),
        Some(order_body(Uuid::new_v4(), variant_id, 1, 1000)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("orders_created_total"));
}
