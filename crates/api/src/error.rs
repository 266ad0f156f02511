//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, InventoryError, OrderError, RepositoryError};
use serde_json::json;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg }))
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Maps domain failures to status codes and response bodies.
///
/// Validation and stock shortfalls carry their full failure lists so a
/// client can fix a request in one round trip; state machine refusals
/// and lost compare-and-set races are conflicts; unknown ids are 404s.
fn domain_error_to_response(err: DomainError) -> (StatusCode, serde_json::Value) {
    match &err {
        DomainError::Order(order_err) => match order_err {
            OrderError::Validation { violations } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": err.to_string(), "violations": violations }),
            ),
            OrderError::InsufficientStock { shortfalls } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": err.to_string(), "shortfalls": shortfalls }),
            ),
            OrderError::ItemNotInOrder { .. } => {
                (StatusCode::NOT_FOUND, json!({ "error": err.to_string() }))
            }
            OrderError::IllegalTransition { .. }
            | OrderError::WorkflowOnly { .. }
            | OrderError::CannotCancel { .. }
            | OrderError::CannotReturn { .. }
            | OrderError::ItemAlreadyReturned { .. } => {
                (StatusCode::CONFLICT, json!({ "error": err.to_string() }))
            }
        },
        DomainError::Inventory(InventoryError::NegativeQuantity { .. }) => {
            (StatusCode::BAD_REQUEST, json!({ "error": err.to_string() }))
        }
        DomainError::OrderNotFound(_) | DomainError::InventoryNotFound(_) => {
            (StatusCode::NOT_FOUND, json!({ "error": err.to_string() }))
        }
        DomainError::Repository(repo_err) => match repo_err {
            RepositoryError::OrderNotFound(_) | RepositoryError::InventoryNotFound(_) => {
                (StatusCode::NOT_FOUND, json!({ "error": err.to_string() }))
            }
            RepositoryError::StatusConflict { .. } => {
                (StatusCode::CONFLICT, json!({ "error": err.to_string() }))
            }
            // A direct adjustment that would go negative surfaces here
            // rather than as an order-level shortfall list.
            RepositoryError::InsufficientStock {
                variant_id,
                requested,
                available,
            } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": err.to_string(),
                    "shortfalls": [{
                        "variant_id": variant_id,
                        "requested": requested,
                        "available": available,
                    }],
                }),
            ),
            RepositoryError::Corrupt(_) | RepositoryError::Backend(_) => {
                tracing::error!(error = %err, "repository failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": err.to_string() }),
                )
            }
        },
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}
