//! HTTP boundary for the order service. Uses axum for routing.
//!
//! ## Routes
//!
//! - `POST /orders` — create an order. Body = JSON `CreateOrder`. Returns
//!   `201` with the Pending order; payment resolves asynchronously.
//! - `GET /orders/:id` — fetch an order (and, eventually, its terminal
//!   status).
//! - `GET /health` — health check returning `{ "ok": true }`.
//!
//! The `X-Request-ID` header, when present, becomes the correlation id for
//! the order's payment round trip; otherwise one is generated at ingress.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::service::{CreateOrder, OrderError, OrderService};

/// Build an axum `Router` serving the order API.
pub fn router(orders: OrderService) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/orders", post(create_order_handler))
        .route("/orders/:id", get(get_order_handler))
        .with_state(orders)
}

/// Serve the order API at the given address (e.g. `"0.0.0.0:8080"`).
pub async fn serve(orders: OrderService, addr: &str) -> Result<(), std::io::Error> {
    let app = router(orders);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr, "http server listening");
    axum::serve(listener, app).await
}

/// `GET /health` — returns `{ "ok": true }`.
async fn health_handler() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

/// `POST /orders` — create an order and queue its payment request.
async fn create_order_handler(
    State(orders): State<OrderService>,
    headers: HeaderMap,
    Json(request): Json<CreateOrder>,
) -> Response {
    let request_id = request_id_from_headers(&headers);
    match orders.create_order(request, &request_id).await {
        Ok(order) => {
            info!(request_id, order_id = %order.id, "order accepted");
            (StatusCode::CREATED, Json(order)).into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// `GET /orders/:id` — fetch one order.
async fn get_order_handler(
    State(orders): State<OrderService>,
    Path(id): Path<String>,
) -> Response {
    match orders.get_order(&id).await {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(e) => error_response(&e),
    }
}

fn error_response(error: &OrderError) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

/// Take the caller's request id, or mint one for the payment round trip.
fn request_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
