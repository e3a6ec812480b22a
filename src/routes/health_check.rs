use actix_web::{http::StatusCode, HttpResponse};

use crate::response::send_success;

/// GET /health
pub async fn health_check() -> HttpResponse {
    tracing::debug!("Health check endpoint called");
    send_success(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}
