//! HTTP handlers for fees-service.

pub mod payments;
pub mod students;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::services::metrics::get_metrics;

pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "service": "fees-service" })),
    )
}

pub async fn metrics() -> impl IntoResponse {
    get_metrics()
}
