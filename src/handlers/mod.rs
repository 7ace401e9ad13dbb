// src/handlers/mod.rs

pub mod attempt;
pub mod teacher;

use axum::{Json, response::IntoResponse};

/// Liveness probe.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
