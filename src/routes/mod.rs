// src/routes/mod.rs
pub mod chat;
pub mod storage;

use std::path::Path;

use crate::error::AppError;
use crate::state::SharedState;
use axum::{
    Json, Router,
    body::Bytes,
    routing::{get, post},
};
use chrono::{SecondsFormat, Utc};
use chat::chat_handler;
use serde_json::{Value, json};
use storage::{get_entity_handler, list_blobs_handler};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub const SERVICE_NAME: &str = "copilot-starter";

/// API routes plus a static-file fallback rooted at `public_dir`.
pub fn create_router(public_dir: impl AsRef<Path>) -> Router<SharedState> {
    let api_routes = Router::new()
        .route("/chat", post(chat_handler))
        .route("/blobs/{container_name}", get(list_blobs_handler))
        .route(
            "/table/{table_name}/{partition_key}/{row_key}",
            get(get_entity_handler),
        )
        .route("/health", get(api_health))
        .route("/echo", post(echo_handler))
        .route("/time", get(time_handler));

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(|| async { "OK" }))
        .fallback_service(ServeDir::new(public_dir.as_ref()))
        .layer(TraceLayer::new_for_http())
}

async fn api_health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": SERVICE_NAME }))
}

/// Wrap any JSON body in `{"received": .., "timestamp": ..}`.
async fn echo_handler(body: Bytes) -> Result<Json<Value>, AppError> {
    if body.is_empty() {
        return Err(AppError::BadRequest("Request body is empty".to_string()));
    }
    let received: Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Request body is not valid JSON: {e}")))?;
    Ok(Json(json!({
        "received": received,
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })))
}

async fn time_handler() -> Json<Value> {
    Json(json!({
        "time": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        "timezone": "UTC",
    }))
}
