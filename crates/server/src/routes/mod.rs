//! API route handlers
//!
//! - `health`: liveness, readiness, metrics and metadata
//! - `embed`: embed and optionally store texts
//! - `search`: hybrid, dense and sparse search

pub mod embed;
pub mod health;
pub mod search;

use crate::error::{ServerError, ServerResult};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// API version and base info (GET /, no authentication).
pub async fn api_info() -> ServerResult<impl IntoResponse> {
    Ok(Json(json!({
        "name": "HRAG Server",
        "version": env!("CARGO_PKG_VERSION"),
        "api_version": "v1",
        "endpoints": [
            "/hybrid-embed",
            "/search",
            "/api/v1/hybrid-embed",
            "/api/v1/search",
            "/api/v1/metadata",
            "/health",
            "/ready",
            "/metrics"
        ]
    })))
}

/// 404 Not Found handler
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
