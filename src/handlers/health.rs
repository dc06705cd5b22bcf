use axum::response::IntoResponse;
use serde_json::json;

use crate::middleware::ApiResponse;

/// GET /healthz - liveness probe
pub async fn healthz() -> impl IntoResponse {
    ApiResponse::success(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now(),
    }))
}
