//! Health Routes
//!
//! Health check endpoints for monitoring and load balancer probes.
//!
//! - GET /api/health - Liveness, no store access
//! - GET /api/health/ready - Readiness, round-trips the document store
//! - Fallback - `{"error": "Not found"}` for unknown routes

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::dto::{HealthResponse, ReadinessResponse};
use crate::api::state::AppState;
use crate::store::CHATS;

/// GET /api/health
///
/// Returns 200 whenever the process is serving; never touches the store.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "GlobeTalk backend is running!".to_string(),
    })
}

/// GET /api/health/ready
///
/// Returns 200 if the document store answers, 503 otherwise.
pub async fn readiness(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ReadinessResponse>) {
    let store_ok = match state.store.list(CHATS).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Document store readiness check failed");
            false
        }
    };

    let status = if store_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            status: if store_ok { "ready" } else { "unavailable" }.to_string(),
            store: if store_ok { "ok" } else { "error" }.to_string(),
            backend: state.store.backend().to_string(),
            uptime_seconds: state.uptime_seconds(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Catch-all for undefined routes
pub async fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
