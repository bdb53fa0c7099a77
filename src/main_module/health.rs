//! Liveness endpoint, reachable without a token.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use diesel::connection::SimpleConnection;
use log::warn;
use std::sync::Arc;

use crate::core::shared::state::AppState;

pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let db_ok = state
        .db(|conn| Ok(conn.batch_execute("SELECT 1")?))
        .await
        .map_err(|e| warn!("Health check failed: {e}"))
        .is_ok();

    if db_ok {
        (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ok",
                "database": "connected",
                "version": env!("CARGO_PKG_VERSION"),
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "error",
                "database": "disconnected",
            })),
        )
    }
}
