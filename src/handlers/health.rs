// handlers/health.rs - GET /health handler (outside the tenant boundary)

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::server::AppState;

/// Liveness, plus a database ping when the server owns a pool. A failed ping
/// is a 503 with a fixed message; the cause is only logged.
pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let now = chrono::Utc::now();

    if !state.check_database {
        return Ok(Json(json!({ "success": true, "data": { "status": "ok", "timestamp": now } })));
    }

    DatabaseManager::health_check().await?;
    Ok(Json(json!({
        "success": true,
        "data": { "status": "ok", "timestamp": now, "database": "ok" }
    })))
}
