use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use crate::errors::ServiceError;
use crate::{ApiResponse, AppState};

/// GET /health — liveness check.
pub async fn health() -> Json<ApiResponse<Value>> {
    Json(ApiResponse::success(json!({ "status": "ok" })))
}

/// GET /status — readiness, including a database ping.
pub async fn status(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, ServiceError> {
    let database = match state.db.ping().await {
        Ok(()) => "up",
        Err(_) => "down",
    };

    Ok(Json(ApiResponse::success(json!({
        "status": if database == "up" { "ok" } else { "degraded" },
        "database": database,
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
    }))))
}
