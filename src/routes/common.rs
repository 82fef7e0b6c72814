//! Common routes: health, readiness, version.

use crate::error::ErrorCode;
use crate::response::failure_body;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

async fn ready(State(state): State<AppState>) -> Result<Json<HealthBody>, axum::response::Response> {
    if sqlx::query("SELECT 1").fetch_optional(&state.pool).await.is_err() {
        let body = failure_body(
            ErrorCode::ServiceUnavailable,
            "database",
            "database is unreachable",
        );
        return Err(axum::response::IntoResponse::into_response((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(body),
        )));
    }
    Ok(Json(HealthBody { status: "ok" }))
}

async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// GET /health, GET /ready (with DB ping), GET /version.
pub fn common_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/version", get(version))
        .with_state(state)
}
