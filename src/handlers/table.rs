//! Table CRUD handlers: one resource path per table, verbs dispatched to the
//! CrudService. Handlers only translate between HTTP and the engine; every
//! outcome is wrapped in the standard envelope.

use crate::error::AppError;
use crate::response;
use crate::service::{CrudService, Verb};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Parse an optional request body. Absent/blank bodies are `None` (the
/// pipeline raises MissingBody where one is required); malformed JSON and
/// non-object bodies are InvalidFormat on `request_body`.
fn parse_body(raw: &str) -> Result<Option<Map<String, Value>>, AppError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| AppError::invalid_format("request_body", &format!("invalid JSON: {}", e)))?;
    match value {
        Value::Object(map) => Ok(Some(map)),
        _ => Err(AppError::invalid_format("request_body", "body must be a JSON object")),
    }
}

pub async fn list(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(filters): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let rows =
        CrudService::handle(&state.pool, &state.catalog, Verb::Read, &table, &filters, None)
            .await?;
    Ok(response::success(rows))
}

pub async fn create(
    State(state): State<AppState>,
    Path(table): Path<String>,
    raw_body: String,
) -> Result<impl IntoResponse, AppError> {
    let body = parse_body(&raw_body)?;
    let result = CrudService::handle(
        &state.pool,
        &state.catalog,
        Verb::Create,
        &table,
        &HashMap::new(),
        body.as_ref(),
    )
    .await?;
    Ok(response::created(result))
}

pub async fn update(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(filters): Query<HashMap<String, String>>,
    raw_body: String,
) -> Result<impl IntoResponse, AppError> {
    let body = parse_body(&raw_body)?;
    let result = CrudService::handle(
        &state.pool,
        &state.catalog,
        Verb::Update,
        &table,
        &filters,
        body.as_ref(),
    )
    .await?;
    Ok(response::success(result))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(filters): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let result =
        CrudService::handle(&state.pool, &state.catalog, Verb::Delete, &table, &filters, None)
            .await?;
    Ok(response::success(result))
}

/// Fallback for verbs outside {GET, POST, PATCH, DELETE}.
pub async fn method_not_supported(method: axum::http::Method) -> AppError {
    AppError::method_not_supported(method.as_str())
}
