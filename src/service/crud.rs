//! Generic CRUD execution against PostgreSQL.
//!
//! `CrudService` sequences one request: schema lookup (cached) → validation
//! pipeline → statement construction → execution → result shaping. Driver
//! failures are classified here, once; nothing below sqlx escapes unwrapped.

use crate::catalog::SchemaCatalog;
use crate::error::AppError;
use crate::sql::{self, QueryBuf};
use crate::validate::RequestValidator;
use serde_json::{json, Map, Value};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

/// The four operations a table resource supports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    Create,
    Read,
    Update,
    Delete,
}

pub struct CrudService;

impl CrudService {
    /// Dispatch one request. Table existence is established by the schema
    /// lookup inside each verb; a table that disappears between lookup and
    /// execution surfaces as a generic QueryFailed.
    pub async fn handle(
        pool: &PgPool,
        catalog: &SchemaCatalog,
        verb: Verb,
        table: &str,
        filters: &HashMap<String, String>,
        body: Option<&Map<String, Value>>,
    ) -> Result<Value, AppError> {
        match verb {
            Verb::Create => Self::create(pool, catalog, table, body).await,
            Verb::Read => Self::read(pool, catalog, table, filters).await,
            Verb::Update => Self::update(pool, catalog, table, filters, body).await,
            Verb::Delete => Self::delete(pool, catalog, table, filters).await,
        }
    }

    /// Insert one row with a freshly generated UUID primary key. The client
    /// never chooses the id, even if it sent one under the pk column name.
    pub async fn create(
        pool: &PgPool,
        catalog: &SchemaCatalog,
        table: &str,
        body: Option<&Map<String, Value>>,
    ) -> Result<Value, AppError> {
        tracing::info!(%table, "create");
        let schema = catalog.table_schema(pool, table).await?;
        let pk = catalog
            .primary_key(pool, table)
            .await?
            .ok_or_else(|| AppError::no_primary_key(table))?;
        RequestValidator::validate_create(table, &schema, Some(&pk), body)?;
        let body = body.ok_or_else(AppError::missing_body)?;

        let new_id = Uuid::new_v4();
        let q = sql::insert(table, &schema, &pk, new_id, body);
        let affected = Self::execute(pool, "INSERT", &q).await?;
        if affected == 0 {
            return Err(AppError::statement_failed("INSERT", "no rows were inserted"));
        }
        Ok(created_payload(new_id, table))
    }

    /// Fetch rows matching the filter set; an empty filter set scans the table.
    pub async fn read(
        pool: &PgPool,
        catalog: &SchemaCatalog,
        table: &str,
        filters: &HashMap<String, String>,
    ) -> Result<Value, AppError> {
        tracing::info!(%table, "read");
        let schema = catalog.table_schema(pool, table).await?;
        RequestValidator::validate_read(table, &schema, filters)?;
        let q = sql::select(table, &schema, filters)?;

        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        let rows = query
            .fetch_all(pool)
            .await
            .map_err(|e| AppError::query_failed("SELECT", e))?;
        Ok(Value::Array(rows.iter().map(row_to_json).collect()))
    }

    /// Update rows matching the filter set from the mutation set.
    pub async fn update(
        pool: &PgPool,
        catalog: &SchemaCatalog,
        table: &str,
        filters: &HashMap<String, String>,
        body: Option<&Map<String, Value>>,
    ) -> Result<Value, AppError> {
        tracing::info!(%table, "update");
        let schema = catalog.table_schema(pool, table).await?;
        let pk = catalog.primary_key(pool, table).await?;
        RequestValidator::validate_update(table, &schema, pk.as_deref(), body, filters)?;
        let body = body.ok_or_else(AppError::missing_body)?;

        let q = sql::update(table, &schema, pk.as_deref(), body, filters)?;
        let affected = Self::execute(pool, "UPDATE", &q).await?;
        Ok(affected_payload(affected, table))
    }

    /// Delete rows matching the filter set. Unfiltered deletes are rejected
    /// before this point by the validation pipeline.
    pub async fn delete(
        pool: &PgPool,
        catalog: &SchemaCatalog,
        table: &str,
        filters: &HashMap<String, String>,
    ) -> Result<Value, AppError> {
        tracing::info!(%table, "delete");
        let schema = catalog.table_schema(pool, table).await?;
        RequestValidator::validate_delete(table, &schema, filters)?;
        let q = sql::delete_from(table, &schema, filters)?;
        let affected = Self::execute(pool, "DELETE", &q).await?;
        Ok(affected_payload(affected, table))
    }

    async fn execute(pool: &PgPool, statement: &str, q: &QueryBuf) -> Result<u64, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        let done = query
            .execute(pool)
            .await
            .map_err(|e| AppError::query_failed(statement, e))?;
        Ok(done.rows_affected())
    }
}

fn created_payload(id: Uuid, table: &str) -> Value {
    json!({
        "id": id.to_string(),
        "status": "created",
        "table": table,
    })
}

fn affected_payload(rows_affected: u64, table: &str) -> Value {
    json!({
        "rowsAffected": rows_affected,
        "table": table,
    })
}

fn row_to_json(row: &sqlx::postgres::PgRow) -> Value {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    Value::Object(map)
}

/// Decode one cell without knowing its type statically. Probes the narrow
/// types first so integers stay integers; json/jsonb decodes back into
/// structured JSON so stored documents round-trip.
fn cell_to_value(row: &sqlx::postgres::PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<serde_json::Value>, _>(name) {
        return j;
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_payload_shape() {
        let id = Uuid::new_v4();
        let v = created_payload(id, "users");
        assert_eq!(v["id"], json!(id.to_string()));
        assert_eq!(v["status"], json!("created"));
        assert_eq!(v["table"], json!("users"));
    }

    #[test]
    fn affected_payload_shape() {
        let v = affected_payload(3, "users");
        assert_eq!(v["rowsAffected"], json!(3));
        assert_eq!(v["table"], json!("users"));
    }
}
