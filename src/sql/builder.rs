//! Builds parameterized INSERT, SELECT, UPDATE, DELETE from the discovered
//! schema. Identifiers are quoted and only ever come from the schema or from
//! a table name the catalog has already resolved; values are always bound.

use crate::catalog::{TableSchema, TypeFamily};
use crate::error::AppError;
use crate::sql::params::BindValue;
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<BindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: BindValue) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

/// Quote identifier for PostgreSQL.
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// json columns carry an explicit cast so text-bound values land as jsonb;
/// everything else gets a plain placeholder.
fn placeholder(n: usize, family: TypeFamily) -> String {
    if family == TypeFamily::Json {
        format!("${}::jsonb", n)
    } else {
        format!("${}", n)
    }
}

/// INSERT: the generated primary-key value always comes first and never from
/// the client; body keys that are the primary key or timestamp column are
/// skipped; the timestamp column (if any) is bound to NOW(), not a parameter.
pub fn insert(
    table: &str,
    schema: &TableSchema,
    pk_column: &str,
    new_id: Uuid,
    body: &Map<String, Value>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ts = schema.timestamp_column.as_deref();

    let n = q.push_param(BindValue::Uuid(new_id));
    let mut cols = vec![quoted(pk_column)];
    let mut values = vec![format!("${}", n)];

    for (key, value) in body {
        if key == pk_column || Some(key.as_str()) == ts {
            continue;
        }
        let Some(meta) = schema.column(key) else { continue };
        let n = q.push_param(BindValue::from_body_value(value));
        cols.push(quoted(key));
        values.push(placeholder(n, meta.family));
    }

    if let Some(ts_col) = ts {
        cols.push(quoted(ts_col));
        values.push("NOW()".to_string());
    }

    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quoted(table),
        cols.join(", "),
        values.join(", ")
    );
    q
}

/// SELECT with an optional WHERE from the filter set. Always all columns.
pub fn select(
    table: &str,
    schema: &TableSchema,
    filters: &HashMap<String, String>,
) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let where_parts = where_clause(&mut q, table, schema, filters)?;
    q.sql = format!("SELECT * FROM {}", quoted(table));
    if !where_parts.is_empty() {
        q.sql.push_str(" WHERE ");
        q.sql.push_str(&where_parts.join(" AND "));
    }
    Ok(q)
}

/// UPDATE: SET from the body (same skip and cast rules as insert, timestamp
/// column forced to NOW()), WHERE from the filter set. Fails when the client
/// supplied no updatable column or no usable filter.
pub fn update(
    table: &str,
    schema: &TableSchema,
    pk_column: Option<&str>,
    body: &Map<String, Value>,
    filters: &HashMap<String, String>,
) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let ts = schema.timestamp_column.as_deref();

    let mut sets = Vec::new();
    for (key, value) in body {
        if Some(key.as_str()) == pk_column || Some(key.as_str()) == ts {
            continue;
        }
        let Some(meta) = schema.column(key) else { continue };
        let n = q.push_param(BindValue::from_body_value(value));
        sets.push(format!("{} = {}", quoted(key), placeholder(n, meta.family)));
    }
    // The NOW() refresh alone does not make a body updatable.
    if sets.is_empty() {
        return Err(AppError::no_valid_columns());
    }
    if let Some(ts_col) = ts {
        sets.push(format!("{} = NOW()", quoted(ts_col)));
    }

    let where_parts = where_clause(&mut q, table, schema, filters)?;
    if where_parts.is_empty() {
        return Err(AppError::no_valid_filters());
    }

    q.sql = format!(
        "UPDATE {} SET {} WHERE {}",
        quoted(table),
        sets.join(", "),
        where_parts.join(" AND ")
    );
    Ok(q)
}

/// DELETE with a WHERE from the filter set; unfiltered deletes never build.
pub fn delete_from(
    table: &str,
    schema: &TableSchema,
    filters: &HashMap<String, String>,
) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let where_parts = where_clause(&mut q, table, schema, filters)?;
    if where_parts.is_empty() {
        return Err(AppError::no_valid_filters());
    }
    q.sql = format!(
        "DELETE FROM {} WHERE {}",
        quoted(table),
        where_parts.join(" AND ")
    );
    Ok(q)
}

/// Shared WHERE rule: a filter key outside the schema fails the whole build;
/// filters are never silently dropped. Values try UUID first, then raw text.
fn where_clause(
    q: &mut QueryBuf,
    table: &str,
    schema: &TableSchema,
    filters: &HashMap<String, String>,
) -> Result<Vec<String>, AppError> {
    let mut parts = Vec::new();
    for (column, raw) in filters {
        if !schema.contains(column) {
            return Err(AppError::unknown_column(column, table));
        }
        let n = q.push_param(BindValue::from_filter(raw));
        parts.push(format!("{} = ${}", quoted(column), n));
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnMeta;
    use crate::error::ErrorCode;
    use serde_json::json;

    fn articles_schema() -> TableSchema {
        let mut columns = HashMap::new();
        columns.insert("id".to_string(), ColumnMeta::new("uuid", false));
        columns.insert("title".to_string(), ColumnMeta::new("varchar", false));
        columns.insert("tags".to_string(), ColumnMeta::new("jsonb", true));
        columns.insert("updated_at".to_string(), ColumnMeta::new("timestamptz", false));
        TableSchema::from_columns(columns)
    }

    fn body(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    fn validation_code(err: AppError) -> ErrorCode {
        match err {
            AppError::Validation { code, .. } => code,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn insert_puts_generated_pk_first_and_now_last() {
        let schema = articles_schema();
        let id = Uuid::new_v4();
        let b = body(json!({"title": "hello", "tags": {"a": 1}}));
        let q = insert("articles", &schema, "id", id, &b);
        assert_eq!(
            q.sql,
            "INSERT INTO \"articles\" (\"id\", \"tags\", \"title\", \"updated_at\") \
             VALUES ($1, $2::jsonb, $3, NOW())"
        );
        assert_eq!(q.params[0], BindValue::Uuid(id));
        assert_eq!(q.params.len(), 3);
    }

    #[test]
    fn insert_ignores_client_pk_and_timestamp_values() {
        let schema = articles_schema();
        let id = Uuid::new_v4();
        let b = body(json!({
            "id": "11111111-1111-1111-1111-111111111111",
            "updated_at": "2020-01-01T00:00:00",
            "title": "hello"
        }));
        let q = insert("articles", &schema, "id", id, &b);
        // One param for the generated id, one for title; nothing client-supplied
        // for id/updated_at.
        assert_eq!(q.params.len(), 2);
        assert_eq!(q.params[0], BindValue::Uuid(id));
        assert_eq!(q.params[1], BindValue::Text("hello".into()));
    }

    #[test]
    fn select_without_filters_is_a_bare_scan() {
        let schema = articles_schema();
        let q = select("articles", &schema, &HashMap::new()).unwrap();
        assert_eq!(q.sql, "SELECT * FROM \"articles\"");
        assert!(q.params.is_empty());
    }

    #[test]
    fn select_filter_binds_uuid_when_it_parses() {
        let schema = articles_schema();
        let raw = "7c9e6679-7425-40de-944b-e07fc1f90ae7";
        let filters = HashMap::from([("id".to_string(), raw.to_string())]);
        let q = select("articles", &schema, &filters).unwrap();
        assert_eq!(q.sql, "SELECT * FROM \"articles\" WHERE \"id\" = $1");
        assert_eq!(q.params[0], BindValue::Uuid(Uuid::parse_str(raw).unwrap()));
    }

    #[test]
    fn select_filter_falls_back_to_raw_text() {
        let schema = articles_schema();
        let filters = HashMap::from([("title".to_string(), "hello".to_string())]);
        let q = select("articles", &schema, &filters).unwrap();
        assert_eq!(q.params[0], BindValue::Text("hello".into()));
    }

    #[test]
    fn unknown_filter_fails_the_whole_build() {
        let schema = articles_schema();
        let filters = HashMap::from([("nickname".to_string(), "x".to_string())]);
        let err = select("articles", &schema, &filters).unwrap_err();
        assert_eq!(validation_code(err), ErrorCode::UnknownColumn);
    }

    #[test]
    fn update_forces_timestamp_refresh_and_orders_params() {
        let schema = articles_schema();
        let filters = HashMap::from([("title".to_string(), "old".to_string())]);
        let b = body(json!({"title": "new"}));
        let q = update("articles", &schema, Some("id"), &b, &filters).unwrap();
        assert_eq!(
            q.sql,
            "UPDATE \"articles\" SET \"title\" = $1, \"updated_at\" = NOW() \
             WHERE \"title\" = $2"
        );
        assert_eq!(q.params[0], BindValue::Text("new".into()));
        assert_eq!(q.params[1], BindValue::Text("old".into()));
    }

    #[test]
    fn update_with_only_skipped_columns_is_no_valid_columns() {
        let schema = articles_schema();
        let filters = HashMap::from([("title".to_string(), "x".to_string())]);
        let b = body(json!({
            "id": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
            "updated_at": "2020-01-01T00:00:00"
        }));
        let err = update("articles", &schema, Some("id"), &b, &filters).unwrap_err();
        assert_eq!(validation_code(err), ErrorCode::NoValidColumns);
    }

    #[test]
    fn update_without_filters_is_no_valid_filters() {
        let schema = articles_schema();
        let b = body(json!({"title": "new"}));
        let err = update("articles", &schema, Some("id"), &b, &HashMap::new()).unwrap_err();
        assert_eq!(validation_code(err), ErrorCode::NoValidFilters);
    }

    #[test]
    fn update_binds_null_for_json_null() {
        let schema = articles_schema();
        let filters = HashMap::from([("title".to_string(), "x".to_string())]);
        let b = body(json!({"tags": null}));
        let q = update("articles", &schema, Some("id"), &b, &filters).unwrap();
        assert_eq!(q.params[0], BindValue::Null);
    }

    #[test]
    fn delete_requires_filters() {
        let schema = articles_schema();
        let err = delete_from("articles", &schema, &HashMap::new()).unwrap_err();
        assert_eq!(validation_code(err), ErrorCode::NoValidFilters);

        let filters = HashMap::from([("title".to_string(), "x".to_string())]);
        let q = delete_from("articles", &schema, &filters).unwrap();
        assert_eq!(q.sql, "DELETE FROM \"articles\" WHERE \"title\" = $1");
    }

    #[test]
    fn identifiers_are_quote_escaped() {
        assert_eq!(quoted("weird\"name"), "\"weird\"\"name\"");
    }
}
