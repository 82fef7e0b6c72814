//! Request validation against the discovered schema.
//!
//! `check_value` enforces per-family coercion rules for a single column;
//! `RequestValidator` runs the per-verb check sequences. Every check fails
//! fast with a taxonomy-coded error and never touches the database beyond
//! the already-fetched `TableSchema`.

use crate::catalog::{ColumnMeta, TableSchema, TypeFamily};
use crate::error::AppError;
use serde_json::{Map, Value};
use std::collections::HashMap;

fn family_label(family: TypeFamily) -> &'static str {
    match family {
        TypeFamily::Integer => "integer",
        TypeFamily::Float => "floating-point",
        TypeFamily::Text => "text",
        TypeFamily::Boolean => "boolean",
        TypeFamily::DateTime => "datetime",
        TypeFamily::Uuid => "uuid",
        TypeFamily::Json => "json",
        TypeFamily::Unknown => "unknown",
    }
}

/// Check one value against a column's type family. Null always passes here;
/// nullability is enforced by the per-verb pipelines. Parse failures from
/// chrono/uuid surface as `InvalidFormat`, never as their own error types.
pub fn check_value(column: &str, meta: &ColumnMeta, value: &Value) -> Result<(), AppError> {
    if value.is_null() {
        return Ok(());
    }
    let ok = match meta.family {
        TypeFamily::Integer => match value {
            Value::Number(n) => {
                n.as_i64().is_some()
                    || n.as_u64().is_some()
                    || n.as_f64().map(|f| f.fract() == 0.0).unwrap_or(false)
            }
            Value::String(s) => s.parse::<i64>().is_ok(),
            _ => false,
        },
        TypeFamily::Float => match value {
            Value::Number(_) => true,
            Value::String(s) => s.parse::<f64>().is_ok(),
            _ => false,
        },
        // Text accepts scalars; stringification is the backend's job.
        TypeFamily::Text => matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_)),
        TypeFamily::Boolean => match value {
            Value::Bool(_) => true,
            Value::String(s) => {
                matches!(s.to_lowercase().as_str(), "true" | "false" | "1" | "0")
            }
            Value::Number(n) => matches!(n.as_i64(), Some(0) | Some(1)),
            _ => false,
        },
        TypeFamily::DateTime => match value {
            Value::String(s) => parse_datetime(&meta.type_name, s),
            // Epoch-like numbers pass without further parsing.
            Value::Number(_) => true,
            _ => false,
        },
        TypeFamily::Uuid => match value {
            Value::String(s) => uuid::Uuid::parse_str(s).is_ok(),
            _ => false,
        },
        // Already-parsed JSON is a valid JSON value by construction.
        TypeFamily::Json => true,
        TypeFamily::Unknown => true,
    };
    if ok {
        Ok(())
    } else {
        Err(AppError::invalid_format(
            column,
            &format!("{} type incompatible with value", family_label(meta.family)),
        ))
    }
}

/// Date-ish names want a calendar date, time-ish names a local date-time.
/// "date" is checked first so "datetime" lands on the date rule.
fn parse_datetime(type_name: &str, value: &str) -> bool {
    if type_name.contains("date") {
        chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
    } else if type_name.contains("time") {
        chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
    } else {
        true
    }
}

/// Per-verb validation pipelines. Checks run in a fixed order and stop at
/// the first violation.
pub struct RequestValidator;

impl RequestValidator {
    /// Create: body present, no unknown columns, all required columns
    /// present, no nulls in non-nullable columns, values type-check.
    /// Primary-key and timestamp keys in the body are skipped, not rejected.
    pub fn validate_create(
        table: &str,
        schema: &TableSchema,
        primary_key: Option<&str>,
        body: Option<&Map<String, Value>>,
    ) -> Result<(), AppError> {
        let body = body.ok_or_else(AppError::missing_body)?;
        let ts = schema.timestamp_column.as_deref();

        Self::ensure_known(table, schema, body.keys())?;

        let mut missing: Vec<String> = Vec::new();
        for (name, meta) in &schema.columns {
            if !meta.nullable
                && Some(name.as_str()) != primary_key
                && Some(name.as_str()) != ts
                && !body.contains_key(name.as_str())
            {
                missing.push(name.clone());
            }
        }
        if !missing.is_empty() {
            missing.sort();
            return Err(AppError::missing_required(&missing));
        }

        for (key, value) in body {
            if Some(key.as_str()) == primary_key || Some(key.as_str()) == ts {
                continue;
            }
            let Some(meta) = schema.column(key) else { continue };
            if !meta.nullable && value.is_null() {
                return Err(AppError::not_null(key));
            }
        }

        for (key, value) in body {
            if Some(key.as_str()) == primary_key || Some(key.as_str()) == ts {
                continue;
            }
            if let Some(meta) = schema.column(key) {
                check_value(key, meta, value)?;
            }
        }
        Ok(())
    }

    /// Read: an unfiltered scan is allowed, but present filter keys must be
    /// real columns. Unknown filters are rejected, never dropped.
    pub fn validate_read(
        table: &str,
        schema: &TableSchema,
        filters: &HashMap<String, String>,
    ) -> Result<(), AppError> {
        Self::ensure_known(table, schema, filters.keys())
    }

    /// Update: body and filters present, all keys known, no nulls into
    /// non-nullable columns, values type-check.
    pub fn validate_update(
        table: &str,
        schema: &TableSchema,
        primary_key: Option<&str>,
        body: Option<&Map<String, Value>>,
        filters: &HashMap<String, String>,
    ) -> Result<(), AppError> {
        let body = body.ok_or_else(AppError::missing_body)?;
        if filters.is_empty() {
            return Err(AppError::missing_filter());
        }
        let ts = schema.timestamp_column.as_deref();

        Self::ensure_known(table, schema, body.keys())?;
        Self::ensure_known(table, schema, filters.keys())?;

        for (key, value) in body {
            if let Some(meta) = schema.column(key) {
                if !meta.nullable && value.is_null() {
                    return Err(AppError::not_null(key));
                }
            }
        }

        for (key, value) in body {
            if Some(key.as_str()) == primary_key || Some(key.as_str()) == ts {
                continue;
            }
            if let Some(meta) = schema.column(key) {
                check_value(key, meta, value)?;
            }
        }
        Ok(())
    }

    /// Delete: filters present and known. Unfiltered deletes are refused.
    pub fn validate_delete(
        table: &str,
        schema: &TableSchema,
        filters: &HashMap<String, String>,
    ) -> Result<(), AppError> {
        if filters.is_empty() {
            return Err(AppError::missing_filter());
        }
        Self::ensure_known(table, schema, filters.keys())
    }

    fn ensure_known<'a>(
        table: &str,
        schema: &TableSchema,
        keys: impl Iterator<Item = &'a String>,
    ) -> Result<(), AppError> {
        for key in keys {
            if !schema.contains(key) {
                return Err(AppError::unknown_column(key, table));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnMeta;
    use crate::error::ErrorCode;
    use serde_json::json;

    fn users_schema() -> TableSchema {
        let mut columns = HashMap::new();
        columns.insert("id".to_string(), ColumnMeta::new("uuid", false));
        columns.insert("name".to_string(), ColumnMeta::new("varchar", false));
        columns.insert("age".to_string(), ColumnMeta::new("integer", true));
        TableSchema::from_columns(columns)
    }

    fn body(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    fn code_of(err: AppError) -> (ErrorCode, String) {
        match err {
            AppError::Validation { code, name, .. } => (code, name),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn create_with_required_fields_passes() {
        let schema = users_schema();
        let b = body(json!({"name": "Ann"}));
        assert!(RequestValidator::validate_create("users", &schema, Some("id"), Some(&b)).is_ok());
    }

    #[test]
    fn create_missing_required_names_the_column() {
        let schema = users_schema();
        let b = body(json!({"age": 5}));
        let err = RequestValidator::validate_create("users", &schema, Some("id"), Some(&b)).unwrap_err();
        let (code, name) = code_of(err);
        assert_eq!(code, ErrorCode::MissingRequiredField);
        assert!(name.contains("name"));
    }

    #[test]
    fn create_without_body_is_missing_body() {
        let schema = users_schema();
        let err = RequestValidator::validate_create("users", &schema, Some("id"), None).unwrap_err();
        assert_eq!(code_of(err).0, ErrorCode::MissingBody);
    }

    #[test]
    fn create_unknown_column_is_rejected() {
        let schema = users_schema();
        let b = body(json!({"name": "Ann", "nickname": "A"}));
        let err = RequestValidator::validate_create("users", &schema, Some("id"), Some(&b)).unwrap_err();
        let (code, name) = code_of(err);
        assert_eq!(code, ErrorCode::UnknownColumn);
        assert_eq!(name, "nickname");
    }

    #[test]
    fn create_null_in_required_column_is_not_null() {
        let schema = users_schema();
        let b = body(json!({"name": null}));
        let err = RequestValidator::validate_create("users", &schema, Some("id"), Some(&b)).unwrap_err();
        let (code, name) = code_of(err);
        assert_eq!(code, ErrorCode::NotNull);
        assert_eq!(name, "name");
    }

    #[test]
    fn create_skips_client_supplied_primary_key() {
        let schema = users_schema();
        // "not-a-uuid" would fail the uuid family check if it were validated.
        let b = body(json!({"id": "not-a-uuid", "name": "Ann"}));
        assert!(RequestValidator::validate_create("users", &schema, Some("id"), Some(&b)).is_ok());
    }

    #[test]
    fn read_allows_empty_filters() {
        let schema = users_schema();
        assert!(RequestValidator::validate_read("users", &schema, &HashMap::new()).is_ok());
    }

    #[test]
    fn read_rejects_unknown_filter() {
        let schema = users_schema();
        let filters = HashMap::from([("nickname".to_string(), "x".to_string())]);
        let err = RequestValidator::validate_read("users", &schema, &filters).unwrap_err();
        let (code, name) = code_of(err);
        assert_eq!(code, ErrorCode::UnknownColumn);
        assert_eq!(name, "nickname");
    }

    #[test]
    fn update_null_into_non_nullable_is_not_null() {
        let schema = users_schema();
        let filters = HashMap::from([(
            "id".to_string(),
            "7c9e6679-7425-40de-944b-e07fc1f90ae7".to_string(),
        )]);
        let b = body(json!({"name": null}));
        let err =
            RequestValidator::validate_update("users", &schema, Some("id"), Some(&b), &filters)
                .unwrap_err();
        let (code, name) = code_of(err);
        assert_eq!(code, ErrorCode::NotNull);
        assert_eq!(name, "name");
    }

    #[test]
    fn update_null_into_nullable_passes() {
        let schema = users_schema();
        let filters = HashMap::from([(
            "id".to_string(),
            "7c9e6679-7425-40de-944b-e07fc1f90ae7".to_string(),
        )]);
        let b = body(json!({"age": null}));
        assert!(
            RequestValidator::validate_update("users", &schema, Some("id"), Some(&b), &filters)
                .is_ok()
        );
    }

    #[test]
    fn update_without_filters_is_missing_filter() {
        let schema = users_schema();
        let b = body(json!({"name": "Bea"}));
        let err = RequestValidator::validate_update("users", &schema, Some("id"), Some(&b), &HashMap::new())
            .unwrap_err();
        assert_eq!(code_of(err).0, ErrorCode::MissingFilter);
    }

    #[test]
    fn delete_without_filters_is_missing_filter() {
        let schema = users_schema();
        let err = RequestValidator::validate_delete("users", &schema, &HashMap::new()).unwrap_err();
        assert_eq!(code_of(err).0, ErrorCode::MissingFilter);
    }

    #[test]
    fn delete_rejects_unknown_filter() {
        let schema = users_schema();
        let filters = HashMap::from([("ghost".to_string(), "1".to_string())]);
        let err = RequestValidator::validate_delete("users", &schema, &filters).unwrap_err();
        assert_eq!(code_of(err).0, ErrorCode::UnknownColumn);
    }

    // Type family rules.

    fn meta(type_name: &str) -> ColumnMeta {
        ColumnMeta::new(type_name, true)
    }

    #[test]
    fn integer_rejects_fractional_and_bad_strings() {
        let m = meta("integer");
        assert!(check_value("age", &m, &json!(5)).is_ok());
        assert!(check_value("age", &m, &json!("42")).is_ok());
        assert!(check_value("age", &m, &json!(5.5)).is_err());
        assert!(check_value("age", &m, &json!("5.5")).is_err());
        assert!(check_value("age", &m, &json!(true)).is_err());
    }

    #[test]
    fn float_accepts_numbers_and_decimal_strings() {
        let m = meta("numeric");
        assert!(check_value("price", &m, &json!(5)).is_ok());
        assert!(check_value("price", &m, &json!(5.25)).is_ok());
        assert!(check_value("price", &m, &json!("5.25")).is_ok());
        assert!(check_value("price", &m, &json!("abc")).is_err());
    }

    #[test]
    fn text_accepts_scalars_only() {
        let m = meta("varchar");
        assert!(check_value("name", &m, &json!("Ann")).is_ok());
        assert!(check_value("name", &m, &json!(7)).is_ok());
        assert!(check_value("name", &m, &json!(false)).is_ok());
        assert!(check_value("name", &m, &json!({"a": 1})).is_err());
        assert!(check_value("name", &m, &json!([1])).is_err());
    }

    #[test]
    fn boolean_accepts_flag_spellings() {
        let m = meta("boolean");
        assert!(check_value("active", &m, &json!(true)).is_ok());
        assert!(check_value("active", &m, &json!("TRUE")).is_ok());
        assert!(check_value("active", &m, &json!("0")).is_ok());
        assert!(check_value("active", &m, &json!(1)).is_ok());
        assert!(check_value("active", &m, &json!(2)).is_err());
        assert!(check_value("active", &m, &json!("yes")).is_err());
    }

    #[test]
    fn date_wants_calendar_dates() {
        let m = meta("date");
        assert!(check_value("born_on", &m, &json!("2024-02-29")).is_ok());
        assert!(check_value("born_on", &m, &json!("2024-13-01")).is_err());
        assert!(check_value("born_on", &m, &json!("yesterday")).is_err());
    }

    #[test]
    fn timestamp_wants_iso_datetimes_or_numbers() {
        let m = meta("timestamp");
        assert!(check_value("seen_at", &m, &json!("2024-06-01T12:30:00")).is_ok());
        assert!(check_value("seen_at", &m, &json!("2024-06-01T12:30:00.123")).is_ok());
        assert!(check_value("seen_at", &m, &json!(1717245000000i64)).is_ok());
        assert!(check_value("seen_at", &m, &json!("2024-06-01 12:30")).is_err());
    }

    #[test]
    fn uuid_wants_canonical_literals() {
        let m = meta("uuid");
        assert!(check_value("ref", &m, &json!("7c9e6679-7425-40de-944b-e07fc1f90ae7")).is_ok());
        assert!(check_value("ref", &m, &json!("banana")).is_err());
        assert!(check_value("ref", &m, &json!(42)).is_err());
    }

    #[test]
    fn json_and_unknown_pass_through() {
        assert!(check_value("blob", &meta("jsonb"), &json!({"a": [1, 2]})).is_ok());
        assert!(check_value("vec", &meta("tsvector"), &json!("anything")).is_ok());
    }

    #[test]
    fn null_always_passes_the_type_check() {
        assert!(check_value("age", &meta("integer"), &Value::Null).is_ok());
        assert!(check_value("ref", &meta("uuid"), &Value::Null).is_ok());
    }
}
