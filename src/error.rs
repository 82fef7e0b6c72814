//! Typed errors: the stable error-code taxonomy and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Stable error codes surfaced to clients, one per failure kind.
/// The wire form (`as_str`) is part of the API contract and never changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    // Validation (400)
    NotNull,
    InvalidFormat,
    MissingRequiredField,
    MissingBody,
    MissingFilter,
    NoValidColumns,
    NoValidFilters,
    UnknownColumn,
    MethodNotSupported,
    // Database (404 / 500 / 504)
    TableNotFound,
    ConnectionFailed,
    QueryFailed,
    NoPrimaryKey,
    DatabaseError,
    GatewayTimeout,
    // Configuration (500)
    DbConfigMissing,
    // Catch-all (500)
    InternalError,
    // Readiness (503)
    ServiceUnavailable,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NotNull => "NotNull",
            ErrorCode::InvalidFormat => "InvalidFormat",
            ErrorCode::MissingRequiredField => "MissingRequiredField",
            ErrorCode::MissingBody => "MissingBody",
            ErrorCode::MissingFilter => "MissingFilter",
            ErrorCode::NoValidColumns => "NoValidColumns",
            ErrorCode::NoValidFilters => "NoValidFilters",
            ErrorCode::UnknownColumn => "UnknownColumn",
            ErrorCode::MethodNotSupported => "MethodNotSupported",
            ErrorCode::TableNotFound => "TableNotFound",
            ErrorCode::ConnectionFailed => "ConnectionFailed",
            ErrorCode::QueryFailed => "QueryFailed",
            ErrorCode::NoPrimaryKey => "NoPrimaryKey",
            ErrorCode::DatabaseError => "DatabaseError",
            ErrorCode::GatewayTimeout => "GatewayTimeout",
            ErrorCode::DbConfigMissing => "DbConfigMissing",
            ErrorCode::InternalError => "InternalError",
            ErrorCode::ServiceUnavailable => "ServiceUnavailable",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ErrorCode::NotNull => "field must not be null",
            ErrorCode::InvalidFormat => "invalid value format",
            ErrorCode::MissingRequiredField => "required field is missing",
            ErrorCode::MissingBody => "request body must not be empty",
            ErrorCode::MissingFilter => "filter condition is required",
            ErrorCode::NoValidColumns => "no valid columns provided",
            ErrorCode::NoValidFilters => "no valid filter conditions provided",
            ErrorCode::UnknownColumn => "unknown column",
            ErrorCode::MethodNotSupported => "HTTP method not supported",
            ErrorCode::TableNotFound => "table does not exist",
            ErrorCode::ConnectionFailed => "database connection failed",
            ErrorCode::QueryFailed => "SQL statement execution failed",
            ErrorCode::NoPrimaryKey => "table has no primary key",
            ErrorCode::DatabaseError => "database operation failed",
            ErrorCode::GatewayTimeout => "database call timed out",
            ErrorCode::DbConfigMissing => "database connection settings are missing",
            ErrorCode::InternalError => "internal error",
            ErrorCode::ServiceUnavailable => "service unavailable",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every failure crossing the handler boundary. `name` identifies the
/// offending column/field/resource, or "-" when not applicable.
#[derive(Error, Debug)]
pub enum AppError {
    /// Client-caused: bad body, filters, or field values. Always 400.
    #[error("{code}: {detail}")]
    Validation {
        code: ErrorCode,
        name: String,
        detail: String,
    },
    /// Backend-caused: introspection, connection, or statement failure.
    #[error("{code}: {detail}")]
    Database {
        code: ErrorCode,
        name: String,
        detail: String,
        timeout: bool,
        #[source]
        source: Option<sqlx::Error>,
    },
    /// Environment configuration is incomplete (DbConfigMissing).
    #[error("DbConfigMissing: {detail}")]
    Config { detail: String },
    /// Anything unclassified. Detail is never sent to the client.
    #[error("internal error")]
    Internal,
}

impl AppError {
    pub fn not_null(field: &str) -> Self {
        AppError::Validation {
            code: ErrorCode::NotNull,
            name: field.to_string(),
            detail: format!("field '{}' must not be null", field),
        }
    }

    pub fn invalid_format(field: &str, expected: &str) -> Self {
        AppError::Validation {
            code: ErrorCode::InvalidFormat,
            name: field.to_string(),
            detail: format!("field '{}' has an invalid format: {}", field, expected),
        }
    }

    pub fn missing_required(fields: &[String]) -> Self {
        let joined = fields.join(", ");
        AppError::Validation {
            code: ErrorCode::MissingRequiredField,
            name: joined.clone(),
            detail: format!("missing required fields: {}", joined),
        }
    }

    pub fn missing_body() -> Self {
        AppError::Validation {
            code: ErrorCode::MissingBody,
            name: "request_body".into(),
            detail: "request body must not be empty".into(),
        }
    }

    pub fn missing_filter() -> Self {
        AppError::Validation {
            code: ErrorCode::MissingFilter,
            name: "query_parameters".into(),
            detail: "query parameters are required for filtering".into(),
        }
    }

    pub fn no_valid_columns() -> Self {
        AppError::Validation {
            code: ErrorCode::NoValidColumns,
            name: "request_body".into(),
            detail: "request body contains no updatable columns".into(),
        }
    }

    pub fn no_valid_filters() -> Self {
        AppError::Validation {
            code: ErrorCode::NoValidFilters,
            name: "query_parameters".into(),
            detail: "no valid filter conditions provided".into(),
        }
    }

    pub fn unknown_column(column: &str, table: &str) -> Self {
        AppError::Validation {
            code: ErrorCode::UnknownColumn,
            name: column.to_string(),
            detail: format!("column '{}' does not exist in table '{}'", column, table),
        }
    }

    pub fn method_not_supported(method: &str) -> Self {
        AppError::Validation {
            code: ErrorCode::MethodNotSupported,
            name: method.to_string(),
            detail: format!("HTTP method '{}' is not supported for this resource", method),
        }
    }

    pub fn table_not_found(table: &str) -> Self {
        AppError::Database {
            code: ErrorCode::TableNotFound,
            name: table.to_string(),
            detail: format!("table '{}' does not exist", table),
            timeout: false,
            source: None,
        }
    }

    pub fn no_primary_key(table: &str) -> Self {
        AppError::Database {
            code: ErrorCode::NoPrimaryKey,
            name: table.to_string(),
            detail: format!("table '{}' has no primary key defined", table),
            timeout: false,
            source: None,
        }
    }

    pub fn connection_failed(err: sqlx::Error) -> Self {
        let timeout = is_timeout_error(&err);
        AppError::Database {
            code: ErrorCode::ConnectionFailed,
            name: "database_connection".into(),
            detail: format!("database connection failed: {}", err),
            timeout,
            source: Some(err),
        }
    }

    /// Classify a driver failure from statement execution or catalog
    /// introspection. `statement` names the statement kind (SELECT, INSERT, ...).
    pub fn query_failed(statement: &str, err: sqlx::Error) -> Self {
        let timeout = is_timeout_error(&err);
        AppError::Database {
            code: ErrorCode::QueryFailed,
            name: "sql_query".into(),
            detail: format!("{} statement failed: {}", statement, err),
            timeout,
            source: Some(err),
        }
    }

    /// Statement-level failure with no underlying driver error (e.g. an
    /// insert that affected zero rows).
    pub fn statement_failed(statement: &str, detail: &str) -> Self {
        AppError::Database {
            code: ErrorCode::QueryFailed,
            name: "sql_query".into(),
            detail: format!("{} statement failed: {}", statement, detail),
            timeout: false,
            source: None,
        }
    }

    pub fn config_missing(detail: impl Into<String>) -> Self {
        AppError::Config { detail: detail.into() }
    }

    /// True when this failure should map to 504 rather than 500.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AppError::Database { timeout: true, .. })
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Database { code: ErrorCode::TableNotFound, .. } => StatusCode::NOT_FOUND,
            AppError::Database { timeout: true, .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Config { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Wire triple for the response envelope: (errorCode, errorName, errorDetail).
    fn wire_parts(&self) -> (ErrorCode, &str, String) {
        match self {
            AppError::Validation { code, name, detail } => (*code, name, detail.clone()),
            // Timeouts keep their name/detail but surface as GatewayTimeout.
            AppError::Database { name, detail, timeout: true, .. } => {
                (ErrorCode::GatewayTimeout, name, detail.clone())
            }
            AppError::Database { code, name, detail, .. } => (*code, name, detail.clone()),
            AppError::Config { detail } => {
                (ErrorCode::DbConfigMissing, "environment_variables", detail.clone())
            }
            AppError::Internal => (
                ErrorCode::InternalError,
                "system",
                "internal error, contact the operator".into(),
            ),
        }
    }
}

/// Walk the driver error chain looking for a socket/pool timeout.
fn is_timeout_error(err: &sqlx::Error) -> bool {
    if matches!(err, sqlx::Error::PoolTimedOut) {
        return true;
    }
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::TimedOut {
                return true;
            }
        }
        source = inner.source();
    }
    false
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (code, name, detail) = self.wire_parts();
        if status.is_server_error() {
            tracing::error!(code = %code, %detail, "request failed");
        } else {
            tracing::warn!(code = %code, %detail, "request rejected");
        }
        let body = crate::response::failure_body(code, name, &detail);
        (status, Json(body)).into_response()
    }
}
