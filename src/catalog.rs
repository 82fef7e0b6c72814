//! Runtime schema discovery with caching.
//!
//! `SchemaCatalog` learns each table's columns, nullability, primary key, and
//! auto-maintained timestamp column from `information_schema` on first
//! reference and caches the result for the life of the process. The catalog
//! is assumed to change only through explicit `invalidate` calls.

use crate::error::AppError;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Coarse grouping of column type names sharing one validation rule.
/// Classified once when a schema is cached, never re-derived per request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeFamily {
    Integer,
    Float,
    Text,
    Boolean,
    DateTime,
    Uuid,
    Json,
    /// Unrecognized type names pass validation untouched.
    Unknown,
}

impl TypeFamily {
    pub fn classify(type_name: &str) -> TypeFamily {
        match type_name.to_lowercase().as_str() {
            "int" | "int2" | "int4" | "int8" | "integer" | "smallint" | "bigint" | "serial"
            | "bigserial" => TypeFamily::Integer,
            "float" | "float4" | "float8" | "double precision" | "real" | "numeric"
            | "decimal" => TypeFamily::Float,
            "varchar" | "char" | "bpchar" | "text" | "character" | "character varying" => {
                TypeFamily::Text
            }
            "boolean" | "bool" => TypeFamily::Boolean,
            "timestamp" | "timestamptz" | "date" | "time" | "datetime"
            | "timestamp without time zone" | "timestamp with time zone" => TypeFamily::DateTime,
            "uuid" => TypeFamily::Uuid,
            "json" | "jsonb" => TypeFamily::Json,
            _ => TypeFamily::Unknown,
        }
    }
}

/// Per-column metadata as reported by the catalog. Immutable once cached.
#[derive(Clone, Debug)]
pub struct ColumnMeta {
    /// Catalog type name, lower-cased for comparisons (e.g. "varchar", "jsonb").
    pub type_name: String,
    pub family: TypeFamily,
    pub nullable: bool,
}

impl ColumnMeta {
    pub fn new(type_name: &str, nullable: bool) -> Self {
        let type_name = type_name.to_lowercase();
        let family = TypeFamily::classify(&type_name);
        ColumnMeta { type_name, family, nullable }
    }
}

/// Type names whose first occurrence is treated as the auto-maintained
/// timestamp column (bound to NOW() on insert/update, never client-supplied).
const TIMESTAMP_TYPE_NAMES: &[&str] = &[
    "timestamp",
    "timestamptz",
    "datetime",
    "timestamp without time zone",
    "timestamp with time zone",
];

/// A table's discovered shape: column map plus the timestamp column, if any.
/// Shared read-only between requests via `Arc`.
#[derive(Clone, Debug, Default)]
pub struct TableSchema {
    pub columns: HashMap<String, ColumnMeta>,
    /// First timestamp-typed column in map iteration order. Which column wins
    /// when a table has several is implementation-defined; callers must not
    /// depend on the choice.
    pub timestamp_column: Option<String>,
}

impl TableSchema {
    pub fn from_columns(columns: HashMap<String, ColumnMeta>) -> Self {
        let timestamp_column = find_auto_timestamp_column(&columns);
        TableSchema { columns, timestamp_column }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }
}

fn find_auto_timestamp_column(columns: &HashMap<String, ColumnMeta>) -> Option<String> {
    columns
        .iter()
        .find(|(_, meta)| TIMESTAMP_TYPE_NAMES.contains(&meta.type_name.as_str()))
        .map(|(name, _)| name.clone())
}

/// Process-wide schema cache. Constructed once and shared by handle; no
/// ambient statics. Lookups and first-population are concurrent; a duplicate
/// introspection of the same table writes an identical entry, which is benign.
#[derive(Debug, Default)]
pub struct SchemaCatalog {
    tables: RwLock<HashMap<String, Arc<TableSchema>>>,
    /// Primary key per table. `None` is cached too, so keyless tables are
    /// introspected once.
    primary_keys: RwLock<HashMap<String, Option<String>>>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column metadata for `table`, from cache or catalog introspection.
    /// Zero discovered columns means the table does not exist.
    pub async fn table_schema(
        &self,
        pool: &PgPool,
        table: &str,
    ) -> Result<Arc<TableSchema>, AppError> {
        if let Some(schema) = self.cached_schema(table) {
            return Ok(schema);
        }

        tracing::info!(%table, "schema cache miss, introspecting columns");
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT column_name, data_type, is_nullable \
             FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = $1",
        )
        .bind(table)
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::query_failed("catalog introspection", e))?;

        if rows.is_empty() {
            return Err(AppError::table_not_found(table));
        }

        let columns: HashMap<String, ColumnMeta> = rows
            .into_iter()
            .map(|(name, type_name, is_nullable)| {
                (name, ColumnMeta::new(&type_name, is_nullable.eq_ignore_ascii_case("YES")))
            })
            .collect();
        let schema = Arc::new(TableSchema::from_columns(columns));
        self.store_schema(table, Arc::clone(&schema));
        Ok(schema)
    }

    /// Primary-key column for `table`, from cache or catalog introspection.
    /// Multi-column keys are not supported; the first key column wins.
    pub async fn primary_key(
        &self,
        pool: &PgPool,
        table: &str,
    ) -> Result<Option<String>, AppError> {
        if let Some(cached) = self.cached_primary_key(table) {
            return Ok(cached);
        }

        tracing::info!(%table, "schema cache miss, introspecting primary key");
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT kcu.column_name \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu \
               ON tc.constraint_name = kcu.constraint_name \
              AND tc.table_schema = kcu.table_schema \
             WHERE tc.constraint_type = 'PRIMARY KEY' \
               AND tc.table_schema = current_schema() \
               AND tc.table_name = $1 \
             ORDER BY kcu.ordinal_position \
             LIMIT 1",
        )
        .bind(table)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::query_failed("catalog introspection", e))?;

        let pk = row.map(|(name,)| name);
        self.store_primary_key(table, pk.clone());
        Ok(pk)
    }

    /// Drop cached entries for one table. Call after DDL changes.
    pub fn invalidate(&self, table: &str) {
        self.tables.write().expect("schema cache poisoned").remove(table);
        self.primary_keys.write().expect("schema cache poisoned").remove(table);
    }

    /// Drop the whole cache.
    pub fn invalidate_all(&self) {
        self.tables.write().expect("schema cache poisoned").clear();
        self.primary_keys.write().expect("schema cache poisoned").clear();
    }

    fn cached_schema(&self, table: &str) -> Option<Arc<TableSchema>> {
        self.tables.read().expect("schema cache poisoned").get(table).cloned()
    }

    fn store_schema(&self, table: &str, schema: Arc<TableSchema>) {
        self.tables
            .write()
            .expect("schema cache poisoned")
            .insert(table.to_string(), schema);
    }

    fn cached_primary_key(&self, table: &str) -> Option<Option<String>> {
        self.primary_keys.read().expect("schema cache poisoned").get(table).cloned()
    }

    fn store_primary_key(&self, table: &str, pk: Option<String>) {
        self.primary_keys
            .write()
            .expect("schema cache poisoned")
            .insert(table.to_string(), pk);
    }
}
