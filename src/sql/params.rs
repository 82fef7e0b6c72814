//! Convert request values to parameters that sqlx can bind.

use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::Database;

/// A value bound to a PostgreSQL statement. Filters and mutation values are
/// bound as text (the server coerces by column context, as the placeholders
/// carry casts only for json columns); UUID literals are bound natively so
/// uuid-typed key columns compare correctly.
#[derive(Clone, Debug, PartialEq)]
pub enum BindValue {
    Null,
    Uuid(uuid::Uuid),
    Text(String),
}

impl BindValue {
    /// Mutation-set rule: JSON null binds SQL NULL, objects/arrays bind their
    /// serialized JSON text, scalars bind their string representation.
    pub fn from_body_value(v: &Value) -> BindValue {
        match v {
            Value::Null => BindValue::Null,
            Value::Object(_) | Value::Array(_) => BindValue::Text(v.to_string()),
            Value::Bool(b) => BindValue::Text(b.to_string()),
            Value::Number(n) => BindValue::Text(n.to_string()),
            Value::String(s) => BindValue::Text(s.clone()),
        }
    }

    /// Filter rule: try the value as a UUID literal first, otherwise bind the
    /// raw string unchanged.
    pub fn from_filter(raw: &str) -> BindValue {
        match uuid::Uuid::parse_str(raw) {
            Ok(u) => BindValue::Uuid(u),
            Err(_) => BindValue::Text(raw.to_string()),
        }
    }
}

impl<'q> Encode<'q, Postgres> for BindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            BindValue::Null => <Option<String> as Encode<Postgres>>::encode_by_ref(&None, buf)?,
            BindValue::Uuid(u) => <uuid::Uuid as Encode<Postgres>>::encode_by_ref(u, buf)?,
            BindValue::Text(s) => {
                let s_ref: &str = s.as_str();
                <&str as Encode<Postgres>>::encode_by_ref(&s_ref, buf)?
            }
        })
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(match self {
            BindValue::Uuid(_) => <uuid::Uuid as sqlx::Type<Postgres>>::type_info(),
            _ => <String as sqlx::Type<Postgres>>::type_info(),
        })
    }
}

impl sqlx::Type<Postgres> for BindValue {
    fn type_info() -> PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}
