//! PostgreSQL row decoding

use super::normalize_type_name;
use crate::error::{Error, Result};
use crate::value::{DbValue, Row};
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgRow, Postgres};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

fn get<T>(row: &PgRow, index: usize, column: &str) -> Result<DbValue>
where
    T: for<'r> sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres> + Into<DbValue>,
{
    let value: Option<T> = row
        .try_get(index)
        .map_err(|e| Error::decode(column, e.to_string()))?;
    Ok(value.map(Into::into).unwrap_or(DbValue::Null))
}

/// Decode one PostgreSQL result row into a canonical ordered row.
pub fn decode_postgres_row(row: &PgRow) -> Result<Row> {
    let mut decoded = Row::with_capacity(row.columns().len());

    for (index, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let type_name = normalize_type_name(column.type_info().name());

        if row.try_get_raw(index)?.is_null() {
            decoded.insert(name, DbValue::Null);
            continue;
        }

        let value = match type_name.as_str() {
            "BOOL" => get::<bool>(row, index, &name)?,
            "INT2" | "SMALLINT" | "SMALLSERIAL" => get::<i16>(row, index, &name)?,
            "INT4" | "INT" | "SERIAL" => get::<i32>(row, index, &name)?,
            "INT8" | "BIGINT" | "BIGSERIAL" | "OID" => get::<i64>(row, index, &name)?,
            "FLOAT4" | "REAL" => get::<f32>(row, index, &name)?,
            "FLOAT8" | "DOUBLE PRECISION" => get::<f64>(row, index, &name)?,
            #[cfg(feature = "decimal")]
            "NUMERIC" => get::<rust_decimal::Decimal>(row, index, &name)?,
            #[cfg(not(feature = "decimal"))]
            "NUMERIC" => get::<f64>(row, index, &name)?,
            "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => get::<String>(row, index, &name)?,
            "TEXT" | "CITEXT" => {
                let value: Option<String> = row
                    .try_get(index)
                    .map_err(|e| Error::decode(&name, e.to_string()))?;
                value.map(DbValue::Text).unwrap_or(DbValue::Null)
            }
            "BYTEA" => get::<Vec<u8>>(row, index, &name)?,
            "DATE" => get::<chrono::NaiveDate>(row, index, &name)?,
            "TIME" => get::<chrono::NaiveTime>(row, index, &name)?,
            "TIMESTAMP" => get::<chrono::NaiveDateTime>(row, index, &name)?,
            "TIMESTAMPTZ" => get::<chrono::DateTime<chrono::Utc>>(row, index, &name)?,
            "JSON" | "JSONB" => get::<JsonValue>(row, index, &name)?,
            other => {
                log::debug!(
                    "postgres: no mapping for column type {}, trying string",
                    other
                );
                get::<String>(row, index, &name).unwrap_or(DbValue::Null)
            }
        };

        decoded.insert(name, value);
    }

    Ok(decoded)
}
