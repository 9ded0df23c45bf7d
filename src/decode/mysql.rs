//! MySQL row decoding

use super::normalize_type_name;
use crate::error::{Error, Result};
use crate::value::{DbValue, Row};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySql, MySqlRow};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

fn get<T>(row: &MySqlRow, index: usize, column: &str) -> Result<DbValue>
where
    T: for<'r> sqlx::Decode<'r, MySql> + sqlx::Type<MySql> + Into<DbValue>,
{
    let value: Option<T> = row
        .try_get(index)
        .map_err(|e| Error::decode(column, e.to_string()))?;
    Ok(value.map(Into::into).unwrap_or(DbValue::Null))
}

/// Decode one MySQL result row into a canonical ordered row.
pub fn decode_mysql_row(row: &MySqlRow) -> Result<Row> {
    let mut decoded = Row::with_capacity(row.columns().len());

    for (index, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let type_name = normalize_type_name(column.type_info().name());

        if row.try_get_raw(index)?.is_null() {
            decoded.insert(name, DbValue::Null);
            continue;
        }

        let value = if type_name.contains("UNSIGNED") {
            get::<u64>(row, index, &name)?
        } else {
            match type_name.as_str() {
                "BOOLEAN" => get::<bool>(row, index, &name)?,
                "TINYINT" => get::<i8>(row, index, &name)?,
                "SMALLINT" | "YEAR" => get::<i16>(row, index, &name)?,
                "INT" | "MEDIUMINT" => get::<i32>(row, index, &name)?,
                "BIGINT" => get::<i64>(row, index, &name)?,
                "FLOAT" => get::<f32>(row, index, &name)?,
                "DOUBLE" => get::<f64>(row, index, &name)?,
                #[cfg(feature = "decimal")]
                "DECIMAL" => get::<rust_decimal::Decimal>(row, index, &name)?,
                #[cfg(not(feature = "decimal"))]
                "DECIMAL" => get::<f64>(row, index, &name)?,
                "CHAR" | "VARCHAR" | "ENUM" | "SET" => get::<String>(row, index, &name)?,
                "TINYTEXT" | "TEXT" | "MEDIUMTEXT" | "LONGTEXT" => {
                    let value: Option<String> = row
                        .try_get(index)
                        .map_err(|e| Error::decode(&name, e.to_string()))?;
                    value.map(DbValue::Text).unwrap_or(DbValue::Null)
                }
                "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
                    get::<Vec<u8>>(row, index, &name)?
                }
                "DATE" => get::<chrono::NaiveDate>(row, index, &name)?,
                "TIME" => get::<chrono::NaiveTime>(row, index, &name)?,
                "DATETIME" => get::<chrono::NaiveDateTime>(row, index, &name)?,
                "TIMESTAMP" => get::<chrono::DateTime<chrono::Utc>>(row, index, &name)?,
                "JSON" => get::<JsonValue>(row, index, &name)?,
                other => {
                    log::debug!("mysql: no mapping for column type {}, trying string", other);
                    get::<String>(row, index, &name).unwrap_or(DbValue::Null)
                }
            }
        };

        decoded.insert(name, value);
    }

    Ok(decoded)
}
