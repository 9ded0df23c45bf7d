//! SQLite row decoding
//!
//! SQLite columns carry declared types, not storage types, so decoding
//! follows the type-affinity rules (https://www.sqlite.org/datatype3.html)
//! instead of an exact name match.

use super::normalize_type_name;
use crate::error::{Error, Result};
use crate::value::{DbValue, Row};
use sqlx::sqlite::{Sqlite, SqliteRow};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

#[derive(Debug, Clone, Copy)]
enum Affinity {
    Integer,
    Real,
    Text,
    Blob,
    Numeric,
    Boolean,
    Date,
    Time,
    DateTime,
}

fn affinity(type_name: &str) -> Affinity {
    if type_name == "BOOLEAN" {
        Affinity::Boolean
    } else if type_name == "DATETIME" || type_name == "TIMESTAMP" {
        Affinity::DateTime
    } else if type_name == "DATE" {
        Affinity::Date
    } else if type_name == "TIME" {
        Affinity::Time
    } else if type_name.contains("INT") {
        Affinity::Integer
    } else if type_name.contains("CHAR") || type_name.contains("CLOB") || type_name.contains("TEXT")
    {
        Affinity::Text
    } else if type_name.contains("BLOB") || type_name.is_empty() {
        Affinity::Blob
    } else if type_name.contains("REAL") || type_name.contains("FLOA") || type_name.contains("DOUB")
    {
        Affinity::Real
    } else {
        Affinity::Numeric
    }
}

fn get<T>(row: &SqliteRow, index: usize, column: &str) -> Result<DbValue>
where
    T: for<'r> sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite> + Into<DbValue>,
{
    let value: Option<T> = row
        .try_get(index)
        .map_err(|e| Error::decode(column, e.to_string()))?;
    Ok(value.map(Into::into).unwrap_or(DbValue::Null))
}

/// Decode one SQLite result row into a canonical ordered row.
pub fn decode_sqlite_row(row: &SqliteRow) -> Result<Row> {
    let mut decoded = Row::with_capacity(row.columns().len());

    for (index, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let type_name = normalize_type_name(column.type_info().name());

        if row.try_get_raw(index)?.is_null() {
            decoded.insert(name, DbValue::Null);
            continue;
        }

        let value = match affinity(&type_name) {
            Affinity::Boolean => get::<bool>(row, index, &name)?,
            Affinity::Integer => get::<i64>(row, index, &name)?,
            Affinity::Real => get::<f64>(row, index, &name)?,
            Affinity::Text => get::<String>(row, index, &name)?,
            Affinity::Blob => get::<Vec<u8>>(row, index, &name)?,
            Affinity::Date => get::<chrono::NaiveDate>(row, index, &name)?,
            Affinity::Time => get::<chrono::NaiveTime>(row, index, &name)?,
            Affinity::DateTime => get::<chrono::NaiveDateTime>(row, index, &name)?,
            // NUMERIC affinity stores whatever fits; try the ladder
            Affinity::Numeric => get::<i64>(row, index, &name)
                .or_else(|_| get::<f64>(row, index, &name))
                .or_else(|_| get::<String>(row, index, &name))
                .unwrap_or(DbValue::Null),
        };

        decoded.insert(name, value);
    }

    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affinity_rules() {
        assert!(matches!(affinity("INTEGER"), Affinity::Integer));
        assert!(matches!(affinity("BIGINT"), Affinity::Integer));
        assert!(matches!(affinity("VARCHAR"), Affinity::Text));
        assert!(matches!(affinity("REAL"), Affinity::Real));
        assert!(matches!(affinity("BLOB"), Affinity::Blob));
        assert!(matches!(affinity("BOOLEAN"), Affinity::Boolean));
        assert!(matches!(affinity("DATETIME"), Affinity::DateTime));
        assert!(matches!(affinity("NUMERIC"), Affinity::Numeric));
    }
}
