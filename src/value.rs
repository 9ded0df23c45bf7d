//! Canonical value holder for all database operations
//!
//! `DbValue` is the single source of truth for values crossing the
//! driver boundary in either direction: parameters bound into statements
//! and column values decoded out of result rows. SQL NULL is its own
//! variant so it is never conflated with an empty string or zero.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// A decoded result row: ordered mapping from column name to value.
pub type Row = IndexMap<String, DbValue>;

/// Canonical SQL value across MySQL, PostgreSQL, SQL Server and SQLite.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DbValue {
    Null,

    Bool(bool),

    // Integer tiers (precise type mapping for decode)
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    UInt(u64),

    // Floating point
    Float(f32),
    Double(f64),
    #[cfg(feature = "decimal")]
    Decimal(rust_decimal::Decimal),
    #[cfg(not(feature = "decimal"))]
    Decimal(String),

    // Text
    String(String),
    Text(String),

    // Binary
    Bytes(Vec<u8>),

    // Date and time
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    DateTime(chrono::NaiveDateTime),
    Timestamp(chrono::DateTime<chrono::Utc>),

    Json(JsonValue),
}

impl DbValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DbValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DbValue::Bool(b) => Some(*b),
            DbValue::TinyInt(i) => Some(*i != 0),
            DbValue::SmallInt(i) => Some(*i != 0),
            DbValue::Int(i) => Some(*i != 0),
            DbValue::BigInt(i) => Some(*i != 0),
            DbValue::UInt(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DbValue::TinyInt(i) => Some(i64::from(*i)),
            DbValue::SmallInt(i) => Some(i64::from(*i)),
            DbValue::Int(i) => Some(i64::from(*i)),
            DbValue::BigInt(i) => Some(*i),
            DbValue::UInt(i) if *i <= i64::MAX as u64 => Some(*i as i64),
            DbValue::Bool(b) => Some(i64::from(*b)),
            DbValue::String(s) | DbValue::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DbValue::Float(f) => Some(f64::from(*f)),
            DbValue::Double(f) => Some(*f),
            #[cfg(feature = "decimal")]
            DbValue::Decimal(d) => {
                use rust_decimal::prelude::ToPrimitive;
                d.to_f64()
            }
            #[cfg(not(feature = "decimal"))]
            DbValue::Decimal(s) => s.parse().ok(),
            DbValue::TinyInt(i) => Some(f64::from(*i)),
            DbValue::SmallInt(i) => Some(f64::from(*i)),
            DbValue::Int(i) => Some(f64::from(*i)),
            DbValue::BigInt(i) => Some(*i as f64),
            DbValue::UInt(i) => Some(*i as f64),
            DbValue::String(s) | DbValue::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DbValue::String(s) | DbValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to JSON for rendering or re-serialization.
    pub fn to_json(&self) -> JsonValue {
        match self {
            DbValue::Null => JsonValue::Null,
            DbValue::Bool(b) => JsonValue::Bool(*b),
            DbValue::TinyInt(i) => JsonValue::Number((*i).into()),
            DbValue::SmallInt(i) => JsonValue::Number((*i).into()),
            DbValue::Int(i) => JsonValue::Number((*i).into()),
            DbValue::BigInt(i) => JsonValue::Number((*i).into()),
            DbValue::UInt(i) => JsonValue::Number((*i).into()),
            DbValue::Float(f) => serde_json::Number::from_f64(f64::from(*f))
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            DbValue::Double(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            #[cfg(feature = "decimal")]
            DbValue::Decimal(d) => JsonValue::String(d.to_string()),
            #[cfg(not(feature = "decimal"))]
            DbValue::Decimal(s) => JsonValue::String(s.clone()),
            DbValue::String(s) | DbValue::Text(s) => JsonValue::String(s.clone()),
            DbValue::Bytes(bytes) => JsonValue::String(base64_encode(bytes)),
            DbValue::Date(d) => JsonValue::String(d.to_string()),
            DbValue::Time(t) => JsonValue::String(t.to_string()),
            DbValue::DateTime(dt) => JsonValue::String(dt.to_string()),
            DbValue::Timestamp(ts) => JsonValue::String(ts.to_rfc3339()),
            DbValue::Json(j) => j.clone(),
        }
    }
}

impl fmt::Display for DbValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbValue::Null => write!(f, "NULL"),
            DbValue::Bool(b) => write!(f, "{}", b),
            DbValue::TinyInt(i) => write!(f, "{}", i),
            DbValue::SmallInt(i) => write!(f, "{}", i),
            DbValue::Int(i) => write!(f, "{}", i),
            DbValue::BigInt(i) => write!(f, "{}", i),
            DbValue::UInt(i) => write!(f, "{}", i),
            DbValue::Float(v) => write!(f, "{}", v),
            DbValue::Double(v) => write!(f, "{}", v),
            DbValue::Decimal(d) => write!(f, "{}", d),
            DbValue::String(s) | DbValue::Text(s) => write!(f, "{}", s),
            DbValue::Bytes(b) => write!(f, "<binary:{} bytes>", b.len()),
            DbValue::Date(d) => write!(f, "{}", d),
            DbValue::Time(t) => write!(f, "{}", t),
            DbValue::DateTime(dt) => write!(f, "{}", dt),
            DbValue::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            DbValue::Json(j) => write!(f, "{}", j),
        }
    }
}

fn base64_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(data)
}

impl From<bool> for DbValue {
    fn from(v: bool) -> Self {
        DbValue::Bool(v)
    }
}

impl From<i8> for DbValue {
    fn from(v: i8) -> Self {
        DbValue::TinyInt(v)
    }
}

impl From<i16> for DbValue {
    fn from(v: i16) -> Self {
        DbValue::SmallInt(v)
    }
}

impl From<i32> for DbValue {
    fn from(v: i32) -> Self {
        DbValue::Int(v)
    }
}

impl From<i64> for DbValue {
    fn from(v: i64) -> Self {
        DbValue::BigInt(v)
    }
}

impl From<u8> for DbValue {
    fn from(v: u8) -> Self {
        DbValue::UInt(u64::from(v))
    }
}

impl From<u16> for DbValue {
    fn from(v: u16) -> Self {
        DbValue::UInt(u64::from(v))
    }
}

impl From<u32> for DbValue {
    fn from(v: u32) -> Self {
        DbValue::UInt(u64::from(v))
    }
}

impl From<u64> for DbValue {
    fn from(v: u64) -> Self {
        DbValue::UInt(v)
    }
}

impl From<f32> for DbValue {
    fn from(v: f32) -> Self {
        DbValue::Float(v)
    }
}

impl From<f64> for DbValue {
    fn from(v: f64) -> Self {
        DbValue::Double(v)
    }
}

impl From<String> for DbValue {
    fn from(s: String) -> Self {
        DbValue::String(s)
    }
}

impl From<&str> for DbValue {
    fn from(s: &str) -> Self {
        DbValue::String(s.to_string())
    }
}

impl From<&String> for DbValue {
    fn from(s: &String) -> Self {
        DbValue::String(s.clone())
    }
}

impl From<Vec<u8>> for DbValue {
    fn from(v: Vec<u8>) -> Self {
        DbValue::Bytes(v)
    }
}

impl From<JsonValue> for DbValue {
    fn from(v: JsonValue) -> Self {
        DbValue::Json(v)
    }
}

impl From<chrono::NaiveDate> for DbValue {
    fn from(d: chrono::NaiveDate) -> Self {
        DbValue::Date(d)
    }
}

impl From<chrono::NaiveTime> for DbValue {
    fn from(t: chrono::NaiveTime) -> Self {
        DbValue::Time(t)
    }
}

impl From<chrono::NaiveDateTime> for DbValue {
    fn from(dt: chrono::NaiveDateTime) -> Self {
        DbValue::DateTime(dt)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for DbValue {
    fn from(ts: chrono::DateTime<chrono::Utc>) -> Self {
        DbValue::Timestamp(ts)
    }
}

#[cfg(feature = "decimal")]
impl From<rust_decimal::Decimal> for DbValue {
    fn from(d: rust_decimal::Decimal) -> Self {
        DbValue::Decimal(d)
    }
}

impl<T> From<Option<T>> for DbValue
where
    T: Into<DbValue>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => DbValue::Null,
        }
    }
}
