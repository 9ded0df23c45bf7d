//! Column decoding
//!
//! Converts driver rows into canonical [`Row`](crate::value::Row)s. Each
//! backend maps its reported column types onto [`DbValue`] variants; NULL is
//! decoded through `Option` so it is never conflated with an empty string or
//! zero value.

pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use mysql::decode_mysql_row;
pub use postgres::decode_postgres_row;
pub use sqlite::decode_sqlite_row;

/// Normalize a driver-reported column type name: strip any parenthesized
/// precision or length suffix and upper-case the rest.
///
/// `varchar(255)` -> `VARCHAR`, `tinyint(1) unsigned` -> `TINYINT UNSIGNED`.
pub fn normalize_type_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut depth = 0usize;
    for ch in name.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => normalized.push(ch.to_ascii_uppercase()),
            _ => {}
        }
    }
    normalized.trim().replace("  ", " ")
}
