//! PostgreSQL dialect
//!
//! Inserted identifiers are read back through an explicit `RETURNING`
//! clause; the driver has no usable native last-insert-id.

use super::{Dialect, Driver};

pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn driver(&self) -> Driver {
        Driver::Postgres
    }

    fn delimiters(&self) -> (char, char) {
        ('"', '"')
    }

    fn placeholder(&self, position: usize) -> String {
        format!("${}", position)
    }

    fn group_concat(&self, expression: &str, separator: &str) -> String {
        format!(
            "string_agg({}, '{}')",
            expression,
            separator.replace('\'', "''")
        )
    }

    fn supports_returning_id(&self, _table: &str) -> bool {
        true
    }

    fn supports_last_insert_id(&self) -> bool {
        false
    }

    /// PostgreSQL lower-cases an unaliased aggregate to its bare function
    /// name: `select count(*)` comes back as column `count`.
    fn aggregate_key(&self, function: &str, _field: &str) -> String {
        function.to_ascii_lowercase()
    }
}
