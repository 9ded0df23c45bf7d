//! SQL dialect translation
//!
//! Each supported backend implements [`Dialect`]: a stateless set of
//! functions turning abstract clause descriptions into backend-specific SQL
//! fragments and placeholder syntax. Dialects own no data beyond constants
//! and are never mutated after registration.
//!
//! Dialects are resolved through an explicit [`DialectRegistry`] built once
//! at startup and passed to the connection layer, so tests can substitute
//! fake dialects without touching global state.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub mod mssql;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use mssql::MssqlDialect;
pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

/// Database drivers supported by paneldb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Driver {
    MySql,
    Postgres,
    Mssql,
    Sqlite,
}

impl Driver {
    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::MySql => "mysql",
            Driver::Postgres => "postgresql",
            Driver::Mssql => "mssql",
            Driver::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Driver {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Driver::MySql),
            "postgresql" | "postgres" => Ok(Driver::Postgres),
            "mssql" | "sqlserver" => Ok(Driver::Mssql),
            "sqlite" | "sqlite3" => Ok(Driver::Sqlite),
            other => Err(Error::UnknownDriver(other.to_string())),
        }
    }
}

/// Backend-specific SQL generation.
pub trait Dialect: Send + Sync {
    fn driver(&self) -> Driver;

    /// Opening and closing identifier delimiter.
    fn delimiters(&self) -> (char, char);

    /// Parameter placeholder for the given 1-based position.
    fn placeholder(&self, position: usize) -> String;

    /// Quote an identifier. Qualified names (`t.c`), expressions and `*`
    /// pass through untouched.
    fn quote(&self, identifier: &str) -> String {
        if identifier == "*"
            || identifier.contains('.')
            || identifier.contains('(')
            || identifier.contains(' ')
        {
            return identifier.to_string();
        }
        let (open, close) = self.delimiters();
        let escaped = identifier.replace(close, &format!("{}{}", close, close));
        format!("{}{}{}", open, escaped, close)
    }

    /// String concatenation of grouped values with a separator.
    fn group_concat(&self, expression: &str, separator: &str) -> String;

    /// LIMIT/OFFSET fragment, empty when the backend has no native form.
    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        let mut sql = String::new();
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }
        sql
    }

    /// Attach ordering and pagination to a rendered SELECT. `order` is the
    /// comma-joined ordering expression list without the `ORDER BY` keyword.
    fn paginate(
        &self,
        sql: String,
        order: Option<&str>,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> String {
        let mut sql = sql;
        if let Some(order) = order {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }
        sql.push_str(&self.limit_offset(limit, offset));
        sql
    }

    /// Whether INSERT must use an explicit `RETURNING` clause to report the
    /// inserted identifier for this table.
    fn supports_returning_id(&self, _table: &str) -> bool {
        false
    }

    /// Whether the driver reports a usable native last-insert-id.
    fn supports_last_insert_id(&self) -> bool {
        true
    }

    /// Result-set column name under which an unaliased aggregate such as
    /// `count(*)` comes back from this driver.
    fn aggregate_key(&self, function: &str, field: &str) -> String {
        format!("{}({})", function, field)
    }
}

/// Explicit, constructed-once dialect registry.
pub struct DialectRegistry {
    dialects: HashMap<Driver, Arc<dyn Dialect>>,
}

impl DialectRegistry {
    /// Empty registry, for tests that register fake dialects.
    pub fn new() -> Self {
        Self {
            dialects: HashMap::new(),
        }
    }

    /// Registry carrying all four built-in dialects.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MySqlDialect));
        registry.register(Arc::new(PostgresDialect));
        registry.register(Arc::new(MssqlDialect));
        registry.register(Arc::new(SqliteDialect));
        registry
    }

    pub fn register(&mut self, dialect: Arc<dyn Dialect>) {
        self.dialects.insert(dialect.driver(), dialect);
    }

    /// Resolve a dialect. Missing drivers are a configuration error meant to
    /// fail at startup, not per-query.
    pub fn get(&self, driver: Driver) -> Result<Arc<dyn Dialect>> {
        self.dialects
            .get(&driver)
            .cloned()
            .ok_or_else(|| Error::UnknownDriver(driver.to_string()))
    }

    pub fn get_by_name(&self, name: &str) -> Result<Arc<dyn Dialect>> {
        self.get(name.parse()?)
    }
}

impl Default for DialectRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
