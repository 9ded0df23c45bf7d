//! Connection layer
//!
//! A [`Connection`] is a capability object for one driver: it owns one sqlx
//! pool per named sub-connection (e.g. "default", "logs"), executes raw
//! queries and statements with bound parameters, and opens transactions at a
//! requested isolation level. Pools are opened exactly once by [`Connection::init`],
//! even under concurrent first use; afterwards the pool map is read-only.

use crate::config::{DatabasesConfig, DEFAULT_CONNECTION};
use crate::dialect::{Dialect, DialectRegistry, Driver};
use crate::error::{Error, Result};
use crate::transaction::{IsolationLevel, Transaction};
use crate::value::{DbValue, Row};
use async_trait::async_trait;
use std::sync::Arc;

pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use mysql::MySqlAdapter;
pub use postgres::PostgresAdapter;
pub use sqlite::SqliteAdapter;

/// Result of a statement execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecResult {
    /// Number of rows affected by the statement
    pub rows_affected: u64,
    /// Last inserted identifier, where the driver reports one
    pub last_insert_id: Option<i64>,
}

/// Unified connection interface over all database backends.
#[async_trait]
pub trait Connection: Send + Sync {
    fn driver(&self) -> Driver;

    /// The dialect resolved for this connection at construction.
    fn dialect(&self) -> Arc<dyn Dialect>;

    /// Open every configured sub-connection pool. Idempotent: concurrent
    /// calls open each pool exactly once.
    async fn init(&self) -> Result<()>;

    /// Run a SELECT against a named sub-connection.
    async fn query_with(
        &self,
        connection: &str,
        sql: &str,
        params: Vec<DbValue>,
    ) -> Result<Vec<Row>>;

    /// Run a data-modifying statement against a named sub-connection.
    async fn exec_with(
        &self,
        connection: &str,
        sql: &str,
        params: Vec<DbValue>,
    ) -> Result<ExecResult>;

    /// Open a transaction on a named sub-connection at the given isolation
    /// level. The level is fixed for the transaction's lifetime.
    async fn begin_tx_with(
        &self,
        connection: &str,
        level: IsolationLevel,
    ) -> Result<Transaction>;

    async fn query(&self, sql: &str, params: Vec<DbValue>) -> Result<Vec<Row>> {
        self.query_with(DEFAULT_CONNECTION, sql, params).await
    }

    async fn exec(&self, sql: &str, params: Vec<DbValue>) -> Result<ExecResult> {
        self.exec_with(DEFAULT_CONNECTION, sql, params).await
    }

    async fn begin_tx(&self, level: IsolationLevel) -> Result<Transaction> {
        self.begin_tx_with(DEFAULT_CONNECTION, level).await
    }
}

/// Build and initialize the connection for a configuration.
///
/// Fails fast: an unknown driver name, an invalid configuration or an
/// unreachable database is reported here, before any query runs.
pub async fn connect(
    config: DatabasesConfig,
    registry: &DialectRegistry,
) -> Result<Arc<dyn Connection>> {
    config.validate()?;
    let driver = config.driver()?;
    let dialect = registry.get(driver)?;

    let connection: Arc<dyn Connection> = match driver {
        Driver::MySql => Arc::new(MySqlAdapter::new(config, dialect)),
        Driver::Postgres => Arc::new(PostgresAdapter::new(config, dialect)),
        Driver::Sqlite => Arc::new(SqliteAdapter::new(config, dialect)),
        Driver::Mssql => return Err(Error::UnsupportedDriver(driver.to_string())),
    };

    connection.init().await?;
    Ok(connection)
}
