//! SQLite connection adapter

use super::{Connection, ExecResult};
use crate::config::DatabasesConfig;
use crate::decode::decode_sqlite_row;
use crate::dialect::{Dialect, Driver};
use crate::error::{is_benign_driver_error, Error, Result};
use crate::transaction::{IsolationLevel, Transaction, TxConn};
use crate::value::{DbValue, Row};
use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePool, SqlitePoolOptions};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

pub struct SqliteAdapter {
    config: DatabasesConfig,
    dialect: Arc<dyn Dialect>,
    pools: OnceCell<HashMap<String, SqlitePool>>,
}

impl SqliteAdapter {
    pub fn new(config: DatabasesConfig, dialect: Arc<dyn Dialect>) -> Self {
        Self {
            config,
            dialect,
            pools: OnceCell::new(),
        }
    }

    fn pool(&self, name: &str) -> Result<&SqlitePool> {
        self.pools
            .get()
            .ok_or_else(|| Error::connection("connection not initialized"))?
            .get(name)
            .ok_or_else(|| Error::connection(format!("unknown sub-connection '{}'", name)))
    }

    async fn open_pools(config: &DatabasesConfig) -> Result<HashMap<String, SqlitePool>> {
        let mut pools = HashMap::new();
        for (name, cfg) in &config.connections {
            let pool = SqlitePoolOptions::new()
                .max_connections(cfg.max_connections)
                .min_connections(cfg.min_connections)
                .connect(&cfg.url()?)
                .await
                .map_err(|e| {
                    Error::connection(format!(
                        "failed to open SQLite sub-connection '{}' ({}): {}",
                        name, cfg.name, e
                    ))
                })?;
            pools.insert(name.clone(), pool);
        }
        Ok(pools)
    }
}

#[async_trait]
impl Connection for SqliteAdapter {
    fn driver(&self) -> Driver {
        Driver::Sqlite
    }

    fn dialect(&self) -> Arc<dyn Dialect> {
        self.dialect.clone()
    }

    async fn init(&self) -> Result<()> {
        self.pools
            .get_or_try_init(|| Self::open_pools(&self.config))
            .await?;
        Ok(())
    }

    async fn query_with(
        &self,
        connection: &str,
        sql: &str,
        params: Vec<DbValue>,
    ) -> Result<Vec<Row>> {
        query_sqlite(self.pool(connection)?, sql, params).await
    }

    async fn exec_with(
        &self,
        connection: &str,
        sql: &str,
        params: Vec<DbValue>,
    ) -> Result<ExecResult> {
        exec_sqlite(self.pool(connection)?, sql, params).await
    }

    async fn begin_tx_with(
        &self,
        connection: &str,
        level: IsolationLevel,
    ) -> Result<Transaction> {
        let mut conn = self.pool(connection)?.acquire().await?;
        // SQLite transactions are always serializable; the requested level
        // is recorded but has no effect.
        sqlx::query("BEGIN").execute(&mut *conn).await?;
        Ok(Transaction::new(TxConn::Sqlite(conn), level))
    }
}

/// SQLite integers are signed 64-bit; larger unsigned values cannot be
/// bound without corruption.
fn check_params(params: &[DbValue]) -> Result<()> {
    for value in params {
        if let DbValue::UInt(v) = value {
            if *v > i64::MAX as u64 {
                return Err(Error::UnsupportedFeature {
                    driver: Driver::Sqlite.to_string(),
                    feature: format!("unsigned parameter {} exceeds INTEGER range", v),
                });
            }
        }
    }
    Ok(())
}

pub(crate) fn bind_sqlite<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: DbValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        DbValue::Null => query.bind(Option::<String>::None),
        DbValue::Bool(v) => query.bind(v),
        // SQLite is dynamically typed; widen every integer to i64
        DbValue::TinyInt(v) => query.bind(i64::from(v)),
        DbValue::SmallInt(v) => query.bind(i64::from(v)),
        DbValue::Int(v) => query.bind(i64::from(v)),
        DbValue::BigInt(v) => query.bind(v),
        // range pre-checked by check_params
        DbValue::UInt(v) => query.bind(v as i64),
        DbValue::Float(v) => query.bind(f64::from(v)),
        DbValue::Double(v) => query.bind(v),
        DbValue::Decimal(v) => query.bind(v.to_string()),
        DbValue::String(v) | DbValue::Text(v) => query.bind(v),
        DbValue::Bytes(v) => query.bind(v),
        DbValue::Date(v) => query.bind(v),
        DbValue::Time(v) => query.bind(v),
        DbValue::DateTime(v) => query.bind(v),
        DbValue::Timestamp(v) => query.bind(v),
        DbValue::Json(v) => query.bind(v),
    }
}

pub(crate) async fn query_sqlite<'a, E>(
    executor: E,
    sql: &'a str,
    params: Vec<DbValue>,
) -> Result<Vec<Row>>
where
    E: sqlx::Executor<'a, Database = Sqlite>,
{
    log::debug!("sqlite query: {} | params: {:?}", sql, params);
    check_params(&params)?;
    let mut query = sqlx::query(sql);
    for value in params {
        query = bind_sqlite(query, value);
    }
    let rows = query.fetch_all(executor).await?;
    rows.iter().map(decode_sqlite_row).collect()
}

pub(crate) async fn exec_sqlite<'a, E>(
    executor: E,
    sql: &'a str,
    params: Vec<DbValue>,
) -> Result<ExecResult>
where
    E: sqlx::Executor<'a, Database = Sqlite>,
{
    log::debug!("sqlite exec: {} | params: {:?}", sql, params);
    check_params(&params)?;
    let mut query = sqlx::query(sql);
    for value in params {
        query = bind_sqlite(query, value);
    }
    match query.execute(executor).await {
        Ok(result) => Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: Some(result.last_insert_rowid()),
        }),
        Err(e) if is_benign_driver_error(&e.to_string()) => Ok(ExecResult::default()),
        Err(e) => Err(e.into()),
    }
}
