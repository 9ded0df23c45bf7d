//! PostgreSQL connection adapter
//!
//! PostgreSQL reports no native last-insert-id; the statement builder uses
//! the dialect's `RETURNING` capability instead of `exec_with` for inserts
//! that need the new identifier.

use super::{Connection, ExecResult};
use crate::config::DatabasesConfig;
use crate::decode::decode_postgres_row;
use crate::dialect::{Dialect, Driver};
use crate::error::{is_benign_driver_error, Error, Result};
use crate::transaction::{IsolationLevel, Transaction, TxConn};
use crate::value::{DbValue, Row};
use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, Postgres};
use sqlx::query::Query;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

pub struct PostgresAdapter {
    config: DatabasesConfig,
    dialect: Arc<dyn Dialect>,
    pools: OnceCell<HashMap<String, PgPool>>,
}

impl PostgresAdapter {
    pub fn new(config: DatabasesConfig, dialect: Arc<dyn Dialect>) -> Self {
        Self {
            config,
            dialect,
            pools: OnceCell::new(),
        }
    }

    fn pool(&self, name: &str) -> Result<&PgPool> {
        self.pools
            .get()
            .ok_or_else(|| Error::connection("connection not initialized"))?
            .get(name)
            .ok_or_else(|| Error::connection(format!("unknown sub-connection '{}'", name)))
    }

    async fn open_pools(config: &DatabasesConfig) -> Result<HashMap<String, PgPool>> {
        let mut pools = HashMap::new();
        for (name, cfg) in &config.connections {
            let pool = PgPoolOptions::new()
                .max_connections(cfg.max_connections)
                .min_connections(cfg.min_connections)
                .connect(&cfg.url()?)
                .await
                .map_err(|e| {
                    Error::connection(format!(
                        "failed to open PostgreSQL sub-connection '{}' ({}:{}/{}): {}",
                        name, cfg.host, cfg.port, cfg.name, e
                    ))
                })?;
            pools.insert(name.clone(), pool);
        }
        Ok(pools)
    }
}

#[async_trait]
impl Connection for PostgresAdapter {
    fn driver(&self) -> Driver {
        Driver::Postgres
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
        query_postgres(self.pool(connection)?, sql, params).await
    }

    async fn exec_with(
        &self,
        connection: &str,
        sql: &str,
        params: Vec<DbValue>,
    ) -> Result<ExecResult> {
        exec_postgres(self.pool(connection)?, sql, params).await
    }

    async fn begin_tx_with(
        &self,
        connection: &str,
        level: IsolationLevel,
    ) -> Result<Transaction> {
        let mut conn = self.pool(connection)?.acquire().await?;
        let begin = match level.sql_name() {
            Some(name) => format!("BEGIN ISOLATION LEVEL {}", name),
            None => "BEGIN".to_string(),
        };
        sqlx::query(&begin).execute(&mut *conn).await?;
        Ok(Transaction::new(TxConn::Postgres(conn), level))
    }
}

/// PostgreSQL has no unsigned 64-bit column type; values beyond BIGINT
/// range cannot be bound.
fn check_params(params: &[DbValue]) -> Result<()> {
    for value in params {
        if let DbValue::UInt(v) = value {
            if *v > i64::MAX as u64 {
                return Err(Error::UnsupportedFeature {
                    driver: Driver::Postgres.to_string(),
                    feature: format!("unsigned parameter {} exceeds BIGINT range", v),
                });
            }
        }
    }
    Ok(())
}

pub(crate) fn bind_postgres(
    query: Query<'_, Postgres, PgArguments>,
    value: DbValue,
) -> Query<'_, Postgres, PgArguments> {
    match value {
        DbValue::Null => query.bind(Option::<String>::None),
        DbValue::Bool(v) => query.bind(v),
        // PostgreSQL has no one-byte integer column type
        DbValue::TinyInt(v) => query.bind(i16::from(v)),
        DbValue::SmallInt(v) => query.bind(v),
        DbValue::Int(v) => query.bind(v),
        DbValue::BigInt(v) => query.bind(v),
        // range pre-checked by check_params
        DbValue::UInt(v) => query.bind(v as i64),
        DbValue::Float(v) => query.bind(v),
        DbValue::Double(v) => query.bind(v),
        DbValue::Decimal(v) => query.bind(v),
        DbValue::String(v) | DbValue::Text(v) => query.bind(v),
        DbValue::Bytes(v) => query.bind(v),
        DbValue::Date(v) => query.bind(v),
        DbValue::Time(v) => query.bind(v),
        DbValue::DateTime(v) => query.bind(v),
        DbValue::Timestamp(v) => query.bind(v),
        DbValue::Json(v) => query.bind(v),
    }
}

pub(crate) async fn query_postgres<'a, E>(
    executor: E,
    sql: &'a str,
    params: Vec<DbValue>,
) -> Result<Vec<Row>>
where
    E: sqlx::Executor<'a, Database = Postgres>,
{
    log::debug!("postgres query: {} | params: {:?}", sql, params);
    check_params(&params)?;
    let mut query = sqlx::query(sql);
    for value in params {
        query = bind_postgres(query, value);
    }
    let rows = query.fetch_all(executor).await?;
    rows.iter().map(decode_postgres_row).collect()
}

pub(crate) async fn exec_postgres<'a, E>(
    executor: E,
    sql: &'a str,
    params: Vec<DbValue>,
) -> Result<ExecResult>
where
    E: sqlx::Executor<'a, Database = Postgres>,
{
    log::debug!("postgres exec: {} | params: {:?}", sql, params);
    check_params(&params)?;
    let mut query = sqlx::query(sql);
    for value in params {
        query = bind_postgres(query, value);
    }
    match query.execute(executor).await {
        Ok(result) => Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: None,
        }),
        Err(e) if is_benign_driver_error(&e.to_string()) => Ok(ExecResult::default()),
        Err(e) => Err(e.into()),
    }
}
