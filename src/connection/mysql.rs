//! MySQL connection adapter

use super::{Connection, ExecResult};
use crate::config::DatabasesConfig;
use crate::decode::decode_mysql_row;
use crate::dialect::{Dialect, Driver};
use crate::error::{is_benign_driver_error, Error, Result};
use crate::transaction::{IsolationLevel, Transaction, TxConn};
use crate::value::{DbValue, Row};
use async_trait::async_trait;
use sqlx::mysql::{MySql, MySqlArguments, MySqlPool, MySqlPoolOptions};
use sqlx::query::Query;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

pub struct MySqlAdapter {
    config: DatabasesConfig,
    dialect: Arc<dyn Dialect>,
    pools: OnceCell<HashMap<String, MySqlPool>>,
}

impl MySqlAdapter {
    pub fn new(config: DatabasesConfig, dialect: Arc<dyn Dialect>) -> Self {
        Self {
            config,
            dialect,
            pools: OnceCell::new(),
        }
    }

    fn pool(&self, name: &str) -> Result<&MySqlPool> {
        self.pools
            .get()
            .ok_or_else(|| Error::connection("connection not initialized"))?
            .get(name)
            .ok_or_else(|| Error::connection(format!("unknown sub-connection '{}'", name)))
    }

    async fn open_pools(config: &DatabasesConfig) -> Result<HashMap<String, MySqlPool>> {
        let mut pools = HashMap::new();
        for (name, cfg) in &config.connections {
            let pool = MySqlPoolOptions::new()
                .max_connections(cfg.max_connections)
                .min_connections(cfg.min_connections)
                .connect(&cfg.url()?)
                .await
                .map_err(|e| {
                    Error::connection(format!(
                        "failed to open MySQL sub-connection '{}' ({}:{}/{}): {}",
                        name, cfg.host, cfg.port, cfg.name, e
                    ))
                })?;
            pools.insert(name.clone(), pool);
        }
        Ok(pools)
    }
}

#[async_trait]
impl Connection for MySqlAdapter {
    fn driver(&self) -> Driver {
        Driver::MySql
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
        query_mysql(self.pool(connection)?, sql, params).await
    }

    async fn exec_with(
        &self,
        connection: &str,
        sql: &str,
        params: Vec<DbValue>,
    ) -> Result<ExecResult> {
        exec_mysql(self.pool(connection)?, sql, params).await
    }

    async fn begin_tx_with(
        &self,
        connection: &str,
        level: IsolationLevel,
    ) -> Result<Transaction> {
        let mut conn = self.pool(connection)?.acquire().await?;
        // MySQL forbids changing transaction characteristics inside one, so
        // the level is set on the checked-out connection first.
        if let Some(name) = level.sql_name() {
            sqlx::query(&format!("SET TRANSACTION ISOLATION LEVEL {}", name))
                .execute(&mut *conn)
                .await?;
        }
        sqlx::query("START TRANSACTION").execute(&mut *conn).await?;
        Ok(Transaction::new(TxConn::MySql(conn), level))
    }
}

/// The driver reports the inserted id as u64; ids beyond i64 range cannot
/// be represented in [`ExecResult`] and come back as `None` rather than a
/// truncated value.
fn last_insert_id(raw: u64) -> Option<i64> {
    i64::try_from(raw).ok()
}

pub(crate) fn bind_mysql(
    query: Query<'_, MySql, MySqlArguments>,
    value: DbValue,
) -> Query<'_, MySql, MySqlArguments> {
    match value {
        DbValue::Null => query.bind(Option::<String>::None),
        DbValue::Bool(v) => query.bind(v),
        DbValue::TinyInt(v) => query.bind(v),
        DbValue::SmallInt(v) => query.bind(v),
        DbValue::Int(v) => query.bind(v),
        DbValue::BigInt(v) => query.bind(v),
        DbValue::UInt(v) => query.bind(v),
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

pub(crate) async fn query_mysql<'a, E>(
    executor: E,
    sql: &'a str,
    params: Vec<DbValue>,
) -> Result<Vec<Row>>
where
    E: sqlx::Executor<'a, Database = MySql>,
{
    log::debug!("mysql query: {} | params: {:?}", sql, params);
    let mut query = sqlx::query(sql);
    for value in params {
        query = bind_mysql(query, value);
    }
    let rows = query.fetch_all(executor).await?;
    rows.iter().map(decode_mysql_row).collect()
}

pub(crate) async fn exec_mysql<'a, E>(
    executor: E,
    sql: &'a str,
    params: Vec<DbValue>,
) -> Result<ExecResult>
where
    E: sqlx::Executor<'a, Database = MySql>,
{
    log::debug!("mysql exec: {} | params: {:?}", sql, params);
    let mut query = sqlx::query(sql);
    for value in params {
        query = bind_mysql(query, value);
    }
    match query.execute(executor).await {
        Ok(result) => Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: last_insert_id(result.last_insert_id()),
        }),
        Err(e) if is_benign_driver_error(&e.to_string()) => Ok(ExecResult::default()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_insert_id_out_of_range_is_none() {
        assert_eq!(last_insert_id(42), Some(42));
        assert_eq!(last_insert_id(i64::MAX as u64), Some(i64::MAX));
        assert_eq!(last_insert_id(i64::MAX as u64 + 1), None);
        assert_eq!(last_insert_id(u64::MAX), None);
    }
}
