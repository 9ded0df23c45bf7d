//! Transaction wrapper
//!
//! A [`Transaction`] owns one driver connection checked out of its
//! sub-connection pool, with a transaction opened on it at a fixed
//! isolation level. `commit` and `rollback` consume the wrapper, so issuing
//! a statement after the transaction terminated is not representable.
//! Dropping an open transaction detaches the connection from the pool; the
//! server rolls the transaction back when the connection closes. That is
//! also the safety net for panics inside [`with_transaction`] units of work.

use crate::connection::{
    mysql::{exec_mysql, query_mysql},
    postgres::{exec_postgres, query_postgres},
    sqlite::{exec_sqlite, query_sqlite},
    Connection, ExecResult,
};
use crate::error::{Error, Result};
use crate::value::{DbValue, Row};
use futures::future::BoxFuture;
use sqlx::pool::PoolConnection;
use sqlx::{MySql, Postgres, Sqlite};

/// Transaction isolation levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// The driver's default level
    #[default]
    Default,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// SQL spelling of the level, `None` for the driver default.
    pub fn sql_name(&self) -> Option<&'static str> {
        match self {
            IsolationLevel::Default => None,
            IsolationLevel::ReadUncommitted => Some("READ UNCOMMITTED"),
            IsolationLevel::ReadCommitted => Some("READ COMMITTED"),
            IsolationLevel::RepeatableRead => Some("REPEATABLE READ"),
            IsolationLevel::Serializable => Some("SERIALIZABLE"),
        }
    }
}

pub(crate) enum TxConn {
    MySql(PoolConnection<MySql>),
    Postgres(PoolConnection<Postgres>),
    Sqlite(PoolConnection<Sqlite>),
}

/// An open transaction on one sub-connection.
///
/// All operations take `&mut self`: one open transaction belongs to one
/// logical caller, and statements apply in issue order.
pub struct Transaction {
    conn: Option<TxConn>,
    level: IsolationLevel,
}

impl Transaction {
    pub(crate) fn new(conn: TxConn, level: IsolationLevel) -> Self {
        Self {
            conn: Some(conn),
            level,
        }
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.level
    }

    fn conn(&mut self) -> Result<&mut TxConn> {
        self.conn
            .as_mut()
            .ok_or_else(|| Error::transaction("transaction already terminated"))
    }

    /// Run a SELECT inside the transaction.
    pub async fn query(&mut self, sql: &str, params: Vec<DbValue>) -> Result<Vec<Row>> {
        match self.conn()? {
            TxConn::MySql(conn) => query_mysql(&mut **conn, sql, params).await,
            TxConn::Postgres(conn) => query_postgres(&mut **conn, sql, params).await,
            TxConn::Sqlite(conn) => query_sqlite(&mut **conn, sql, params).await,
        }
    }

    /// Run a data-modifying statement inside the transaction.
    pub async fn exec(&mut self, sql: &str, params: Vec<DbValue>) -> Result<ExecResult> {
        match self.conn()? {
            TxConn::MySql(conn) => exec_mysql(&mut **conn, sql, params).await,
            TxConn::Postgres(conn) => exec_postgres(&mut **conn, sql, params).await,
            TxConn::Sqlite(conn) => exec_sqlite(&mut **conn, sql, params).await,
        }
    }

    pub async fn commit(mut self) -> Result<()> {
        self.end("COMMIT").await
    }

    pub async fn rollback(mut self) -> Result<()> {
        self.end("ROLLBACK").await
    }

    async fn end(&mut self, sql: &str) -> Result<()> {
        match self.conn.take() {
            Some(TxConn::MySql(mut conn)) => {
                sqlx::query(sql).execute(&mut *conn).await?;
            }
            Some(TxConn::Postgres(mut conn)) => {
                sqlx::query(sql).execute(&mut *conn).await?;
            }
            Some(TxConn::Sqlite(mut conn)) => {
                sqlx::query(sql).execute(&mut *conn).await?;
            }
            None => return Err(Error::transaction("transaction already terminated")),
        }
        Ok(())
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        // An open transaction must not leak its connection back into the
        // pool; detaching closes the connection and the server rolls back.
        if let Some(conn) = self.conn.take() {
            log::warn!("transaction dropped while open; discarding its connection");
            match conn {
                TxConn::MySql(conn) => drop(conn.detach()),
                TxConn::Postgres(conn) => drop(conn.detach()),
                TxConn::Sqlite(conn) => drop(conn.detach()),
            }
        }
    }
}

/// Run a unit of work in a transaction at the driver's default isolation
/// level: commit when it returns `Ok`, roll back when it returns `Err`.
pub async fn with_transaction<T, F>(db: &dyn Connection, work: F) -> Result<T>
where
    F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, Result<T>>,
{
    with_transaction_by_level(db, IsolationLevel::Default, work).await
}

/// Like [`with_transaction`] with an explicit isolation level.
pub async fn with_transaction_by_level<T, F>(
    db: &dyn Connection,
    level: IsolationLevel,
    work: F,
) -> Result<T>
where
    F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, Result<T>>,
{
    let mut tx = db.begin_tx(level).await?;
    match work(&mut tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                log::error!("rollback failed: {}", rollback_err);
            }
            Err(e)
        }
    }
}
