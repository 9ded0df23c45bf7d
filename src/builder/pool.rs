//! Statement pool and the pooled builder guard
//!
//! [`StatementPool`] recycles [`Statement`] accumulators so steady-state query
//! building does not allocate a fresh clause set per query. [`PooledStatement`]
//! is the handle callers actually use: fluent methods accumulate clauses,
//! terminal methods consume the handle and run the statement. The guard's
//! `Drop` resets the accumulator and returns it to the pool exactly once,
//! whether a terminal ran, an error propagated, or the handle was abandoned.

use super::statement::{
    render_delete, render_insert, render_select, render_update, Field, Join, Predicate,
    RawUpdate, SortOrder, Statement,
};
use crate::connection::{Connection, ExecResult};
use crate::error::{Error, Result};
use crate::transaction::Transaction;
use crate::value::{DbValue, Row};
use std::sync::{Arc, Mutex};

/// Recycles statement accumulators across queries.
#[derive(Debug, Default)]
pub struct StatementPool {
    idle: Mutex<Vec<Statement>>,
}

impl StatementPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check out an accumulator targeting `table` on `db`. The returned guard
    /// puts the accumulator back when it goes out of scope.
    pub fn table<'t>(
        &self,
        db: &Arc<dyn Connection>,
        table: &str,
    ) -> PooledStatement<'_, 't> {
        let mut statement = self
            .idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop()
            .unwrap_or_default();
        debug_assert!(statement.is_reset());
        statement.table = table.to_string();
        PooledStatement {
            statement,
            pool: self,
            db: Arc::clone(db),
            tx: None,
        }
    }

    fn release(&self, mut statement: Statement) {
        statement.reset();
        self.idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(statement);
    }

    /// Number of accumulators currently idle in the pool.
    pub fn idle_count(&self) -> usize {
        self.idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// A checked-out statement builder bound to a connection, and optionally to
/// an open transaction.
///
/// Fluent methods take and return the guard by value; terminal methods
/// consume it, so a finished builder cannot be reused by mistake.
pub struct PooledStatement<'p, 't> {
    statement: Statement,
    pool: &'p StatementPool,
    db: Arc<dyn Connection>,
    tx: Option<&'t mut Transaction>,
}

impl<'p, 't> PooledStatement<'p, 't> {
    fn statement_mut(&mut self) -> &mut Statement {
        &mut self.statement
    }

    fn statement_ref(&self) -> &Statement {
        &self.statement
    }

    /// Select specific fields; `func(field)` expressions are recognized and
    /// rendered as aggregates.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.statement_mut().fields = fields
            .into_iter()
            .map(|field| Field::parse(field.as_ref()))
            .collect();
        self
    }

    /// Add one `field operator value` predicate; predicates combine with AND.
    pub fn where_op(mut self, field: &str, operator: &str, value: impl Into<DbValue>) -> Self {
        self.statement_mut().predicates.push(Predicate::Cmp {
            field: field.to_string(),
            operator: operator.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn where_eq(self, field: &str, value: impl Into<DbValue>) -> Self {
        self.where_op(field, "=", value)
    }

    pub fn where_ne(self, field: &str, value: impl Into<DbValue>) -> Self {
        self.where_op(field, "!=", value)
    }

    pub fn where_gt(self, field: &str, value: impl Into<DbValue>) -> Self {
        self.where_op(field, ">", value)
    }

    pub fn where_gte(self, field: &str, value: impl Into<DbValue>) -> Self {
        self.where_op(field, ">=", value)
    }

    pub fn where_lt(self, field: &str, value: impl Into<DbValue>) -> Self {
        self.where_op(field, "<", value)
    }

    pub fn where_lte(self, field: &str, value: impl Into<DbValue>) -> Self {
        self.where_op(field, "<=", value)
    }

    pub fn where_like(self, field: &str, pattern: &str) -> Self {
        self.where_op(field, "LIKE", pattern)
    }

    pub fn where_null(self, field: &str) -> Self {
        self.where_op(field, "=", DbValue::Null)
    }

    pub fn where_not_null(self, field: &str) -> Self {
        self.where_op(field, "!=", DbValue::Null)
    }

    pub fn where_in<I, V>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<DbValue>,
    {
        self.statement_mut().predicates.push(Predicate::In {
            field: field.to_string(),
            not: false,
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn where_not_in<I, V>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<DbValue>,
    {
        self.statement_mut().predicates.push(Predicate::In {
            field: field.to_string(),
            not: true,
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Append a raw WHERE fragment, with `?` rewritten to this dialect's
    /// placeholders and `args` bound in order. A `?` inside a single-quoted
    /// string literal stays literal.
    pub fn where_raw<I, V>(mut self, sql: &str, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<DbValue>,
    {
        self.statement_mut().predicates.push(Predicate::Raw {
            sql: sql.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn left_join(
        mut self,
        table: &str,
        left_field: &str,
        operator: &str,
        right_field: &str,
    ) -> Self {
        self.statement_mut().joins.push(Join {
            table: table.to_string(),
            left: left_field.to_string(),
            operator: operator.to_string(),
            right: right_field.to_string(),
        });
        self
    }

    pub fn order_by(mut self, field: &str, direction: SortOrder) -> Self {
        self.statement_mut()
            .order_bys
            .push((field.to_string(), direction));
        self
    }

    pub fn order_by_raw(mut self, raw: &str) -> Self {
        self.statement_mut().order_by_raw = Some(raw.to_string());
        self
    }

    pub fn group_by(mut self, field: &str) -> Self {
        self.statement_mut().group_bys.push(field.to_string());
        self
    }

    pub fn group_by_raw(mut self, raw: &str) -> Self {
        self.statement_mut().group_by_raw = Some(raw.to_string());
        self
    }

    pub fn skip(mut self, offset: u64) -> Self {
        self.statement_mut().offset = Some(offset);
        self
    }

    pub fn take(mut self, limit: u64) -> Self {
        self.statement_mut().limit = Some(limit);
        self
    }

    /// Queue a raw SET fragment for [`exec`](Self::exec) or
    /// [`update`](Self::update), e.g. `views = views + ?`. Placeholder
    /// rewriting follows the [`where_raw`](Self::where_raw) rules.
    pub fn update_raw<I, V>(mut self, expression: &str, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<DbValue>,
    {
        self.statement_mut().raw_updates.push(RawUpdate {
            expression: expression.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Route the statement to a named sub-connection instead of "default".
    pub fn with_connection(mut self, name: &str) -> Self {
        self.statement_mut().connection = name.to_string();
        self
    }

    /// Run the statement inside an open transaction instead of the pool.
    pub fn with_tx(mut self, tx: &'t mut Transaction) -> Self {
        self.tx = Some(tx);
        self
    }

    async fn run_query(
        &mut self,
        connection: &str,
        sql: &str,
        params: Vec<DbValue>,
    ) -> Result<Vec<Row>> {
        match self.tx.as_deref_mut() {
            Some(tx) => tx.query(sql, params).await,
            None => self.db.query_with(connection, sql, params).await,
        }
    }

    async fn run_exec(
        &mut self,
        connection: &str,
        sql: &str,
        params: Vec<DbValue>,
    ) -> Result<ExecResult> {
        match self.tx.as_deref_mut() {
            Some(tx) => tx.exec(sql, params).await,
            None => self.db.exec_with(connection, sql, params).await,
        }
    }

    /// Run the SELECT and return the first row, or [`Error::NoRows`].
    pub async fn first(mut self) -> Result<Row> {
        let dialect = self.db.dialect();
        let (connection, sql, params) = {
            let statement = self.statement_ref();
            let (sql, params) = render_select(statement, dialect.as_ref());
            (statement.connection_name().to_string(), sql, params)
        };
        let rows = self.run_query(&connection, &sql, params).await?;
        rows.into_iter().next().ok_or(Error::NoRows)
    }

    /// Run the SELECT and return every row.
    pub async fn all(mut self) -> Result<Vec<Row>> {
        let dialect = self.db.dialect();
        let (connection, sql, params) = {
            let statement = self.statement_ref();
            let (sql, params) = render_select(statement, dialect.as_ref());
            (statement.connection_name().to_string(), sql, params)
        };
        self.run_query(&connection, &sql, params).await
    }

    /// Fetch the row whose `id` column equals `id`.
    pub async fn find(self, id: impl Into<DbValue>) -> Result<Row> {
        self.where_eq("id", id).first().await
    }

    async fn aggregate(mut self, function: &str, field: &str) -> Result<DbValue> {
        self.statement_mut().fields = vec![Field {
            function: Some(function.to_string()),
            name: field.to_string(),
        }];
        let dialect = self.db.dialect();
        let (connection, sql, params) = {
            let statement = self.statement_ref();
            let (sql, params) = render_select(statement, dialect.as_ref());
            (statement.connection_name().to_string(), sql, params)
        };
        let rows = self.run_query(&connection, &sql, params).await?;
        let row = match rows.into_iter().next() {
            Some(row) => row,
            None => return Ok(DbValue::Null),
        };
        let key = dialect.aggregate_key(function, field);
        Ok(row
            .get(&key)
            .cloned()
            .or_else(|| row.values().next().cloned())
            .unwrap_or(DbValue::Null))
    }

    /// `COUNT(*)` over the accumulated predicates; 0 when nothing matches.
    pub async fn count(self) -> Result<i64> {
        Ok(self.aggregate("count", "*").await?.as_i64().unwrap_or(0))
    }

    /// `SUM(field)`; 0.0 over an empty set.
    pub async fn sum(self, field: &str) -> Result<f64> {
        Ok(self.aggregate("sum", field).await?.as_f64().unwrap_or(0.0))
    }

    /// `AVG(field)`; 0.0 over an empty set.
    pub async fn avg(self, field: &str) -> Result<f64> {
        Ok(self.aggregate("avg", field).await?.as_f64().unwrap_or(0.0))
    }

    /// `MAX(field)`; 0.0 over an empty set.
    pub async fn max(self, field: &str) -> Result<f64> {
        Ok(self.aggregate("max", field).await?.as_f64().unwrap_or(0.0))
    }

    /// `MIN(field)`; 0.0 over an empty set.
    pub async fn min(self, field: &str) -> Result<f64> {
        Ok(self.aggregate("min", field).await?.as_f64().unwrap_or(0.0))
    }

    /// Insert one row and return its identifier.
    ///
    /// On drivers without a native last-insert-id the statement carries a
    /// `RETURNING` clause when the dialect reports the table supports it;
    /// otherwise 0 comes back.
    pub async fn insert<K, V>(
        mut self,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> Result<i64>
    where
        K: Into<String>,
        V: Into<DbValue>,
    {
        self.statement_mut().values = values
            .into_iter()
            .map(|(column, value)| (column.into(), value.into()))
            .collect();

        let dialect = self.db.dialect();
        let returning = !dialect.supports_last_insert_id()
            && dialect.supports_returning_id(&self.statement_ref().table);
        let (connection, sql, params) = {
            let statement = self.statement_ref();
            let (sql, params) = render_insert(statement, dialect.as_ref(), returning)?;
            (statement.connection_name().to_string(), sql, params)
        };

        if returning {
            let rows = self.run_query(&connection, &sql, params).await?;
            let row = rows.into_iter().next().ok_or(Error::NoRows)?;
            Ok(row
                .get("id")
                .and_then(DbValue::as_i64)
                .or_else(|| row.values().next().and_then(DbValue::as_i64))
                .unwrap_or(0))
        } else {
            let result = self.run_exec(&connection, &sql, params).await?;
            Ok(result.last_insert_id.unwrap_or(0))
        }
    }

    /// Update matching rows and return the affected count;
    /// [`Error::NoAffectedRows`] when nothing matched.
    pub async fn update<K, V>(
        mut self,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> Result<u64>
    where
        K: Into<String>,
        V: Into<DbValue>,
    {
        self.statement_mut().values = values
            .into_iter()
            .map(|(column, value)| (column.into(), value.into()))
            .collect();
        self.run_update().await
    }

    /// Run the queued [`update_raw`](Self::update_raw) fragments as an UPDATE.
    pub async fn exec(mut self) -> Result<u64> {
        if self.statement_ref().raw_updates.is_empty() {
            return Err(Error::MissingClause {
                clause: "update_raw".to_string(),
            });
        }
        self.statement_mut().values.clear();
        self.run_update().await
    }

    async fn run_update(mut self) -> Result<u64> {
        let dialect = self.db.dialect();
        let (connection, sql, params) = {
            let statement = self.statement_ref();
            let (sql, params) = render_update(statement, dialect.as_ref())?;
            (statement.connection_name().to_string(), sql, params)
        };
        let result = self.run_exec(&connection, &sql, params).await?;
        if result.rows_affected == 0 {
            return Err(Error::NoAffectedRows);
        }
        Ok(result.rows_affected)
    }

    /// Delete matching rows and return the affected count;
    /// [`Error::NoAffectedRows`] when nothing matched. With no predicates
    /// this deletes every row in the table.
    pub async fn delete(mut self) -> Result<u64> {
        let dialect = self.db.dialect();
        let (connection, sql, params) = {
            let statement = self.statement_ref();
            let (sql, params) = render_delete(statement, dialect.as_ref());
            (statement.connection_name().to_string(), sql, params)
        };
        let result = self.run_exec(&connection, &sql, params).await?;
        if result.rows_affected == 0 {
            return Err(Error::NoAffectedRows);
        }
        Ok(result.rows_affected)
    }
}

impl Drop for PooledStatement<'_, '_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.statement));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Dialect, DialectRegistry, Driver};
    use crate::transaction::IsolationLevel;
    use async_trait::async_trait;

    /// Records every statement it is asked to run and replies with canned
    /// results.
    struct RecordingConnection {
        dialect: Arc<dyn Dialect>,
        statements: Mutex<Vec<(String, String, Vec<DbValue>)>>,
        rows: Vec<Row>,
        exec_result: ExecResult,
    }

    impl RecordingConnection {
        fn new(driver: Driver) -> Arc<Self> {
            Arc::new(Self {
                dialect: DialectRegistry::builtin().get(driver).unwrap(),
                statements: Mutex::new(Vec::new()),
                rows: Vec::new(),
                exec_result: ExecResult {
                    rows_affected: 1,
                    last_insert_id: Some(42),
                },
            })
        }

        fn recorded(&self) -> Vec<(String, String, Vec<DbValue>)> {
            self.statements.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Connection for RecordingConnection {
        fn driver(&self) -> Driver {
            self.dialect.driver()
        }

        fn dialect(&self) -> Arc<dyn Dialect> {
            Arc::clone(&self.dialect)
        }

        async fn init(&self) -> Result<()> {
            Ok(())
        }

        async fn query_with(
            &self,
            connection: &str,
            sql: &str,
            params: Vec<DbValue>,
        ) -> Result<Vec<Row>> {
            self.statements.lock().unwrap().push((
                connection.to_string(),
                sql.to_string(),
                params,
            ));
            Ok(self.rows.clone())
        }

        async fn exec_with(
            &self,
            connection: &str,
            sql: &str,
            params: Vec<DbValue>,
        ) -> Result<ExecResult> {
            self.statements.lock().unwrap().push((
                connection.to_string(),
                sql.to_string(),
                params,
            ));
            Ok(self.exec_result)
        }

        async fn begin_tx_with(
            &self,
            _connection: &str,
            _level: IsolationLevel,
        ) -> Result<Transaction> {
            Err(Error::transaction("not supported by the test double"))
        }
    }

    #[test]
    fn test_drop_returns_statement_to_pool() {
        let pool = StatementPool::new();
        let db: Arc<dyn Connection> = RecordingConnection::new(Driver::Sqlite);

        let guard = pool.table(&db, "users").where_eq("id", 1).take(5);
        assert_eq!(pool.idle_count(), 0);
        drop(guard);
        assert_eq!(pool.idle_count(), 1);

        // the recycled accumulator comes back clean
        let guard = pool.table(&db, "posts");
        assert!(guard.statement_ref().predicates.is_empty());
        assert_eq!(guard.statement_ref().table, "posts");
        assert!(guard.statement_ref().limit.is_none());
        drop(guard);
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn test_terminal_releases_exactly_once() {
        let pool = StatementPool::new();
        let recording = RecordingConnection::new(Driver::Sqlite);
        let db: Arc<dyn Connection> = recording.clone();

        let rows = pool.table(&db, "users").where_gt("age", 18).all().await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(pool.idle_count(), 1);

        let recorded = recording.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].1, "SELECT * FROM `users` WHERE `age` > ?");
        assert_eq!(recorded[0].2, vec![DbValue::Int(18)]);
    }

    #[tokio::test]
    async fn test_first_on_empty_result_is_no_rows() {
        let pool = StatementPool::new();
        let db: Arc<dyn Connection> = RecordingConnection::new(Driver::Sqlite);
        let err = pool.table(&db, "users").first().await.unwrap_err();
        assert!(err.is_no_rows());
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn test_insert_uses_driver_last_insert_id() {
        let pool = StatementPool::new();
        let recording = RecordingConnection::new(Driver::MySql);
        let db: Arc<dyn Connection> = recording.clone();
        let id = pool
            .table(&db, "users")
            .insert([("name", "ann")])
            .await
            .unwrap();
        assert_eq!(id, 42);

        let recorded = recording.recorded();
        assert_eq!(recorded[0].1, "INSERT INTO `users` (`name`) VALUES (?)");
    }

    #[tokio::test]
    async fn test_exec_without_raw_updates_is_missing_clause() {
        let pool = StatementPool::new();
        let db: Arc<dyn Connection> = RecordingConnection::new(Driver::MySql);
        let err = pool.table(&db, "users").exec().await.unwrap_err();
        assert!(matches!(err, Error::MissingClause { .. }));
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn test_with_connection_routes_to_named_pool() {
        let pool = StatementPool::new();
        let recording = RecordingConnection::new(Driver::MySql);
        let db: Arc<dyn Connection> = recording.clone();
        pool.table(&db, "events")
            .with_connection("logs")
            .all()
            .await
            .unwrap();
        let recorded = recording.recorded();
        assert_eq!(recorded[0].0, "logs");
    }
}
