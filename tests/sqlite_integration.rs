//! End-to-end tests against a file-backed SQLite database.

use futures::FutureExt;
use paneldb::connection::SqliteAdapter;
use paneldb::{
    connect, with_transaction, Connection, DatabaseConfig, DatabasesConfig, DbValue,
    DialectRegistry, Driver, Error, IsolationLevel, StatementPool,
};
use std::sync::Arc;
use tempfile::TempDir;

async fn open_db(dir: &TempDir) -> Arc<dyn Connection> {
    let path = dir.path().join("test.db");
    let config = DatabasesConfig::single(DatabaseConfig::sqlite(path.to_string_lossy()));
    connect(config, &DialectRegistry::builtin()).await.unwrap()
}

async fn create_users(db: &Arc<dyn Connection>) {
    db.exec(
        "CREATE TABLE users (\
         id INTEGER PRIMARY KEY AUTOINCREMENT, \
         name TEXT NOT NULL, \
         age INTEGER, \
         deleted_at DATETIME)",
        vec![],
    )
    .await
    .unwrap();
}

async fn create_widgets(db: &Arc<dyn Connection>) {
    db.exec(
        "CREATE TABLE widgets (\
         id INTEGER PRIMARY KEY AUTOINCREMENT, \
         name TEXT NOT NULL, \
         price REAL NOT NULL)",
        vec![],
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_crud_round_trip() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir).await;
    create_users(&db).await;
    let pool = StatementPool::new();

    let id = pool
        .table(&db, "users")
        .insert([
            ("name", DbValue::from("ann")),
            ("age", DbValue::Int(30)),
            ("deleted_at", DbValue::Null),
        ])
        .await
        .unwrap();
    assert_eq!(id, 1);

    let row = pool.table(&db, "users").find(id).await.unwrap();
    assert_eq!(row.get("name").and_then(DbValue::as_str), Some("ann"));
    assert_eq!(row.get("age").and_then(DbValue::as_i64), Some(30));
    assert!(row.get("deleted_at").is_some_and(DbValue::is_null));

    let affected = pool
        .table(&db, "users")
        .where_eq("id", id)
        .update([("age", DbValue::Int(31))])
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let row = pool.table(&db, "users").find(id).await.unwrap();
    assert_eq!(row.get("age").and_then(DbValue::as_i64), Some(31));

    let affected = pool
        .table(&db, "users")
        .where_eq("id", id)
        .delete()
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let err = pool.table(&db, "users").find(id).await.unwrap_err();
    assert!(err.is_no_rows());
}

#[tokio::test]
async fn test_update_nothing_is_no_affected_rows() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir).await;
    create_users(&db).await;
    let pool = StatementPool::new();

    let err = pool
        .table(&db, "users")
        .where_eq("id", 999)
        .update([("age", DbValue::Int(1))])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoAffectedRows));

    let err = pool
        .table(&db, "users")
        .where_eq("id", 999)
        .delete()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoAffectedRows));
}

#[tokio::test]
async fn test_aggregates_over_widget_prices() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir).await;
    create_widgets(&db).await;
    let pool = StatementPool::new();

    for (name, price) in [("nut", 2.5), ("bolt", 7.5), ("gear", 20.5)] {
        pool.table(&db, "widgets")
            .insert([("name", DbValue::from(name)), ("price", DbValue::Double(price))])
            .await
            .unwrap();
    }

    assert_eq!(pool.table(&db, "widgets").count().await.unwrap(), 3);
    assert_eq!(pool.table(&db, "widgets").sum("price").await.unwrap(), 30.5);
    assert_eq!(pool.table(&db, "widgets").max("price").await.unwrap(), 20.5);
    assert_eq!(pool.table(&db, "widgets").min("price").await.unwrap(), 2.5);

    let deleted = pool.table(&db, "widgets").delete().await.unwrap();
    assert_eq!(deleted, 3);

    // aggregates over an empty set report zero, not an error
    assert_eq!(pool.table(&db, "widgets").count().await.unwrap(), 0);
    assert_eq!(pool.table(&db, "widgets").sum("price").await.unwrap(), 0.0);
    assert_eq!(pool.table(&db, "widgets").max("price").await.unwrap(), 0.0);
}

#[tokio::test]
async fn test_filters_ordering_and_pagination() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir).await;
    create_users(&db).await;
    let pool = StatementPool::new();

    for (name, age) in [("ann", 30), ("bo", 17), ("cy", 45), ("dee", 22)] {
        pool.table(&db, "users")
            .insert([("name", DbValue::from(name)), ("age", DbValue::Int(age))])
            .await
            .unwrap();
    }

    let adults = pool
        .table(&db, "users")
        .select(["name", "age"])
        .where_gt("age", 18)
        .order_by("age", paneldb::SortOrder::Desc)
        .all()
        .await
        .unwrap();
    let names: Vec<&str> = adults
        .iter()
        .filter_map(|row| row.get("name").and_then(DbValue::as_str))
        .collect();
    assert_eq!(names, vec!["cy", "ann", "dee"]);

    let page = pool
        .table(&db, "users")
        .order_by("age", paneldb::SortOrder::Asc)
        .skip(1)
        .take(2)
        .all()
        .await
        .unwrap();
    let names: Vec<&str> = page
        .iter()
        .filter_map(|row| row.get("name").and_then(DbValue::as_str))
        .collect();
    assert_eq!(names, vec!["dee", "ann"]);

    let picked = pool
        .table(&db, "users")
        .where_in("name", ["ann", "bo"])
        .count()
        .await
        .unwrap();
    assert_eq!(picked, 2);

    let raw = pool
        .table(&db, "users")
        .where_raw("age BETWEEN ? AND ?", [DbValue::Int(20), DbValue::Int(40)])
        .count()
        .await
        .unwrap();
    assert_eq!(raw, 2);
}

#[tokio::test]
async fn test_statement_recycling_leaves_no_stale_clauses() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir).await;
    create_users(&db).await;
    let pool = StatementPool::new();

    for (name, age) in [("ann", 30), ("bo", 17)] {
        pool.table(&db, "users")
            .insert([("name", DbValue::from(name)), ("age", DbValue::Int(age))])
            .await
            .unwrap();
    }

    let filtered = pool
        .table(&db, "users")
        .where_gt("age", 18)
        .count()
        .await
        .unwrap();
    assert_eq!(filtered, 1);

    // the recycled accumulator must not keep the previous predicate
    let total = pool.table(&db, "users").count().await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(pool.idle_count(), 1);
}

#[tokio::test]
async fn test_exec_raw_update_fragment() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir).await;
    create_users(&db).await;
    let pool = StatementPool::new();

    pool.table(&db, "users")
        .insert([("name", DbValue::from("ann")), ("age", DbValue::Int(30))])
        .await
        .unwrap();

    let affected = pool
        .table(&db, "users")
        .update_raw("age = age + ?", [DbValue::Int(5)])
        .where_eq("name", "ann")
        .exec()
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let row = pool.table(&db, "users").first().await.unwrap();
    assert_eq!(row.get("age").and_then(DbValue::as_i64), Some(35));
}

#[tokio::test]
async fn test_transaction_commit_and_rollback() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir).await;
    create_users(&db).await;
    let pool = StatementPool::new();

    let mut tx = db.begin_tx(IsolationLevel::Serializable).await.unwrap();
    pool.table(&db, "users")
        .with_tx(&mut tx)
        .insert([("name", DbValue::from("ann")), ("age", DbValue::Int(30))])
        .await
        .unwrap();
    tx.commit().await.unwrap();
    assert_eq!(pool.table(&db, "users").count().await.unwrap(), 1);

    let mut tx = db.begin_tx(IsolationLevel::Default).await.unwrap();
    pool.table(&db, "users")
        .with_tx(&mut tx)
        .insert([("name", DbValue::from("bo")), ("age", DbValue::Int(17))])
        .await
        .unwrap();
    tx.rollback().await.unwrap();
    assert_eq!(pool.table(&db, "users").count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_with_transaction_rolls_back_on_error() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir).await;
    create_users(&db).await;
    let pool = StatementPool::new();

    let result: Result<(), Error> = with_transaction(db.as_ref(), |tx| {
        async move {
            tx.exec(
                "INSERT INTO users (name, age) VALUES (?, ?)",
                vec![DbValue::from("ghost"), DbValue::Int(1)],
            )
            .await?;
            Err(Error::transaction("forced failure"))
        }
        .boxed()
    })
    .await;
    assert!(result.is_err());
    assert_eq!(pool.table(&db, "users").count().await.unwrap(), 0);

    let inserted = with_transaction(db.as_ref(), |tx| {
        async move {
            tx.exec(
                "INSERT INTO users (name, age) VALUES (?, ?)",
                vec![DbValue::from("ann"), DbValue::Int(30)],
            )
            .await?;
            Ok(1_i64)
        }
        .boxed()
    })
    .await
    .unwrap();
    assert_eq!(inserted, 1);
    assert_eq!(pool.table(&db, "users").count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_named_sub_connections() {
    let dir = TempDir::new().unwrap();
    let main = dir.path().join("main.db");
    let logs = dir.path().join("logs.db");
    let mut config =
        DatabasesConfig::single(DatabaseConfig::sqlite(main.to_string_lossy()));
    config.add("logs", DatabaseConfig::sqlite(logs.to_string_lossy()));
    let db = connect(config, &DialectRegistry::builtin()).await.unwrap();
    let pool = StatementPool::new();

    db.exec("CREATE TABLE here (id INTEGER)", vec![]).await.unwrap();
    db.exec_with("logs", "CREATE TABLE there (id INTEGER)", vec![])
        .await
        .unwrap();

    pool.table(&db, "there")
        .with_connection("logs")
        .insert([("id", DbValue::Int(1))])
        .await
        .unwrap();

    assert_eq!(
        pool.table(&db, "there")
            .with_connection("logs")
            .count()
            .await
            .unwrap(),
        1
    );
    // the default sub-connection does not see the other database's table
    assert!(pool.table(&db, "there").count().await.is_err());
}

#[tokio::test]
async fn test_null_round_trip_and_null_filters() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir).await;
    create_users(&db).await;
    let pool = StatementPool::new();

    pool.table(&db, "users")
        .insert([("name", DbValue::from("ann")), ("age", DbValue::Null)])
        .await
        .unwrap();
    pool.table(&db, "users")
        .insert([("name", DbValue::from("bo")), ("age", DbValue::Int(17))])
        .await
        .unwrap();

    let unknown_age = pool
        .table(&db, "users")
        .where_null("age")
        .all()
        .await
        .unwrap();
    assert_eq!(unknown_age.len(), 1);
    assert_eq!(
        unknown_age[0].get("name").and_then(DbValue::as_str),
        Some("ann")
    );
    assert!(unknown_age[0].get("age").is_some_and(DbValue::is_null));

    let known_age = pool
        .table(&db, "users")
        .where_not_null("age")
        .count()
        .await
        .unwrap();
    assert_eq!(known_age, 1);
}

#[tokio::test]
async fn test_concurrent_init_opens_each_pool_once() {
    let dir = TempDir::new().unwrap();
    let main = dir.path().join("main.db");
    let logs = dir.path().join("logs.db");
    let mut config =
        DatabasesConfig::single(DatabaseConfig::sqlite(main.to_string_lossy()));
    config.add("logs", DatabaseConfig::sqlite(logs.to_string_lossy()));

    // built directly so no init has run yet; the first init happens in the
    // racing tasks below
    let dialect = DialectRegistry::builtin().get(Driver::Sqlite).unwrap();
    let db: Arc<dyn Connection> = Arc::new(SqliteAdapter::new(config, dialect));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let db = Arc::clone(&db);
        handles.push(tokio::spawn(async move { db.init().await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // one pool per sub-connection, both opened and usable
    db.exec("CREATE TABLE marks (id INTEGER)", vec![]).await.unwrap();
    db.exec_with("logs", "CREATE TABLE marks (id INTEGER)", vec![])
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let db = Arc::clone(&db);
        let name = if i % 2 == 0 { "default" } else { "logs" };
        handles.push(tokio::spawn(async move {
            db.exec_with(
                name,
                "INSERT INTO marks (id) VALUES (?)",
                vec![DbValue::Int(i)],
            )
            .await
            .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let pool = StatementPool::new();
    assert_eq!(pool.table(&db, "marks").count().await.unwrap(), 4);
    assert_eq!(
        pool.table(&db, "marks")
            .with_connection("logs")
            .count()
            .await
            .unwrap(),
        4
    );
}

#[tokio::test]
async fn test_concurrent_queries_share_one_pool() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir).await;
    create_users(&db).await;

    // init already ran in connect; calling it again must be a no-op
    db.init().await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let db = Arc::clone(&db);
        handles.push(tokio::spawn(async move {
            let pool = StatementPool::new();
            pool.table(&db, "users")
                .insert([
                    ("name", DbValue::from(format!("user-{}", i))),
                    ("age", DbValue::Int(i)),
                ])
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let pool = StatementPool::new();
    assert_eq!(pool.table(&db, "users").count().await.unwrap(), 8);
}
