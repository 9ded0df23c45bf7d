//! paneldb - a multi-dialect database access layer
//!
//! paneldb gives admin-panel style applications one API over MySQL,
//! PostgreSQL and SQLite (with a SQL Server dialect for statement
//! generation), with:
//! - Driver dialects for identifier quoting, placeholders and pagination
//! - Pooled connections with named sub-connections per configuration
//! - A recycled fluent statement builder with typed parameter binding
//! - Transactions with selectable isolation levels
//! - Driver-aware decoding of result rows into a canonical value type
//!
//! ```no_run
//! use paneldb::{connect, DatabaseConfig, DatabasesConfig, DialectRegistry, StatementPool};
//!
//! # async fn demo() -> paneldb::Result<()> {
//! let config = DatabasesConfig::single(DatabaseConfig::sqlite("panel.db"));
//! let registry = DialectRegistry::builtin();
//! let db = connect(config, &registry).await?;
//!
//! let pool = StatementPool::new();
//! let user = pool.table(&db, "users").find(1).await?;
//! # let _ = user;
//! # Ok(())
//! # }
//! ```

// Enforce error handling best practices
#![cfg_attr(
    not(test),
    warn(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
    )
)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used,))]

pub mod builder;
pub mod config;
pub mod connection;
pub mod decode;
pub mod dialect;
pub mod error;
pub mod transaction;
pub mod value;

// Re-export main types for public API
pub use builder::{PooledStatement, SortOrder, StatementPool};
pub use config::{DatabaseConfig, DatabasesConfig, DEFAULT_CONNECTION};
pub use connection::{connect, Connection, ExecResult};
pub use dialect::{Dialect, DialectRegistry, Driver};
pub use error::{Error, Result};
pub use transaction::{with_transaction, with_transaction_by_level, IsolationLevel, Transaction};
pub use value::{DbValue, Row};
