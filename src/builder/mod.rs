//! Fluent statement builder
//!
//! Queries are built through a [`StatementPool`]: `pool.table(&db, "users")`
//! checks out a [`PooledStatement`], fluent calls accumulate clauses, and a
//! terminal call such as [`PooledStatement::all`] renders the SQL for the
//! connection's dialect, binds the parameters and runs it.
//!
//! ```no_run
//! # use paneldb::{builder::StatementPool, connection::Connection, Result};
//! # use std::sync::Arc;
//! # async fn demo(db: Arc<dyn Connection>) -> Result<()> {
//! let pool = StatementPool::new();
//! let adults = pool
//!     .table(&db, "users")
//!     .select(["id", "name"])
//!     .where_gt("age", 18)
//!     .all()
//!     .await?;
//! # let _ = adults;
//! # Ok(())
//! # }
//! ```

mod pool;
mod statement;

pub use pool::{PooledStatement, StatementPool};
pub use statement::SortOrder;
