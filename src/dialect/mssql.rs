//! SQL Server dialect
//!
//! SQL Server has no native LIMIT/OFFSET; pagination wraps the statement in
//! `ROW_NUMBER() OVER (...)` windowing.

use super::{Dialect, Driver};

pub struct MssqlDialect;

impl Dialect for MssqlDialect {
    fn driver(&self) -> Driver {
        Driver::Mssql
    }

    fn delimiters(&self) -> (char, char) {
        ('[', ']')
    }

    fn placeholder(&self, position: usize) -> String {
        format!("@p{}", position)
    }

    fn group_concat(&self, expression: &str, separator: &str) -> String {
        format!(
            "string_agg({}, '{}')",
            expression,
            separator.replace('\'', "''")
        )
    }

    fn limit_offset(&self, _limit: Option<u64>, _offset: Option<u64>) -> String {
        String::new()
    }

    fn paginate(
        &self,
        sql: String,
        order: Option<&str>,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> String {
        if limit.is_none() && offset.is_none() {
            let mut sql = sql;
            if let Some(order) = order {
                sql.push_str(" ORDER BY ");
                sql.push_str(order);
            }
            return sql;
        }

        // ROW_NUMBER requires an ordering; (SELECT NULL) keeps the engine's
        // natural order when the caller gave none.
        let order = order.unwrap_or("(SELECT NULL)");
        let offset = offset.unwrap_or(0);
        let upper = match limit {
            Some(limit) => format!(" AND [row_number__] <= {}", offset + limit),
            None => String::new(),
        };
        format!(
            "SELECT * FROM (SELECT ROW_NUMBER() OVER (ORDER BY {}) AS [row_number__], \
             [inner__].* FROM ({}) AS [inner__]) AS [paged__] \
             WHERE [row_number__] > {}{}",
            order, sql, offset, upper
        )
    }
}
