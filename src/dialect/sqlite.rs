//! SQLite dialect

use super::{Dialect, Driver};

pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn driver(&self) -> Driver {
        Driver::Sqlite
    }

    fn delimiters(&self) -> (char, char) {
        ('`', '`')
    }

    fn placeholder(&self, _position: usize) -> String {
        "?".to_string()
    }

    fn group_concat(&self, expression: &str, separator: &str) -> String {
        // SQLite group_concat takes the separator as a second argument
        format!(
            "group_concat({}, '{}')",
            expression,
            separator.replace('\'', "''")
        )
    }
}
