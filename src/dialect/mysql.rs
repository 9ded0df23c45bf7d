//! MySQL dialect

use super::{Dialect, Driver};

pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn driver(&self) -> Driver {
        Driver::MySql
    }

    fn delimiters(&self) -> (char, char) {
        ('`', '`')
    }

    fn placeholder(&self, _position: usize) -> String {
        "?".to_string()
    }

    fn group_concat(&self, expression: &str, separator: &str) -> String {
        format!(
            "group_concat({} SEPARATOR '{}')",
            expression,
            separator.replace('\'', "''")
        )
    }
}
