//! Statement accumulation and SQL rendering
//!
//! [`Statement`] is the plain clause accumulator held by the pool; rendering
//! delegates all backend-specific syntax to the bound [`Dialect`]. Parameter
//! positions are threaded through one [`ParamWriter`] per rendered statement
//! so `$n`-style placeholders number correctly across SET and WHERE clauses.

use crate::config::DEFAULT_CONNECTION;
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::value::DbValue;
use indexmap::IndexMap;

/// Sort direction for `order_by`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// A selected field, with the aggregate wrapper split off when the caller
/// wrote `func(field)`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Field {
    pub function: Option<String>,
    pub name: String,
}

impl Field {
    pub(crate) fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Some(open) = trimmed.find('(') {
            if trimmed.ends_with(')') && open > 0 {
                return Field {
                    function: Some(trimmed[..open].trim().to_string()),
                    name: trimmed[open + 1..trimmed.len() - 1].trim().to_string(),
                };
            }
        }
        Field {
            function: None,
            name: trimmed.to_string(),
        }
    }

    fn render(&self, dialect: &dyn Dialect) -> String {
        match &self.function {
            Some(function) => format!("{}({})", function, dialect.quote(&self.name)),
            None => dialect.quote(&self.name),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Predicate {
    Cmp {
        field: String,
        operator: String,
        value: DbValue,
    },
    In {
        field: String,
        not: bool,
        values: Vec<DbValue>,
    },
    Raw {
        sql: String,
        args: Vec<DbValue>,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct Join {
    pub table: String,
    pub left: String,
    pub operator: String,
    pub right: String,
}

#[derive(Debug, Clone)]
pub(crate) struct RawUpdate {
    pub expression: String,
    pub args: Vec<DbValue>,
}

/// One logical query's accumulated clauses. Zeroed on release back to the
/// pool; a fresh instance starts from `Default`.
#[derive(Debug, Default)]
pub(crate) struct Statement {
    pub table: String,
    pub fields: Vec<Field>,
    pub predicates: Vec<Predicate>,
    pub joins: Vec<Join>,
    pub order_bys: Vec<(String, SortOrder)>,
    pub order_by_raw: Option<String>,
    pub group_bys: Vec<String>,
    pub group_by_raw: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub values: IndexMap<String, DbValue>,
    pub raw_updates: Vec<RawUpdate>,
    pub connection: String,
}

impl Statement {
    pub fn reset(&mut self) {
        *self = Statement::default();
    }

    pub fn is_reset(&self) -> bool {
        self.table.is_empty()
            && self.fields.is_empty()
            && self.predicates.is_empty()
            && self.joins.is_empty()
            && self.order_bys.is_empty()
            && self.order_by_raw.is_none()
            && self.group_bys.is_empty()
            && self.group_by_raw.is_none()
            && self.limit.is_none()
            && self.offset.is_none()
            && self.values.is_empty()
            && self.raw_updates.is_empty()
            && self.connection.is_empty()
    }

    pub fn connection_name(&self) -> &str {
        if self.connection.is_empty() {
            DEFAULT_CONNECTION
        } else {
            &self.connection
        }
    }
}

/// Threads placeholder positions through one rendered statement.
struct ParamWriter<'d> {
    dialect: &'d dyn Dialect,
    position: usize,
}

impl<'d> ParamWriter<'d> {
    fn new(dialect: &'d dyn Dialect) -> Self {
        Self {
            dialect,
            position: 0,
        }
    }

    fn next(&mut self) -> String {
        self.position += 1;
        self.dialect.placeholder(self.position)
    }

    /// Rewrite each `?` in a raw fragment into this dialect's placeholder,
    /// keeping global numbering intact. A `?` inside a single-quoted string
    /// literal is not a parameter marker and passes through unchanged
    /// (a doubled `''` escape toggles the state twice, which nets out).
    fn rewrite_raw(&mut self, raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        let mut in_string = false;
        for ch in raw.chars() {
            match ch {
                '\'' => {
                    in_string = !in_string;
                    out.push(ch);
                }
                '?' if !in_string => out.push_str(&self.next()),
                _ => out.push(ch),
            }
        }
        out
    }
}

fn render_wheres(
    statement: &Statement,
    dialect: &dyn Dialect,
    writer: &mut ParamWriter<'_>,
    params: &mut Vec<DbValue>,
) -> Option<String> {
    if statement.predicates.is_empty() {
        return None;
    }

    let mut clauses = Vec::with_capacity(statement.predicates.len());
    for predicate in &statement.predicates {
        match predicate {
            Predicate::Cmp {
                field,
                operator,
                value,
            } => {
                if value.is_null() && matches!(operator.as_str(), "=" | "is") {
                    clauses.push(format!("{} IS NULL", dialect.quote(field)));
                } else if value.is_null() && matches!(operator.as_str(), "!=" | "<>") {
                    clauses.push(format!("{} IS NOT NULL", dialect.quote(field)));
                } else {
                    clauses.push(format!(
                        "{} {} {}",
                        dialect.quote(field),
                        operator,
                        writer.next()
                    ));
                    params.push(value.clone());
                }
            }
            Predicate::In { field, not, values } => {
                if values.is_empty() {
                    // x IN () is invalid SQL; an empty list matches nothing
                    clauses.push(if *not { "1 = 1" } else { "1 = 0" }.to_string());
                    continue;
                }
                let placeholders: Vec<String> =
                    values.iter().map(|_| writer.next()).collect();
                clauses.push(format!(
                    "{} {} ({})",
                    dialect.quote(field),
                    if *not { "NOT IN" } else { "IN" },
                    placeholders.join(",")
                ));
                params.extend(values.iter().cloned());
            }
            Predicate::Raw { sql, args } => {
                clauses.push(writer.rewrite_raw(sql));
                params.extend(args.iter().cloned());
            }
        }
    }

    Some(format!(" WHERE {}", clauses.join(" AND ")))
}

pub(crate) fn render_select(
    statement: &Statement,
    dialect: &dyn Dialect,
) -> (String, Vec<DbValue>) {
    let mut writer = ParamWriter::new(dialect);
    let mut params = Vec::new();

    let fields = if statement.fields.is_empty() {
        "*".to_string()
    } else {
        statement
            .fields
            .iter()
            .map(|field| field.render(dialect))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut sql = format!("SELECT {} FROM {}", fields, dialect.quote(&statement.table));

    for join in &statement.joins {
        sql.push_str(&format!(
            " LEFT JOIN {} ON {} {} {}",
            dialect.quote(&join.table),
            dialect.quote(&join.left),
            join.operator,
            dialect.quote(&join.right)
        ));
    }

    if let Some(wheres) = render_wheres(statement, dialect, &mut writer, &mut params) {
        sql.push_str(&wheres);
    }

    if let Some(raw) = &statement.group_by_raw {
        sql.push_str(" GROUP BY ");
        sql.push_str(raw);
    } else if !statement.group_bys.is_empty() {
        let grouped: Vec<String> = statement
            .group_bys
            .iter()
            .map(|field| dialect.quote(field))
            .collect();
        sql.push_str(" GROUP BY ");
        sql.push_str(&grouped.join(", "));
    }

    let order = if let Some(raw) = &statement.order_by_raw {
        Some(raw.clone())
    } else if !statement.order_bys.is_empty() {
        Some(
            statement
                .order_bys
                .iter()
                .map(|(field, direction)| {
                    format!("{} {}", dialect.quote(field), direction.as_sql())
                })
                .collect::<Vec<_>>()
                .join(", "),
        )
    } else {
        None
    };

    let sql = dialect.paginate(sql, order.as_deref(), statement.limit, statement.offset);
    (sql, params)
}

pub(crate) fn render_insert(
    statement: &Statement,
    dialect: &dyn Dialect,
    returning_id: bool,
) -> Result<(String, Vec<DbValue>)> {
    if statement.values.is_empty() {
        return Err(Error::MissingClause {
            clause: "values".to_string(),
        });
    }

    let mut writer = ParamWriter::new(dialect);
    let mut params = Vec::new();
    let mut columns = Vec::with_capacity(statement.values.len());
    let mut placeholders = Vec::with_capacity(statement.values.len());

    for (column, value) in &statement.values {
        columns.push(dialect.quote(column));
        if value.is_null() {
            placeholders.push("NULL".to_string());
        } else {
            placeholders.push(writer.next());
            params.push(value.clone());
        }
    }

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        dialect.quote(&statement.table),
        columns.join(", "),
        placeholders.join(", ")
    );

    if returning_id {
        sql.push_str(&format!(" RETURNING {}", dialect.quote("id")));
    }

    Ok((sql, params))
}

pub(crate) fn render_update(
    statement: &Statement,
    dialect: &dyn Dialect,
) -> Result<(String, Vec<DbValue>)> {
    if statement.values.is_empty() && statement.raw_updates.is_empty() {
        return Err(Error::MissingClause {
            clause: "values".to_string(),
        });
    }

    let mut writer = ParamWriter::new(dialect);
    let mut params = Vec::new();
    let mut sets = Vec::with_capacity(statement.values.len() + statement.raw_updates.len());

    for (column, value) in &statement.values {
        if value.is_null() {
            sets.push(format!("{} = NULL", dialect.quote(column)));
        } else {
            sets.push(format!("{} = {}", dialect.quote(column), writer.next()));
            params.push(value.clone());
        }
    }

    for raw in &statement.raw_updates {
        sets.push(writer.rewrite_raw(&raw.expression));
        params.extend(raw.args.iter().cloned());
    }

    let mut sql = format!(
        "UPDATE {} SET {}",
        dialect.quote(&statement.table),
        sets.join(", ")
    );

    if let Some(wheres) = render_wheres(statement, dialect, &mut writer, &mut params) {
        sql.push_str(&wheres);
    }

    Ok((sql, params))
}

pub(crate) fn render_delete(
    statement: &Statement,
    dialect: &dyn Dialect,
) -> (String, Vec<DbValue>) {
    let mut writer = ParamWriter::new(dialect);
    let mut params = Vec::new();

    let mut sql = format!("DELETE FROM {}", dialect.quote(&statement.table));
    if let Some(wheres) = render_wheres(statement, dialect, &mut writer, &mut params) {
        sql.push_str(&wheres);
    }

    (sql, params)
}
