//! The MySQL / MariaDB dialect.

mod decode;
mod literal;
pub mod types;


use super::{Clause, Dialect};
use crate::clause::{GroupBy, OrderBy, Selection, TableRow};
use crate::error::{ClauseKind, DbError, DbResult};
use crate::transaction::TransactionIsolation;
use crate::value::Value;

pub use types::{ColumnType, IntWidth, TypeDescriptor};

/// Longest identifier MySQL accepts, in characters.
const MAX_IDENTIFIER_CHARS: usize = 64;

/// MySQL grammar: backtick-delimited identifiers, backslash-escaped string
/// literals, `X'..'` binary literals and `b'..'` bit literals.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    pub const fn new() -> Self {
        Self
    }

    fn select_clause(&self, selection: &Selection) -> DbResult<String> {
        if selection.is_empty() {
            return Ok("SELECT *".to_string());
        }
        let items = selection
            .items()
            .iter()
            .map(|item| {
                if item.expr.trim().is_empty() {
                    return Err(DbError::invalid_clause(
                        ClauseKind::Column,
                        "missing column expression",
                    ));
                }
                match &item.alias {
                    Some(alias) => Ok(format!(
                        "{} AS {}",
                        item.expr,
                        self.sanitize_identifier(alias)?
                    )),
                    None => Ok(item.expr.clone()),
                }
            })
            .collect::<DbResult<Vec<_>>>()?;
        Ok(format!("SELECT {}", items.join(", ")))
    }

    fn group_by_clause(&self, group_by: &GroupBy) -> DbResult<String> {
        if group_by.columns().is_empty() {
            return Err(DbError::invalid_clause(
                ClauseKind::GroupBy,
                "missing group by column data",
            ));
        }
        let columns = group_by
            .columns()
            .iter()
            .map(|c| self.sanitize_identifier(c))
            .collect::<DbResult<Vec<_>>>()?;
        Ok(format!("GROUP BY {}", columns.join(", ")))
    }

    fn order_by_clause(&self, order_by: &OrderBy) -> DbResult<String> {
        if order_by.terms().is_empty() {
            return Err(DbError::invalid_clause(
                ClauseKind::OrderBy,
                "missing order by column data",
            ));
        }
        let terms = order_by
            .terms()
            .iter()
            .map(|t| {
                Ok(format!(
                    "{} {}",
                    self.sanitize_identifier(&t.column)?,
                    t.direction.as_sql()
                ))
            })
            .collect::<DbResult<Vec<_>>>()?;
        Ok(format!("ORDER BY {}", terms.join(", ")))
    }

    fn limit_clause(&self, count: u64, offset: Option<u64>) -> DbResult<String> {
        let count = self.sanitize_value(&Value::UInt(count), Some("BIGINT UNSIGNED"))?;
        match offset {
            Some(offset) => {
                let offset = self.sanitize_value(&Value::UInt(offset), Some("BIGINT UNSIGNED"))?;
                Ok(format!("LIMIT {offset}, {count}"))
            }
            None => Ok(format!("LIMIT {count}")),
        }
    }

    fn row_entries<'a>(&self, row: &'a TableRow) -> DbResult<&'a [(String, String)]> {
        if row.is_empty() {
            return Err(DbError::invalid_clause(
                ClauseKind::TableRow,
                "missing table row data",
            ));
        }
        if let Some((column, _)) = row.entries().iter().find(|(_, e)| e.trim().is_empty()) {
            return Err(DbError::invalid_clause(
                ClauseKind::TableRow,
                format!("missing expression for column \"{column}\""),
            ));
        }
        Ok(row.entries())
    }

    fn column_list(&self, row: &TableRow) -> DbResult<String> {
        let columns = self
            .row_entries(row)?
            .iter()
            .map(|(c, _)| self.sanitize_identifier(c))
            .collect::<DbResult<Vec<_>>>()?;
        Ok(columns.join(", "))
    }
}

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn sanitize_identifier(&self, identifier: &str) -> DbResult<String> {
        let chars = identifier.chars().count();
        let valid = (1..=MAX_IDENTIFIER_CHARS).contains(&chars)
            && identifier
                .chars()
                .all(|c| c != '\0' && c != '`' && u32::from(c) <= 0xFFFF);
        if !valid {
            return Err(DbError::invalid_identifier(format!(
                "invalid identifier \"{}\"",
                identifier.escape_debug()
            )));
        }
        Ok(format!("`{identifier}`"))
    }

    fn sanitize_value(&self, value: &Value, ty: Option<&str>) -> DbResult<String> {
        literal::sanitize_value(value, ty)
    }

    fn build_clause(&self, clause: Clause<'_>) -> DbResult<String> {
        match clause {
            Clause::Select(selection) => self.select_clause(selection),
            Clause::From(table) => Ok(format!("FROM {}", self.sanitize_identifier(table)?)),
            Clause::Where(expr) => Ok(format!("WHERE {expr}")),
            Clause::GroupBy(group_by) => self.group_by_clause(group_by),
            Clause::Having(expr) => Ok(format!("HAVING {expr}")),
            Clause::OrderBy(order_by) => self.order_by_clause(order_by),
            Clause::Limit(limit) => self.limit_clause(limit.count, limit.offset),
            Clause::InsertInto { table, row } => Ok(format!(
                "INSERT INTO {} ({})",
                self.sanitize_identifier(table)?,
                self.column_list(row)?
            )),
            Clause::Values(row) => {
                let exprs: Vec<&str> = self
                    .row_entries(row)?
                    .iter()
                    .map(|(_, e)| e.as_str())
                    .collect();
                Ok(format!("VALUES ({})", exprs.join(", ")))
            }
            Clause::Update(table) => Ok(format!("UPDATE {}", self.sanitize_identifier(table)?)),
            Clause::Set(row) => {
                let assignments = self
                    .row_entries(row)?
                    .iter()
                    .map(|(c, e)| Ok(format!("{} = {e}", self.sanitize_identifier(c)?)))
                    .collect::<DbResult<Vec<_>>>()?;
                Ok(format!("SET {}", assignments.join(", ")))
            }
            Clause::DeleteFrom(table) => {
                Ok(format!("DELETE FROM {}", self.sanitize_identifier(table)?))
            }
            Clause::ForUpdate => Ok("FOR UPDATE".to_string()),
        }
    }

    fn decode_value(&self, raw: Value, ty: &str) -> DbResult<Value> {
        decode::decode_value(raw, ty)
    }

    fn primary_key_query(&self, table: &str) -> DbResult<String> {
        Ok(format!(
            "SHOW COLUMNS FROM {} WHERE `Key` = 'PRI'",
            self.sanitize_identifier(table)?
        ))
    }

    fn begin_transaction(&self, isolation: TransactionIsolation) -> DbResult<Vec<String>> {
        Ok(vec![
            format!("SET TRANSACTION ISOLATION LEVEL {}", isolation.as_sql()),
            "START TRANSACTION".to_string(),
        ])
    }
}
