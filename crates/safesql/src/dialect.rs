//! SQL dialects.
//!
//! A [`Dialect`] turns identifiers, typed values and declarative clause input into
//! SQL text for one database grammar. Adding a database means adding one
//! implementation of this trait; nothing else in the crate branches on the
//! dialect name.

pub mod mysql;

use crate::clause::{GroupBy, Limit, OrderBy, Selection, TableRow};
use crate::error::{DbError, DbResult};
use crate::params::{Params, bind_template};
use crate::transaction::TransactionIsolation;
use crate::value::Value;
use std::fmt;

pub use mysql::MySqlDialect;

/// One clause of a statement template, as declarative input.
#[derive(Debug, Clone, Copy)]
pub enum Clause<'a> {
    Select(&'a Selection),
    From(&'a str),
    Where(&'a str),
    GroupBy(&'a GroupBy),
    Having(&'a str),
    OrderBy(&'a OrderBy),
    Limit(Limit),
    InsertInto { table: &'a str, row: &'a TableRow },
    Values(&'a TableRow),
    Update(&'a str),
    Set(&'a TableRow),
    DeleteFrom(&'a str),
    /// Locking read suffix for SELECT inside a transaction.
    ForUpdate,
}

/// SQL grammar and type system of one database.
pub trait Dialect: Send + Sync + fmt::Debug {
    /// Dialect name as used in configuration (e.g. `"mysql"`).
    fn name(&self) -> &'static str;

    /// Validate a table/column/alias name and return it delimited.
    ///
    /// This is the only path by which a name reaches generated SQL.
    fn sanitize_identifier(&self, identifier: &str) -> DbResult<String>;

    /// Validate `value` against the declared column type `ty` (or the dialect
    /// default for the value's kind) and return a safe literal.
    fn sanitize_value(&self, value: &Value, ty: Option<&str>) -> DbResult<String>;

    /// Render one clause fragment.
    fn build_clause(&self, clause: Clause<'_>) -> DbResult<String>;

    /// Substitute every `:name` placeholder of `template` with its sanitized literal.
    fn bind_parameters(&self, template: &str, params: &Params) -> DbResult<String> {
        if params.is_empty() && !template.contains(':') {
            return Ok(template.to_string());
        }
        bind_template(template, params, |value, ty| self.sanitize_value(value, ty))
    }

    /// Convert a value as fetched from the store into the runtime kind matching
    /// its declared column type, so it can be sanitized again.
    fn decode_value(&self, raw: Value, ty: &str) -> DbResult<Value> {
        let _ = ty;
        Ok(raw)
    }

    /// Introspection query listing the table's primary key column(s).
    ///
    /// Result rows expose at least the `Field` and `Type` columns.
    fn primary_key_query(&self, table: &str) -> DbResult<String> {
        let _ = table;
        Err(self.unsupported("primary key introspection"))
    }

    /// Statements that open a transaction at the given isolation level.
    fn begin_transaction(&self, isolation: TransactionIsolation) -> DbResult<Vec<String>> {
        let _ = isolation;
        Err(self.unsupported("transactions"))
    }

    fn commit_transaction(&self) -> &'static str {
        "COMMIT"
    }

    fn rollback_transaction(&self) -> &'static str {
        "ROLLBACK"
    }

    #[doc(hidden)]
    fn unsupported(&self, what: &str) -> DbError {
        DbError::UnsupportedDialect(format!(
            "{what} is not supported for dialect \"{}\"",
            self.name()
        ))
    }
}

/// Look up a dialect implementation by its configuration name.
pub fn dialect_for(name: &str) -> DbResult<Box<dyn Dialect>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "mysql" | "mariadb" => Ok(Box::new(MySqlDialect::new())),
        other => Err(DbError::UnsupportedDialect(format!(
            "no implementation for dialect \"{other}\""
        ))),
    }
}
