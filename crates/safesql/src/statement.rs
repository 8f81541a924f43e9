//! Statement builders.
//!
//! Each builder collects declarative clause input and renders it through a
//! [`Dialect`] in the fixed clause order of its statement kind. Optional
//! clauses that were never set (or were set to an empty expression) are
//! omitted. Rendering yields a template; placeholders are substituted by
//! [`Statement::bind`].
//!
//! ```ignore
//! let sql = SelectStatement::new("USER")
//!     .columns([("USER_ID", "id"), ("USER_EMAIL", "email")])
//!     .filter("USER_NAME = :name")
//!     .order_by(OrderBy::new().desc("USER_ID"))
//!     .limit(10_u64)
//!     .bind(&MySqlDialect::new(), &Params::new().bind(":name", "O'Brien"))?;
//! ```

use crate::clause::{GroupBy, Limit, OrderBy, Selection, TableRow};
use crate::dialect::{Clause, Dialect};
use crate::error::DbResult;
use crate::params::Params;

/// A statement that can be rendered for a dialect.
pub trait Statement {
    /// Render the statement template (placeholders left in place).
    fn to_sql(&self, dialect: &dyn Dialect) -> DbResult<String>;

    /// Render and substitute every placeholder with its sanitized literal.
    fn bind(&self, dialect: &dyn Dialect, params: &Params) -> DbResult<String> {
        let template = self.to_sql(dialect)?;
        dialect.bind_parameters(&template, params)
    }
}

fn non_empty(expr: &Option<String>) -> Option<&str> {
    expr.as_deref().filter(|e| !e.trim().is_empty())
}

/// `SELECT → FROM → WHERE → GROUP BY → HAVING → ORDER BY → LIMIT [FOR UPDATE]`
#[derive(Debug, Clone, Default)]
pub struct SelectStatement {
    table: String,
    columns: Selection,
    filter: Option<String>,
    group_by: Option<GroupBy>,
    having: Option<String>,
    order_by: Option<OrderBy>,
    limit: Option<Limit>,
    for_update: bool,
}

impl SelectStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn columns(mut self, columns: impl Into<Selection>) -> Self {
        self.columns = columns.into();
        self
    }

    /// WHERE expression, may contain placeholders.
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn group_by(mut self, group_by: impl Into<GroupBy>) -> Self {
        self.group_by = Some(group_by.into());
        self
    }

    pub fn having(mut self, having: impl Into<String>) -> Self {
        self.having = Some(having.into());
        self
    }

    pub fn order_by(mut self, order_by: impl Into<OrderBy>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn limit(mut self, limit: impl Into<Limit>) -> Self {
        self.limit = Some(limit.into());
        self
    }

    /// Lock the selected rows until the enclosing transaction ends.
    pub fn for_update(mut self) -> Self {
        self.for_update = true;
        self
    }
}

impl Statement for SelectStatement {
    fn to_sql(&self, dialect: &dyn Dialect) -> DbResult<String> {
        let mut clauses = vec![
            dialect.build_clause(Clause::Select(&self.columns))?,
            dialect.build_clause(Clause::From(&self.table))?,
        ];
        if let Some(filter) = non_empty(&self.filter) {
            clauses.push(dialect.build_clause(Clause::Where(filter))?);
        }
        if let Some(group_by) = &self.group_by {
            clauses.push(dialect.build_clause(Clause::GroupBy(group_by))?);
        }
        if let Some(having) = non_empty(&self.having) {
            clauses.push(dialect.build_clause(Clause::Having(having))?);
        }
        if let Some(order_by) = &self.order_by {
            clauses.push(dialect.build_clause(Clause::OrderBy(order_by))?);
        }
        if let Some(limit) = self.limit {
            clauses.push(dialect.build_clause(Clause::Limit(limit))?);
        }
        if self.for_update {
            clauses.push(dialect.build_clause(Clause::ForUpdate)?);
        }
        Ok(clauses.join(" "))
    }
}

/// `INSERT INTO table (columns) → VALUES (expressions)`
#[derive(Debug, Clone)]
pub struct InsertStatement {
    table: String,
    row: TableRow,
}

impl InsertStatement {
    pub fn new(table: impl Into<String>, row: impl Into<TableRow>) -> Self {
        Self {
            table: table.into(),
            row: row.into(),
        }
    }
}

impl Statement for InsertStatement {
    fn to_sql(&self, dialect: &dyn Dialect) -> DbResult<String> {
        Ok(format!(
            "{} {}",
            dialect.build_clause(Clause::InsertInto {
                table: &self.table,
                row: &self.row,
            })?,
            dialect.build_clause(Clause::Values(&self.row))?
        ))
    }
}

/// `UPDATE → SET → [WHERE] → [ORDER BY] → [LIMIT]`
#[derive(Debug, Clone)]
pub struct UpdateStatement {
    table: String,
    row: TableRow,
    filter: Option<String>,
    order_by: Option<OrderBy>,
    limit: Option<Limit>,
}

impl UpdateStatement {
    pub fn new(table: impl Into<String>, row: impl Into<TableRow>) -> Self {
        Self {
            table: table.into(),
            row: row.into(),
            filter: None,
            order_by: None,
            limit: None,
        }
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn order_by(mut self, order_by: impl Into<OrderBy>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn limit(mut self, limit: impl Into<Limit>) -> Self {
        self.limit = Some(limit.into());
        self
    }
}

impl Statement for UpdateStatement {
    fn to_sql(&self, dialect: &dyn Dialect) -> DbResult<String> {
        let mut clauses = vec![
            dialect.build_clause(Clause::Update(&self.table))?,
            dialect.build_clause(Clause::Set(&self.row))?,
        ];
        if let Some(filter) = non_empty(&self.filter) {
            clauses.push(dialect.build_clause(Clause::Where(filter))?);
        }
        if let Some(order_by) = &self.order_by {
            clauses.push(dialect.build_clause(Clause::OrderBy(order_by))?);
        }
        if let Some(limit) = self.limit {
            clauses.push(dialect.build_clause(Clause::Limit(limit))?);
        }
        Ok(clauses.join(" "))
    }
}

/// `DELETE FROM → [WHERE] → [ORDER BY] → [LIMIT]`
#[derive(Debug, Clone)]
pub struct DeleteStatement {
    table: String,
    filter: Option<String>,
    order_by: Option<OrderBy>,
    limit: Option<Limit>,
}

impl DeleteStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: None,
            order_by: None,
            limit: None,
        }
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn order_by(mut self, order_by: impl Into<OrderBy>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn limit(mut self, limit: impl Into<Limit>) -> Self {
        self.limit = Some(limit.into());
        self
    }
}

impl Statement for DeleteStatement {
    fn to_sql(&self, dialect: &dyn Dialect) -> DbResult<String> {
        let mut clauses = vec![dialect.build_clause(Clause::DeleteFrom(&self.table))?];
        if let Some(filter) = non_empty(&self.filter) {
            clauses.push(dialect.build_clause(Clause::Where(filter))?);
        }
        if let Some(order_by) = &self.order_by {
            clauses.push(dialect.build_clause(Clause::OrderBy(order_by))?);
        }
        if let Some(limit) = self.limit {
            clauses.push(dialect.build_clause(Clause::Limit(limit))?);
        }
        Ok(clauses.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::Direction;
    use crate::dialect::MySqlDialect;

    const D: MySqlDialect = MySqlDialect::new();

    #[test]
    fn select_clauses_in_fixed_order() {
        let sql = SelectStatement::new("USER")
            .columns([("USER_ID", "id"), ("COUNT(*)", "n")])
            .filter("USER_ARCHIVED = :a")
            .group_by("USER_ID")
            .having("COUNT(*) > 1")
            .order_by([("USER_ID", Direction::Desc)])
            .limit((5_u64, 10_u64))
            .to_sql(&D)
            .unwrap();
        assert_eq!(
            sql,
            "SELECT USER_ID AS `id`, COUNT(*) AS `n` FROM `USER` WHERE USER_ARCHIVED = :a \
             GROUP BY `USER_ID` HAVING COUNT(*) > 1 ORDER BY `USER_ID` DESC LIMIT 10, 5"
        );
    }

    #[test]
    fn empty_optional_clauses_are_omitted() {
        let sql = SelectStatement::new("USER").filter("  ").to_sql(&D).unwrap();
        assert_eq!(sql, "SELECT * FROM `USER`");
    }

    #[test]
    fn for_update_comes_last() {
        let sql = SelectStatement::new("t")
            .columns("`ID`")
            .filter("a = 1")
            .limit(1_u64)
            .for_update()
            .to_sql(&D)
            .unwrap();
        assert_eq!(sql, "SELECT `ID` FROM `t` WHERE a = 1 LIMIT 1 FOR UPDATE");
    }

    #[test]
    fn insert_update_delete_templates() {
        let row = TableRow::from([("NAME", ":n"), ("EMAIL", ":e")]);
        assert_eq!(
            InsertStatement::new("USER", row.clone()).to_sql(&D).unwrap(),
            "INSERT INTO `USER` (`NAME`, `EMAIL`) VALUES (:n, :e)"
        );
        assert_eq!(
            UpdateStatement::new("USER", row)
                .filter("`ID` = 7")
                .limit(1_u64)
                .to_sql(&D)
                .unwrap(),
            "UPDATE `USER` SET `NAME` = :n, `EMAIL` = :e WHERE `ID` = 7 LIMIT 1"
        );
        assert_eq!(
            DeleteStatement::new("USER")
                .filter("`ID` IN (1, 2)")
                .order_by("ID")
                .limit(1_u64)
                .to_sql(&D)
                .unwrap(),
            "DELETE FROM `USER` WHERE `ID` IN (1, 2) ORDER BY `ID` ASC LIMIT 1"
        );
    }

    #[test]
    fn bind_substitutes_after_building() {
        let sql = InsertStatement::new("USER", [("NAME", ":n")])
            .bind(&D, &Params::new().bind(":n", "O'Brien"))
            .unwrap();
        assert_eq!(sql, "INSERT INTO `USER` (`NAME`) VALUES ('O''Brien')");
    }
}
