//! Declarative inputs for clause builders.
//!
//! These types describe *what* a clause should contain. They hold raw caller
//! input (column names, expressions, aliases); every identifier is sanitized by
//! the [`Dialect`](crate::Dialect) when the clause is rendered.

use crate::error::{ClauseKind, DbError, DbResult};
use std::str::FromStr;

/// One item of a SELECT list: an expression with an optional output alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectItem {
    pub expr: String,
    pub alias: Option<String>,
}

/// A SELECT list.
///
/// An empty selection renders as `SELECT *`. Expressions are caller-supplied SQL
/// (typically column names); aliases are sanitized as identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    items: Vec<SelectItem>,
}

impl Selection {
    /// `SELECT *`
    pub fn all() -> Self {
        Self::default()
    }

    /// Append an expression without alias.
    pub fn expr(mut self, expr: impl Into<String>) -> Self {
        self.items.push(SelectItem {
            expr: expr.into(),
            alias: None,
        });
        self
    }

    /// Append an expression with an output alias.
    pub fn aliased(mut self, expr: impl Into<String>, alias: impl Into<String>) -> Self {
        self.items.push(SelectItem {
            expr: expr.into(),
            alias: Some(alias.into()),
        });
        self
    }

    pub fn items(&self) -> &[SelectItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl From<&str> for Selection {
    fn from(expr: &str) -> Self {
        Selection::all().expr(expr)
    }
}

impl From<String> for Selection {
    fn from(expr: String) -> Self {
        Selection::all().expr(expr)
    }
}

impl From<Vec<&str>> for Selection {
    fn from(exprs: Vec<&str>) -> Self {
        exprs.into_iter().fold(Selection::all(), Selection::expr)
    }
}

impl<const N: usize> From<[&str; N]> for Selection {
    fn from(exprs: [&str; N]) -> Self {
        exprs.into_iter().fold(Selection::all(), Selection::expr)
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Selection {
    fn from(pairs: [(&str, &str); N]) -> Self {
        pairs
            .into_iter()
            .fold(Selection::all(), |s, (expr, alias)| s.aliased(expr, alias))
    }
}

impl From<Vec<(&str, &str)>> for Selection {
    fn from(pairs: Vec<(&str, &str)>) -> Self {
        pairs
            .into_iter()
            .fold(Selection::all(), |s, (expr, alias)| s.aliased(expr, alias))
    }
}

/// GROUP BY column list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupBy {
    columns: Vec<String>,
}

impl GroupBy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl From<&str> for GroupBy {
    fn from(column: &str) -> Self {
        GroupBy::new().column(column)
    }
}

impl<const N: usize> From<[&str; N]> for GroupBy {
    fn from(columns: [&str; N]) -> Self {
        columns.into_iter().fold(GroupBy::new(), GroupBy::column)
    }
}

impl From<Vec<String>> for GroupBy {
    fn from(columns: Vec<String>) -> Self {
        GroupBy { columns }
    }
}

/// Sort direction for ORDER BY.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for Direction {
    type Err = DbError;

    fn from_str(s: &str) -> DbResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Asc),
            "desc" | "descending" => Ok(Self::Desc),
            other => Err(DbError::invalid_clause(
                ClauseKind::OrderBy,
                format!("invalid order by direction \"{other}\""),
            )),
        }
    }
}

/// One ORDER BY criterion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm {
    pub column: String,
    pub direction: Direction,
}

/// ORDER BY criteria, in priority order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderBy {
    terms: Vec<OrderTerm>,
}

impl OrderBy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asc(self, column: impl Into<String>) -> Self {
        self.term(column, Direction::Asc)
    }

    pub fn desc(self, column: impl Into<String>) -> Self {
        self.term(column, Direction::Desc)
    }

    pub fn term(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.terms.push(OrderTerm {
            column: column.into(),
            direction,
        });
        self
    }

    /// Parse `(column, direction)` pairs where the direction comes from untrusted
    /// input such as a query string.
    pub fn parse<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> DbResult<Self> {
        pairs
            .into_iter()
            .try_fold(OrderBy::new(), |o, (column, dir)| -> DbResult<Self> {
                Ok(o.term(column, dir.parse::<Direction>()?))
            })
    }

    pub fn terms(&self) -> &[OrderTerm] {
        &self.terms
    }
}

impl From<&str> for OrderBy {
    fn from(column: &str) -> Self {
        OrderBy::new().asc(column)
    }
}

impl<const N: usize> From<[&str; N]> for OrderBy {
    fn from(columns: [&str; N]) -> Self {
        columns.into_iter().fold(OrderBy::new(), OrderBy::asc)
    }
}

impl<const N: usize> From<[(&str, Direction); N]> for OrderBy {
    fn from(terms: [(&str, Direction); N]) -> Self {
        terms
            .into_iter()
            .fold(OrderBy::new(), |o, (column, dir)| o.term(column, dir))
    }
}

/// LIMIT count with optional offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub count: u64,
    pub offset: Option<u64>,
}

impl Limit {
    pub fn new(count: u64) -> Self {
        Self {
            count,
            offset: None,
        }
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

impl From<u64> for Limit {
    fn from(count: u64) -> Self {
        Limit::new(count)
    }
}

impl From<(u64, u64)> for Limit {
    fn from((count, offset): (u64, u64)) -> Self {
        Limit::new(count).offset(offset)
    }
}

/// Column → expression mapping for INSERT and UPDATE.
///
/// The expression is a parameter placeholder (`:name`) or a raw SQL expression
/// such as `NULL` or `DEFAULT`. It is never a pre-escaped literal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRow {
    entries: Vec<(String, String)>,
}

impl TableRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, column: impl Into<String>, expr: impl Into<String>) -> Self {
        self.entries.push((column.into(), expr.into()));
        self
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for TableRow {
    fn from(pairs: [(&str, &str); N]) -> Self {
        pairs
            .into_iter()
            .fold(TableRow::new(), |r, (column, expr)| r.set(column, expr))
    }
}

impl From<Vec<(&str, &str)>> for TableRow {
    fn from(pairs: Vec<(&str, &str)>) -> Self {
        pairs
            .into_iter()
            .fold(TableRow::new(), |r, (column, expr)| r.set(column, expr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_parses_long_and_short_forms() {
        assert_eq!("ASC".parse::<Direction>().unwrap(), Direction::Asc);
        assert_eq!("descending".parse::<Direction>().unwrap(), Direction::Desc);
        let err = "sideways".parse::<Direction>().unwrap_err();
        assert!(err.is_invalid_clause(ClauseKind::OrderBy));
    }

    #[test]
    fn order_by_parse_keeps_order() {
        let o = OrderBy::parse([("a", "desc"), ("b", "asc")]).unwrap();
        assert_eq!(
            o.terms(),
            &[
                OrderTerm {
                    column: "a".into(),
                    direction: Direction::Desc
                },
                OrderTerm {
                    column: "b".into(),
                    direction: Direction::Asc
                },
            ]
        );
    }

    #[test]
    fn selection_from_pairs_sets_aliases() {
        let s = Selection::from([("USER_ID", "id"), ("USER_NAME", "name")]);
        assert_eq!(s.items().len(), 2);
        assert_eq!(s.items()[1].alias.as_deref(), Some("name"));
        assert!(Selection::all().is_empty());
    }
}
