//! # safesql
//!
//! A dialect-aware value sanitizer and SQL statement builder for MySQL, with
//! row-oriented CRUD on top.
//!
//! ## Features
//!
//! - **Typed literals**: every value is checked against its declared column type
//!   (`TINYINT UNSIGNED`, `DECIMAL(5,2)`, `ENUM('a','b')`, `DATETIME(3)`, ...)
//!   before it becomes SQL text; out-of-range data is an error, never coerced
//! - **Identifiers**: table, column and alias names only reach SQL through the
//!   dialect's identifier sanitizer
//! - **Declarative statements**: SELECT / INSERT / UPDATE / DELETE built from
//!   clause input in a fixed clause order
//! - **Returning rows**: `insert_row`, `update_row` and `delete_row` read back
//!   columns of the affected row, resolving the filter through the primary key
//!   inside a transaction
//! - **SQL logging**: every statement is traced on the `safesql.sql` target
//!
//! ## Example
//!
//! ```ignore
//! use safesql::{Database, DatabaseConfig, Params, Selection};
//!
//! let mut db = Database::connect(DatabaseConfig::from_env()?).await?;
//!
//! let row = db
//!     .select_row(
//!         "USER",
//!         [("USER_EMAIL", "email")],
//!         Some("USER_NAME = :name"),
//!         &Params::new().bind(":name", "O'Brien"),
//!         0,
//!     )
//!     .await?;
//!
//! db.update_row(
//!     "USER",
//!     [("USER_AGE", ":age")],
//!     "USER_NAME = :name",
//!     &Params::new()
//!         .bind(":name", "O'Brien")
//!         .bind_typed(":age", 42, "TINYINT UNSIGNED"),
//!     Some(Selection::from([("USER_AGE", "age")])),
//! )
//! .await?;
//! ```

pub mod audit;
pub mod clause;
pub mod config;
pub mod connection;
pub mod database;
pub mod dialect;
pub mod error;
pub mod mysql;
pub mod params;
pub mod row;
pub mod statement;
pub mod transaction;
pub mod value;

mod trace;

pub use audit::{AuditEntry, AuditMedia};
pub use clause::{Direction, GroupBy, Limit, OrderBy, Selection, TableRow};
pub use config::DatabaseConfig;
pub use connection::Connection;
pub use database::{Database, PrimaryKey};
pub use dialect::{Clause, Dialect, MySqlDialect, dialect_for};
pub use error::{ClauseKind, DbError, DbResult};
pub use mysql::MySqlConnection;
pub use params::{Param, Params};
pub use row::{FromRow, FromValue, Row};
pub use statement::{
    DeleteStatement, InsertStatement, SelectStatement, Statement, UpdateStatement,
};
pub use transaction::{TransactionIsolation, TransactionScope};
pub use value::Value;
