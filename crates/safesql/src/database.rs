//! The database handle and row-oriented operations.
//!
//! [`Database`] is constructed once at startup and passed by `&mut` to every
//! caller. It owns one connection, the dialect that generates its SQL, and a
//! cache of primary-key metadata.
//!
//! # Example
//!
//! ```ignore
//! use safesql::{Database, DatabaseConfig, Params, Selection};
//!
//! # async fn demo() -> safesql::DbResult<()> {
//! let mut db = Database::connect(DatabaseConfig::from_env()?).await?;
//!
//! let user = db
//!     .insert_row(
//!         "USER",
//!         [("NAME", ":n"), ("EMAIL", ":e")],
//!         &Params::new().bind(":n", "O'Brien").bind(":e", "a@b.com"),
//!         Some(Selection::from([("ID", "id")])),
//!     )
//!     .await?;
//!
//! let updated = db
//!     .update_row(
//!         "USER",
//!         [("EMAIL", ":e")],
//!         "ID = :id",
//!         &Params::new().bind(":id", 7).bind(":e", "x@y.com"),
//!         Some(Selection::from([("EMAIL", "email")])),
//!     )
//!     .await?;
//! # Ok(()) }
//! ```


use crate::clause::{Limit, OrderBy, Selection, TableRow};
use crate::config::DatabaseConfig;
use crate::connection::Connection;
use crate::dialect::{Dialect, dialect_for};
use crate::error::{ClauseKind, DbError, DbResult};
use crate::mysql::MySqlConnection;
use crate::params::{Params, is_valid_placeholder};
use crate::row::{FromRow, Row};
use crate::statement::{
    DeleteStatement, InsertStatement, SelectStatement, Statement, UpdateStatement,
};
use crate::trace;
use crate::transaction::TransactionScope;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// The single primary-key column of a table, as reported by introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKey {
    pub column: String,
    /// Declared column type, used to sanitize key values.
    pub ty: String,
}

/// A database handle: one connection plus the dialect that writes its SQL.
pub struct Database<C: Connection = MySqlConnection> {
    pub(crate) dialect: Box<dyn Dialect>,
    pub(crate) conn: C,
    pub(crate) config: DatabaseConfig,
    primary_keys: HashMap<String, PrimaryKey>,
    pub(crate) in_transaction: bool,
    /// Raised by a dropped [`TransactionScope`]; cleared by the next call.
    pub(crate) abandoned: Arc<AtomicBool>,
}

impl<C: Connection> std::fmt::Debug for Database<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("dialect", &self.dialect.name())
            .field("config", &self.config)
            .field("in_transaction", &self.in_transaction)
            .finish_non_exhaustive()
    }
}

impl Database<MySqlConnection> {
    /// Open the connection described by `config`.
    pub async fn connect(config: DatabaseConfig) -> DbResult<Self> {
        let dialect = dialect_for(&config.dialect)?;
        let conn = MySqlConnection::connect(&config).await?;
        tracing::info!(
            target: trace::TARGET,
            dialect = dialect.name(),
            host = %config.host,
            schema = %config.schema,
            "connected"
        );
        Ok(Self::from_parts(dialect, conn, config))
    }
}

impl<C: Connection> Database<C> {
    /// Wrap an already open connection.
    pub fn with_connection(config: DatabaseConfig, conn: C) -> DbResult<Self> {
        let dialect = dialect_for(&config.dialect)?;
        Ok(Self::from_parts(dialect, conn, config))
    }

    fn from_parts(dialect: Box<dyn Dialect>, conn: C, config: DatabaseConfig) -> Self {
        Self {
            dialect,
            conn,
            config,
            primary_keys: HashMap::new(),
            in_transaction: false,
            abandoned: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn dialect(&self) -> &dyn Dialect {
        &*self.dialect
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub(crate) async fn run_query(&mut self, kind: &str, sql: &str) -> DbResult<Vec<Row>> {
        self.recover_abandoned().await?;
        trace::statement(kind, sql, self.config.log_max_sql_length);
        let started = Instant::now();
        let rows = self.conn.query(sql).await?;
        trace::completed(kind, started.elapsed(), rows.len() as u64);
        Ok(rows)
    }

    pub(crate) async fn run_execute(&mut self, kind: &str, sql: &str) -> DbResult<u64> {
        self.recover_abandoned().await?;
        trace::statement(kind, sql, self.config.log_max_sql_length);
        let started = Instant::now();
        let affected = self.conn.execute(sql).await?;
        trace::completed(kind, started.elapsed(), affected);
        Ok(affected)
    }

    // ─── Lifecycle ──────────────────────────────────────────────────────────

    pub async fn ping(&mut self) -> DbResult<()> {
        self.conn.ping().await
    }

    /// Ping the connection and reopen it once if the ping fails.
    ///
    /// A transaction abandoned by a cancelled operation is rolled back first.
    /// A connection with a live transaction is never reopened; the ping error
    /// is returned instead.
    pub async fn health_check(&mut self) -> DbResult<()> {
        let error = match self.conn.ping().await {
            Ok(()) => return self.recover_abandoned().await,
            Err(error) => error,
        };
        let abandoned = self.abandoned.load(Ordering::Acquire);
        if self.in_transaction && !abandoned {
            return Err(error);
        }
        tracing::warn!(target: trace::TARGET, error = %error, "ping failed, reconnecting");
        self.conn.reconnect().await?;
        // A fresh session has no transaction to roll back.
        self.abandoned.store(false, Ordering::Release);
        self.in_transaction = false;
        self.conn.ping().await
    }

    /// Close the connection. An open transaction is rolled back by the server.
    pub async fn close(self) -> DbResult<()> {
        if self.in_transaction || self.abandoned.load(Ordering::Acquire) {
            tracing::warn!(target: trace::TARGET, "closing with an open transaction");
        }
        self.conn.close().await
    }

    // ─── Primary keys ───────────────────────────────────────────────────────

    /// Forget cached primary-key metadata, e.g. after a schema migration.
    pub fn invalidate_schema_cache(&mut self) {
        self.primary_keys.clear();
    }

    /// Look up the table's single primary-key column and its declared type.
    ///
    /// Tables without a primary key, or with a composite one, fail with
    /// `DbError::PrimaryKey`.
    pub async fn primary_key(&mut self, table: &str) -> DbResult<PrimaryKey> {
        if let Some(pk) = self.primary_keys.get(table) {
            return Ok(pk.clone());
        }

        let sql = self.dialect.primary_key_query(table)?;
        let rows = self.run_query("primary_key", &sql).await?;
        let row = match rows.as_slice() {
            [row] => row,
            [] => {
                return Err(DbError::PrimaryKey(format!(
                    "table \"{table}\" has no primary key"
                )));
            }
            _ => {
                return Err(DbError::PrimaryKey(format!(
                    "table \"{table}\" has a composite primary key"
                )));
            }
        };
        let pk = PrimaryKey {
            column: row.try_get("Field")?,
            ty: row.try_get("Type")?,
        };

        self.primary_keys.insert(table.to_string(), pk.clone());
        Ok(pk)
    }

    /// Primary-key values of every row matching `filter`.
    ///
    /// Inside a transaction the matched rows are locked until it ends.
    pub async fn primary_key_values(
        &mut self,
        table: &str,
        filter: &str,
        params: &Params,
    ) -> DbResult<(PrimaryKey, Vec<Value>)> {
        let pk = self.primary_key(table).await?;
        let column = self.dialect.sanitize_identifier(&pk.column)?;
        let mut select = SelectStatement::new(table)
            .columns(Selection::all().aliased(column, pk.column.clone()))
            .filter(filter);
        if self.in_transaction {
            select = select.for_update();
        }
        let sql = select.bind(&*self.dialect, params)?;

        let rows = self.run_query("primary_key_values", &sql).await?;
        let values = rows
            .into_iter()
            .map(|mut row| {
                let raw = row
                    .take(&pk.column)
                    .ok_or_else(|| DbError::decode(pk.column.clone(), "missing key column"))?;
                self.dialect.decode_value(raw, &pk.ty)
            })
            .collect::<DbResult<Vec<_>>>()?;
        Ok((pk, values))
    }

    /// Resolve `filter` to an equality (one row) or `IN` (several rows) clause
    /// over sanitized primary-key literals. `None` when nothing matches.
    pub async fn simplify_where(
        &mut self,
        table: &str,
        filter: &str,
        params: &Params,
    ) -> DbResult<Option<String>> {
        let (pk, keys) = self.primary_key_values(table, filter, params).await?;
        self.key_filter(&pk, &keys)
    }

    fn key_filter(&self, pk: &PrimaryKey, keys: &[Value]) -> DbResult<Option<String>> {
        let column = self.dialect.sanitize_identifier(&pk.column)?;
        let literals = keys
            .iter()
            .map(|key| self.dialect.sanitize_value(key, Some(&pk.ty)))
            .collect::<DbResult<Vec<_>>>()?;
        Ok(match literals.as_slice() {
            [] => None,
            [key] => Some(format!("{column} = {key}")),
            keys => Some(format!("{column} IN ({})", keys.join(", "))),
        })
    }

    /// Literal for the key value `row` binds to the primary-key column.
    ///
    /// `None` when the column is absent or given as `DEFAULT`/`NULL`, which
    /// leaves the key to the store. Any other raw expression is rejected: its
    /// value cannot be known without evaluating it again.
    fn bound_key(
        &self,
        pk: &PrimaryKey,
        row: &TableRow,
        params: &Params,
    ) -> DbResult<Option<String>> {
        let Some((_, expr)) = row
            .entries()
            .iter()
            .find(|(column, _)| column.eq_ignore_ascii_case(&pk.column))
        else {
            return Ok(None);
        };
        let expr = expr.trim();
        if expr.eq_ignore_ascii_case("DEFAULT") || expr.eq_ignore_ascii_case("NULL") {
            return Ok(None);
        }
        if is_valid_placeholder(expr) {
            let param = params.get(expr).ok_or_else(|| {
                DbError::invalid_parameter(format!(
                    "no parameter bound for placeholder \"{expr}\""
                ))
            })?;
            if param.value.is_null() {
                return Ok(None);
            }
            return self.dialect.sanitize_value(&param.value, Some(&pk.ty)).map(Some);
        }
        Err(DbError::invalid_clause(
            ClauseKind::TableRow,
            format!(
                "key column \"{}\" must be bound through a placeholder to be returned",
                pk.column
            ),
        ))
    }

    /// Deterministic row choice when a resolved filter matches several keys.
    fn key_order(pk: &PrimaryKey, keys: &[Value]) -> Option<OrderBy> {
        (keys.len() > 1).then(|| OrderBy::new().asc(pk.column.clone()))
    }

    // ─── Transactions joined by row operations ──────────────────────────────

    /// Join the open transaction, or open one owned by the caller.
    async fn enter(&mut self) -> DbResult<Option<TransactionScope>> {
        self.recover_abandoned().await?;
        if self.in_transaction {
            return Ok(None);
        }
        self.begin_scoped().await.map(Some)
    }

    async fn leave<T>(
        &mut self,
        scope: Option<TransactionScope>,
        result: DbResult<T>,
    ) -> DbResult<T> {
        match scope {
            Some(scope) => self.finish_scoped(scope, result).await,
            None => result,
        }
    }

    // ─── Row operations ─────────────────────────────────────────────────────

    /// Run a SELECT and map every row.
    pub async fn fetch_all<T: FromRow>(
        &mut self,
        select: &SelectStatement,
        params: &Params,
    ) -> DbResult<Vec<T>> {
        let sql = select.bind(&*self.dialect, params)?;
        let rows = self.run_query("fetch_all", &sql).await?;
        rows.iter().map(T::from_row).collect()
    }

    /// Bind a hand-written statement and run it as a query.
    pub async fn query(&mut self, sql: &str, params: &Params) -> DbResult<Vec<Row>> {
        let sql = self.dialect.bind_parameters(sql, params)?;
        self.run_query("query", &sql).await
    }

    /// Bind a hand-written statement and execute it, returning affected rows.
    pub async fn execute(&mut self, sql: &str, params: &Params) -> DbResult<u64> {
        let sql = self.dialect.bind_parameters(sql, params)?;
        self.run_execute("execute", &sql).await
    }

    /// Select the row at `offset` among those matching `filter`.
    pub async fn select_row(
        &mut self,
        table: &str,
        columns: impl Into<Selection>,
        filter: Option<&str>,
        params: &Params,
        offset: u64,
    ) -> DbResult<Option<Row>> {
        let mut select = SelectStatement::new(table)
            .columns(columns)
            .limit(Limit::new(1).offset(offset));
        if let Some(filter) = filter {
            select = select.filter(filter);
        }
        let sql = select.bind(&*self.dialect, params)?;
        Ok(self.run_query("select_row", &sql).await?.into_iter().next())
    }

    /// Insert one row. With `returning`, re-select the new row by its key.
    ///
    /// The key is the value `row` binds to the primary-key column when it
    /// binds one, and otherwise the key the store generated for the insert.
    /// An insert that neither binds nor generates a key fails with
    /// `DbError::PrimaryKey` instead of reading back some other row.
    pub async fn insert_row(
        &mut self,
        table: &str,
        row: impl Into<TableRow>,
        params: &Params,
        returning: Option<Selection>,
    ) -> DbResult<Option<Row>> {
        let row = row.into();
        let insert = InsertStatement::new(table, row.clone()).bind(&*self.dialect, params)?;
        let Some(returning) = returning else {
            self.run_execute("insert_row", &insert).await?;
            return Ok(None);
        };
        SelectStatement::new(table)
            .columns(returning.clone())
            .to_sql(&*self.dialect)?;

        let pk = self.primary_key(table).await?;
        let bound_key = self.bound_key(&pk, &row, params)?;
        self.run_execute("insert_row", &insert).await?;

        let key = match bound_key {
            Some(key) => key,
            None => {
                let id = self
                    .conn
                    .last_insert_id()
                    .filter(|id| *id != 0)
                    .ok_or_else(|| {
                        DbError::PrimaryKey(format!(
                            "insert into \"{table}\" generated no value for key \"{}\"",
                            pk.column
                        ))
                    })?;
                self.dialect.sanitize_value(&Value::UInt(id), Some(&pk.ty))?
            }
        };
        let filter = format!("{} = {key}", self.dialect.sanitize_identifier(&pk.column)?);
        let select = SelectStatement::new(table)
            .columns(returning)
            .filter(filter)
            .limit(Limit::new(1));
        let sql = select.bind(&*self.dialect, params)?;
        Ok(self
            .run_query("insert_row.returning", &sql)
            .await?
            .into_iter()
            .next())
    }

    /// Update the first row matching `filter`.
    ///
    /// The filter is resolved to primary-key values under a locking read, the
    /// update targets those keys, and `returning` columns are read back from the
    /// same keys. All of it runs in one transaction (joining an open one).
    /// Returns `None` without mutating anything when no row matches.
    pub async fn update_row(
        &mut self,
        table: &str,
        row: impl Into<TableRow>,
        filter: &str,
        params: &Params,
        returning: Option<Selection>,
    ) -> DbResult<Option<Row>> {
        let row = row.into();
        UpdateStatement::new(table, row.clone())
            .filter(filter)
            .limit(Limit::new(1))
            .bind(&*self.dialect, params)?;
        if let Some(returning) = &returning {
            SelectStatement::new(table)
                .columns(returning.clone())
                .to_sql(&*self.dialect)?;
        }

        let scope = self.enter().await?;
        let result = self.update_keyed(table, row, filter, params, returning).await;
        self.leave(scope, result).await
    }

    async fn update_keyed(
        &mut self,
        table: &str,
        row: TableRow,
        filter: &str,
        params: &Params,
        returning: Option<Selection>,
    ) -> DbResult<Option<Row>> {
        let (pk, keys) = self.primary_key_values(table, filter, params).await?;
        let Some(key_filter) = self.key_filter(&pk, &keys)? else {
            return Ok(None);
        };
        let order = Self::key_order(&pk, &keys);

        let mut update = UpdateStatement::new(table, row)
            .filter(key_filter.clone())
            .limit(Limit::new(1));
        if let Some(order) = &order {
            update = update.order_by(order.clone());
        }
        let sql = update.bind(&*self.dialect, params)?;
        self.run_execute("update_row", &sql).await?;

        let Some(returning) = returning else {
            return Ok(None);
        };
        let mut select = SelectStatement::new(table)
            .columns(returning)
            .filter(key_filter)
            .limit(Limit::new(1));
        if let Some(order) = order {
            select = select.order_by(order);
        }
        let sql = select.bind(&*self.dialect, params)?;
        Ok(self
            .run_query("update_row.returning", &sql)
            .await?
            .into_iter()
            .next())
    }

    /// Delete the first row matching `filter`.
    ///
    /// Without `returning` this is a single `DELETE ... LIMIT 1`. With it, the
    /// row is captured before deletion inside a transaction, resolved through
    /// its primary key like [`update_row`](Self::update_row).
    pub async fn delete_row(
        &mut self,
        table: &str,
        filter: &str,
        params: &Params,
        returning: Option<Selection>,
    ) -> DbResult<Option<Row>> {
        let delete = DeleteStatement::new(table)
            .filter(filter)
            .limit(Limit::new(1))
            .bind(&*self.dialect, params)?;
        let Some(returning) = returning else {
            self.run_execute("delete_row", &delete).await?;
            return Ok(None);
        };
        SelectStatement::new(table)
            .columns(returning.clone())
            .to_sql(&*self.dialect)?;

        let scope = self.enter().await?;
        let result = self.delete_keyed(table, filter, params, returning).await;
        self.leave(scope, result).await
    }

    async fn delete_keyed(
        &mut self,
        table: &str,
        filter: &str,
        params: &Params,
        returning: Selection,
    ) -> DbResult<Option<Row>> {
        let (pk, keys) = self.primary_key_values(table, filter, params).await?;
        let Some(key_filter) = self.key_filter(&pk, &keys)? else {
            return Ok(None);
        };
        let order = Self::key_order(&pk, &keys);

        let mut select = SelectStatement::new(table)
            .columns(returning)
            .filter(key_filter.clone())
            .limit(Limit::new(1));
        if let Some(order) = &order {
            select = select.order_by(order.clone());
        }
        let sql = select.bind(&*self.dialect, params)?;
        let Some(captured) = self
            .run_query("delete_row.returning", &sql)
            .await?
            .into_iter()
            .next()
        else {
            return Ok(None);
        };

        let mut delete = DeleteStatement::new(table)
            .filter(key_filter)
            .limit(Limit::new(1));
        if let Some(order) = order {
            delete = delete.order_by(order);
        }
        let sql = delete.bind(&*self.dialect, params)?;
        self.run_execute("delete_row", &sql).await?;
        Ok(Some(captured))
    }
}
