//! Transaction boundaries.
//!
//! A [`Database`] owns one connection, so a transaction is a mode of that
//! handle: [`Database::begin`] opens it, [`Database::commit`] /
//! [`Database::rollback`] close it, and [`Database::finish`] picks one from a
//! result. Row operations that run several statements join an open transaction
//! instead of starting their own.
//!
//! For ergonomic commit/rollback handling, use the [`transaction!`] macro.
//!
//! # Example
//!
//! ```ignore
//! use safesql::{Database, DbResult, Params};
//!
//! # async fn demo(db: &mut Database) -> DbResult<()> {
//! safesql::transaction!(db, tx, {
//!     let params = Params::new().bind(":a", "login").bind(":id", 7);
//!     tx.insert_row("AUDIT", [("AUDIT_ACTION", ":a")], &params, None).await?;
//!     tx.update_row("USER", [("LAST_SEEN", "NOW()")], "USER_ID = :id", &params, None)
//!         .await?;
//!     Ok(())
//! })?;
//! # Ok(()) }
//! ```

use crate::connection::Connection;
use crate::database::Database;
use crate::error::{DbError, DbResult};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Isolation level applied to the next transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionIsolation {
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl TransactionIsolation {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

impl fmt::Display for TransactionIsolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl std::str::FromStr for TransactionIsolation {
    type Err = DbError;

    fn from_str(s: &str) -> DbResult<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '_'], " ");
        match normalized.split_whitespace().collect::<Vec<_>>().join(" ").as_str() {
            "read uncommitted" => Ok(Self::ReadUncommitted),
            "read committed" => Ok(Self::ReadCommitted),
            "repeatable read" => Ok(Self::RepeatableRead),
            "serializable" => Ok(Self::Serializable),
            _ => Err(DbError::Config(format!("unknown isolation level \"{s}\""))),
        }
    }
}

/// Runs the given block inside a database transaction.
///
/// - Begins a transaction via `$db.begin_scoped().await`.
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)`.
/// - If the enclosing future is dropped before the block finishes, the
///   transaction is rolled back by the next call on the handle.
///
/// The block must evaluate to `safesql::DbResult<T>`. Inside the block `$tx`
/// is a `&mut Database` with the transaction open.
#[macro_export]
macro_rules! transaction {
    ($db:expr, $tx:ident, $body:block) => {{
        let $tx = &mut *($db);
        match $tx.begin_scoped().await {
            Ok(__safesql_tx_scope) => {
                let __safesql_tx_body_result: $crate::DbResult<_> = async { $body }.await;
                $tx.finish_scoped(__safesql_tx_scope, __safesql_tx_body_result)
                    .await
            }
            Err(error) => Err(error),
        }
    }};
}

/// Marks a transaction as abandoned unless it is closed before being dropped.
///
/// The scope holds no borrow of the [`Database`], so it survives into the
/// future that owns the transaction. When that future is dropped mid-flight
/// (a timeout, a losing `select!` branch) the scope's drop raises the
/// handle's abandoned flag, and the next call on the handle sends ROLLBACK.
#[must_use = "pass the scope to `finish_scoped` to close the transaction"]
#[derive(Debug)]
pub struct TransactionScope {
    abandoned: Arc<AtomicBool>,
    armed: bool,
}

impl TransactionScope {
    pub(crate) fn new(abandoned: &Arc<AtomicBool>) -> Self {
        Self {
            abandoned: Arc::clone(abandoned),
            armed: true,
        }
    }

    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        if self.armed {
            self.abandoned.store(true, Ordering::Release);
        }
    }
}

impl<C: Connection> Database<C> {
    /// Whether a transaction is open on this handle.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Roll back a transaction whose owning future was dropped.
    ///
    /// Runs at the start of every call that talks to the server. A ROLLBACK
    /// with nothing open is a no-op on the server, so a scope dropped while
    /// COMMIT was in flight is handled too.
    pub(crate) async fn recover_abandoned(&mut self) -> DbResult<()> {
        if !self.abandoned.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        tracing::warn!(
            target: crate::trace::TARGET,
            "rolling back transaction abandoned by a cancelled operation"
        );
        self.in_transaction = false;
        let sql = self.dialect.rollback_transaction();
        crate::trace::statement("rollback", sql, self.config.log_max_sql_length);
        if let Err(error) = self.conn.execute(sql).await {
            // Retried on the next call; the server may still hold the locks.
            self.abandoned.store(true, Ordering::Release);
            return Err(error);
        }
        Ok(())
    }

    /// Open a transaction whose rollback survives cancellation of the caller.
    ///
    /// Close it with [`finish_scoped`](Self::finish_scoped).
    pub async fn begin_scoped(&mut self) -> DbResult<TransactionScope> {
        self.recover_abandoned().await?;
        if self.in_transaction {
            return Err(DbError::Other("transaction already in progress".to_string()));
        }
        let scope = TransactionScope::new(&self.abandoned);
        match self.begin().await {
            Ok(()) => Ok(scope),
            Err(error) => {
                // Nothing was opened, or the server already dropped it.
                scope.disarm();
                Err(error)
            }
        }
    }

    /// [`finish`](Self::finish) a transaction opened by
    /// [`begin_scoped`](Self::begin_scoped).
    pub async fn finish_scoped<T>(
        &mut self,
        scope: TransactionScope,
        result: DbResult<T>,
    ) -> DbResult<T> {
        let result = self.finish(result).await;
        scope.disarm();
        result
    }

    /// Open a transaction at the configured isolation level.
    pub async fn begin(&mut self) -> DbResult<()> {
        self.recover_abandoned().await?;
        if self.in_transaction {
            return Err(DbError::Other("transaction already in progress".to_string()));
        }
        for sql in self.dialect.begin_transaction(self.config.isolation)? {
            self.run_execute("begin", &sql).await?;
        }
        self.in_transaction = true;
        Ok(())
    }

    pub async fn commit(&mut self) -> DbResult<()> {
        self.recover_abandoned().await?;
        if !self.in_transaction {
            return Err(DbError::Other("no transaction in progress".to_string()));
        }
        // The transaction is over whether or not COMMIT reaches the server.
        self.in_transaction = false;
        let sql = self.dialect.commit_transaction();
        self.run_execute("commit", sql).await.map(|_| ())
    }

    pub async fn rollback(&mut self) -> DbResult<()> {
        self.recover_abandoned().await?;
        if !self.in_transaction {
            return Err(DbError::Other("no transaction in progress".to_string()));
        }
        self.in_transaction = false;
        let sql = self.dialect.rollback_transaction();
        self.run_execute("rollback", sql).await.map(|_| ())
    }

    /// Commit on `Ok`, roll back on `Err`.
    ///
    /// A failed rollback is reported together with the error that caused it.
    pub async fn finish<T>(&mut self, result: DbResult<T>) -> DbResult<T> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(error) => {
                tracing::warn!(target: crate::trace::TARGET, error = %error, "rolling back transaction");
                match self.rollback().await {
                    Ok(()) => Err(error),
                    Err(rollback_err) => Err(DbError::Other(format!(
                        "{error} (rollback failed: {rollback_err})"
                    ))),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolation_parses_common_spellings() {
        assert_eq!(
            "read-committed".parse::<TransactionIsolation>().unwrap(),
            TransactionIsolation::ReadCommitted
        );
        assert_eq!(
            "REPEATABLE READ".parse::<TransactionIsolation>().unwrap(),
            TransactionIsolation::RepeatableRead
        );
        assert!("snapshot".parse::<TransactionIsolation>().is_err());
    }

    #[test]
    fn default_is_read_committed() {
        assert_eq!(TransactionIsolation::default().as_sql(), "READ COMMITTED");
    }
}
