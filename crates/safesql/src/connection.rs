//! The connection seam between SQL generation and a live store.

use crate::error::{DbError, DbResult};
use crate::row::Row;
use std::future::Future;

/// A single logical connection that executes fully bound SQL text.
///
/// Statements reaching a `Connection` have already been validated and had every
/// literal substituted, so implementations never see parameters. This keeps the
/// SQL pipeline testable against a scripted connection.
pub trait Connection: Send {
    /// Execute a query and return all rows.
    fn query(&mut self, sql: &str) -> impl Future<Output = DbResult<Vec<Row>>> + Send;

    /// Execute a statement and return the number of affected rows.
    fn execute(&mut self, sql: &str) -> impl Future<Output = DbResult<u64>> + Send;

    /// Key generated by the most recent INSERT, if the driver reports one.
    fn last_insert_id(&self) -> Option<u64>;

    /// Check that the connection is alive.
    ///
    /// The default implementation runs `SELECT 1`.
    fn ping(&mut self) -> impl Future<Output = DbResult<()>> + Send {
        async move {
            self.query("SELECT 1").await?;
            Ok(())
        }
    }

    /// Replace a broken connection with a fresh one using the original settings.
    fn reconnect(&mut self) -> impl Future<Output = DbResult<()>> + Send {
        async move { Err(DbError::Connection("reconnect is not supported".to_string())) }
    }

    /// Close the connection gracefully.
    fn close(self) -> impl Future<Output = DbResult<()>> + Send
    where
        Self: Sized,
    {
        async move { Ok(()) }
    }
}
