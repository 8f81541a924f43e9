//! `tracing` events for executed SQL.
//!
//! Every statement is logged at DEBUG on the `safesql.sql` target before it is
//! sent, with the fully bound SQL truncated to the configured length.

use std::time::Duration;

/// Target shared by all SQL events.
pub(crate) const TARGET: &str = "safesql.sql";

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

fn truncate_sql(sql: &str, max_sql_length: Option<usize>) -> String {
    match max_sql_length {
        Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
        _ => sql.to_string(),
    }
}

/// Emit the statement about to be executed.
pub(crate) fn statement(kind: &str, sql: &str, max_sql_length: Option<usize>) {
    if tracing::enabled!(target: TARGET, tracing::Level::DEBUG) {
        let sql = truncate_sql(sql, max_sql_length);
        tracing::debug!(target: TARGET, kind, sql = %sql, "executing");
    }
}

/// Emit the outcome of an executed statement.
pub(crate) fn completed(kind: &str, elapsed: Duration, rows: u64) {
    tracing::trace!(
        target: TARGET,
        kind,
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        rows,
        "completed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_sql_bytes("SELECT 1", 100), "SELECT 1");
        assert_eq!(truncate_sql_bytes("héllo", 2), "h");
        assert_eq!(truncate_sql("SELECT * FROM t", Some(6)), "SELECT...");
        assert_eq!(truncate_sql("SELECT * FROM t", None), "SELECT * FROM t");
    }
}
