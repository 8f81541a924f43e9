//! [`Connection`] over a single `mysql_async` connection.

use crate::config::DatabaseConfig;
use crate::connection::Connection;
use crate::error::{DbError, DbResult};
use crate::row::Row;
use crate::value::Value;
use chrono::{NaiveDate, NaiveTime};
use mysql_async::consts::ColumnType;
use mysql_async::prelude::Queryable;
use mysql_async::{Column, Conn, Opts, OptsBuilder};

/// Collation id of the `binary` character set.
const BINARY_CHARSET: u16 = 63;

/// Run on every (re)connect: literals are rendered for backslash escapes.
const SESSION_INIT: &str =
    "SET SESSION sql_mode = REPLACE(@@SESSION.sql_mode, 'NO_BACKSLASH_ESCAPES', '')";

/// One MySQL connection, opened with the settings it can be reopened with.
pub struct MySqlConnection {
    conn: Conn,
    opts: Opts,
}

impl std::fmt::Debug for MySqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlConnection")
            .field("id", &self.conn.id())
            .field("host", &self.opts.ip_or_hostname())
            .field("db", &self.opts.db_name())
            .finish()
    }
}

impl MySqlConnection {
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        let opts: Opts = OptsBuilder::default()
            .ip_or_hostname(config.host.clone())
            .tcp_port(config.port)
            .user(Some(config.user.clone()))
            .pass(Some(config.password.clone()))
            .db_name(Some(config.schema.clone()))
            .init(vec![SESSION_INIT])
            .into();
        let conn = open(opts.clone()).await?;
        Ok(Self { conn, opts })
    }
}

async fn open(opts: Opts) -> DbResult<Conn> {
    let mut conn = Conn::new(opts)
        .await
        .map_err(|e| DbError::Connection(e.to_string()))?;
    let mode: Option<String> = conn.query_first("SELECT @@SESSION.sql_mode").await?;
    check_sql_mode(mode.as_deref().unwrap_or_default())?;
    Ok(conn)
}

/// Refuse a session whose string literals would not honor backslash escapes.
fn check_sql_mode(mode: &str) -> DbResult<()> {
    if mode
        .split(',')
        .any(|flag| flag.trim().eq_ignore_ascii_case("NO_BACKSLASH_ESCAPES"))
    {
        return Err(DbError::Connection(format!(
            "session sql_mode still has NO_BACKSLASH_ESCAPES ({mode})"
        )));
    }
    Ok(())
}

impl Connection for MySqlConnection {
    async fn query(&mut self, sql: &str) -> DbResult<Vec<Row>> {
        let rows: Vec<mysql_async::Row> = self.conn.query(sql).await?;
        Ok(rows.into_iter().map(convert_row).collect())
    }

    async fn execute(&mut self, sql: &str) -> DbResult<u64> {
        self.conn.query_drop(sql).await?;
        Ok(self.conn.affected_rows())
    }

    fn last_insert_id(&self) -> Option<u64> {
        self.conn.last_insert_id()
    }

    async fn ping(&mut self) -> DbResult<()> {
        self.conn.ping().await?;
        Ok(())
    }

    async fn reconnect(&mut self) -> DbResult<()> {
        let fresh = open(self.opts.clone()).await?;
        let stale = std::mem::replace(&mut self.conn, fresh);
        // The old connection is already broken; its disconnect error is moot.
        let _ = stale.disconnect().await;
        tracing::info!(target: crate::trace::TARGET, id = self.conn.id(), "reconnected");
        Ok(())
    }

    async fn close(self) -> DbResult<()> {
        self.conn.disconnect().await?;
        Ok(())
    }
}

fn convert_row(row: mysql_async::Row) -> Row {
    let columns = row.columns();
    // Consumes the row into its raw column values; none has been taken yet.
    row.unwrap()
        .into_iter()
        .zip(columns.iter())
        .map(|(value, column)| (column.name_str().into_owned(), convert_value(value, column)))
        .collect()
}

fn is_binary_string(column: &Column) -> bool {
    column.character_set() == BINARY_CHARSET
        && matches!(
            column.column_type(),
            ColumnType::MYSQL_TYPE_STRING
                | ColumnType::MYSQL_TYPE_VAR_STRING
                | ColumnType::MYSQL_TYPE_VARCHAR
                | ColumnType::MYSQL_TYPE_TINY_BLOB
                | ColumnType::MYSQL_TYPE_BLOB
                | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
                | ColumnType::MYSQL_TYPE_LONG_BLOB
                | ColumnType::MYSQL_TYPE_BIT
        )
}

fn convert_value(value: mysql_async::Value, column: &Column) -> Value {
    use mysql_async::Value as M;

    match value {
        M::NULL => Value::Null,
        M::Bytes(bytes) if is_binary_string(column) => Value::Bytes(bytes),
        M::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => Value::Text(text),
            Err(e) => Value::Bytes(e.into_bytes()),
        },
        M::Int(i) => Value::Int(i),
        M::UInt(u) => Value::UInt(u),
        M::Float(f) => Value::Float(f64::from(f)),
        M::Double(d) => Value::Float(d),
        M::Date(year, month, day, hour, minute, second, micros) => {
            NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
                .and_then(|date| {
                    date.and_hms_micro_opt(
                        u32::from(hour),
                        u32::from(minute),
                        u32::from(second),
                        micros,
                    )
                })
                .map_or_else(
                    || {
                        Value::Text(format!(
                            "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}.{micros:06}"
                        ))
                    },
                    Value::DateTime,
                )
        }
        M::Time(negative, days, hours, minutes, seconds, micros) => {
            let within_day = (!negative && days == 0)
                .then(|| {
                    NaiveTime::from_hms_micro_opt(
                        u32::from(hours),
                        u32::from(minutes),
                        u32::from(seconds),
                        micros,
                    )
                })
                .flatten();
            match within_day {
                Some(t) => Value::Time(t),
                None => {
                    let sign = if negative { "-" } else { "" };
                    let hours = u64::from(days) * 24 + u64::from(hours);
                    Value::Text(format!(
                        "{sign}{hours:02}:{minutes:02}:{seconds:02}.{micros:06}"
                    ))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_mode_without_backslash_escapes_is_refused() {
        assert!(check_sql_mode("").is_ok());
        assert!(check_sql_mode("STRICT_TRANS_TABLES,ONLY_FULL_GROUP_BY").is_ok());
        let err = check_sql_mode("STRICT_TRANS_TABLES,NO_BACKSLASH_ESCAPES").unwrap_err();
        assert!(matches!(err, DbError::Connection(ref m) if m.contains("NO_BACKSLASH_ESCAPES")));
    }
}
