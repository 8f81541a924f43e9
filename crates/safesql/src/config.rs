//! Connection configuration.

use crate::error::{DbError, DbResult};
use crate::transaction::TransactionIsolation;
use serde::Deserialize;
use std::fmt;

/// Configuration for [`Database`](crate::Database).
///
/// Supplied once at startup. Can be built in code, deserialized from a config
/// file, or read from `DATABASE_*` environment variables with
/// [`DatabaseConfig::from_env`].
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Dialect name (`mysql` / `mariadb`).
    #[serde(alias = "driver")]
    pub dialect: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Database (schema) name.
    pub schema: String,
    /// Isolation level for transactions opened by this handle.
    pub isolation: TransactionIsolation,
    /// Truncate logged SQL to this many bytes. `None` logs full statements.
    pub log_max_sql_length: Option<usize>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dialect: "mysql".to_string(),
            host: "localhost".to_string(),
            port: 3306,
            user: String::new(),
            password: String::new(),
            schema: String::new(),
            isolation: TransactionIsolation::ReadCommitted,
            log_max_sql_length: Some(200),
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("dialect", &self.dialect)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("schema", &self.schema)
            .field("isolation", &self.isolation)
            .field("log_max_sql_length", &self.log_max_sql_length)
            .finish()
    }
}

impl DatabaseConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dialect(mut self, dialect: impl Into<String>) -> Self {
        self.dialect = dialect.into();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the credential pair.
    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn isolation(mut self, isolation: TransactionIsolation) -> Self {
        self.isolation = isolation;
        self
    }

    /// Set maximum SQL length to log.
    pub fn log_max_sql_length(mut self, len: usize) -> Self {
        self.log_max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation in logs.
    pub fn no_log_truncate(mut self) -> Self {
        self.log_max_sql_length = None;
        self
    }

    /// Read `DATABASE_DRIVER`, `DATABASE_HOST`, `DATABASE_USER`,
    /// `DATABASE_PASSWORD` and `DATABASE_SCHEMA` (all required), plus the
    /// optional `DATABASE_PORT` and `DATABASE_ISOLATION`.
    pub fn from_env() -> DbResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DbResult<Self> {
        let required = |key: &str, field: &str| {
            lookup(key).ok_or_else(|| DbError::Config(format!("{field} is not set")))
        };

        let mut config = Self::default()
            .dialect(required("DATABASE_DRIVER", "driver")?)
            .host(required("DATABASE_HOST", "host")?)
            .credentials(
                required("DATABASE_USER", "user")?,
                required("DATABASE_PASSWORD", "password")?,
            )
            .schema(required("DATABASE_SCHEMA", "schema")?);

        if let Some(port) = lookup("DATABASE_PORT") {
            config.port = port
                .trim()
                .parse()
                .map_err(|_| DbError::Config(format!("invalid port \"{port}\"")))?;
        }
        if let Some(isolation) = lookup("DATABASE_ISOLATION") {
            config.isolation = isolation.parse()?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn lookup_reads_required_fields() {
        let env = vars(&[
            ("DATABASE_DRIVER", "mysql"),
            ("DATABASE_HOST", "db.internal"),
            ("DATABASE_USER", "app"),
            ("DATABASE_PASSWORD", "secret"),
            ("DATABASE_SCHEMA", "cms"),
            ("DATABASE_PORT", "3307"),
        ]);
        let config = DatabaseConfig::from_lookup(|k| env.get(k).cloned()).unwrap();
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 3307);
        assert_eq!(config.schema, "cms");
        assert_eq!(config.isolation, TransactionIsolation::ReadCommitted);
    }

    #[test]
    fn missing_field_is_named() {
        let env = vars(&[("DATABASE_DRIVER", "mysql"), ("DATABASE_HOST", "h")]);
        let err = DatabaseConfig::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: user is not set");
    }

    #[test]
    fn debug_redacts_password() {
        let config = DatabaseConfig::new().credentials("app", "hunter2");
        let shown = format!("{config:?}");
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("<redacted>"));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: DatabaseConfig = serde_json::from_value(serde_json::json!({
            "driver": "mariadb",
            "host": "db",
            "isolation": "serializable",
        }))
        .unwrap();
        assert_eq!(config.dialect, "mariadb");
        assert_eq!(config.port, 3306);
        assert_eq!(config.isolation, TransactionIsolation::Serializable);
        assert_eq!(config.log_max_sql_length, Some(200));
    }
}
