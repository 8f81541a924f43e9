//! Error types for safesql

use std::fmt;
use thiserror::Error;

/// Result type alias for safesql operations
pub type DbResult<T> = Result<T, DbError>;

/// The clause a malformed piece of declarative input belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseKind {
    /// Selection / returning column list
    Column,
    /// GROUP BY column list
    GroupBy,
    /// ORDER BY criteria
    OrderBy,
    /// LIMIT count/offset
    Limit,
    /// INSERT / UPDATE column → expression mapping
    TableRow,
}

impl fmt::Display for ClauseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Column => "column",
            Self::GroupBy => "group by",
            Self::OrderBy => "order by",
            Self::Limit => "limit",
            Self::TableRow => "table row",
        };
        f.write_str(name)
    }
}

/// Error types for database operations
#[derive(Debug, Error)]
pub enum DbError {
    /// No implementation exists for the requested dialect or capability
    #[error("Unsupported dialect: {0}")]
    UnsupportedDialect(String),

    /// A table/column/alias name failed the dialect's identifier grammar
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A value cannot satisfy its declared column type
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// A runtime value kind the dialect has no literal form for
    #[error("Unsupported value: cannot sanitize {kind} value for \"{dialect}\" dialect")]
    UnsupportedValue { kind: &'static str, dialect: String },

    /// Malformed declarative clause input
    #[error("Invalid {clause} data: {message}")]
    InvalidClauseData { clause: ClauseKind, message: String },

    /// Malformed placeholder name or parameter entry
    #[error("Invalid parameter data: {0}")]
    InvalidParameterData(String),

    /// Table without exactly one primary key column
    #[error("Primary key error: {0}")]
    PrimaryKey(String),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Driver error, passed through unchanged
    #[error("Driver error: {0}")]
    Driver(#[from] mysql_async::Error),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl DbError {
    /// Create an invalid identifier error
    pub fn invalid_identifier(message: impl Into<String>) -> Self {
        Self::InvalidIdentifier(message.into())
    }

    /// Create an invalid value error
    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue(message.into())
    }

    /// Create an invalid clause data error for a specific clause
    pub fn invalid_clause(clause: ClauseKind, message: impl Into<String>) -> Self {
        Self::InvalidClauseData {
            clause,
            message: message.into(),
        }
    }

    /// Create an invalid parameter data error
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameterData(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Check if this is an invalid identifier error
    pub fn is_invalid_identifier(&self) -> bool {
        matches!(self, Self::InvalidIdentifier(_))
    }

    /// Check if this is an invalid value error
    pub fn is_invalid_value(&self) -> bool {
        matches!(self, Self::InvalidValue(_))
    }

    /// Check if this is an invalid clause data error for `clause`
    pub fn is_invalid_clause(&self, clause: ClauseKind) -> bool {
        matches!(self, Self::InvalidClauseData { clause: c, .. } if *c == clause)
    }

    /// Check if this is an invalid parameter data error
    pub fn is_invalid_parameter(&self) -> bool {
        matches!(self, Self::InvalidParameterData(_))
    }

    /// Check if this error was raised by validation, before any SQL reached the store
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidIdentifier(_)
                | Self::InvalidValue(_)
                | Self::UnsupportedValue { .. }
                | Self::InvalidClauseData { .. }
                | Self::InvalidParameterData(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clause_error_renders_clause_name() {
        let err = DbError::invalid_clause(ClauseKind::OrderBy, "missing order by column data");
        assert_eq!(
            err.to_string(),
            "Invalid order by data: missing order by column data"
        );
        assert!(err.is_invalid_clause(ClauseKind::OrderBy));
        assert!(!err.is_invalid_clause(ClauseKind::GroupBy));
    }

    #[test]
    fn unsupported_value_names_kind_and_dialect() {
        let err = DbError::UnsupportedValue {
            kind: "json",
            dialect: "mysql".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unsupported value: cannot sanitize json value for \"mysql\" dialect"
        );
        assert!(err.is_validation());
    }
}
