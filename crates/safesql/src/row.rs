//! Result rows and typed column access.

use crate::error::{DbError, DbResult};
use crate::value::Value;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

/// One result row: output alias → value, in select-list order.
///
/// Values are in the store's fetch representation. Text-protocol results carry
/// most columns as text; [`Row::try_get`] converts to richer types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: IndexMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.columns.insert(column.into(), value.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    /// Take a column value out of the row.
    pub fn take(&mut self, column: &str) -> Option<Value> {
        self.columns.shift_remove(column)
    }

    /// Get a column converted to `T`, returning `DbError::Decode` on failure.
    pub fn try_get<T: FromValue>(&self, column: &str) -> DbResult<T> {
        let value = self
            .columns
            .get(column)
            .ok_or_else(|| DbError::decode(column, "no such column"))?;
        T::from_value(value).map_err(|message| DbError::decode(column, message))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            columns: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Trait for converting a result row into a Rust struct.
///
/// # Example
///
/// ```ignore
/// use safesql::{FromRow, Row, DbResult};
///
/// struct User {
///     id: u64,
///     email: String,
/// }
///
/// impl FromRow for User {
///     fn from_row(row: &Row) -> DbResult<Self> {
///         Ok(Self {
///             id: row.try_get("id")?,
///             email: row.try_get("email")?,
///         })
///     }
/// }
/// ```
pub trait FromRow: Sized {
    /// Convert a result row into Self
    fn from_row(row: &Row) -> DbResult<Self>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> DbResult<Self> {
        Ok(row.clone())
    }
}

/// Conversion from a fetched column value.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, String>;
}

fn unexpected<T>(value: &Value, wanted: &str) -> Result<T, String> {
    Err(format!("cannot read {} value as {wanted}", value.kind()))
}

fn parse_text<T: FromStr>(value: &Value, wanted: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    match value.as_str() {
        Some(s) => s.trim().parse().map_err(|e| format!("{e}: \"{s}\"")),
        None => unexpected(value, wanted),
    }
}

macro_rules! impl_from_value_int {
    ($($t:ty),*) => {$(
        impl FromValue for $t {
            fn from_value(value: &Value) -> Result<Self, String> {
                let out_of_range = |n: &dyn std::fmt::Display| {
                    format!("{n} out of range for {}", stringify!($t))
                };
                match value {
                    Value::Int(i) => <$t>::try_from(*i).map_err(|_| out_of_range(i)),
                    Value::UInt(u) => <$t>::try_from(*u).map_err(|_| out_of_range(u)),
                    Value::Bool(b) => Ok(<$t>::from(*b)),
                    _ => parse_text(value, stringify!($t)),
                }
            }
        }
    )*};
}

impl_from_value_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            Value::UInt(u) => Ok(*u != 0),
            _ => match value.as_str().map(str::trim) {
                Some("1") => Ok(true),
                Some("0") => Ok(false),
                _ => parse_text(value, "bool"),
            },
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            Value::UInt(u) => Ok(*u as f64),
            _ => parse_text(value, "f64"),
        }
    }
}

impl FromValue for Decimal {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Decimal(d) => Ok(*d),
            Value::Int(i) => Ok(Decimal::from(*i)),
            Value::UInt(u) => Ok(Decimal::from(*u)),
            _ => parse_text(value, "decimal"),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Int(i) => Ok(i.to_string()),
            Value::UInt(u) => Ok(u.to_string()),
            _ => value
                .as_str()
                .map(str::to_string)
                .map_or_else(|| unexpected(value, "string"), Ok),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.as_bytes().to_vec()),
            _ => unexpected(value, "bytes"),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Date(d) => Ok(*d),
            Value::DateTime(dt) => Ok(dt.date()),
            _ => match value.as_str() {
                Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("{e}: \"{s}\"")),
                None => unexpected(value, "date"),
            },
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::DateTime(dt) => Ok(*dt),
            Value::Date(d) => Ok(d.and_time(NaiveTime::MIN)),
            _ => match value.as_str() {
                Some(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                    .map_err(|e| format!("{e}: \"{s}\"")),
                None => unexpected(value, "datetime"),
            },
        }
    }
}

impl FromValue for NaiveTime {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Time(t) => Ok(*t),
            _ => match value.as_str() {
                Some(s) => NaiveTime::parse_from_str(s, "%H:%M:%S%.f").map_err(|e| format!("{e}: \"{s}\"")),
                None => unexpected(value, "time"),
            },
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Uuid(u) => Ok(*u),
            Value::Bytes(b) if b.len() == 16 => Uuid::from_slice(b).map_err(|e| e.to_string()),
            _ => parse_text(value, "uuid"),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Row {
        Row::new()
            .with("id", "42")
            .with("email", "a@b.com")
            .with("created", "2024-05-01 12:30:00")
            .with("archived", Value::Null)
    }

    #[test]
    fn keeps_select_order() {
        let row = sample();
        assert_eq!(
            row.columns().collect::<Vec<_>>(),
            vec!["id", "email", "created", "archived"]
        );
    }

    #[test]
    fn converts_text_columns() {
        let row = sample();
        assert_eq!(row.try_get::<u64>("id").unwrap(), 42);
        assert_eq!(row.try_get::<String>("email").unwrap(), "a@b.com");
        let created: NaiveDateTime = row.try_get("created").unwrap();
        assert_eq!(created.to_string(), "2024-05-01 12:30:00");
        assert_eq!(row.try_get::<Option<String>>("archived").unwrap(), None);
    }

    #[test]
    fn decode_errors_name_the_column() {
        let row = sample();
        let err = row.try_get::<i8>("email").unwrap_err();
        assert!(matches!(err, DbError::Decode { ref column, .. } if column == "email"));
        let err = row.try_get::<i64>("missing").unwrap_err();
        assert!(matches!(err, DbError::Decode { .. }));
    }

    #[test]
    fn integer_narrowing_is_checked() {
        let row = Row::new().with("n", 300_i64);
        assert_eq!(row.try_get::<u16>("n").unwrap(), 300);
        assert!(row.try_get::<u8>("n").is_err());
    }
}
