//! Converting fetched MySQL values back into typed values.
//!
//! Text-protocol results arrive as strings or byte strings. When a fetched
//! value must be sanitized again (a primary key feeding a rewritten WHERE
//! clause) it is first decoded into the kind its declared type expects.

use super::types::{ColumnType, TypeDescriptor};
use crate::error::{DbError, DbResult};
use crate::value::Value;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use std::str::FromStr;

pub(super) fn decode_value(raw: Value, ty: &str) -> DbResult<Value> {
    let raw_bytes = match &raw {
        Value::Text(s) => s.as_bytes(),
        Value::Bytes(b) => b.as_slice(),
        _ => return Ok(raw),
    };
    let column = TypeDescriptor::parse(ty)?.column;
    let failed = |message: &str| DbError::decode(ty, message.to_string());

    let value = match column {
        ColumnType::Bit(_) => {
            // BIT arrives as big-endian bytes.
            if raw_bytes.len() > 8 {
                return Err(failed("BIT value wider than 64 bits"));
            }
            Value::UInt(
                raw_bytes
                    .iter()
                    .fold(0_u64, |acc, byte| (acc << 8) | u64::from(*byte)),
            )
        }
        ColumnType::Binary(_) | ColumnType::VarBinary(_) | ColumnType::Blob { .. } => {
            Value::Bytes(raw_bytes.to_vec())
        }
        other => {
            let text = std::str::from_utf8(raw_bytes).map_err(|_| failed("invalid UTF-8"))?;
            decode_text(text, &other).map_err(|message| failed(&message))?
        }
    };
    Ok(value)
}

fn decode_text(text: &str, column: &ColumnType) -> Result<Value, String> {
    let value = match column {
        ColumnType::Null => Value::Null,
        ColumnType::Integer { unsigned: true, .. } => {
            Value::UInt(text.parse().map_err(|e| format!("{e}: {text}"))?)
        }
        ColumnType::Integer { .. } | ColumnType::Boolean | ColumnType::Year => {
            Value::Int(text.parse().map_err(|e| format!("{e}: {text}"))?)
        }
        ColumnType::Decimal { .. } => {
            Value::Decimal(Decimal::from_str(text).map_err(|e| format!("{e}: {text}"))?)
        }
        ColumnType::Float { .. } | ColumnType::Double { .. } => {
            Value::Float(text.parse().map_err(|e| format!("{e}: {text}"))?)
        }
        ColumnType::Date => Value::Date(
            NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|e| format!("{e}: {text}"))?,
        ),
        ColumnType::DateTime(_) | ColumnType::Timestamp(_) => Value::DateTime(
            NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
                .map_err(|e| format!("{e}: {text}"))?,
        ),
        // TIME spans -838:59:59..838:59:59; values outside a day stay textual.
        ColumnType::Time(_) => match NaiveTime::parse_from_str(text, "%H:%M:%S%.f") {
            Ok(t) => Value::Time(t),
            Err(_) => Value::Text(text.to_string()),
        },
        _ => Value::Text(text.to_string()),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_follow_signedness() {
        assert_eq!(
            decode_value(Value::Text("7".into()), "int(10) unsigned").unwrap(),
            Value::UInt(7)
        );
        assert_eq!(
            decode_value(Value::Bytes(b"-7".to_vec()), "INT").unwrap(),
            Value::Int(-7)
        );
    }

    #[test]
    fn temporal_text_is_parsed() {
        assert_eq!(
            decode_value(Value::Text("2024-02-29 10:11:12.5".into()), "DATETIME(1)").unwrap(),
            Value::DateTime(
                NaiveDate::from_ymd_opt(2024, 2, 29)
                    .unwrap()
                    .and_hms_milli_opt(10, 11, 12, 500)
                    .unwrap()
            )
        );
        assert_eq!(
            decode_value(Value::Text("100:00:00".into()), "TIME").unwrap(),
            Value::Text("100:00:00".into())
        );
    }

    #[test]
    fn bit_bytes_are_big_endian() {
        assert_eq!(
            decode_value(Value::Bytes(vec![0x01, 0x02]), "BIT(16)").unwrap(),
            Value::UInt(0x0102)
        );
    }

    #[test]
    fn non_text_values_pass_through() {
        assert_eq!(decode_value(Value::Int(3), "INT").unwrap(), Value::Int(3));
        assert_eq!(decode_value(Value::Null, "INT").unwrap(), Value::Null);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = decode_value(Value::Text("abc".into()), "INT").unwrap_err();
        assert!(matches!(err, DbError::Decode { .. }));
    }
}
