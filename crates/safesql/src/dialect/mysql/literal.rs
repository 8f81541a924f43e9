//! MySQL literal rendering.
//!
//! Every function here validates first and formats second: a value that does
//! not fit its declared type produces an error, never a literal.

use super::types::{ColumnType, IntWidth, TypeDescriptor};
use crate::error::{DbError, DbResult};
use crate::value::Value;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use std::borrow::Cow;
use std::fmt::{self, Write as _};
use std::str::FromStr;
use uuid::Uuid;

const DIALECT: &str = "mysql";

/// Largest scale `rust_decimal` can represent; wider DECIMAL scales are zero-padded.
const MAX_NATIVE_SCALE: u32 = 28;

/// Floats at least this large are integral and may exceed `Decimal`'s range.
const WIDE_FLOAT: f64 = 1e28;

const TIMESTAMP_MIN: i64 = 1;
const TIMESTAMP_MAX: i64 = 2_147_483_647;

/// Sanitize `value` against the declared type `ty`, or the default type for its kind.
pub(super) fn sanitize_value(value: &Value, ty: Option<&str>) -> DbResult<String> {
    if let Value::Json(_) = value {
        return Err(DbError::UnsupportedValue {
            kind: value.kind(),
            dialect: DIALECT.to_string(),
        });
    }

    let label: Cow<'_, str> = match ty {
        Some(ty) => Cow::Borrowed(ty),
        None => Cow::Owned(default_type(value)?),
    };
    let TypeDescriptor { column, nullable } = TypeDescriptor::parse(&label)?;
    let target = Target {
        column: &column,
        label: &label,
    };

    match value {
        Value::Null if nullable => Ok("NULL".to_string()),
        Value::Null => Err(target.mismatch(value)),
        Value::Bool(b) => boolean(*b, target),
        Value::Int(i) => integer(i128::from(*i), target),
        Value::UInt(u) => integer(i128::from(*u), target),
        Value::Float(f) => float(*f, target),
        Value::Decimal(d) => decimal(*d, target),
        Value::Text(s) => text(s, target),
        Value::Bytes(b) => bytes(b, target),
        Value::List(items) => list(items, target),
        Value::Date(d) => date(*d, target),
        Value::Time(t) => time(*t, target),
        Value::DateTime(dt) => datetime(*dt, target),
        Value::Uuid(u) => uuid(u, target),
        Value::Json(_) => Err(target.mismatch(value)),
    }
}

/// Type assumed when a parameter carries no declared type.
fn default_type(value: &Value) -> DbResult<String> {
    let ty = match value {
        Value::Null => "NULL",
        Value::Bool(_) => "BOOLEAN",
        Value::Int(_) => "BIGINT",
        Value::UInt(_) => "BIGINT UNSIGNED",
        Value::Float(_) => "DOUBLE",
        Value::Decimal(d) => return Ok(format!("DECIMAL(65,{})", d.scale())),
        Value::Text(_) => "VARCHAR",
        Value::Bytes(_) => "VARBINARY",
        Value::List(_) => {
            return Err(DbError::invalid_value(
                "list value requires a declared SET type",
            ));
        }
        Value::Date(_) => "DATE",
        Value::Time(_) => "TIME",
        Value::DateTime(_) => "DATETIME",
        Value::Uuid(_) => "CHAR(36)",
        Value::Json(_) => "JSON",
    };
    Ok(ty.to_string())
}

/// The declared type a value is checked against.
#[derive(Clone, Copy)]
struct Target<'a> {
    column: &'a ColumnType,
    label: &'a str,
}

impl Target<'_> {
    fn mismatch(&self, value: &Value) -> DbError {
        DbError::invalid_value(format!(
            "invalid type \"{}\" for {} value",
            self.label,
            value.kind()
        ))
    }

    fn rejects(&self, kind: &str, shown: impl fmt::Display) -> DbError {
        DbError::invalid_value(format!(
            "invalid {kind} value ({shown}) for type \"{}\"",
            self.label
        ))
    }
}

fn boolean(b: bool, target: Target<'_>) -> DbResult<String> {
    match target.column {
        ColumnType::Boolean
        | ColumnType::Integer {
            width: IntWidth::Tiny,
            ..
        }
        | ColumnType::Bit(1) => Ok(if b { "TRUE" } else { "FALSE" }.to_string()),
        _ => Err(target.mismatch(&Value::Bool(b))),
    }
}

fn integer(v: i128, target: Target<'_>) -> DbResult<String> {
    let out_of_range = || target.rejects("integer", v);
    match *target.column {
        ColumnType::Boolean => {
            let (lo, hi) = IntWidth::Tiny.range(false);
            if v < lo || v > hi {
                return Err(out_of_range());
            }
            Ok(v.to_string())
        }
        ColumnType::Integer { width, unsigned } => {
            let (lo, hi) = width.range(unsigned);
            if v < lo || v > hi {
                return Err(out_of_range());
            }
            Ok(v.to_string())
        }
        ColumnType::Bit(size) => {
            let max = (1_u128 << size) - 1;
            let bits = u128::try_from(v).map_err(|_| out_of_range())?;
            if bits > max {
                return Err(out_of_range());
            }
            Ok(format!("b'{bits:0width$b}'", width = size as usize))
        }
        ColumnType::Year => {
            if v != 0 && !(1901..=2155).contains(&v) {
                return Err(out_of_range());
            }
            Ok(v.to_string())
        }
        ColumnType::Decimal {
            precision,
            scale,
            unsigned,
        } => {
            let d = Decimal::from_str(&v.to_string()).map_err(|_| out_of_range())?;
            fixed_point(d, precision, scale, unsigned, target, &v)
        }
        ColumnType::Float { unsigned } => {
            if unsigned && v < 0 {
                return Err(out_of_range());
            }
            Ok(format!("{:e}", v as f32))
        }
        ColumnType::Double { unsigned } => {
            if unsigned && v < 0 {
                return Err(out_of_range());
            }
            Ok(format!("{:e}", v as f64))
        }
        _ => Err(DbError::invalid_value(format!(
            "invalid type \"{}\" for integer value",
            target.label
        ))),
    }
}

fn float(f: f64, target: Target<'_>) -> DbResult<String> {
    if !f.is_finite() {
        return Err(target.rejects("float", f));
    }
    match *target.column {
        ColumnType::Boolean | ColumnType::Integer { .. } | ColumnType::Bit(_) | ColumnType::Year => {
            let (lo, hi) = integral_bounds(target.column);
            let t = f.trunc();
            if t < lo as f64 || t >= (hi + 1) as f64 {
                return Err(target.rejects("float", f));
            }
            integer(t as i128, target)
        }
        ColumnType::Decimal {
            precision,
            scale,
            unsigned,
        } => {
            if f.abs() >= WIDE_FLOAT {
                return wide_integral(&f.to_string(), precision, scale, unsigned, target, &f);
            }
            let d = Decimal::from_str(&f.to_string())
                .ok()
                .or_else(|| Decimal::from_f64(f))
                .ok_or_else(|| target.rejects("float", f))?;
            fixed_point(d, precision, scale, unsigned, target, &f)
        }
        ColumnType::Float { unsigned } => {
            let magnitude = f.abs();
            let representable = magnitude == 0.0
                || (f64::from(f32::MIN_POSITIVE)..=f64::from(f32::MAX)).contains(&magnitude);
            if !representable || (unsigned && f < 0.0) {
                return Err(target.rejects("float", f));
            }
            Ok(format!("{:e}", f as f32))
        }
        ColumnType::Double { unsigned } => {
            if unsigned && f < 0.0 {
                return Err(target.rejects("float", f));
            }
            Ok(format!("{f:e}"))
        }
        _ => Err(target.mismatch(&Value::Float(f))),
    }
}

fn decimal(d: Decimal, target: Target<'_>) -> DbResult<String> {
    match *target.column {
        ColumnType::Decimal {
            precision,
            scale,
            unsigned,
        } => fixed_point(d, precision, scale, unsigned, target, &d),
        ColumnType::Boolean | ColumnType::Integer { .. } | ColumnType::Bit(_) | ColumnType::Year => {
            let t = d
                .trunc()
                .to_i128()
                .ok_or_else(|| target.rejects("decimal", d))?;
            integer(t, target).map_err(|_| target.rejects("decimal", d))
        }
        ColumnType::Float { .. } | ColumnType::Double { .. } => {
            let f = d.to_f64().ok_or_else(|| target.rejects("decimal", d))?;
            float(f, target)
        }
        _ => Err(target.mismatch(&Value::Decimal(d))),
    }
}

/// Render an integral value too wide for `Decimal`, given as plain digits.
fn wide_integral(
    digits: &str,
    precision: u32,
    scale: u32,
    unsigned: bool,
    target: Target<'_>,
    shown: &dyn fmt::Display,
) -> DbResult<String> {
    let negative = digits.starts_with('-');
    let magnitude = digits.trim_start_matches('-');
    if (unsigned && negative)
        || !magnitude.bytes().all(|b| b.is_ascii_digit())
        || magnitude.len() > (precision - scale) as usize
    {
        return Err(target.rejects("numeric", shown));
    }
    let mut out = digits.to_string();
    if scale > 0 {
        out.push('.');
        out.extend(std::iter::repeat_n('0', scale as usize));
    }
    Ok(out)
}

/// Inclusive bounds of an integer-valued column type.
fn integral_bounds(column: &ColumnType) -> (i128, i128) {
    match *column {
        ColumnType::Integer { width, unsigned } => width.range(unsigned),
        ColumnType::Bit(size) => (0, (1_i128 << size) - 1),
        ColumnType::Year => (0, 2155),
        _ => IntWidth::Tiny.range(false),
    }
}

/// Render `d` with exactly `scale` fractional digits, rounding half away from zero.
///
/// Fails when the rounded value needs more than `precision - scale` integral
/// digits; digits are never dropped.
fn fixed_point(
    d: Decimal,
    precision: u32,
    scale: u32,
    unsigned: bool,
    target: Target<'_>,
    shown: &dyn fmt::Display,
) -> DbResult<String> {
    let kind = "numeric";
    let rounded = d.round_dp_with_strategy(
        scale.min(MAX_NATIVE_SCALE),
        RoundingStrategy::MidpointAwayFromZero,
    );
    let rounded = if rounded.is_zero() {
        Decimal::ZERO
    } else {
        rounded
    };
    if unsigned && rounded.is_sign_negative() {
        return Err(target.rejects(kind, shown));
    }

    let normalized = rounded.normalize().to_string();
    let (int_part, frac_part) = normalized
        .split_once('.')
        .unwrap_or((normalized.as_str(), ""));
    let digits = int_part.trim_start_matches('-');
    let integral_digits = if digits == "0" { 0 } else { digits.len() };
    if integral_digits > (precision - scale) as usize {
        return Err(target.rejects(kind, shown));
    }

    let mut out = int_part.to_string();
    if scale > 0 {
        out.push('.');
        out.push_str(frac_part);
        out.extend(std::iter::repeat_n('0', scale as usize - frac_part.len()));
    }
    Ok(out)
}

fn text(s: &str, target: Target<'_>) -> DbResult<String> {
    let oversize = || {
        DbError::invalid_value(format!(
            "string value of {} characters exceeds type \"{}\"",
            s.chars().count(),
            target.label
        ))
    };
    match target.column {
        ColumnType::Char { size, national } => {
            let len = s.chars().count();
            if len > *size as usize {
                return Err(oversize());
            }
            let mut padded = s.to_string();
            padded.extend(std::iter::repeat_n(' ', *size as usize - len));
            Ok(quote(&padded, *national))
        }
        ColumnType::VarChar {
            size,
            national: false,
        } => {
            let truncated: Cow<'_, str> = match s.char_indices().nth(*size as usize) {
                Some((end, _)) => Cow::Borrowed(&s[..end]),
                None => Cow::Borrowed(s),
            };
            Ok(quote(&truncated, false))
        }
        ColumnType::VarChar {
            size,
            national: true,
        } => {
            if s.chars().count() > *size as usize {
                return Err(oversize());
            }
            Ok(quote(s, true))
        }
        ColumnType::Text { max_chars } => {
            if s.chars().count() as u64 > *max_chars {
                return Err(oversize());
            }
            Ok(quote(s, false))
        }
        ColumnType::Binary(_) | ColumnType::VarBinary(_) | ColumnType::Blob { .. } => {
            bytes(s.as_bytes(), target)
        }
        ColumnType::Enum(members) => {
            if !members.iter().any(|m| m == s) {
                return Err(DbError::invalid_value(format!(
                    "invalid member ('{s}') for type \"{}\"",
                    target.label
                )));
            }
            Ok(quote(s, false))
        }
        ColumnType::Set(members) => {
            if !s.is_empty() {
                if let Some(bad) = s.split(',').find(|item| !members.iter().any(|m| m == item)) {
                    return Err(DbError::invalid_value(format!(
                        "invalid member ('{bad}') for type \"{}\"",
                        target.label
                    )));
                }
            }
            Ok(quote(s, false))
        }
        _ => Err(DbError::invalid_value(format!(
            "invalid type \"{}\" for string value",
            target.label
        ))),
    }
}

fn bytes(b: &[u8], target: Target<'_>) -> DbResult<String> {
    let oversize = || {
        DbError::invalid_value(format!(
            "binary string value of {} bytes exceeds type \"{}\"",
            b.len(),
            target.label
        ))
    };
    match target.column {
        ColumnType::Binary(size) => {
            if b.len() > *size as usize {
                return Err(oversize());
            }
            let mut padded = b.to_vec();
            padded.resize(*size as usize, 0);
            Ok(hex_literal(&padded))
        }
        ColumnType::VarBinary(size) => {
            if b.len() > *size as usize {
                return Err(oversize());
            }
            Ok(hex_literal(b))
        }
        ColumnType::Blob { max_bytes } => {
            if b.len() as u64 > *max_bytes {
                return Err(oversize());
            }
            Ok(hex_literal(b))
        }
        ColumnType::Char { .. }
        | ColumnType::VarChar { .. }
        | ColumnType::Text { .. }
        | ColumnType::Enum(_)
        | ColumnType::Set(_) => {
            let s = std::str::from_utf8(b).map_err(|_| {
                DbError::invalid_value(format!(
                    "binary string value is not valid UTF-8 for type \"{}\"",
                    target.label
                ))
            })?;
            text(s, target)
        }
        _ => Err(target.mismatch(&Value::Bytes(Vec::new()))),
    }
}

fn list(items: &[String], target: Target<'_>) -> DbResult<String> {
    let ColumnType::Set(members) = target.column else {
        return Err(DbError::invalid_value(format!(
            "invalid type \"{}\" for list value",
            target.label
        )));
    };
    if let Some(bad) = items.iter().find(|item| !members.contains(*item)) {
        return Err(DbError::invalid_value(format!(
            "invalid member ('{bad}') in list value for type \"{}\"",
            target.label
        )));
    }
    Ok(quote(&items.join(","), false))
}

fn date(d: NaiveDate, target: Target<'_>) -> DbResult<String> {
    match target.column {
        ColumnType::Date => {
            check_year(d.year(), target, &d)?;
            Ok(quote(&d.format("%Y-%m-%d").to_string(), false))
        }
        ColumnType::DateTime(_) | ColumnType::Timestamp(_) => {
            datetime(d.and_time(NaiveTime::MIN), target)
        }
        ColumnType::Year => integer(i128::from(d.year()), target),
        _ => Err(target.mismatch(&Value::Date(d))),
    }
}

fn datetime(dt: NaiveDateTime, target: Target<'_>) -> DbResult<String> {
    match *target.column {
        ColumnType::DateTime(fsp) => {
            check_year(dt.year(), target, &dt)?;
            Ok(quote(&format_datetime(dt, fsp), false))
        }
        ColumnType::Timestamp(fsp) => {
            let epoch = dt.and_utc().timestamp();
            if !(TIMESTAMP_MIN..=TIMESTAMP_MAX).contains(&epoch) {
                return Err(target.rejects("datetime", dt));
            }
            Ok(quote(&format_datetime(dt, fsp), false))
        }
        ColumnType::Date if dt.time() == NaiveTime::MIN => date(dt.date(), target),
        _ => Err(target.mismatch(&Value::DateTime(dt))),
    }
}

fn time(t: NaiveTime, target: Target<'_>) -> DbResult<String> {
    match *target.column {
        ColumnType::Time(fsp) => {
            let mut out = t.format("%H:%M:%S").to_string();
            push_fraction(&mut out, t.nanosecond(), fsp);
            Ok(quote(&out, false))
        }
        _ => Err(target.mismatch(&Value::Time(t))),
    }
}

fn uuid(u: &Uuid, target: Target<'_>) -> DbResult<String> {
    match *target.column {
        ColumnType::Char { .. } | ColumnType::Text { .. } => {
            text(&u.hyphenated().to_string(), target)
        }
        ColumnType::VarChar { size, .. } => {
            if size < 36 {
                return Err(target.rejects("uuid", u));
            }
            text(&u.hyphenated().to_string(), target)
        }
        ColumnType::Binary(_) | ColumnType::VarBinary(_) | ColumnType::Blob { .. } => {
            bytes(u.as_bytes(), target).map_err(|_| target.rejects("uuid", u))
        }
        _ => Err(target.mismatch(&Value::Uuid(*u))),
    }
}

fn check_year(year: i32, target: Target<'_>, shown: &dyn fmt::Display) -> DbResult<()> {
    if !(1000..=9999).contains(&year) {
        return Err(target.rejects("temporal", shown));
    }
    Ok(())
}

fn format_datetime(dt: NaiveDateTime, fsp: u32) -> String {
    let mut out = dt.format("%Y-%m-%d %H:%M:%S").to_string();
    push_fraction(&mut out, dt.nanosecond(), fsp);
    out
}

/// Append `fsp` fractional-second digits, truncated from microseconds.
fn push_fraction(out: &mut String, nanos: u32, fsp: u32) {
    if fsp == 0 {
        return;
    }
    let micros = (nanos % 1_000_000_000) / 1_000;
    let digits = format!("{micros:06}");
    out.push('.');
    out.push_str(&digits[..fsp as usize]);
}

/// Quote a string literal.
///
/// Quotes are doubled rather than backslash-escaped, so the literal ends at the
/// same byte whether or not the session runs with `NO_BACKSLASH_ESCAPES`. The
/// other escapes follow `mysql_real_escape_string`.
pub(super) fn quote(s: &str, national: bool) -> String {
    let mut out = String::with_capacity(s.len() + 3);
    if national {
        out.push('N');
    }
    out.push('\'');
    for c in s.chars() {
        match c {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("''"),
            '"' => out.push_str("\\\""),
            '\x1a' => out.push_str("\\Z"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// `X'0AFF'`; valid for empty input too.
fn hex_literal(b: &[u8]) -> String {
    let mut out = String::with_capacity(b.len() * 2 + 3);
    out.push_str("X'");
    for byte in b {
        let _ = write!(out, "{byte:02X}");
    }
    out.push('\'');
    out
}
