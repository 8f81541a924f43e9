//! MySQL column type descriptors.
//!
//! A descriptor is the type text as written in DDL or reported by
//! `SHOW COLUMNS` (`"INT UNSIGNED"`, `"varchar(255)"`, `"enum('a','b')"`,
//! `"DATETIME(3) NULL"`). Parsing is case-insensitive and enforces the limits
//! MySQL places on each type's parameters.

use crate::error::{DbError, DbResult};
use regex::Regex;
use std::sync::OnceLock;

/// Integer storage width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    Tiny,
    Small,
    Medium,
    Int,
    Big,
}

impl IntWidth {
    /// Inclusive value range.
    pub fn range(self, unsigned: bool) -> (i128, i128) {
        match (self, unsigned) {
            (Self::Tiny, false) => (-128, 127),
            (Self::Tiny, true) => (0, 255),
            (Self::Small, false) => (-32_768, 32_767),
            (Self::Small, true) => (0, 65_535),
            (Self::Medium, false) => (-8_388_608, 8_388_607),
            (Self::Medium, true) => (0, 16_777_215),
            (Self::Int, false) => (i128::from(i32::MIN), i128::from(i32::MAX)),
            (Self::Int, true) => (0, i128::from(u32::MAX)),
            (Self::Big, false) => (i128::from(i64::MIN), i128::from(i64::MAX)),
            (Self::Big, true) => (0, i128::from(u64::MAX)),
        }
    }
}

/// A parsed MySQL column type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Null,
    Boolean,
    Bit(u32),
    Integer { width: IntWidth, unsigned: bool },
    Decimal { precision: u32, scale: u32, unsigned: bool },
    Float { unsigned: bool },
    Double { unsigned: bool },
    Year,
    Char { size: u32, national: bool },
    VarChar { size: u32, national: bool },
    /// TINYTEXT / TEXT / MEDIUMTEXT / LONGTEXT, limit in characters.
    Text { max_chars: u64 },
    Binary(u32),
    VarBinary(u32),
    /// TINYBLOB / BLOB / MEDIUMBLOB / LONGBLOB, limit in bytes.
    Blob { max_bytes: u64 },
    Enum(Vec<String>),
    Set(Vec<String>),
    Date,
    DateTime(u32),
    Timestamp(u32),
    Time(u32),
}

/// A column type plus whether it admits NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub column: ColumnType,
    pub nullable: bool,
}

const MAX_SET_MEMBERS: usize = 64;
const MAX_ENUM_MEMBERS: usize = 65_535;

fn descriptor_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?is)^\s*([a-z]+(?:\s+[a-z]+)*?)\s*(?:\((.*)\))?((?:\s+(?:unsigned|signed|zerofill))*)\s*$",
        )
        .expect("invalid built-in type descriptor regex")
    })
}

fn nullability_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)^(.*?\S)\s+(not\s+)?null\s*$")
            .expect("invalid built-in nullability regex")
    })
}

impl TypeDescriptor {
    /// Parse a descriptor, including an optional trailing `NULL` / `NOT NULL`.
    ///
    /// The bare descriptor `NULL` is the null type. Any other descriptor admits
    /// NULL only when it ends in `NULL`.
    pub fn parse(descriptor: &str) -> DbResult<Self> {
        if let Some(caps) = nullability_re().captures(descriptor) {
            let base = caps.get(1).map_or("", |m| m.as_str());
            let nullable = caps.get(2).is_none();
            return Ok(Self {
                column: ColumnType::parse(base)?,
                nullable,
            });
        }
        let column = ColumnType::parse(descriptor)?;
        let nullable = column == ColumnType::Null;
        Ok(Self { column, nullable })
    }
}

fn invalid(descriptor: &str, reason: impl std::fmt::Display) -> DbError {
    DbError::invalid_value(format!("invalid type \"{descriptor}\": {reason}"))
}

impl ColumnType {
    /// Parse a bare column type (no nullability suffix).
    pub fn parse(descriptor: &str) -> DbResult<Self> {
        let caps = descriptor_re()
            .captures(descriptor)
            .ok_or_else(|| invalid(descriptor, "unrecognized type syntax"))?;
        let name = caps[1]
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        let args = caps.get(2).map(|m| m.as_str());
        let attrs = caps.get(3).map_or("", |m| m.as_str()).to_ascii_uppercase();
        let unsigned = attrs.contains("UNSIGNED") || attrs.contains("ZEROFILL");
        let has_attrs = !attrs.trim().is_empty();

        let ty = match name.as_str() {
            "NULL" => {
                no_args(descriptor, args)?;
                Self::Null
            }
            "BOOL" | "BOOLEAN" => {
                no_args(descriptor, args)?;
                Self::Boolean
            }
            "BIT" => Self::Bit(single(descriptor, args, 1, 1, 64)?),
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" => {
                // Display width is accepted and ignored.
                single(descriptor, args, 1, 1, 255)?;
                let width = match name.as_str() {
                    "TINYINT" => IntWidth::Tiny,
                    "SMALLINT" => IntWidth::Small,
                    "MEDIUMINT" => IntWidth::Medium,
                    "BIGINT" => IntWidth::Big,
                    _ => IntWidth::Int,
                };
                return Ok(Self::Integer { width, unsigned });
            }
            "SERIAL" => {
                no_args(descriptor, args)?;
                Self::Integer {
                    width: IntWidth::Big,
                    unsigned: true,
                }
            }
            "DECIMAL" | "DEC" | "NUMERIC" | "FIXED" => {
                let nums = numbers(descriptor, args)?;
                let (precision, scale) = match nums.as_slice() {
                    [] => (10, 0),
                    [p] => (*p, 0),
                    [p, s] => (*p, *s),
                    _ => return Err(invalid(descriptor, "expected (precision[,scale])")),
                };
                if !(1..=65).contains(&precision) {
                    return Err(invalid(descriptor, "precision must be between 1 and 65"));
                }
                if scale > 30 || scale > precision {
                    return Err(invalid(
                        descriptor,
                        "scale must not exceed 30 or the precision",
                    ));
                }
                return Ok(Self::Decimal {
                    precision,
                    scale,
                    unsigned,
                });
            }
            "FLOAT" => {
                let nums = numbers(descriptor, args)?;
                return match nums.as_slice() {
                    [] | [_, _] => Ok(Self::Float { unsigned }),
                    [p] if *p <= 24 => Ok(Self::Float { unsigned }),
                    [p] if *p <= 53 => Ok(Self::Double { unsigned }),
                    _ => Err(invalid(descriptor, "float precision must not exceed 53")),
                };
            }
            "DOUBLE" | "DOUBLE PRECISION" | "REAL" => {
                let nums = numbers(descriptor, args)?;
                if !(nums.is_empty() || nums.len() == 2) {
                    return Err(invalid(descriptor, "expected (M,D)"));
                }
                return Ok(Self::Double { unsigned });
            }
            "YEAR" => {
                if let Some(width) = args {
                    if width.trim() != "4" {
                        return Err(invalid(descriptor, "only YEAR(4) is supported"));
                    }
                }
                Self::Year
            }
            "CHAR" | "CHARACTER" => Self::Char {
                size: single(descriptor, args, 1, 0, 255)?,
                national: false,
            },
            "NCHAR" | "NATIONAL CHAR" | "NATIONAL CHARACTER" => Self::Char {
                size: single(descriptor, args, 1, 0, 255)?,
                national: true,
            },
            "VARCHAR" | "CHARACTER VARYING" | "CHAR VARYING" => Self::VarChar {
                size: single(descriptor, args, 65_535, 0, 65_535)?,
                national: false,
            },
            "NVARCHAR"
            | "NATIONAL VARCHAR"
            | "NATIONAL CHARACTER VARYING"
            | "NATIONAL CHAR VARYING"
            | "NCHAR VARYING" => Self::VarChar {
                size: single(descriptor, args, 65_535, 0, 65_535)?,
                national: true,
            },
            "BINARY" => Self::Binary(single(descriptor, args, 1, 0, 255)?),
            "VARBINARY" => Self::VarBinary(single(descriptor, args, 65_535, 0, 65_535)?),
            "TINYTEXT" => sized_text(descriptor, args, 255)?,
            "TEXT" => Self::Text {
                max_chars: u64::from(single(descriptor, args, 65_535, 0, 65_535)?),
            },
            "MEDIUMTEXT" => sized_text(descriptor, args, 16_777_215)?,
            "LONGTEXT" => sized_text(descriptor, args, 4_294_967_295)?,
            "TINYBLOB" => sized_blob(descriptor, args, 255)?,
            "BLOB" => Self::Blob {
                max_bytes: u64::from(single(descriptor, args, 65_535, 0, 65_535)?),
            },
            "MEDIUMBLOB" => sized_blob(descriptor, args, 16_777_215)?,
            "LONGBLOB" => sized_blob(descriptor, args, 4_294_967_295)?,
            "ENUM" => {
                let members = members(descriptor, args)?;
                if members.len() > MAX_ENUM_MEMBERS {
                    return Err(invalid(descriptor, "too many ENUM members"));
                }
                Self::Enum(members)
            }
            "SET" => {
                let members = members(descriptor, args)?;
                if members.len() > MAX_SET_MEMBERS {
                    return Err(invalid(descriptor, "too many SET members"));
                }
                if members.iter().any(|m| m.contains(',')) {
                    return Err(invalid(descriptor, "SET members must not contain ','"));
                }
                Self::Set(members)
            }
            "DATE" => {
                no_args(descriptor, args)?;
                Self::Date
            }
            "DATETIME" => Self::DateTime(single(descriptor, args, 0, 0, 6)?),
            "TIMESTAMP" => Self::Timestamp(single(descriptor, args, 0, 0, 6)?),
            "TIME" => Self::Time(single(descriptor, args, 0, 0, 6)?),
            _ => return Err(invalid(descriptor, "unknown type")),
        };

        if has_attrs {
            return Err(invalid(descriptor, "UNSIGNED/ZEROFILL only apply to numeric types"));
        }
        Ok(ty)
    }
}

fn no_args(descriptor: &str, args: Option<&str>) -> DbResult<()> {
    match args {
        None => Ok(()),
        Some(_) => Err(invalid(descriptor, "type takes no parameters")),
    }
}

fn numbers(descriptor: &str, args: Option<&str>) -> DbResult<Vec<u32>> {
    let Some(args) = args else {
        return Ok(Vec::new());
    };
    args.split(',')
        .map(|part| {
            let part = part.trim();
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid(descriptor, "expected numeric parameters"));
            }
            part.parse::<u32>()
                .map_err(|_| invalid(descriptor, "numeric parameter out of range"))
        })
        .collect()
}

/// A single optional numeric parameter with a default and an inclusive range.
fn single(descriptor: &str, args: Option<&str>, default: u32, min: u32, max: u32) -> DbResult<u32> {
    let nums = numbers(descriptor, args)?;
    let n = match nums.as_slice() {
        [] => default,
        [n] => *n,
        _ => return Err(invalid(descriptor, "expected a single parameter")),
    };
    if n < min || n > max {
        return Err(invalid(
            descriptor,
            format!("parameter must be between {min} and {max}"),
        ));
    }
    Ok(n)
}

fn sized_text(descriptor: &str, args: Option<&str>, max_chars: u64) -> DbResult<ColumnType> {
    no_args(descriptor, args)?;
    Ok(ColumnType::Text { max_chars })
}

fn sized_blob(descriptor: &str, args: Option<&str>, max_bytes: u64) -> DbResult<ColumnType> {
    no_args(descriptor, args)?;
    Ok(ColumnType::Blob { max_bytes })
}

/// Parse `'a','b''c','d\'e'` into its members.
fn members(descriptor: &str, args: Option<&str>) -> DbResult<Vec<String>> {
    let args = args.ok_or_else(|| invalid(descriptor, "missing member list"))?;
    let mut out = Vec::new();
    let mut chars = args.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        if chars.next() != Some('\'') {
            return Err(invalid(descriptor, "members must be quoted strings"));
        }
        let mut member = String::new();
        loop {
            match chars.next() {
                Some('\'') if chars.peek() == Some(&'\'') => {
                    chars.next();
                    member.push('\'');
                }
                Some('\'') => break,
                Some('\\') => match chars.next() {
                    Some(c) => member.push(c),
                    None => return Err(invalid(descriptor, "unterminated member")),
                },
                Some(c) => member.push(c),
                None => return Err(invalid(descriptor, "unterminated member")),
            }
        }
        out.push(member);

        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next() {
            Some(',') => continue,
            None => break,
            Some(_) => return Err(invalid(descriptor, "expected ',' between members")),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_integer_families() {
        assert_eq!(
            ColumnType::parse("int(10) unsigned").unwrap(),
            ColumnType::Integer {
                width: IntWidth::Int,
                unsigned: true
            }
        );
        assert_eq!(
            ColumnType::parse("TINYINT UNSIGNED ZEROFILL").unwrap(),
            ColumnType::Integer {
                width: IntWidth::Tiny,
                unsigned: true
            }
        );
        assert_eq!(
            ColumnType::parse("serial").unwrap(),
            ColumnType::Integer {
                width: IntWidth::Big,
                unsigned: true
            }
        );
        assert_eq!(
            ColumnType::parse("BIGINT").unwrap(),
            ColumnType::Integer {
                width: IntWidth::Big,
                unsigned: false
            }
        );
    }

    #[test]
    fn parses_multi_word_names() {
        assert_eq!(
            ColumnType::parse("double  precision").unwrap(),
            ColumnType::Double { unsigned: false }
        );
        assert_eq!(
            ColumnType::parse("NATIONAL CHARACTER VARYING(20)").unwrap(),
            ColumnType::VarChar {
                size: 20,
                national: true
            }
        );
    }

    #[test]
    fn decimal_defaults_and_limits() {
        assert_eq!(
            ColumnType::parse("DECIMAL").unwrap(),
            ColumnType::Decimal {
                precision: 10,
                scale: 0,
                unsigned: false
            }
        );
        assert_eq!(
            ColumnType::parse("numeric(5, 2)").unwrap(),
            ColumnType::Decimal {
                precision: 5,
                scale: 2,
                unsigned: false
            }
        );
        assert!(ColumnType::parse("DECIMAL(66,2)").is_err());
        assert!(ColumnType::parse("DECIMAL(40,31)").is_err());
        assert!(ColumnType::parse("DECIMAL(2,3)").is_err());
    }

    #[test]
    fn float_precision_selects_width() {
        assert_eq!(
            ColumnType::parse("FLOAT(24)").unwrap(),
            ColumnType::Float { unsigned: false }
        );
        assert_eq!(
            ColumnType::parse("FLOAT(25)").unwrap(),
            ColumnType::Double { unsigned: false }
        );
        assert!(ColumnType::parse("FLOAT(54)").is_err());
    }

    #[test]
    fn size_limits() {
        assert_eq!(ColumnType::parse("BIT").unwrap(), ColumnType::Bit(1));
        assert!(ColumnType::parse("BIT(65)").is_err());
        assert!(ColumnType::parse("BIT(0)").is_err());
        assert!(ColumnType::parse("CHAR(256)").is_err());
        assert!(ColumnType::parse("VARCHAR(65536)").is_err());
        assert!(ColumnType::parse("DATETIME(7)").is_err());
        assert_eq!(ColumnType::parse("datetime(6)").unwrap(), ColumnType::DateTime(6));
    }

    #[test]
    fn enum_members_with_escapes() {
        assert_eq!(
            ColumnType::parse(r"enum('a','it''s','x\'y', 'with space')").unwrap(),
            ColumnType::Enum(vec![
                "a".into(),
                "it's".into(),
                "x'y".into(),
                "with space".into()
            ])
        );
        assert!(ColumnType::parse("ENUM(a,b)").is_err());
        assert!(ColumnType::parse("ENUM('a'").is_err());
        assert!(ColumnType::parse("ENUM").is_err());
    }

    #[test]
    fn set_member_limit() {
        let many: Vec<String> = (0..65).map(|i| format!("'m{i}'")).collect();
        assert!(ColumnType::parse(&format!("SET({})", many.join(","))).is_err());
        assert!(ColumnType::parse(&format!("SET({})", many[..64].join(","))).is_ok());
    }

    #[test]
    fn attributes_only_on_numbers() {
        assert!(ColumnType::parse("VARCHAR(10) UNSIGNED").is_err());
        assert!(ColumnType::parse("DECIMAL(10,2) UNSIGNED").is_ok());
    }

    #[test]
    fn nullability_suffix() {
        let d = TypeDescriptor::parse("INT UNSIGNED NULL").unwrap();
        assert!(d.nullable);
        assert_eq!(
            d.column,
            ColumnType::Integer {
                width: IntWidth::Int,
                unsigned: true
            }
        );
        assert!(!TypeDescriptor::parse("INT NOT NULL").unwrap().nullable);
        assert!(!TypeDescriptor::parse("INT").unwrap().nullable);
        let null = TypeDescriptor::parse("NULL").unwrap();
        assert!(null.nullable);
        assert_eq!(null.column, ColumnType::Null);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = ColumnType::parse("GEOMETRY").unwrap_err();
        assert!(err.is_invalid_value());
    }
}
