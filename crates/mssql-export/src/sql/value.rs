//! Value codec: one column value to one T-SQL literal.
//!
//! Stateless; dispatch is driven by the column's [`SqlTypeCode`]. NULL in
//! the cursor always yields the literal `NULL`, regardless of type.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use rust_decimal::Decimal;
use tiberius::Row;
use uuid::Uuid;

use crate::schema::SqlTypeCode;

/// Largest binary value emitted inline as `0x…`; anything bigger becomes
/// a NULL sentinel so the script stays loadable by hand.
pub const BINARY_INLINE_LIMIT: usize = 8000;

const NULL_LITERAL: &str = "NULL";

/// Format the value at `idx` as a T-SQL literal safe for a VALUES list.
pub fn format_value(row: &Row, idx: usize, code: SqlTypeCode) -> String {
    match code {
        SqlTypeCode::Char
        | SqlTypeCode::VarChar
        | SqlTypeCode::NChar
        | SqlTypeCode::NVarChar
        | SqlTypeCode::LongVarChar
        | SqlTypeCode::LongNVarChar => row
            .get::<&str, _>(idx)
            .map(string_literal)
            .unwrap_or_else(|| NULL_LITERAL.to_string()),

        SqlTypeCode::Guid => row
            .get::<Uuid, _>(idx)
            .map(|g| string_literal(&g.to_string()))
            .unwrap_or_else(|| NULL_LITERAL.to_string()),

        SqlTypeCode::Bit => row
            .get::<bool, _>(idx)
            .map(boolean_literal)
            .unwrap_or_else(|| NULL_LITERAL.to_string()),

        SqlTypeCode::TinyInt => numeric(row.get::<u8, _>(idx)),
        SqlTypeCode::SmallInt => numeric(row.get::<i16, _>(idx)),
        SqlTypeCode::Integer => numeric(row.get::<i32, _>(idx)),
        SqlTypeCode::BigInt => numeric(row.get::<i64, _>(idx)),
        SqlTypeCode::Real => numeric(row.get::<f32, _>(idx)),
        SqlTypeCode::Float => numeric(row.get::<f64, _>(idx)),

        // money/smallmoney come back as floats from the wire; fall back.
        SqlTypeCode::Decimal => row
            .get::<Decimal, _>(idx)
            .map(|d| d.to_string())
            .or_else(|| row.get::<f64, _>(idx).map(|f| f.to_string()))
            .unwrap_or_else(|| NULL_LITERAL.to_string()),

        SqlTypeCode::Date => row
            .get::<NaiveDateTime, _>(idx)
            .map(|dt| quoted(dt.date().format("%Y-%m-%d")))
            .unwrap_or_else(|| NULL_LITERAL.to_string()),

        SqlTypeCode::Time => row
            .get::<NaiveDateTime, _>(idx)
            .map(|dt| quoted(dt.time().format("%H:%M:%S%.f")))
            .unwrap_or_else(|| NULL_LITERAL.to_string()),

        SqlTypeCode::Timestamp => row
            .get::<NaiveDateTime, _>(idx)
            .map(|dt| quoted(dt.format("%Y-%m-%d %H:%M:%S%.f")))
            .unwrap_or_else(|| NULL_LITERAL.to_string()),

        SqlTypeCode::TimestampTz => row
            .get::<DateTime<FixedOffset>, _>(idx)
            .map(|dt| quoted(dt.format("%Y-%m-%d %H:%M:%S%.f %:z")))
            .unwrap_or_else(|| NULL_LITERAL.to_string()),

        SqlTypeCode::Binary | SqlTypeCode::VarBinary | SqlTypeCode::LongVarBinary => row
            .get::<&[u8], _>(idx)
            .map(binary_literal)
            .unwrap_or_else(|| NULL_LITERAL.to_string()),

        SqlTypeCode::Other => row
            .get::<&str, _>(idx)
            .map(fallback_literal)
            .unwrap_or_else(|| NULL_LITERAL.to_string()),
    }
}

/// `N'…'` with quote doubling; CRLF, LF, and CR collapse to one space so a
/// statement never spans lines.
pub(crate) fn string_literal(value: &str) -> String {
    let escaped = value
        .replace('\'', "''")
        .replace("\r\n", " ")
        .replace('\n', " ")
        .replace('\r', " ");
    format!("N'{}'", escaped)
}

pub(crate) fn boolean_literal(value: bool) -> String {
    let bit = if value { "1" } else { "0" };
    bit.to_string()
}

/// `0x…` lowercase hex, or the NULL sentinel above the inline limit.
pub(crate) fn binary_literal(bytes: &[u8]) -> String {
    if bytes.len() > BINARY_INLINE_LIMIT {
        return "NULL /* Binary data too large */".to_string();
    }
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// Unknown types keep the plain single-quoted form.
pub(crate) fn fallback_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn quoted(value: impl std::fmt::Display) -> String {
    format!("'{}'", value)
}

fn numeric<T: ToString>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| NULL_LITERAL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_literal_doubles_quotes_and_strips_newlines() {
        assert_eq!(string_literal("O'Reilly\nInc"), "N'O''Reilly Inc'");
        assert_eq!(string_literal("a\r\nb"), "N'a b'");
        assert_eq!(string_literal("a\rb"), "N'a b'");
        assert_eq!(string_literal("plain"), "N'plain'");
    }

    #[test]
    fn test_string_literal_always_national() {
        assert_eq!(string_literal(""), "N''");
    }

    #[test]
    fn test_boolean_literal() {
        assert_eq!(boolean_literal(true), "1");
        assert_eq!(boolean_literal(false), "0");
    }

    #[test]
    fn test_binary_literal_hex() {
        assert_eq!(binary_literal(&[0x00, 0xff, 0x0a]), "0x00ff0a");
        assert_eq!(binary_literal(&[]), "0x");
    }

    #[test]
    fn test_binary_literal_over_limit_is_sentinel() {
        let big = vec![0xabu8; BINARY_INLINE_LIMIT + 1];
        assert_eq!(binary_literal(&big), "NULL /* Binary data too large */");

        let at_limit = vec![0x01u8; BINARY_INLINE_LIMIT];
        assert!(binary_literal(&at_limit).starts_with("0x01"));
    }

    #[test]
    fn test_fallback_literal_escapes_quotes_without_prefix() {
        assert_eq!(fallback_literal("it's"), "'it''s'");
    }
}
