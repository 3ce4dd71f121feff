use std::fmt;

use anyhow::{Result, anyhow};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::schema::ColumnType;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    DateTime(NaiveDateTime),
}

impl Eq for Value {}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Value::Boolean(b) => b.to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) if f.is_finite() => Some(*f),
            _ => None,
        }
    }

    /// Integer view used for coded columns; integral floats count as codes.
    pub fn as_code(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::String(_) => ColumnType::String,
            Value::Integer(_) => ColumnType::Integer,
            Value::Float(_) => ColumnType::Float,
            Value::Boolean(_) => ColumnType::Boolean,
            Value::DateTime(_) => ColumnType::DateTime,
        }
    }

    /// Converts the value into the representation of `target`, used when
    /// columns from several files are unified.
    pub fn coerce_to(self, target: &ColumnType) -> Value {
        match (target, self) {
            (ColumnType::Float, Value::Integer(i)) => Value::Float(i as f64),
            (ColumnType::String, other @ (Value::Integer(_)
            | Value::Float(_)
            | Value::Boolean(_)
            | Value::DateTime(_))) => Value::String(other.as_display()),
            (_, other) => other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %I:%M:%S %p",
        "%m/%d/%Y %H:%M",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    let trimmed = value.trim().trim_end_matches('Z');
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(parsed);
        }
    }
    // Date-only cells count as midnight of that day.
    parse_naive_date(trimmed)
        .map(|date| date.and_time(NaiveTime::MIN))
        .map_err(|_| anyhow!("Failed to parse '{value}' as datetime"))
}

pub fn parse_boolean(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Parses a raw text cell according to the inferred column type. Cells that
/// do not fit the type become missing rather than failing the load.
pub fn parse_typed_value(value: &str, ty: &ColumnType) -> Option<Value> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    match ty {
        ColumnType::Unknown | ColumnType::String => Some(Value::String(value.to_string())),
        ColumnType::Integer => trimmed.parse().ok().map(Value::Integer),
        ColumnType::Float => trimmed.parse().ok().map(Value::Float),
        ColumnType::Boolean => parse_boolean(trimmed).map(Value::Boolean),
        ColumnType::DateTime => parse_naive_datetime(trimmed).ok().map(Value::DateTime),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_naive_datetime_supports_tlc_formats() {
        let expected =
            NaiveDateTime::parse_from_str("2024-05-06 14:30:00", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(parse_naive_datetime("2024-05-06T14:30:00").unwrap(), expected);
        assert_eq!(parse_naive_datetime("05/06/2024 02:30:00 PM").unwrap(), expected);
        assert_eq!(parse_naive_datetime("2024-05-06 14:30").unwrap(), expected);
        assert_eq!(
            parse_naive_datetime("2024-05-06").unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 6)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
        assert!(parse_naive_datetime("yesterday").is_err());
    }

    #[test]
    fn parse_typed_value_turns_bad_cells_into_missing() {
        assert_eq!(parse_typed_value("", &ColumnType::Integer), None);
        assert_eq!(parse_typed_value("abc", &ColumnType::Float), None);
        assert_eq!(
            parse_typed_value(" 12.5 ", &ColumnType::Float),
            Some(Value::Float(12.5))
        );
        assert_eq!(
            parse_typed_value("TRUE", &ColumnType::Boolean),
            Some(Value::Boolean(true))
        );
    }

    #[test]
    fn integral_floats_are_codes() {
        assert_eq!(Value::Float(2.0).as_code(), Some(2));
        assert_eq!(Value::Float(2.5).as_code(), None);
        assert_eq!(Value::String("4".into()).as_code(), Some(4));
        assert_eq!(Value::Boolean(true).as_code(), None);
    }

    #[test]
    fn coerce_integer_into_float_and_text() {
        assert_eq!(Value::Integer(3).coerce_to(&ColumnType::Float), Value::Float(3.0));
        assert_eq!(
            Value::Float(1.5).coerce_to(&ColumnType::String),
            Value::String("1.5".into())
        );
    }
}
