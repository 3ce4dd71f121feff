//! Column types and type inference for text-based inputs.
//!
//! Delimited files carry no type information, so every column is scanned in
//! full and assigned the narrowest [`ColumnType`] that accepts all of its
//! non-empty cells. Timestamp-looking column names get a second, lenient pass
//! (see [`is_temporal_name`]).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::{parse_boolean, parse_naive_datetime};

const TEMPORAL_NAME_TOKENS: &[&str] = &["pickup", "dropoff", "date", "time"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ColumnType {
    /// No value was observed; unifies to whatever the other side holds.
    Unknown,
    String,
    Integer,
    Float,
    Boolean,
    DateTime,
}

impl ColumnType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }

    /// Type that can hold values of both `self` and `other`.
    pub fn unify(&self, other: &ColumnType) -> ColumnType {
        match (self, other) {
            (a, b) if a == b => a.clone(),
            (ColumnType::Unknown, other) | (other, ColumnType::Unknown) => other.clone(),
            (ColumnType::Integer, ColumnType::Float) | (ColumnType::Float, ColumnType::Integer) => {
                ColumnType::Float
            }
            _ => ColumnType::String,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Unknown => "Unknown",
            ColumnType::String => "String",
            ColumnType::Integer => "Integer",
            ColumnType::Float => "Float",
            ColumnType::Boolean => "Boolean",
            ColumnType::DateTime => "DateTime",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub datatype: ColumnType,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, datatype: ColumnType) -> Self {
        Self {
            name: name.into(),
            datatype,
        }
    }
}

#[derive(Debug, Clone)]
struct TypeCandidate {
    possible_integer: bool,
    possible_float: bool,
    possible_boolean: bool,
    possible_datetime: bool,
    observed: usize,
}

impl TypeCandidate {
    fn new() -> Self {
        Self {
            possible_integer: true,
            possible_float: true,
            possible_boolean: true,
            possible_datetime: true,
            observed: 0,
        }
    }

    fn observe(&mut self, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        self.observed += 1;
        if self.possible_integer && value.parse::<i64>().is_err() {
            self.possible_integer = false;
        }
        if self.possible_float && value.parse::<f64>().is_err() {
            self.possible_float = false;
        }
        if self.possible_boolean && parse_boolean(value).is_none() {
            self.possible_boolean = false;
        }
        if self.possible_datetime && parse_naive_datetime(value).is_err() {
            self.possible_datetime = false;
        }
    }

    fn decide(&self) -> ColumnType {
        if self.observed == 0 {
            ColumnType::Unknown
        } else if self.possible_integer {
            ColumnType::Integer
        } else if self.possible_float {
            ColumnType::Float
        } else if self.possible_datetime {
            ColumnType::DateTime
        } else if self.possible_boolean {
            ColumnType::Boolean
        } else {
            ColumnType::String
        }
    }
}

/// Infers one type per column from raw text rows.
pub fn infer_column_types(headers: &[String], rows: &[Vec<String>]) -> Vec<ColumnMeta> {
    let mut candidates = vec![TypeCandidate::new(); headers.len()];
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(headers.len()) {
            candidates[idx].observe(cell);
        }
    }
    headers
        .iter()
        .zip(candidates)
        .enumerate()
        .map(|(idx, (name, candidate))| {
            let mut datatype = candidate.decide();
            if datatype == ColumnType::String
                && is_temporal_name(name)
                && rows.iter().any(|row| {
                    row.get(idx)
                        .is_some_and(|cell| parse_naive_datetime(cell).is_ok())
                })
            {
                log::debug!("Coercing text column '{name}' to timestamps");
                datatype = ColumnType::DateTime;
            }
            ColumnMeta::new(name.clone(), datatype)
        })
        .collect()
}

/// Column names that suggest a timestamp, e.g. `tpep_pickup_datetime`.
pub fn is_temporal_name(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    TEMPORAL_NAME_TOKENS
        .iter()
        .any(|token| lowered.contains(token))
}
