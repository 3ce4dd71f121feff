//! Filter engine.
//!
//! A [`FilterState`] is the conjunction of a pickup-date range, inclusive
//! numeric ranges and categorical selections. Applying it never mutates the
//! input: [`FilterState::apply`] returns a new table whose rows are a subset of
//! the input, in input order. Predicates whose column is absent from the table
//! are skipped rather than treated as errors.
//!
//! Command-line syntax:
//!
//! - `--date-range 2024-01-01..2024-01-31`
//! - `--range fare_amount=5..50` (either side may be left open: `..50`)
//! - `--category "payment_type=1 - Credit Card"` (repeat to select several;
//!   `payment_type=` alone selects nothing, which means no filter)

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    data::{Value, parse_naive_date},
    error::ValidationError,
    normalize::PICKUP_DATETIME,
    trips::TripTable,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NumericRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumericRange {
    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

/// Active selections for one session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterState {
    pub date_range: Option<DateRange>,
    pub numeric: BTreeMap<String, NumericRange>,
    pub categories: BTreeMap<String, BTreeSet<String>>,
}

enum Predicate<'a> {
    Date(usize, &'a DateRange),
    Numeric(usize, &'a NumericRange),
    Category(usize, &'a BTreeSet<String>),
}

impl Predicate<'_> {
    fn matches(&self, row: &[Option<Value>]) -> bool {
        match self {
            Predicate::Date(idx, range) => row[*idx]
                .as_ref()
                .and_then(Value::as_datetime)
                .is_some_and(|ts| range.contains(ts.date())),
            Predicate::Numeric(idx, range) => row[*idx]
                .as_ref()
                .and_then(Value::as_f64)
                .is_some_and(|v| range.contains(v)),
            Predicate::Category(idx, selected) => row[*idx]
                .as_ref()
                .is_some_and(|value| selected.contains(&value.as_display())),
        }
    }
}

impl FilterState {
    /// True when no predicate would restrict any table.
    pub fn is_empty(&self) -> bool {
        self.date_range.is_none()
            && self.numeric.is_empty()
            && self.categories.values().all(BTreeSet::is_empty)
    }

    pub fn reset(&mut self) {
        *self = FilterState::default();
    }

    pub fn set_date_range(&mut self, start: NaiveDate, end: NaiveDate) -> Result<(), ValidationError> {
        if start > end {
            return Err(ValidationError::ReversedRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        self.date_range = Some(DateRange { start, end });
        Ok(())
    }

    pub fn set_numeric(&mut self, column: &str, range: NumericRange) -> Result<(), ValidationError> {
        if let (Some(min), Some(max)) = (range.min, range.max)
            && min > max
        {
            return Err(ValidationError::ReversedRange {
                start: min.to_string(),
                end: max.to_string(),
            });
        }
        self.numeric.insert(column.to_string(), range);
        Ok(())
    }

    /// Adds `value` to the selection for `column`. An empty value only
    /// registers the column, leaving its selection empty.
    pub fn select(&mut self, column: &str, value: &str) {
        let selected = self.categories.entry(column.to_string()).or_default();
        if !value.is_empty() {
            selected.insert(value.to_string());
        }
    }

    /// Checks invariants that deserialization alone cannot enforce.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut checked = FilterState::default();
        if let Some(range) = self.date_range {
            checked.set_date_range(range.start, range.end)?;
        }
        for (column, range) in &self.numeric {
            checked.set_numeric(column, *range)?;
        }
        Ok(())
    }

    fn compile<'a>(&'a self, table: &TripTable) -> Vec<Predicate<'a>> {
        let mut predicates = Vec::new();
        if let Some(range) = &self.date_range {
            match table.column_index(PICKUP_DATETIME) {
                Some(idx) => predicates.push(Predicate::Date(idx, range)),
                None => debug!("Skipping date filter; '{PICKUP_DATETIME}' is absent"),
            }
        }
        for (column, range) in &self.numeric {
            match table.column_index(column) {
                Some(idx) => predicates.push(Predicate::Numeric(idx, range)),
                None => debug!("Skipping range filter on absent column '{column}'"),
            }
        }
        for (column, selected) in &self.categories {
            if selected.is_empty() {
                continue;
            }
            match table.column_index(column) {
                Some(idx) => predicates.push(Predicate::Category(idx, selected)),
                None => debug!("Skipping category filter on absent column '{column}'"),
            }
        }
        predicates
    }

    /// Returns the rows of `table` that satisfy every applicable predicate.
    pub fn apply(&self, table: &TripTable) -> TripTable {
        let predicates = self.compile(table);
        if predicates.is_empty() {
            return table.clone();
        }
        let filtered = table.filter_rows(|row| predicates.iter().all(|p| p.matches(row)));
        info!(
            "Filters kept {} of {} row(s)",
            filtered.row_count(),
            table.row_count()
        );
        filtered
    }

    pub fn from_yaml_path(path: &Path) -> Result<FilterState> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Reading filter file {path:?}"))?;
        let state: FilterState = serde_yaml::from_str(&text)
            .with_context(|| format!("Parsing filter file {path:?}"))?;
        state.validate()?;
        Ok(state)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing filter state")
    }
}

/// Builds a filter state from command-line arguments.
pub fn parse_filters(
    date_range: Option<&str>,
    ranges: &[String],
    categories: &[String],
) -> Result<FilterState, ValidationError> {
    let mut state = FilterState::default();
    if let Some(raw) = date_range {
        let (start, end) = parse_date_range(raw)?;
        state.set_date_range(start, end)?;
    }
    for raw in ranges {
        let (column, range) = parse_numeric_range(raw)?;
        state.set_numeric(&column, range)?;
    }
    for raw in categories {
        let (column, value) = split_assignment(raw, "category")?;
        state.select(column, value);
    }
    Ok(state)
}

pub fn parse_date_range(raw: &str) -> Result<(NaiveDate, NaiveDate), ValidationError> {
    let invalid = |reason: &str| ValidationError::Input {
        what: "date range",
        value: raw.to_string(),
        reason: reason.to_string(),
    };
    let (start, end) = raw
        .split_once("..")
        .ok_or_else(|| invalid("expected START..END"))?;
    let start = parse_naive_date(start.trim()).map_err(|err| invalid(&err.to_string()))?;
    let end = parse_naive_date(end.trim()).map_err(|err| invalid(&err.to_string()))?;
    Ok((start, end))
}

fn parse_numeric_range(raw: &str) -> Result<(String, NumericRange), ValidationError> {
    let invalid = |reason: String| ValidationError::Input {
        what: "range",
        value: raw.to_string(),
        reason,
    };
    let (column, bounds) = split_assignment(raw, "range")?;
    let (min, max) = bounds
        .split_once("..")
        .ok_or_else(|| invalid("expected COLUMN=MIN..MAX".to_string()))?;
    let bound = |text: &str| -> Result<Option<f64>, ValidationError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        text.parse::<f64>()
            .map(Some)
            .map_err(|err| invalid(format!("'{text}' is not a number ({err})")))
    };
    Ok((
        column.to_string(),
        NumericRange {
            min: bound(min)?,
            max: bound(max)?,
        },
    ))
}

fn split_assignment<'a>(raw: &'a str, what: &'static str) -> Result<(&'a str, &'a str), ValidationError> {
    match raw.split_once('=') {
        Some((column, value)) if !column.trim().is_empty() => Ok((column.trim(), value.trim())),
        _ => Err(ValidationError::Input {
            what,
            value: raw.to_string(),
            reason: "expected COLUMN=VALUE".to_string(),
        }),
    }
}

/// Smallest and largest value of a numeric column, for seeding range
/// selectors. `None` when the column is absent or has no numeric values.
pub fn numeric_bounds(table: &TripTable, column: &str) -> Option<(f64, f64)> {
    table
        .numeric_values(column)?
        .into_iter()
        .fold(None, |acc, v| match acc {
            Some((lo, hi)) => Some((f64::min(lo, v), f64::max(hi, v))),
            None => Some((v, v)),
        })
}

/// Distinct display values of a column, sorted.
pub fn category_options(table: &TripTable, column: &str) -> Option<BTreeSet<String>> {
    Some(table.text_values(column)?.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnMeta, ColumnType};
    use chrono::NaiveDateTime;

    fn at(day: u32, hour: u32) -> Option<Value> {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .map(Value::DateTime)
    }

    fn trips() -> TripTable {
        TripTable::new(
            vec![
                ColumnMeta::new(PICKUP_DATETIME, ColumnType::DateTime),
                ColumnMeta::new("fare_amount", ColumnType::Float),
                ColumnMeta::new("payment_type", ColumnType::String),
            ],
            vec![
                vec![at(1, 0), Some(Value::Float(5.0)), Some(Value::String("1 - Credit Card".into()))],
                vec![at(2, 12), Some(Value::Float(12.5)), Some(Value::String("2 - Cash".into()))],
                vec![at(3, 23), None, Some(Value::String("1 - Credit Card".into()))],
                vec![None, Some(Value::Float(40.0)), None],
            ],
        )
    }

    fn fares(table: &TripTable) -> Vec<Option<f64>> {
        table
            .column_values("fare_amount")
            .unwrap()
            .map(|v| v.and_then(Value::as_f64))
            .collect()
    }

    #[test]
    fn empty_state_is_identity() {
        let table = trips();
        assert!(FilterState::default().is_empty());
        assert_eq!(FilterState::default().apply(&table), table);
    }

    #[test]
    fn date_range_is_inclusive_and_drops_missing_timestamps() {
        let mut state = FilterState::default();
        let jan = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        state.set_date_range(jan(1), jan(3)).unwrap();
        assert_eq!(state.apply(&trips()).row_count(), 3);
        state.set_date_range(jan(2), jan(2)).unwrap();
        let filtered = state.apply(&trips());
        assert_eq!(filtered.row_count(), 1);
        assert_eq!(
            filtered.rows()[0][0].as_ref().and_then(Value::as_datetime),
            NaiveDateTime::parse_from_str("2024-01-02 12:00:00", "%Y-%m-%d %H:%M:%S").ok()
        );
    }

    #[test]
    fn numeric_range_is_inclusive_and_drops_missing_values() {
        let mut state = FilterState::default();
        state.set_numeric("fare_amount", NumericRange::between(5.0, 12.5)).unwrap();
        assert_eq!(fares(&state.apply(&trips())), vec![Some(5.0), Some(12.5)]);
    }

    #[test]
    fn open_ended_ranges() {
        let state = parse_filters(None, &["fare_amount=12.5..".to_string()], &[]).unwrap();
        assert_eq!(fares(&state.apply(&trips())), vec![Some(12.5), Some(40.0)]);
    }

    #[test]
    fn empty_category_selection_means_no_filter() {
        let state = parse_filters(None, &[], &["payment_type=".to_string()]).unwrap();
        assert!(state.is_empty());
        assert_eq!(state.apply(&trips()), trips());
    }

    #[test]
    fn category_membership() {
        let state = parse_filters(
            None,
            &[],
            &["payment_type=2 - Cash".to_string(), "payment_type=1 - Credit Card".to_string()],
        )
        .unwrap();
        assert_eq!(state.apply(&trips()).row_count(), 3);
    }

    #[test]
    fn predicates_on_absent_columns_are_skipped() {
        let state = parse_filters(
            None,
            &["tip_amount=1..2".to_string()],
            &["vendor_id=7 - Helix".to_string()],
        )
        .unwrap();
        assert_eq!(state.apply(&trips()), trips());
    }

    #[test]
    fn reversed_inputs_are_rejected() {
        assert!(matches!(
            parse_filters(Some("2024-02-01..2024-01-01"), &[], &[]),
            Err(ValidationError::ReversedRange { .. })
        ));
        assert!(matches!(
            parse_filters(None, &["fare_amount=9..1".to_string()], &[]),
            Err(ValidationError::ReversedRange { .. })
        ));
        assert!(matches!(
            parse_filters(None, &["fare_amount=a..1".to_string()], &[]),
            Err(ValidationError::Input { what: "range", .. })
        ));
        assert!(matches!(
            parse_filters(None, &[], &["=x".to_string()]),
            Err(ValidationError::Input { what: "category", .. })
        ));
    }

    #[test]
    fn reset_clears_everything() {
        let mut state = parse_filters(Some("2024-01-01..2024-01-02"), &[], &[]).unwrap();
        state.reset();
        assert!(state.is_empty());
    }

    #[test]
    fn yaml_round_trip() {
        let state = parse_filters(
            Some("2024-01-01..2024-01-31"),
            &["fare_amount=5..50".to_string()],
            &["payment_type=2 - Cash".to_string()],
        )
        .unwrap();
        let yaml = state.to_yaml().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filters.yml");
        fs::write(&path, yaml).unwrap();
        assert_eq!(FilterState::from_yaml_path(&path).unwrap(), state);
    }

    #[test]
    fn option_helpers() {
        let table = trips();
        assert_eq!(numeric_bounds(&table, "fare_amount"), Some((5.0, 40.0)));
        assert_eq!(numeric_bounds(&table, "tip_amount"), None);
        let options = category_options(&table, "payment_type").unwrap();
        assert_eq!(
            options.into_iter().collect::<Vec<_>>(),
            vec!["1 - Credit Card".to_string(), "2 - Cash".to_string()]
        );
    }
}
