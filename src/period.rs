//! Reporting-period resolution.
//!
//! A period is either scanned from the canonical pickup column or supplied by
//! the caller as a month, a month range or a date range. Manual input is
//! validated; auto-detection never fails and falls back to
//! [`PeriodSpan::Unknown`].

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, warn};
use serde::Serialize;

use crate::{
    error::ValidationError,
    normalize::{Locale, PICKUP_DATETIME},
    trips::TripTable,
};

pub const MIN_YEAR: i32 = 2009;
pub const MAX_YEAR: i32 = 2030;

const MONTHS_EN: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const MONTHS_ID: [&str; 12] = [
    "Januari",
    "Februari",
    "Maret",
    "April",
    "Mei",
    "Juni",
    "Juli",
    "Agustus",
    "September",
    "Oktober",
    "November",
    "Desember",
];

/// How the caller wants the period determined for one load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeriodRequest {
    #[default]
    AutoDetect,
    Month {
        month: u32,
        year: i32,
    },
    MonthRange {
        start_month: u32,
        start_year: i32,
        end_month: u32,
        end_year: i32,
    },
    DateRange {
        start: NaiveDate,
        end: NaiveDate,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    AutoDetected,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PeriodSpan {
    /// First and last pickup observed in the data.
    Observed {
        start: NaiveDateTime,
        end: NaiveDateTime,
        column: String,
    },
    Month {
        month: u32,
        year: i32,
    },
    MonthRange {
        start_month: u32,
        start_year: i32,
        end_month: u32,
        end_year: i32,
    },
    DateRange {
        start: NaiveDate,
        end: NaiveDate,
    },
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodMetadata {
    pub span: PeriodSpan,
    pub provenance: Provenance,
}

impl PeriodMetadata {
    pub fn unknown() -> Self {
        Self {
            span: PeriodSpan::Unknown,
            provenance: Provenance::AutoDetected,
        }
    }

    pub fn is_known(&self) -> bool {
        self.span != PeriodSpan::Unknown
    }

    /// Human-readable period text in the requested locale.
    pub fn label(&self, locale: Locale) -> String {
        match &self.span {
            PeriodSpan::Observed { start, end, .. } => format!(
                "{} - {}",
                start.format("%d %b %Y"),
                end.format("%d %b %Y")
            ),
            PeriodSpan::Month { month, year } => month_label(*month, *year, locale),
            PeriodSpan::MonthRange {
                start_month,
                start_year,
                end_month,
                end_year,
            } => format!(
                "{} - {}",
                month_label(*start_month, *start_year, locale),
                month_label(*end_month, *end_year, locale)
            ),
            PeriodSpan::DateRange { start, end } => {
                format!("{} - {}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
            }
            PeriodSpan::Unknown => match locale {
                Locale::En => "Unknown period".to_string(),
                Locale::Id => "Periode tidak diketahui".to_string(),
            },
        }
    }
}

impl fmt::Display for PeriodMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label(Locale::En))
    }
}

fn month_label(month: u32, year: i32, locale: Locale) -> String {
    let names = match locale {
        Locale::En => &MONTHS_EN,
        Locale::Id => &MONTHS_ID,
    };
    let name = names
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("?");
    format!("{name} {year}")
}

pub fn validate_month(month: u32, year: i32) -> Result<(), ValidationError> {
    if !(1..=12).contains(&month) {
        return Err(ValidationError::Month(month));
    }
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(ValidationError::Year {
            year,
            min: MIN_YEAR,
            max: MAX_YEAR,
        });
    }
    Ok(())
}

/// Resolves the period for `table`. Only manual input can fail.
pub fn resolve(table: &TripTable, request: &PeriodRequest) -> Result<PeriodMetadata, ValidationError> {
    let span = match *request {
        PeriodRequest::AutoDetect => return Ok(detect(table)),
        PeriodRequest::Month { month, year } => {
            validate_month(month, year)?;
            PeriodSpan::Month { month, year }
        }
        PeriodRequest::MonthRange {
            start_month,
            start_year,
            end_month,
            end_year,
        } => {
            validate_month(start_month, start_year)?;
            validate_month(end_month, end_year)?;
            if (start_year, start_month) > (end_year, end_month) {
                return Err(ValidationError::ReversedRange {
                    start: format!("{start_year}-{start_month:02}"),
                    end: format!("{end_year}-{end_month:02}"),
                });
            }
            PeriodSpan::MonthRange {
                start_month,
                start_year,
                end_month,
                end_year,
            }
        }
        PeriodRequest::DateRange { start, end } => {
            if start > end {
                return Err(ValidationError::ReversedRange {
                    start: start.to_string(),
                    end: end.to_string(),
                });
            }
            PeriodSpan::DateRange { start, end }
        }
    };
    Ok(PeriodMetadata {
        span,
        provenance: Provenance::Manual,
    })
}

/// Scans the canonical pickup column for its first and last timestamp.
pub fn detect(table: &TripTable) -> PeriodMetadata {
    let Some(values) = table.column_values(PICKUP_DATETIME) else {
        debug!("No '{PICKUP_DATETIME}' column; period is unknown");
        return PeriodMetadata::unknown();
    };
    let bounds = values
        .filter_map(|value| value.and_then(|v| v.as_datetime()))
        .fold(None, |acc: Option<(NaiveDateTime, NaiveDateTime)>, ts| match acc {
            Some((lo, hi)) => Some((lo.min(ts), hi.max(ts))),
            None => Some((ts, ts)),
        });
    match bounds {
        Some((start, end)) => PeriodMetadata {
            span: PeriodSpan::Observed {
                start,
                end,
                column: PICKUP_DATETIME.to_string(),
            },
            provenance: Provenance::AutoDetected,
        },
        None => {
            warn!("'{PICKUP_DATETIME}' has no usable timestamps; period is unknown");
            PeriodMetadata::unknown()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::Value,
        schema::{ColumnMeta, ColumnType},
    };

    fn pickups(values: Vec<Option<Value>>) -> TripTable {
        TripTable::new(
            vec![ColumnMeta::new(PICKUP_DATETIME, ColumnType::DateTime)],
            values.into_iter().map(|v| vec![v]).collect(),
        )
    }

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 12, day)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .unwrap()
    }

    #[test]
    fn month_thirteen_is_rejected() {
        let table = pickups(vec![]);
        let err = resolve(&table, &PeriodRequest::Month { month: 13, year: 2023 }).unwrap_err();
        assert_eq!(err, ValidationError::Month(13));
    }

    #[test]
    fn december_2023_is_accepted() {
        let table = pickups(vec![]);
        let period = resolve(&table, &PeriodRequest::Month { month: 12, year: 2023 }).unwrap();
        assert_eq!(period.provenance, Provenance::Manual);
        assert_eq!(period.to_string(), "December 2023");
        assert_eq!(period.label(Locale::Id), "Desember 2023");
    }

    #[test]
    fn implausible_year_is_rejected() {
        let table = pickups(vec![]);
        assert!(matches!(
            resolve(&table, &PeriodRequest::Month { month: 1, year: 1999 }),
            Err(ValidationError::Year { year: 1999, .. })
        ));
    }

    #[test]
    fn single_day_range_is_allowed_and_reversed_is_not() {
        let table = pickups(vec![]);
        let day = NaiveDate::from_ymd_opt(2023, 5, 1).unwrap();
        let later = NaiveDate::from_ymd_opt(2023, 5, 2).unwrap();
        assert!(resolve(&table, &PeriodRequest::DateRange { start: day, end: day }).is_ok());
        assert!(matches!(
            resolve(&table, &PeriodRequest::DateRange { start: later, end: day }),
            Err(ValidationError::ReversedRange { .. })
        ));
    }

    #[test]
    fn month_range_must_be_ordered() {
        let table = pickups(vec![]);
        let ok = PeriodRequest::MonthRange {
            start_month: 11,
            start_year: 2022,
            end_month: 2,
            end_year: 2023,
        };
        assert_eq!(
            resolve(&table, &ok).unwrap().to_string(),
            "November 2022 - February 2023"
        );
        let reversed = PeriodRequest::MonthRange {
            start_month: 3,
            start_year: 2023,
            end_month: 2,
            end_year: 2023,
        };
        assert!(resolve(&table, &reversed).is_err());
    }

    #[test]
    fn auto_detect_scans_min_and_max() {
        let table = pickups(vec![
            Some(Value::DateTime(ts(5, 8))),
            None,
            Some(Value::DateTime(ts(2, 23))),
            Some(Value::DateTime(ts(30, 1))),
        ]);
        let period = resolve(&table, &PeriodRequest::AutoDetect).unwrap();
        assert_eq!(period.provenance, Provenance::AutoDetected);
        assert_eq!(
            period.span,
            PeriodSpan::Observed {
                start: ts(2, 23),
                end: ts(30, 1),
                column: PICKUP_DATETIME.to_string()
            }
        );
        assert_eq!(period.to_string(), "02 Dec 2023 - 30 Dec 2023");
    }

    #[test]
    fn auto_detect_without_timestamps_is_unknown() {
        let empty = pickups(vec![None, None]);
        assert_eq!(detect(&empty), PeriodMetadata::unknown());
        let absent = TripTable::new(
            vec![ColumnMeta::new("fare_amount", ColumnType::Float)],
            vec![vec![Some(Value::Float(1.0))]],
        );
        let period = detect(&absent);
        assert!(!period.is_known());
        assert_eq!(period.to_string(), "Unknown period");
    }
}
