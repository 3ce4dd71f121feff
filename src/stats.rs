use anyhow::{Result, anyhow};
use log::info;
use serde::Serialize;

use crate::{cli::StatsArgs, session, table, trips::TripTable};

/// Descriptive statistics for one numeric column, over non-missing values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub p25: Option<f64>,
    pub median: Option<f64>,
    pub p75: Option<f64>,
    pub max: Option<f64>,
}

pub fn execute(args: &StatsArgs) -> Result<()> {
    let session = session::open(&args.source, &args.period, &args.filter)?;
    let view = session.view()?;

    let columns = if args.columns.is_empty() {
        view.numeric_columns()
            .into_iter()
            .map(|c| c.name.clone())
            .collect::<Vec<_>>()
    } else {
        for name in &args.columns {
            match view.column_type(name) {
                None => return Err(anyhow!("Column '{name}' not found")),
                Some(ty) if !ty.is_numeric() => {
                    return Err(anyhow!(
                        "Column '{name}' is type {ty} and cannot be profiled for statistics"
                    ));
                }
                Some(_) => {}
            }
        }
        args.columns.clone()
    };
    if columns.is_empty() {
        return Err(anyhow!("No numeric columns available. Supply --columns to continue."));
    }

    let rows = columns
        .iter()
        .filter_map(|name| describe_column(&view, name))
        .map(|summary| summary.render_row())
        .collect::<Vec<_>>();
    let headers = ["column", "count", "mean", "std", "min", "25%", "50%", "75%", "max"]
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    info!("Computed summary statistics for {} column(s)", rows.len());
    Ok(())
}

/// Summaries for every numeric column, in table order.
pub fn describe(table: &TripTable) -> Vec<ColumnSummary> {
    table
        .numeric_columns()
        .iter()
        .filter_map(|column| describe_column(table, &column.name))
        .collect()
}

/// `None` when the column is absent.
pub fn describe_column(table: &TripTable, column: &str) -> Option<ColumnSummary> {
    let mut stats = ColumnStats::default();
    for value in table.numeric_values(column)? {
        stats.add_value(value);
    }
    Some(stats.summarize(column))
}

#[derive(Debug, Default)]
struct ColumnStats {
    values: Vec<f64>,
    sum: f64,
    sum_squares: f64,
}

impl ColumnStats {
    fn add_value(&mut self, value: f64) {
        self.sum += value;
        self.sum_squares += value * value;
        self.values.push(value);
    }

    fn count(&self) -> usize {
        self.values.len()
    }

    fn mean(&self) -> Option<f64> {
        if self.count() > 0 {
            Some(self.sum / self.count() as f64)
        } else {
            None
        }
    }

    /// Sample standard deviation.
    fn std_dev(&self) -> Option<f64> {
        let count = self.count();
        if count < 2 {
            return None;
        }
        let mean = self.mean()?;
        let variance = (self.sum_squares - count as f64 * mean * mean) / (count as f64 - 1.0);
        Some(variance.max(0.0).sqrt())
    }

    fn summarize(mut self, column: &str) -> ColumnSummary {
        self.values.sort_by(f64::total_cmp);
        let sorted = &self.values;
        ColumnSummary {
            column: column.to_string(),
            count: self.count(),
            mean: self.mean(),
            std_dev: self.std_dev(),
            min: sorted.first().copied(),
            p25: quantile(sorted, 0.25),
            median: quantile(sorted, 0.5),
            p75: quantile(sorted, 0.75),
            max: sorted.last().copied(),
        }
    }
}

/// Linearly interpolated quantile of sorted values.
fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

impl ColumnSummary {
    fn render_row(&self) -> Vec<String> {
        vec![
            self.column.clone(),
            self.count.to_string(),
            format_metric(self.mean),
            format_metric(self.std_dev),
            format_metric(self.min),
            format_metric(self.p25),
            format_metric(self.median),
            format_metric(self.p75),
            format_metric(self.max),
        ]
    }
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.4}")
    }
}

fn format_metric(metric: Option<f64>) -> String {
    metric.map(format_number).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::Value,
        schema::{ColumnMeta, ColumnType},
    };

    fn fares(values: &[Option<f64>]) -> TripTable {
        TripTable::new(
            vec![
                ColumnMeta::new("fare_amount", ColumnType::Float),
                ColumnMeta::new("payment_type", ColumnType::String),
            ],
            values
                .iter()
                .map(|v| vec![v.map(Value::Float), Some(Value::String("2 - Cash".into()))])
                .collect(),
        )
    }

    #[test]
    fn quartiles_interpolate() {
        let summary = describe_column(&fares(&[Some(1.0), Some(2.0), Some(3.0), Some(4.0)]), "fare_amount")
            .unwrap();
        assert_eq!(summary.count, 4);
        assert_eq!(summary.mean, Some(2.5));
        assert_eq!(summary.min, Some(1.0));
        assert_eq!(summary.p25, Some(1.75));
        assert_eq!(summary.median, Some(2.5));
        assert_eq!(summary.p75, Some(3.25));
        assert_eq!(summary.max, Some(4.0));
        let std = summary.std_dev.unwrap();
        assert!((std - 1.2909944487358056).abs() < 1e-12);
    }

    #[test]
    fn missing_values_are_not_counted() {
        let summary = describe_column(&fares(&[Some(5.0), None]), "fare_amount").unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(summary.std_dev, None);
        assert_eq!(summary.median, Some(5.0));
    }

    #[test]
    fn describe_covers_numeric_columns_only() {
        let all = describe(&fares(&[Some(1.0)]));
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].column, "fare_amount");
        assert!(describe_column(&fares(&[]), "tip_amount").is_none());
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(12.0), "12");
        assert_eq!(format_number(2.345678), "2.3457");
    }
}
