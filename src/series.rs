//! Chart-ready aggregates for a renderer.
//!
//! Each function returns `None` when the column it needs is absent, so a
//! renderer can skip the chart instead of drawing an empty one.

use std::collections::BTreeMap;

use anyhow::{Result, anyhow};
use chrono::{NaiveDate, Timelike};
use log::info;
use rand::{SeedableRng, rngs::StdRng, seq::index};
use serde::Serialize;

use crate::{
    cli::{SeriesArgs, SeriesKind},
    normalize::{PICKUP_DATETIME, PICKUP_LATITUDE, PICKUP_LONGITUDE},
    session,
    stats::format_number,
    table,
    trips::TripTable,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

pub fn execute(args: &SeriesArgs) -> Result<()> {
    let session = session::open(&args.source, &args.period, &args.filter)?;
    let view = session.view()?;

    let (headers, rows) = match args.kind {
        SeriesKind::Daily => {
            let days = trips_per_day(&view)
                .ok_or_else(|| anyhow!("Column '{PICKUP_DATETIME}' not found"))?;
            (
                vec!["date".to_string(), "trips".to_string()],
                days.into_iter()
                    .map(|(day, count)| vec![day.format("%Y-%m-%d").to_string(), count.to_string()])
                    .collect::<Vec<_>>(),
            )
        }
        SeriesKind::Hourly => {
            let hours = trips_per_hour(&view)
                .ok_or_else(|| anyhow!("Column '{PICKUP_DATETIME}' not found"))?;
            (
                vec!["hour".to_string(), "trips".to_string()],
                hours
                    .iter()
                    .enumerate()
                    .map(|(hour, count)| vec![format!("{hour:02}"), count.to_string()])
                    .collect(),
            )
        }
        SeriesKind::Histogram => {
            let column = args
                .column
                .as_deref()
                .ok_or_else(|| anyhow!("--column is required for a histogram"))?;
            let bins = histogram(&view, column, usize::from(args.bins))
                .ok_or_else(|| anyhow!("Column '{column}' not found"))?;
            (
                vec!["lower".to_string(), "upper".to_string(), "count".to_string()],
                bins.into_iter()
                    .map(|bin| {
                        vec![
                            format_number(bin.lower),
                            format_number(bin.upper),
                            bin.count.to_string(),
                        ]
                    })
                    .collect(),
            )
        }
        SeriesKind::Points => {
            if !(view.has_column(PICKUP_LATITUDE) && view.has_column(PICKUP_LONGITUDE)) {
                return Err(anyhow!(
                    "Columns '{PICKUP_LATITUDE}' and '{PICKUP_LONGITUDE}' are required for points"
                ));
            }
            let sampled = sample_rows(&view, args.points, args.seed);
            let latitudes = sampled.column_values(PICKUP_LATITUDE).into_iter().flatten();
            let longitudes = sampled.column_values(PICKUP_LONGITUDE).into_iter().flatten();
            (
                vec![PICKUP_LATITUDE.to_string(), PICKUP_LONGITUDE.to_string()],
                latitudes
                    .zip(longitudes)
                    .filter_map(|(lat, lon)| Some(vec![lat?.as_display(), lon?.as_display()]))
                    .collect(),
            )
        }
    };
    table::print_table(&headers, &rows);
    info!("Rendered {} point(s)", rows.len());
    Ok(())
}

/// Trip counts per calendar day of pickup, in date order.
pub fn trips_per_day(table: &TripTable) -> Option<Vec<(NaiveDate, usize)>> {
    let mut counts: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for ts in table
        .column_values(PICKUP_DATETIME)?
        .filter_map(|value| value.and_then(|v| v.as_datetime()))
    {
        *counts.entry(ts.date()).or_default() += 1;
    }
    Some(counts.into_iter().collect())
}

/// Trip counts for each hour of the day (index 0 is midnight).
pub fn trips_per_hour(table: &TripTable) -> Option<[usize; 24]> {
    let mut counts = [0usize; 24];
    for ts in table
        .column_values(PICKUP_DATETIME)?
        .filter_map(|value| value.and_then(|v| v.as_datetime()))
    {
        counts[ts.hour() as usize] += 1;
    }
    Some(counts)
}

/// Equal-width histogram between the column's minimum and maximum. The last
/// bin includes the maximum. A column without numeric values has no bins.
pub fn histogram(table: &TripTable, column: &str, bins: usize) -> Option<Vec<HistogramBin>> {
    let values = table.numeric_values(column)?;
    let Some((min, max)) = values.iter().fold(None, |acc: Option<(f64, f64)>, v| match acc {
        Some((lo, hi)) => Some((lo.min(*v), hi.max(*v))),
        None => Some((*v, *v)),
    }) else {
        return Some(Vec::new());
    };
    let bins = bins.max(1);
    let width = (max - min) / bins as f64;
    if width == 0.0 {
        return Some(vec![HistogramBin {
            lower: min,
            upper: max,
            count: values.len(),
        }]);
    }
    let mut counts = vec![0usize; bins];
    for value in &values {
        let idx = (((value - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    Some(
        counts
            .into_iter()
            .enumerate()
            .map(|(idx, count)| HistogramBin {
                lower: min + width * idx as f64,
                upper: if idx + 1 == bins {
                    max
                } else {
                    min + width * (idx + 1) as f64
                },
                count,
            })
            .collect(),
    )
}

/// A seeded random subset of at most `n` rows, kept in table order.
pub fn sample_rows(table: &TripTable, n: usize, seed: u64) -> TripTable {
    if n >= table.row_count() {
        return table.clone();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut chosen = index::sample(&mut rng, table.row_count(), n).into_vec();
    chosen.sort_unstable();
    let mut position = 0usize;
    table.filter_rows(|_| {
        let keep = chosen.binary_search(&position).is_ok();
        position += 1;
        keep
    })
}
