//! Bundled demo dataset.
//!
//! A deterministic synthetic year of trips (2024) for trying the tool without
//! a data file. The same `(rows, seed)` pair always produces the same table.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    data::Value,
    schema::{ColumnMeta, ColumnType},
    trips::TripTable,
};

pub const DEFAULT_SAMPLE_ROWS: usize = 10_000;
pub const DEFAULT_SAMPLE_SEED: u64 = 42;

const COLUMNS: &[(&str, ColumnType)] = &[
    ("pickup_datetime", ColumnType::DateTime),
    ("dropoff_datetime", ColumnType::DateTime),
    ("passenger_count", ColumnType::Integer),
    ("trip_distance", ColumnType::Float),
    ("fare_amount", ColumnType::Float),
    ("tip_amount", ColumnType::Float),
    ("total_amount", ColumnType::Float),
    ("payment_type", ColumnType::Integer),
    ("pickup_latitude", ColumnType::Float),
    ("pickup_longitude", ColumnType::Float),
    ("dropoff_latitude", ColumnType::Float),
    ("dropoff_longitude", ColumnType::Float),
];

/// Generates `rows` trips spread evenly over calendar year 2024.
pub fn generate(rows: usize, seed: u64) -> TripTable {
    let mut rng = StdRng::seed_from_u64(seed);
    let start = year_start();
    let span_secs = (NaiveDate::from_ymd_opt(2024, 12, 31)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(start)
        - start)
        .num_seconds();
    let step = if rows > 1 {
        span_secs as f64 / (rows - 1) as f64
    } else {
        0.0
    };

    let columns = COLUMNS
        .iter()
        .map(|(name, ty)| ColumnMeta::new(*name, ty.clone()))
        .collect();
    let data = (0..rows)
        .map(|idx| {
            let pickup = start + Duration::seconds((step * idx as f64) as i64);
            let dropoff = pickup + Duration::minutes(rng.gen_range(5..60));
            // Card and cash dominate TLC records; disputes and no-charge trips are rare.
            let payment = match rng.r#gen::<f64>() {
                p if p < 0.72 => 1,
                p if p < 0.97 => 2,
                p if p < 0.99 => 4,
                _ => 3,
            };
            vec![
                Some(Value::DateTime(pickup)),
                Some(Value::DateTime(dropoff)),
                Some(Value::Integer(rng.gen_range(1..6))),
                Some(Value::Float(exponential(&mut rng, 3.0))),
                Some(Value::Float(exponential(&mut rng, 15.0) + 5.0)),
                Some(Value::Float(exponential(&mut rng, 3.0))),
                Some(Value::Float(exponential(&mut rng, 20.0) + 8.0)),
                Some(Value::Integer(payment)),
                Some(Value::Float(rng.gen_range(40.6..40.9))),
                Some(Value::Float(rng.gen_range(-74.05..-73.75))),
                Some(Value::Float(rng.gen_range(40.6..40.9))),
                Some(Value::Float(rng.gen_range(-74.05..-73.75))),
            ]
        })
        .collect();
    TripTable::new(columns, data)
}

fn year_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Inverse-transform sample of an exponential distribution, rounded to cents.
fn exponential(rng: &mut StdRng, mean: f64) -> f64 {
    let u: f64 = rng.r#gen();
    let draw = -mean * (1.0 - u).ln();
    (draw * 100.0).round() / 100.0
}
