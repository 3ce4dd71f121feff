//! Descriptive facts about a (possibly filtered) trip table.
//!
//! Each insight is computed independently from non-missing values only and
//! is omitted when its column is absent or has nothing to summarize. An empty
//! table yields no insights at all.
//!
//! Ties are broken deterministically: the smallest passenger count, the
//! earliest hour, the earliest weekday counting from Monday, and the
//! alphabetically first payment label.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use log::debug;
use serde::Serialize;

use crate::{
    normalize::{
        FARE_AMOUNT, Locale, PASSENGER_COUNT, PAYMENT_TYPE, PICKUP_DATETIME, TIP_AMOUNT,
        TOTAL_AMOUNT, TRIP_DISTANCE,
    },
    trips::TripTable,
};

const KM_PER_MILE: f64 = 1.609344;
const HIGH_FARE_THRESHOLD: f64 = 100.0;

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    AverageDistance,
    MedianDistance,
    LongestTrip,
    AverageFare,
    HighestFare,
    AverageTip,
    TipShare,
    AveragePassengers,
    MostCommonPassengers,
    SoloTrips,
    TopPayment,
    BusiestHour,
    BusiestDay,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InsightValue {
    Number(f64),
    Label(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub label: String,
    pub value: InsightValue,
    pub text: String,
}

impl InsightKind {
    pub fn label(&self, locale: Locale) -> &'static str {
        use InsightKind::*;
        match (self, locale) {
            (AverageDistance, Locale::En) => "Average distance",
            (AverageDistance, Locale::Id) => "Rata-rata jarak",
            (MedianDistance, Locale::En) => "Median distance",
            (MedianDistance, Locale::Id) => "Jarak tengah",
            (LongestTrip, Locale::En) => "Longest trip",
            (LongestTrip, Locale::Id) => "Perjalanan terjauh",
            (AverageFare, Locale::En) => "Average fare",
            (AverageFare, Locale::Id) => "Rata-rata tarif",
            (HighestFare, Locale::En) => "Highest fare",
            (HighestFare, Locale::Id) => "Tarif tertinggi",
            (AverageTip, Locale::En) => "Average tip",
            (AverageTip, Locale::Id) => "Rata-rata tip",
            (TipShare, Locale::En) => "Tip share of revenue",
            (TipShare, Locale::Id) => "Porsi tip",
            (AveragePassengers, Locale::En) => "Average passengers",
            (AveragePassengers, Locale::Id) => "Rata-rata penumpang",
            (MostCommonPassengers, Locale::En) => "Most common party size",
            (MostCommonPassengers, Locale::Id) => "Penumpang paling sering",
            (SoloTrips, Locale::En) => "Solo trips",
            (SoloTrips, Locale::Id) => "Perjalanan sendiri",
            (TopPayment, Locale::En) => "Most used payment",
            (TopPayment, Locale::Id) => "Pembayaran terpopuler",
            (BusiestHour, Locale::En) => "Busiest hour",
            (BusiestHour, Locale::Id) => "Jam tersibuk",
            (BusiestDay, Locale::En) => "Busiest day",
            (BusiestDay, Locale::Id) => "Hari tersibuk",
        }
    }
}

/// Headline metrics shown above the insights.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub trips: usize,
    pub columns: usize,
    pub average_fare: Option<f64>,
    pub average_distance: Option<f64>,
    pub total_revenue: Option<f64>,
}

pub fn overview(table: &TripTable) -> Overview {
    Overview {
        trips: table.row_count(),
        columns: table.columns().len(),
        average_fare: table.numeric_values(FARE_AMOUNT).as_deref().and_then(mean),
        average_distance: table.numeric_values(TRIP_DISTANCE).as_deref().and_then(mean),
        total_revenue: table
            .numeric_values(TOTAL_AMOUNT)
            .filter(|values| !values.is_empty())
            .map(|values| values.iter().sum()),
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Middle value, or the mean of the two middle values for an even count.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Most frequent value; the smallest one wins ties.
fn mode(values: &[f64]) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mut best: Option<(f64, usize)> = None;
    for run in sorted.chunk_by(|a, b| a == b) {
        if best.is_none_or(|(_, count)| run.len() > count) {
            best = Some((run[0], run.len()));
        }
    }
    best.map(|(value, _)| value)
}

fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

fn percent(part: usize, whole: usize) -> f64 {
    part as f64 / whole as f64 * 100.0
}

struct Builder {
    locale: Locale,
    insights: Vec<Insight>,
}

impl Builder {
    fn push(&mut self, kind: InsightKind, value: InsightValue, en: String, id: String) {
        let text = match self.locale {
            Locale::En => en,
            Locale::Id => id,
        };
        self.insights.push(Insight {
            kind,
            label: kind.label(self.locale).to_string(),
            value,
            text,
        });
    }
}

/// Computes the ordered insight list for `table`.
pub fn generate(table: &TripTable, locale: Locale) -> Vec<Insight> {
    if table.is_empty() {
        debug!("No rows; skipping insights");
        return Vec::new();
    }
    let mut out = Builder {
        locale,
        insights: Vec::new(),
    };
    distance_insights(table, &mut out);
    fare_insights(table, &mut out);
    tip_insights(table, &mut out);
    passenger_insights(table, &mut out);
    payment_insight(table, &mut out);
    time_insights(table, &mut out);
    out.insights
}

fn distance_insights(table: &TripTable, out: &mut Builder) {
    let Some(distances) = table.numeric_values(TRIP_DISTANCE) else {
        return;
    };
    if let Some(avg) = mean(&distances) {
        out.push(
            InsightKind::AverageDistance,
            InsightValue::Number(avg),
            format!("The average trip covers {avg:.2} mi (~{:.2} km)", avg * KM_PER_MILE),
            format!(
                "Rata-rata jarak perjalanan taxi adalah {avg:.2} mil (~{:.2} km)",
                avg * KM_PER_MILE
            ),
        );
    }
    if let Some(median) = median(&distances) {
        out.push(
            InsightKind::MedianDistance,
            InsightValue::Number(median),
            format!("Half of all trips are shorter than {median:.2} mi (~{:.2} km)", median * KM_PER_MILE),
            format!(
                "Jarak tengah (median) perjalanan adalah {median:.2} mil (~{:.2} km)",
                median * KM_PER_MILE
            ),
        );
    }
    if let Some(longest) = max(&distances) {
        out.push(
            InsightKind::LongestTrip,
            InsightValue::Number(longest),
            format!("The longest trip reached {longest:.2} mi (~{:.2} km)", longest * KM_PER_MILE),
            format!(
                "Perjalanan terjauh mencapai {longest:.2} mil (~{:.2} km)",
                longest * KM_PER_MILE
            ),
        );
    }
}

fn fare_insights(table: &TripTable, out: &mut Builder) {
    let Some(fares) = table.numeric_values(FARE_AMOUNT) else {
        return;
    };
    if let Some(avg) = mean(&fares) {
        out.push(
            InsightKind::AverageFare,
            InsightValue::Number(avg),
            format!("The average fare is ${avg:.2} per trip"),
            format!("Tarif rata-rata adalah ${avg:.2} per perjalanan"),
        );
    }
    if let Some(highest) = max(&fares).filter(|fare| *fare > HIGH_FARE_THRESHOLD) {
        out.push(
            InsightKind::HighestFare,
            InsightValue::Number(highest),
            format!("The highest fare reached ${highest:.2}, likely an airport run"),
            format!("Tarif tertinggi mencapai ${highest:.2}, mungkin perjalanan ke bandara"),
        );
    }
}

fn tip_insights(table: &TripTable, out: &mut Builder) {
    let Some(tips) = table.numeric_values(TIP_AMOUNT) else {
        return;
    };
    let positive = tips.iter().copied().filter(|tip| *tip > 0.0).collect::<Vec<_>>();
    let Some(avg_tip) = mean(&positive) else {
        return;
    };
    out.push(
        InsightKind::AverageTip,
        InsightValue::Number(avg_tip),
        format!("Riders who tip leave ${avg_tip:.2} on average"),
        format!("Rata-rata tip yang diberikan adalah ${avg_tip:.2}"),
    );

    let Some(totals) = table.numeric_values(TOTAL_AMOUNT) else {
        return;
    };
    let revenue: f64 = totals.iter().sum();
    if revenue <= 0.0 {
        return;
    }
    let share = tips.iter().sum::<f64>() / revenue * 100.0;
    if share > 0.0 {
        out.push(
            InsightKind::TipShare,
            InsightValue::Number(share),
            format!("Tips make up {share:.1}% of total revenue"),
            format!("Tip mencakup {share:.1}% dari total pendapatan"),
        );
    }
}

fn passenger_insights(table: &TripTable, out: &mut Builder) {
    let Some(passengers) = table.numeric_values(PASSENGER_COUNT) else {
        return;
    };
    let Some(avg) = mean(&passengers) else {
        return;
    };
    out.push(
        InsightKind::AveragePassengers,
        InsightValue::Number(avg),
        format!("Trips carry {avg:.1} passengers on average"),
        format!("Rata-rata {avg:.1} penumpang per perjalanan"),
    );
    if let Some(common) = mode(&passengers) {
        out.push(
            InsightKind::MostCommonPassengers,
            InsightValue::Number(common),
            format!("Most trips carry {common:.0} passenger(s)"),
            format!("Paling sering {common:.0} penumpang per perjalanan"),
        );
    }
    let solo = passengers.iter().filter(|count| **count == 1.0).count();
    let share = percent(solo, passengers.len());
    out.push(
        InsightKind::SoloTrips,
        InsightValue::Number(share),
        format!("{share:.1}% of trips carry a single passenger"),
        format!("{share:.1}% perjalanan hanya 1 penumpang"),
    );
}

fn payment_insight(table: &TripTable, out: &mut Builder) {
    let Some(labels) = table.text_values(PAYMENT_TYPE) else {
        return;
    };
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for label in &labels {
        *counts.entry(label.clone()).or_default() += 1;
    }
    // BTreeMap iterates alphabetically, so the first maximum wins ties.
    let Some((top, count)) = counts
        .into_iter()
        .fold(None, |best: Option<(String, usize)>, (label, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((label, count)),
        })
    else {
        return;
    };
    let share = percent(count, labels.len());
    out.push(
        InsightKind::TopPayment,
        InsightValue::Label(top.clone()),
        format!("The most used payment method is {top} ({share:.1}%)"),
        format!("Metode pembayaran terpopuler: {top} ({share:.1}%)"),
    );
}

fn time_insights(table: &TripTable, out: &mut Builder) {
    let Some(values) = table.column_values(PICKUP_DATETIME) else {
        return;
    };
    let pickups = values
        .filter_map(|value| value.and_then(|v| v.as_datetime()))
        .collect::<Vec<NaiveDateTime>>();
    if pickups.is_empty() {
        return;
    }

    let mut hours = [0usize; 24];
    let mut days = [0usize; 7];
    for ts in &pickups {
        hours[ts.hour() as usize] += 1;
        days[ts.weekday().num_days_from_monday() as usize] += 1;
    }
    let busiest_hour = argmax(&hours);
    out.push(
        InsightKind::BusiestHour,
        InsightValue::Number(busiest_hour as f64),
        format!("The busiest pickup hour is {busiest_hour:02}:00"),
        format!("Jam tersibuk adalah pukul {busiest_hour:02}.00"),
    );
    let busiest_day = WEEKDAYS[argmax(&days)];
    out.push(
        InsightKind::BusiestDay,
        InsightValue::Label(weekday_name(busiest_day, Locale::En).to_string()),
        format!("The busiest day is {}", weekday_name(busiest_day, Locale::En)),
        format!("Hari tersibuk adalah {}", weekday_name(busiest_day, Locale::Id)),
    );
}

/// Index of the first maximum.
fn argmax(counts: &[usize]) -> usize {
    counts
        .iter()
        .enumerate()
        .fold((0, 0), |(best_idx, best), (idx, count)| {
            if *count > best {
                (idx, *count)
            } else {
                (best_idx, best)
            }
        })
        .0
}

pub fn weekday_name(day: Weekday, locale: Locale) -> &'static str {
    let idx = day.num_days_from_monday() as usize;
    match locale {
        Locale::En => ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"][idx],
        Locale::Id => ["Senin", "Selasa", "Rabu", "Kamis", "Jumat", "Sabtu", "Minggu"][idx],
    }
}
