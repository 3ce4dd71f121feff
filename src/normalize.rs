//! Canonical column names for the NYC TLC trip record families.
//!
//! The TLC has published trip data under several naming conventions over the
//! years (legacy 2009 yellow, 2010-2014 yellow, `tpep_`/`lpep_` yellow and
//! green, FHV and high-volume FHV). [`normalize`] renames any recognized alias
//! to one canonical name so that later stages only deal with one spelling.
//!
//! Matching is case-sensitive. Within an alias list the first alias present
//! in the table claims the canonical name; every list starts with the
//! canonical spelling itself, so a table that already carries it keeps it and
//! competing aliases pass through unchanged.

use std::collections::BTreeSet;

use clap::ValueEnum;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::trips::TripTable;

pub const PICKUP_DATETIME: &str = "pickup_datetime";
pub const DROPOFF_DATETIME: &str = "dropoff_datetime";
pub const PASSENGER_COUNT: &str = "passenger_count";
pub const TRIP_DISTANCE: &str = "trip_distance";
pub const FARE_AMOUNT: &str = "fare_amount";
pub const EXTRA: &str = "extra";
pub const MTA_TAX: &str = "mta_tax";
pub const TIP_AMOUNT: &str = "tip_amount";
pub const TOLLS_AMOUNT: &str = "tolls_amount";
pub const IMPROVEMENT_SURCHARGE: &str = "improvement_surcharge";
pub const CONGESTION_SURCHARGE: &str = "congestion_surcharge";
pub const AIRPORT_FEE: &str = "airport_fee";
pub const CBD_CONGESTION_FEE: &str = "cbd_congestion_fee";
pub const TOTAL_AMOUNT: &str = "total_amount";
pub const PAYMENT_TYPE: &str = "payment_type";
pub const VENDOR_ID: &str = "vendor_id";
pub const RATE_CODE_ID: &str = "rate_code_id";
pub const STORE_AND_FWD_FLAG: &str = "store_and_fwd_flag";
pub const PICKUP_LOCATION_ID: &str = "pickup_location_id";
pub const DROPOFF_LOCATION_ID: &str = "dropoff_location_id";
pub const PICKUP_LATITUDE: &str = "pickup_latitude";
pub const PICKUP_LONGITUDE: &str = "pickup_longitude";
pub const DROPOFF_LATITUDE: &str = "dropoff_latitude";
pub const DROPOFF_LONGITUDE: &str = "dropoff_longitude";

/// Canonical name followed by its recognized source spellings, in
/// precedence order.
pub const CANONICAL_COLUMNS: &[(&str, &[&str])] = &[
    (
        PICKUP_DATETIME,
        &[
            PICKUP_DATETIME,
            "tpep_pickup_datetime",
            "lpep_pickup_datetime",
            "Trip_Pickup_DateTime",
            "Pickup_DateTime",
        ],
    ),
    (
        DROPOFF_DATETIME,
        &[
            DROPOFF_DATETIME,
            "tpep_dropoff_datetime",
            "lpep_dropoff_datetime",
            "Trip_Dropoff_DateTime",
            "dropOff_datetime",
            "DropOff_datetime",
        ],
    ),
    (PASSENGER_COUNT, &[PASSENGER_COUNT, "Passenger_Count"]),
    (TRIP_DISTANCE, &[TRIP_DISTANCE, "Trip_Distance", "trip_miles"]),
    (FARE_AMOUNT, &[FARE_AMOUNT, "Fare_Amt", "base_passenger_fare"]),
    (EXTRA, &[EXTRA, "surcharge"]),
    (MTA_TAX, &[MTA_TAX]),
    (TIP_AMOUNT, &[TIP_AMOUNT, "Tip_Amt", "tips"]),
    (TOLLS_AMOUNT, &[TOLLS_AMOUNT, "Tolls_Amt", "tolls"]),
    (IMPROVEMENT_SURCHARGE, &[IMPROVEMENT_SURCHARGE]),
    (CONGESTION_SURCHARGE, &[CONGESTION_SURCHARGE]),
    (AIRPORT_FEE, &[AIRPORT_FEE, "Airport_fee"]),
    (CBD_CONGESTION_FEE, &[CBD_CONGESTION_FEE]),
    (TOTAL_AMOUNT, &[TOTAL_AMOUNT, "Total_Amt"]),
    (PAYMENT_TYPE, &[PAYMENT_TYPE, "Payment_Type"]),
    (VENDOR_ID, &[VENDOR_ID, "VendorID", "vendor_name"]),
    (RATE_CODE_ID, &[RATE_CODE_ID, "RatecodeID", "RateCodeID", "rate_code", "Rate_Code"]),
    (
        STORE_AND_FWD_FLAG,
        &[STORE_AND_FWD_FLAG, "store_and_forward", "Store_and_fwd_flag"],
    ),
    (
        PICKUP_LOCATION_ID,
        &[PICKUP_LOCATION_ID, "PULocationID", "PUlocationID"],
    ),
    (
        DROPOFF_LOCATION_ID,
        &[DROPOFF_LOCATION_ID, "DOLocationID", "DOlocationID"],
    ),
    (PICKUP_LATITUDE, &[PICKUP_LATITUDE, "Start_Lat"]),
    (PICKUP_LONGITUDE, &[PICKUP_LONGITUDE, "Start_Lon"]),
    (DROPOFF_LATITUDE, &[DROPOFF_LATITUDE, "End_Lat"]),
    (DROPOFF_LONGITUDE, &[DROPOFF_LONGITUDE, "End_Lon"]),
];

/// Result of normalizing a table.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub table: TripTable,
    /// Column names present after renaming.
    pub present_columns: BTreeSet<String>,
    /// `(source, canonical)` pairs that were renamed.
    pub renamed: Vec<(String, String)>,
}

/// Looks up the canonical name claimed by `source`, ignoring precedence.
pub fn canonical_name(source: &str) -> Option<&'static str> {
    CANONICAL_COLUMNS
        .iter()
        .find(|(_, aliases)| aliases.contains(&source))
        .map(|(canonical, _)| *canonical)
}

/// Renames every recognized alias to its canonical name. Pure; never fails.
pub fn normalize(table: &TripTable) -> Normalized {
    let names = table.column_names();
    let mut renames: Vec<Option<&'static str>> = vec![None; names.len()];

    for (canonical, aliases) in CANONICAL_COLUMNS {
        let Some((idx, alias)) = aliases
            .iter()
            .find_map(|alias| names.iter().position(|n| n == alias).map(|idx| (idx, *alias)))
        else {
            continue;
        };
        if alias != *canonical {
            renames[idx] = Some(*canonical);
        }
        let shadowed = aliases
            .iter()
            .filter(|other| **other != alias && names.iter().any(|n| n == *other))
            .collect::<Vec<_>>();
        if !shadowed.is_empty() {
            debug!("'{alias}' claims '{canonical}'; leaving {shadowed:?} unchanged");
        }
    }

    let mut renamed = Vec::new();
    let table = table.with_renamed_columns(|idx, name| {
        let target = renames[idx]?;
        renamed.push((name.to_string(), target.to_string()));
        Some(target.to_string())
    });
    if !renamed.is_empty() {
        info!("Normalized {} column name(s)", renamed.len());
    }
    let present_columns = table.present_columns();
    Normalized {
        table,
        present_columns,
        renamed,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum Locale {
    #[default]
    En,
    Id,
}

const COLUMN_LABELS: &[(&str, &str, &str)] = &[
    (VENDOR_ID, "Taxi vendor", "Perusahaan Taxi"),
    (PICKUP_DATETIME, "Pickup time", "Waktu Jemput"),
    (DROPOFF_DATETIME, "Drop-off time", "Waktu Turun"),
    (PASSENGER_COUNT, "Passengers", "Jumlah Penumpang"),
    (TRIP_DISTANCE, "Trip distance (mi)", "Jarak Perjalanan (mil)"),
    (RATE_CODE_ID, "Rate code", "Jenis Tarif"),
    (STORE_AND_FWD_FLAG, "Store and forward", "Status Penyimpanan"),
    (PICKUP_LOCATION_ID, "Pickup zone", "Lokasi Jemput"),
    (DROPOFF_LOCATION_ID, "Drop-off zone", "Lokasi Turun"),
    (PAYMENT_TYPE, "Payment method", "Metode Pembayaran"),
    (FARE_AMOUNT, "Base fare ($)", "Tarif Dasar ($)"),
    (EXTRA, "Extras ($)", "Biaya Tambahan ($)"),
    (MTA_TAX, "MTA tax ($)", "Pajak MTA ($)"),
    (TIP_AMOUNT, "Tip ($)", "Tip ($)"),
    (TOLLS_AMOUNT, "Tolls ($)", "Biaya Tol ($)"),
    (IMPROVEMENT_SURCHARGE, "Improvement surcharge ($)", "Biaya Perbaikan ($)"),
    (TOTAL_AMOUNT, "Total charged ($)", "Total Pembayaran ($)"),
    (CONGESTION_SURCHARGE, "Congestion surcharge ($)", "Biaya Kemacetan ($)"),
    (AIRPORT_FEE, "Airport fee ($)", "Biaya Bandara ($)"),
    (CBD_CONGESTION_FEE, "CBD congestion fee ($)", "Biaya Zona Kemacetan ($)"),
    (PICKUP_LATITUDE, "Pickup latitude", "Latitude Jemput"),
    (PICKUP_LONGITUDE, "Pickup longitude", "Longitude Jemput"),
    (DROPOFF_LATITUDE, "Drop-off latitude", "Latitude Turun"),
    (DROPOFF_LONGITUDE, "Drop-off longitude", "Longitude Turun"),
];

/// Human-readable label for a canonical column; unknown names are returned
/// unchanged.
pub fn display_label<'a>(column: &'a str, locale: Locale) -> &'a str {
    COLUMN_LABELS
        .iter()
        .find(|(name, _, _)| *name == column)
        .map(|(_, en, id)| match locale {
            Locale::En => *en,
            Locale::Id => *id,
        })
        .unwrap_or(column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnMeta, ColumnType};

    fn table_with(names: &[&str]) -> TripTable {
        TripTable::new(
            names
                .iter()
                .map(|n| ColumnMeta::new(*n, ColumnType::String))
                .collect(),
            vec![],
        )
    }

    #[test]
    fn renames_modern_yellow_headers() {
        let out = normalize(&table_with(&[
            "VendorID",
            "tpep_pickup_datetime",
            "PULocationID",
            "store_and_fwd_flag",
            "custom",
        ]));
        assert_eq!(
            out.table.column_names(),
            vec![
                VENDOR_ID,
                PICKUP_DATETIME,
                PICKUP_LOCATION_ID,
                STORE_AND_FWD_FLAG,
                "custom"
            ]
        );
        assert_eq!(out.renamed.len(), 3);
        assert!(out.present_columns.contains("custom"));
    }

    #[test]
    fn first_alias_wins_when_several_are_present() {
        let out = normalize(&table_with(&["lpep_pickup_datetime", "tpep_pickup_datetime"]));
        assert_eq!(
            out.table.column_names(),
            vec!["lpep_pickup_datetime", PICKUP_DATETIME]
        );
    }

    #[test]
    fn canonical_spelling_beats_aliases() {
        let out = normalize(&table_with(&["tpep_pickup_datetime", "pickup_datetime"]));
        assert_eq!(
            out.table.column_names(),
            vec!["tpep_pickup_datetime", PICKUP_DATETIME]
        );
        assert!(out.renamed.is_empty());
    }

    #[test]
    fn matching_is_case_sensitive() {
        let out = normalize(&table_with(&["VENDORID"]));
        assert_eq!(out.table.column_names(), vec!["VENDORID"]);
    }

    #[test]
    fn missing_columns_stay_missing() {
        let out = normalize(&table_with(&["trip_distance"]));
        assert!(!out.present_columns.contains(FARE_AMOUNT));
    }

    #[test]
    fn labels_follow_locale() {
        assert_eq!(display_label(PAYMENT_TYPE, Locale::En), "Payment method");
        assert_eq!(display_label(PAYMENT_TYPE, Locale::Id), "Metode Pembayaran");
        assert_eq!(display_label("custom", Locale::Id), "custom");
    }
}
