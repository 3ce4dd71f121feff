//! TLC data-dictionary lookups for coded columns.

use std::borrow::Cow;

use log::debug;

use crate::{
    data::Value,
    normalize::{Locale, PAYMENT_TYPE, RATE_CODE_ID, VENDOR_ID},
    schema::ColumnType,
    trips::TripTable,
};

const PAYMENT_TYPES: &[(i64, &str)] = &[
    (0, "0 - Flex Fare"),
    (1, "1 - Credit Card"),
    (2, "2 - Cash"),
    (3, "3 - No Charge"),
    (4, "4 - Dispute"),
    (5, "5 - Unknown"),
    (6, "6 - Voided Trip"),
];

const VENDORS: &[(i64, &str)] = &[
    (1, "1 - Creative Mobile Technologies"),
    (2, "2 - Curb Mobility"),
    (6, "6 - Myle Technologies"),
    (7, "7 - Helix"),
];

const RATE_CODES: &[(i64, &str)] = &[
    (1, "1 - Standard Rate"),
    (2, "2 - JFK"),
    (3, "3 - Newark"),
    (4, "4 - Nassau/Westchester"),
    (5, "5 - Negotiated Fare"),
    (6, "6 - Group Ride"),
    (99, "99 - Null/Unknown"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dictionary {
    PaymentType,
    Vendor,
    RateCode,
}

impl Dictionary {
    pub const ALL: [Dictionary; 3] = [Dictionary::PaymentType, Dictionary::Vendor, Dictionary::RateCode];

    pub fn entries(&self) -> &'static [(i64, &'static str)] {
        match self {
            Dictionary::PaymentType => PAYMENT_TYPES,
            Dictionary::Vendor => VENDORS,
            Dictionary::RateCode => RATE_CODES,
        }
    }

    /// Canonical column the dictionary decodes.
    pub fn column(&self) -> &'static str {
        match self {
            Dictionary::PaymentType => PAYMENT_TYPE,
            Dictionary::Vendor => VENDOR_ID,
            Dictionary::RateCode => RATE_CODE_ID,
        }
    }
}

pub fn fallback_label(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "Unknown",
        Locale::Id => "Tidak Diketahui",
    }
}

/// Label for `code`; codes outside the dictionary get the fallback label.
pub fn lookup(dictionary: Dictionary, code: i64, locale: Locale) -> &'static str {
    dictionary
        .entries()
        .iter()
        .find(|(key, _)| *key == code)
        .map(|(_, label)| *label)
        .unwrap_or_else(|| fallback_label(locale))
}

/// Label for one cell. Numeric codes are looked up; other text is kept as-is
/// and missing cells stay missing.
pub fn label_value(dictionary: Dictionary, value: &Value, locale: Locale) -> Cow<'static, str> {
    match value.as_code() {
        Some(code) => Cow::Borrowed(lookup(dictionary, code, locale)),
        None if matches!(value, Value::Float(_)) => Cow::Borrowed(fallback_label(locale)),
        None => Cow::Owned(value.as_display()),
    }
}

/// Replaces the codes of every dictionary column present in `table` with
/// their labels. Absent columns are skipped.
pub fn apply_dictionaries(table: &TripTable, locale: Locale) -> TripTable {
    Dictionary::ALL
        .iter()
        .fold(table.clone(), |current, dictionary| {
            match current.map_column(dictionary.column(), ColumnType::String, |cell| {
                cell.map(|value| Value::String(label_value(*dictionary, value, locale).into_owned()))
            }) {
                Some(mapped) => {
                    debug!("Decoded '{}' with the data dictionary", dictionary.column());
                    mapped
                }
                None => current,
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnMeta;

    #[test]
    fn known_codes_map_to_labels() {
        assert_eq!(lookup(Dictionary::PaymentType, 1, Locale::En), "1 - Credit Card");
        assert_eq!(lookup(Dictionary::Vendor, 7, Locale::En), "7 - Helix");
        assert_eq!(lookup(Dictionary::RateCode, 99, Locale::En), "99 - Null/Unknown");
    }

    #[test]
    fn unknown_codes_fall_back() {
        assert_eq!(lookup(Dictionary::Vendor, 3, Locale::En), "Unknown");
        assert_eq!(lookup(Dictionary::RateCode, -1, Locale::Id), "Tidak Diketahui");
        assert_eq!(lookup(Dictionary::PaymentType, i64::MAX, Locale::En), "Unknown");
    }

    #[test]
    fn float_codes_and_text_cells() {
        assert_eq!(
            label_value(Dictionary::RateCode, &Value::Float(2.0), Locale::En),
            "2 - JFK"
        );
        assert_eq!(
            label_value(Dictionary::RateCode, &Value::Float(2.5), Locale::En),
            "Unknown"
        );
        assert_eq!(
            label_value(Dictionary::PaymentType, &Value::String("Mobile".into()), Locale::En),
            "Mobile"
        );
    }

    #[test]
    fn apply_dictionaries_skips_absent_columns() {
        let table = TripTable::new(
            vec![
                ColumnMeta::new(PAYMENT_TYPE, ColumnType::Integer),
                ColumnMeta::new("fare_amount", ColumnType::Float),
            ],
            vec![
                vec![Some(Value::Integer(2)), Some(Value::Float(9.0))],
                vec![None, Some(Value::Float(4.0))],
            ],
        );
        let mapped = apply_dictionaries(&table, Locale::En);
        assert_eq!(mapped.column_type(PAYMENT_TYPE), Some(&ColumnType::String));
        assert_eq!(mapped.rows()[0][0], Some(Value::String("2 - Cash".into())));
        assert_eq!(mapped.rows()[1][0], None);
        assert_eq!(mapped.rows()[0][1], Some(Value::Float(9.0)));
    }
}
