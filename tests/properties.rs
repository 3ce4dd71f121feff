use proptest::prelude::*;
use taxi_lens::{
    data::Value,
    dictionary::{self, Dictionary},
    filter::{FilterState, NumericRange},
    normalize::{FARE_AMOUNT, Locale, PAYMENT_TYPE},
    schema::{ColumnMeta, ColumnType},
    trips::TripTable,
};

fn trips(rows: Vec<(Option<f64>, Option<i64>)>) -> TripTable {
    let table = TripTable::new(
        vec![
            ColumnMeta::new(FARE_AMOUNT, ColumnType::Float),
            ColumnMeta::new(PAYMENT_TYPE, ColumnType::Integer),
        ],
        rows.into_iter()
            .map(|(fare, payment)| vec![fare.map(Value::Float), payment.map(Value::Integer)])
            .collect(),
    );
    dictionary::apply_dictionaries(&table, Locale::En)
}

fn row_strategy() -> impl Strategy<Value = (Option<f64>, Option<i64>)> {
    (
        proptest::option::of(-50.0f64..500.0),
        proptest::option::of(-2i64..10),
    )
}

proptest! {
    #[test]
    fn every_code_gets_a_label(code in any::<i64>()) {
        for dictionary in Dictionary::ALL {
            let label = dictionary::lookup(dictionary, code, Locale::En);
            prop_assert!(!label.is_empty());
            let known = dictionary.entries().iter().any(|(key, _)| *key == code);
            prop_assert_eq!(known, label != dictionary::fallback_label(Locale::En));
        }
    }

    #[test]
    fn filtering_twice_changes_nothing(
        rows in proptest::collection::vec(row_strategy(), 0..40),
        min in 0.0f64..100.0,
        span in 0.0f64..200.0,
        pick_cash in any::<bool>(),
    ) {
        let table = trips(rows);
        let mut state = FilterState::default();
        state.set_numeric(FARE_AMOUNT, NumericRange::between(min, min + span)).unwrap();
        state.select(PAYMENT_TYPE, if pick_cash { "2 - Cash" } else { "1 - Credit Card" });
        let once = state.apply(&table);
        let twice = state.apply(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn empty_selection_keeps_every_row(rows in proptest::collection::vec(row_strategy(), 0..40)) {
        let table = trips(rows);
        let mut state = FilterState::default();
        state.select(PAYMENT_TYPE, "");
        prop_assert_eq!(state.apply(&table), table.clone());
        prop_assert_eq!(FilterState::default().apply(&table), table);
    }
}
