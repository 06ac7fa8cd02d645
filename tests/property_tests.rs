//! Property-based tests for the pure helpers behind references, CSV and
//! import parsing.

use chrono::NaiveDate;
use forwarder_api::services::{
    csv::{parse_records, write_record},
    export::DATE_FORMATS,
    import::{parse_date, parse_decimal},
    manifest::plain_decimal,
    reference::{next_in_sequence, reference_prefix, sequence_number},
};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn day_strategy() -> impl Strategy<Value = NaiveDate> {
    (2000i32..2099, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).expect("valid day"))
}

fn field_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ,\"\n.-]{0,12}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn sequence_moves_forward_within_a_day(day in day_strategy(), n in 1u32..999) {
        let prefix = reference_prefix(day);
        let latest = format!("{prefix}{n:03}");
        let next = next_in_sequence(&prefix, Some(&latest));

        prop_assert_eq!(next.len(), 9);
        prop_assert!(next.starts_with(&prefix));
        prop_assert!(next > latest);
    }

    #[test]
    fn sequence_counts_on_past_three_digits(day in day_strategy(), n in 1u32..100_000) {
        let prefix = reference_prefix(day);
        let latest = format!("{prefix}{n:03}");
        let next = next_in_sequence(&prefix, Some(&latest));

        prop_assert_eq!(sequence_number(&prefix, &next), Some(n + 1));
    }

    #[test]
    fn other_days_restart_the_sequence(day in day_strategy(), n in 1u32..999) {
        let yesterday = reference_prefix(day.pred_opt().expect("has a previous day"));
        let prefix = reference_prefix(day);
        let latest = format!("{yesterday}{n:03}");
        prop_assert_eq!(next_in_sequence(&prefix, Some(&latest)), format!("{prefix}001"));
    }

    #[test]
    fn written_records_parse_back(fields in prop::collection::vec(field_strategy(), 2..8)) {
        // All-empty records read as blank lines.
        prop_assume!(fields.iter().any(|f| !f.is_empty()));
        let line = write_record(&fields);
        let parsed = parse_records(&line).expect("well-formed record");
        prop_assert_eq!(parsed, vec![fields]);
    }

    #[test]
    fn every_date_layout_is_accepted(day in day_strategy(), layout in 0usize..DATE_FORMATS.len()) {
        let text = day.format(DATE_FORMATS[layout]).to_string();
        prop_assert_eq!(parse_date(&text), Ok(Some(day)));
    }

    #[test]
    fn plain_decimals_read_back_unchanged(units in -1_000_000i64..1_000_000, scale in 0u32..4) {
        let value = Decimal::new(units, scale);
        let text = plain_decimal(value);
        prop_assert!(!text.contains('e'));
        prop_assert_eq!(parse_decimal(&text), Ok(Some(value)));
    }
}
