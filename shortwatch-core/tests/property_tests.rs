//! Property tests for normalizer and engine invariants.
//!
//! Uses proptest to verify:
//! 1. Unit detection: fraction columns are scaled by 100, pp columns untouched
//! 2. Determinism: identical input gives identical output, independent of row order
//! 3. Score bounds: scores equal the number of raised flags
//! 4. Numeric views: `_num` fields are always finite

use chrono::NaiveDate;
use proptest::prelude::*;
use shortwatch_core::config::{GrossShortsConfig, ShortPositionsConfig};
use shortwatch_core::domain::{GrossRow, PositionRow};
use shortwatch_core::normalize::{detect_unit, to_percentage_points, PercentUnit};
use shortwatch_core::{compute_gross_signals, compute_position_signals};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_code() -> impl Strategy<Value = String> {
    "[A-Z]{3}"
}

fn arb_measure() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![
        1 => Just(None),
        1 => Just(Some(f64::NAN)),
        8 => (0.0..1_000_000.0_f64).prop_map(Some),
    ]
}

fn arb_gross_row() -> impl Strategy<Value = GrossRow> {
    (arb_code(), arb_measure(), arb_measure(), arb_measure()).prop_map(
        |(code, gross, issued, vendor_pct)| GrossRow {
            code,
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            gross,
            issued: issued.map(|i| i * 1_000.0),
            vendor_pct: vendor_pct.map(|p| p / 1_000_000.0),
        },
    )
}

fn arb_position_row(day: u32) -> impl Strategy<Value = PositionRow> {
    (arb_code(), arb_measure(), 0.0..30.0_f64).prop_map(move |(code, issued, pct)| PositionRow {
        code,
        date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
        reported_short: None,
        issued,
        pct_short: Some(pct),
    })
}

/// Unique codes, so row order cannot change which duplicate wins.
fn dedup_by_code<T, F: Fn(&T) -> &str>(rows: Vec<T>, code: F) -> Vec<T> {
    let mut seen = std::collections::HashSet::new();
    rows.into_iter()
        .filter(|r| seen.insert(code(r).to_string()))
        .collect()
}

// ── 1. Unit detection ────────────────────────────────────────────────

proptest! {
    /// A column bounded by 1 is a fraction and every value is scaled by 100.
    #[test]
    fn fraction_columns_scale_by_100(values in prop::collection::vec(0.0..=1.0_f64, 1..50)) {
        let col: Vec<Option<f64>> = values.iter().copied().map(Some).collect();
        prop_assert_eq!(detect_unit(&col), PercentUnit::Fraction);
        let pp = to_percentage_points(&col);
        for (raw, out) in values.iter().zip(pp) {
            prop_assert_eq!(out, Some(raw * 100.0));
        }
    }

    /// A column with any value above 1 is left in percentage points.
    #[test]
    fn pp_columns_unchanged(
        values in prop::collection::vec(0.0..100.0_f64, 0..50),
        big in 1.0001..100.0_f64,
    ) {
        let mut col: Vec<Option<f64>> = values.iter().copied().map(Some).collect();
        col.push(Some(big));
        col.push(None);
        prop_assert_eq!(to_percentage_points(&col), col);
    }
}

// ── 2. Determinism ───────────────────────────────────────────────────

proptest! {
    /// Gross scoring is a pure function of the set of rows.
    #[test]
    fn gross_scoring_ignores_row_order(rows in prop::collection::vec(arb_gross_row(), 0..40)) {
        let rows = dedup_by_code(rows, |r| r.code.as_str());
        let cfg = GrossShortsConfig::default();

        let forward = compute_gross_signals(&rows, &cfg);
        let mut reversed_rows = rows.clone();
        reversed_rows.reverse();
        let reversed = compute_gross_signals(&reversed_rows, &cfg);

        prop_assert_eq!(forward.len(), reversed.len());
        for (a, b) in forward.iter().zip(reversed.iter()) {
            prop_assert_eq!(&a.code, &b.code);
            prop_assert_eq!(a.score, b.score);
        }
    }

    /// Position scoring is repeatable and row-order independent.
    #[test]
    fn position_scoring_is_deterministic(
        today in prop::collection::vec(arb_position_row(2), 1..40),
        prev in prop::collection::vec(arb_position_row(1), 0..40),
    ) {
        let today = dedup_by_code(today, |r| r.code.as_str());
        let prev = dedup_by_code(prev, |r| r.code.as_str());
        let cfg = ShortPositionsConfig::default();

        let first = compute_position_signals(&today, Some(&prev), &cfg);
        let second = compute_position_signals(&today, Some(&prev), &cfg);
        prop_assert_eq!(&first, &second);

        let mut shuffled = today.clone();
        shuffled.reverse();
        let third = compute_position_signals(&shuffled, Some(&prev), &cfg);
        let codes = |v: &[shortwatch_core::ScoredPosition]| v.iter().map(|r| r.code.clone()).collect::<Vec<_>>();
        prop_assert_eq!(codes(&first), codes(&third));
    }
}

// ── 3/4. Scores and numeric views ────────────────────────────────────

proptest! {
    #[test]
    fn gross_score_counts_flags(rows in prop::collection::vec(arb_gross_row(), 0..40)) {
        for r in compute_gross_signals(&rows, &GrossShortsConfig::default()) {
            prop_assert_eq!(r.score, r.flag_big_qty as u8 + r.flag_big_pct as u8);
            prop_assert!(r.gross_num.is_finite());
            prop_assert!(r.pct_gross_vs_issued_pct_num.is_finite());
        }
    }

    #[test]
    fn cover_score_counts_flags(
        today in prop::collection::vec(arb_position_row(2), 1..40),
        prev in prop::collection::vec(arb_position_row(1), 0..40),
    ) {
        for r in compute_position_signals(&today, Some(&prev), &ShortPositionsConfig::default()) {
            prop_assert!(r.cover_score <= 2);
            prop_assert_eq!(r.cover_score, r.flag_cover_pp as u8 + r.flag_cover_shares as u8);
            prop_assert!(r.delta_pp_num.is_finite());
            prop_assert!(r.delta_shares_num.is_finite());
            prop_assert_eq!(r.days_to_cover, 0.0);
        }
    }
}
