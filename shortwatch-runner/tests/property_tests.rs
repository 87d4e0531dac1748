//! Property tests for history and covering invariants.
//!
//! Uses proptest to verify:
//! 1. History dedup: overlapping files keep the values of the file sorted last
//! 2. Covering monotonicity: more shares covered never ranks lower
//! 3. Covering sums are never positive and `NegDays` never exceeds the window

use std::collections::BTreeMap;

use chrono::NaiveDate;
use proptest::prelude::*;
use shortwatch_runner::covering::rank_covering;
use shortwatch_runner::history::{HistoryStore, PositionHistoryRecord};

fn day(n: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).unwrap() + chrono::Duration::days(i64::from(n))
}

fn rec(date: NaiveDate, code: &str, delta_pp: f64, delta_shares: f64) -> PositionHistoryRecord {
    PositionHistoryRecord {
        date,
        code: code.into(),
        pct_short_pp_num: 5.0,
        delta_pp_num: delta_pp,
        delta_shares_num: delta_shares,
        days_to_cover: 0.0,
        adv: 0.0,
    }
}

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_delta() -> impl Strategy<Value = f64> {
    prop_oneof![
        1 => Just(0.0),
        4 => -5.0..5.0_f64,
    ]
}

fn arb_shares() -> impl Strategy<Value = f64> {
    prop_oneof![
        1 => Just(0.0),
        4 => -2_000_000.0..2_000_000.0_f64,
    ]
}

/// One history day: unique codes with their deltas.
fn arb_day_rows() -> impl Strategy<Value = BTreeMap<String, (f64, f64)>> {
    prop::collection::btree_map("[A-D]{3}", (arb_delta(), arb_shares()), 0..6)
}

// ── Properties ───────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn later_file_wins_on_duplicate_keys(
        codes in prop::collection::btree_set("[A-Z]{3}", 1..5),
        old in 0.0..10.0_f64,
        new in 10.0..20.0_f64,
    ) {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = HistoryStore::new(tmp.path());
        let date = day(0);
        let rows_with = |pp: f64| -> Vec<PositionHistoryRecord> {
            codes.iter().map(|c| rec(date, c, pp, 0.0)).collect()
        };

        store.write_day(date, &rows_with(old)).unwrap();
        // Same date, later file name.
        let dir = store.dir::<PositionHistoryRecord>();
        let canonical = store.day_path::<PositionHistoryRecord>(date);
        std::fs::rename(&canonical, dir.join("2024-05-01-a.csv")).unwrap();
        store.write_day(date, &rows_with(new)).unwrap();
        std::fs::rename(&canonical, dir.join("2024-05-01-b.csv")).unwrap();

        let loaded: Vec<PositionHistoryRecord> = store.load_all().unwrap();
        prop_assert_eq!(loaded.len(), codes.len());
        for r in &loaded {
            prop_assert_eq!(r.delta_pp_num, new);
        }
    }

    #[test]
    fn more_shares_covered_ranks_at_least_as_high(
        neg_days in 1usize..5,
        pp in -3.0..0.0_f64,
        small in -1_000_000.0..-1.0_f64,
        extra in 1.0..1_000_000.0_f64,
    ) {
        let mut rows = Vec::new();
        for n in 0..neg_days {
            let date = day(n as u32);
            // Identical NegDays and CovNegPP; only the share totals differ.
            rows.push(rec(date, "ZZZ", pp, small));
            rows.push(rec(date, "AAA", pp, small - extra));
        }
        let out = rank_covering(&rows);
        prop_assert_eq!(out[0].code.as_str(), "AAA");
        prop_assert!(out[0].cover_score >= out[1].cover_score);
    }

    #[test]
    fn covering_sums_are_non_positive(days in prop::collection::vec(arb_day_rows(), 1..6)) {
        let mut rows = Vec::new();
        for (n, day_rows) in days.iter().enumerate() {
            for (code, (pp, shares)) in day_rows {
                rows.push(rec(day(n as u32), code, *pp, *shares));
            }
        }
        for score in rank_covering(&rows) {
            prop_assert!(score.cov_neg_pp <= 0.0);
            prop_assert!(score.cov_neg_shares <= 0.0);
            prop_assert!(score.neg_days as usize <= days.len());
            prop_assert!(score.cover_score >= 0.0);
        }
    }
}
