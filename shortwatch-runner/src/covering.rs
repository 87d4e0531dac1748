//! Covering-score ranker: sustained short covering over a trailing window.
//!
//! Reads only persisted position history. For each code over the last `N`
//! report dates:
//! - `CovNegShares` / `CovNegPP`: sums of the negative parts of
//!   `DeltaShares_num` / `Delta_pp_num` (increases contribute zero)
//! - `NegDays`: rows where either delta is negative
//! - `PctShort_pp`: the most recent value in the window
//!
//! `CoverScore = NegDays + |CovNegPP| * 0.5 + |CovNegShares| / 200000`.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shortwatch_core::normalize::finite_or_zero;

use crate::history::{HistoryError, HistoryStore, PositionHistoryRecord};

/// Share count that weighs the same as one covering day.
pub const SHARES_UNIT: f64 = 200_000.0;
/// Weight of one percentage point of covering.
pub const PP_WEIGHT: f64 = 0.5;

/// Column order of a covering leaderboard.
pub const COVERING_COLUMNS: &[&str] = &[
    "Code",
    "CovNegShares",
    "CovNegPP",
    "NegDays",
    "PctShort_pp",
    "CoverScore",
];

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoveringScore {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "CovNegShares")]
    pub cov_neg_shares: f64,
    #[serde(rename = "CovNegPP")]
    pub cov_neg_pp: f64,
    #[serde(rename = "NegDays")]
    pub neg_days: u32,
    #[serde(rename = "PctShort_pp")]
    pub pct_short_pp: f64,
    #[serde(rename = "CoverScore")]
    pub cover_score: f64,
}

#[derive(Default)]
struct Accumulator {
    cov_neg_shares: f64,
    cov_neg_pp: f64,
    neg_days: u32,
    pct_short_pp: f64,
}

/// Rank codes by covering activity in `rows` (assumed to be one window, date-ordered).
pub fn rank_covering(rows: &[PositionHistoryRecord]) -> Vec<CoveringScore> {
    let mut by_code: BTreeMap<&str, Accumulator> = BTreeMap::new();

    for row in rows {
        let acc = by_code.entry(row.code.as_str()).or_default();
        let shares = finite_or_zero(Some(row.delta_shares_num));
        let pp = finite_or_zero(Some(row.delta_pp_num));

        acc.cov_neg_shares += shares.min(0.0);
        acc.cov_neg_pp += pp.min(0.0);
        if shares < 0.0 || pp < 0.0 {
            acc.neg_days += 1;
        }
        acc.pct_short_pp = finite_or_zero(Some(row.pct_short_pp_num));
    }

    let mut out: Vec<CoveringScore> = by_code
        .into_iter()
        .map(|(code, acc)| CoveringScore {
            code: code.to_string(),
            cov_neg_shares: acc.cov_neg_shares,
            cov_neg_pp: acc.cov_neg_pp,
            neg_days: acc.neg_days,
            pct_short_pp: acc.pct_short_pp,
            cover_score: cover_score(acc.neg_days, acc.cov_neg_pp, acc.cov_neg_shares),
        })
        .collect();

    out.sort_by(rank_order);
    out
}

pub fn cover_score(neg_days: u32, cov_neg_pp: f64, cov_neg_shares: f64) -> f64 {
    f64::from(neg_days) + cov_neg_pp.abs() * PP_WEIGHT + cov_neg_shares.abs() / SHARES_UNIT
}

fn rank_order(a: &CoveringScore, b: &CoveringScore) -> Ordering {
    b.cover_score
        .total_cmp(&a.cover_score)
        .then_with(|| b.cov_neg_shares.abs().total_cmp(&a.cov_neg_shares.abs()))
        .then_with(|| b.cov_neg_pp.abs().total_cmp(&a.cov_neg_pp.abs()))
        .then_with(|| a.code.cmp(&b.code))
}

/// Leaderboard over the last `window` report dates of position history.
pub fn covering_scores(
    store: &HistoryStore,
    window: usize,
) -> Result<Vec<CoveringScore>, HistoryError> {
    let rows = store.load_last_n::<PositionHistoryRecord>(window)?;
    let out = rank_covering(&rows);
    tracing::debug!(window, rows = rows.len(), codes = out.len(), "covering scores ranked");
    Ok(out)
}
