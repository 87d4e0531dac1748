//! Short-position signals with day-over-day deltas.
//!
//! Percent short is normalized to percentage points once per call, from the
//! whole column's maximum. When a previous report is supplied it is
//! left-joined on `Code`, and each row gains:
//! - `Delta_pp`: today's minus previous percentage points
//! - `ShortedShares` / `PrevShortedShares` / `DeltaShares`: the same figures
//!   expressed in shares using each day's own `Issued`
//!
//! Flags split into two directions. Rising interest: `FLAG_high_pct`,
//! `FLAG_delta`. Unwinding (covering): `FLAG_cover_pp`, `FLAG_cover_shares`,
//! whose count is the row's `CoverScore`.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::config::ShortPositionsConfig;
use crate::domain::{collapse_duplicates, PositionRow, ScoredPosition, UNKNOWN_SECTOR};
use crate::normalize::{finite, finite_or_zero, to_percentage_points};

/// Previous report values for one code, in percentage points and shares.
#[derive(Debug, Clone, Copy)]
struct PrevDay {
    pct_pp: Option<f64>,
    issued: Option<f64>,
}

/// Score today's position snapshot, optionally against the previous report.
///
/// Returns rows sorted by `(FLAG_high_pct, FLAG_delta, PctShort_pp_num)`
/// descending, ties broken by code. A batch in which no row carries a percent
/// short figure yields an empty result; a previous snapshot without any
/// percent short figure is ignored.
pub fn compute_position_signals(
    today: &[PositionRow],
    prev: Option<&[PositionRow]>,
    cfg: &ShortPositionsConfig,
) -> Vec<ScoredPosition> {
    let today = collapse_duplicates(today);
    if today.iter().all(|r| finite(r.pct_short).is_none()) {
        return Vec::new();
    }

    let pct_pp = to_percentage_points(&today.iter().map(|r| r.pct_short).collect::<Vec<_>>());
    let prev = prev.map(prev_lookup).filter(|m| !m.is_empty());

    let mut out: Vec<ScoredPosition> = today
        .into_iter()
        .zip(pct_pp)
        .map(|(row, pct_short_pp)| {
            let issued = finite(row.issued);
            let prev_day = prev.as_ref().and_then(|m| m.get(&row.code)).copied();
            let pct_short_prev = prev_day.and_then(|p| p.pct_pp);

            let delta_pp = match (pct_short_pp, pct_short_prev) {
                (Some(t), Some(p)) => finite(Some(t - p)),
                _ => None,
            };

            let shorted_shares = shares_from_pp(pct_short_pp, issued);
            let prev_shorted_shares =
                prev_day.and_then(|p| shares_from_pp(p.pct_pp, p.issued));
            let delta_shares = match (shorted_shares, prev_shorted_shares) {
                (Some(t), Some(p)) => finite(Some(t - p)),
                _ => None,
            };

            let pct_short_pp_num = finite_or_zero(pct_short_pp);
            let delta_pp_num = finite_or_zero(delta_pp);
            let delta_shares_num = finite_or_zero(delta_shares);

            let flag_cover_pp = delta_pp_num <= -cfg.pct_short_change_ge;
            let flag_cover_shares = delta_shares_num <= -cfg.abs_shares_cover_ge;

            ScoredPosition {
                code: row.code,
                date: row.date,
                sector: UNKNOWN_SECTOR.to_string(),
                reported_short: finite(row.reported_short),
                issued,
                pct_short: finite(row.pct_short),
                pct_short_pp,
                pct_short_prev,
                delta_pp,
                shorted_shares,
                prev_shorted_shares,
                delta_shares,
                pct_short_pp_num,
                delta_pp_num,
                delta_shares_num,
                flag_high_pct: pct_short_pp_num >= cfg.pct_short_ge,
                flag_delta: delta_pp_num >= cfg.pct_short_change_ge,
                flag_cover_pp,
                flag_cover_shares,
                cover_score: flag_cover_pp as u8 + flag_cover_shares as u8,
                adv: 0.0,
                days_to_cover: 0.0,
            }
        })
        .collect();

    out.sort_by(rank_order);
    out
}

/// Index the previous snapshot by code, normalizing its own percent column.
fn prev_lookup(prev: &[PositionRow]) -> HashMap<String, PrevDay> {
    let prev = collapse_duplicates(prev);
    if prev.iter().all(|r| finite(r.pct_short).is_none()) {
        return HashMap::new();
    }
    let pct_pp = to_percentage_points(&prev.iter().map(|r| r.pct_short).collect::<Vec<_>>());

    prev.into_iter()
        .zip(pct_pp)
        .map(|(row, pct_pp)| {
            (
                row.code,
                PrevDay {
                    pct_pp,
                    issued: finite(row.issued),
                },
            )
        })
        .collect()
}

/// `pp / 100 * issued`.
fn shares_from_pp(pct_pp: Option<f64>, issued: Option<f64>) -> Option<f64> {
    match (pct_pp, issued) {
        (Some(p), Some(i)) => finite(Some(p / 100.0 * i)),
        _ => None,
    }
}

fn rank_order(a: &ScoredPosition, b: &ScoredPosition) -> Ordering {
    b.flag_high_pct
        .cmp(&a.flag_high_pct)
        .then_with(|| b.flag_delta.cmp(&a.flag_delta))
        .then_with(|| b.pct_short_pp_num.total_cmp(&a.pct_short_pp_num))
        .then_with(|| a.code.cmp(&b.code))
}
