//! History trends shown under the daily report.
//!
//! - Gross: the codes with the largest cumulative `Gross_num` over the last
//!   30 days, with their per-day series.
//! - Positions: the codes with the highest latest `PctShort_pp_num` over the
//!   last 60 days, with their per-day series.
//!
//! Windows are counted back from the run's AWST date, inclusive. Ties rank by
//! `Code` ascending.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::history::{GrossHistoryRecord, HistoryError, HistoryStore, PositionHistoryRecord};

pub const GROSS_TREND_DAYS: i64 = 30;
pub const PCT_SHORT_TREND_DAYS: i64 = 60;
pub const TREND_CODES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// One code's series and the value it was ranked by.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    pub code: String,
    pub rank_value: f64,
    pub points: Vec<TrendPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrendView {
    /// Lookback in calendar days.
    pub days: i64,
    pub series: Vec<TrendSeries>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoryTrends {
    pub gross_cumulative: TrendView,
    pub pct_short_leaders: TrendView,
}

/// Per-code series inside the window, dates ascending.
fn series_in_window<'a>(
    rows: impl Iterator<Item = (NaiveDate, &'a str, f64)>,
    cutoff: NaiveDate,
    as_of: NaiveDate,
) -> BTreeMap<&'a str, BTreeMap<NaiveDate, f64>> {
    let mut by_code: BTreeMap<&str, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
    for (date, code, value) in rows {
        if date < cutoff || date > as_of {
            continue;
        }
        by_code.entry(code).or_default().insert(date, value);
    }
    by_code
}

fn top_series(
    by_code: BTreeMap<&str, BTreeMap<NaiveDate, f64>>,
    rank: impl Fn(&BTreeMap<NaiveDate, f64>) -> f64,
    n: usize,
) -> Vec<TrendSeries> {
    // BTreeMap iteration is by code, so the stable sort keeps code order on ties.
    let mut ranked: Vec<TrendSeries> = by_code
        .into_iter()
        .map(|(code, points)| TrendSeries {
            code: code.to_string(),
            rank_value: rank(&points),
            points: points
                .into_iter()
                .map(|(date, value)| TrendPoint { date, value })
                .collect(),
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.rank_value
            .partial_cmp(&a.rank_value)
            .unwrap_or(Ordering::Equal)
    });
    ranked.truncate(n);
    ranked
}

/// Top `n` codes by summed `Gross_num` over the `days` ending at `as_of`.
pub fn gross_cumulative_leaders(
    rows: &[GrossHistoryRecord],
    as_of: NaiveDate,
    days: i64,
    n: usize,
) -> TrendView {
    let cutoff = as_of - Duration::days(days);
    let by_code = series_in_window(
        rows.iter().map(|r| (r.date, r.code.as_str(), r.gross_num)),
        cutoff,
        as_of,
    );
    TrendView {
        days,
        series: top_series(by_code, |points| points.values().sum(), n),
    }
}

/// Top `n` codes by their most recent `PctShort_pp_num` inside the window.
pub fn pct_short_leaders(
    rows: &[PositionHistoryRecord],
    as_of: NaiveDate,
    days: i64,
    n: usize,
) -> TrendView {
    let cutoff = as_of - Duration::days(days);
    let by_code = series_in_window(
        rows.iter().map(|r| (r.date, r.code.as_str(), r.pct_short_pp_num)),
        cutoff,
        as_of,
    );
    TrendView {
        days,
        series: top_series(
            by_code,
            |points| points.values().next_back().copied().unwrap_or(0.0),
            n,
        ),
    }
}

/// Both views from the full scored history.
pub fn history_trends(store: &HistoryStore, as_of: NaiveDate) -> Result<HistoryTrends, HistoryError> {
    let gross: Vec<GrossHistoryRecord> = store.load_all()?;
    let positions: Vec<PositionHistoryRecord> = store.load_all()?;
    let trends = HistoryTrends {
        gross_cumulative: gross_cumulative_leaders(&gross, as_of, GROSS_TREND_DAYS, TREND_CODES),
        pct_short_leaders: pct_short_leaders(&positions, as_of, PCT_SHORT_TREND_DAYS, TREND_CODES),
    };
    tracing::debug!(
        gross_rows = gross.len(),
        position_rows = positions.len(),
        gross_codes = trends.gross_cumulative.series.len(),
        leader_codes = trends.pct_short_leaders.series.len(),
        "history trends built"
    );
    Ok(trends)
}
