//! Gross short-sale signals.
//!
//! Two flags per row, both against absolute thresholds:
//! - `FLAG_big_qty`: gross shares sold short >= `absolute_qty_ge`
//! - `FLAG_big_pct`: gross as percentage points of issue >= `as_percent_issued_ge`
//!
//! The percentage is computed here as `Gross / Issued * 100`. Vendor
//! percentages drift between fraction and percent, so they are only used
//! (through the normalizer) when the ratio cannot be computed.

use std::cmp::Ordering;

use crate::config::GrossShortsConfig;
use crate::domain::{collapse_duplicates, GrossRow, ScoredGross, UNKNOWN_SECTOR};
use crate::normalize::{finite, finite_or_zero, to_percentage_points};

/// Score a combined gross snapshot.
///
/// Returns rows sorted by `(Score, Gross_num, PctGrossVsIssuedPct_num)`
/// descending, ties broken by code. A batch in which no row carries a gross
/// figure is malformed and yields an empty result.
pub fn compute_gross_signals(rows: &[GrossRow], cfg: &GrossShortsConfig) -> Vec<ScoredGross> {
    let rows = collapse_duplicates(rows);
    if rows.iter().all(|r| finite(r.gross).is_none()) {
        return Vec::new();
    }

    let vendor_pp = to_percentage_points(&rows.iter().map(|r| r.vendor_pct).collect::<Vec<_>>());

    let mut out: Vec<ScoredGross> = rows
        .into_iter()
        .zip(vendor_pp)
        .map(|(row, vendor_pp)| {
            let gross = finite(row.gross);
            let issued = finite(row.issued);
            let pct = gross_pct_of_issue(gross, issued).or(vendor_pp);

            let gross_num = finite_or_zero(gross);
            let pct_num = finite_or_zero(pct);
            let flag_big_qty = gross_num >= cfg.absolute_qty_ge;
            let flag_big_pct = pct_num >= cfg.as_percent_issued_ge;

            ScoredGross {
                code: row.code,
                date: row.date,
                sector: UNKNOWN_SECTOR.to_string(),
                gross,
                issued,
                pct_gross_vs_issued_pct: pct,
                gross_num,
                pct_gross_vs_issued_pct_num: pct_num,
                flag_big_qty,
                flag_big_pct,
                score: flag_big_qty as u8 + flag_big_pct as u8,
            }
        })
        .collect();

    out.sort_by(rank_order);
    out
}

/// `Gross / Issued * 100`, undefined for missing or non-positive issue.
fn gross_pct_of_issue(gross: Option<f64>, issued: Option<f64>) -> Option<f64> {
    match (gross, issued) {
        (Some(g), Some(i)) if i > 0.0 => finite(Some(g / i * 100.0)),
        _ => None,
    }
}

fn rank_order(a: &ScoredGross, b: &ScoredGross) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| b.gross_num.total_cmp(&a.gross_num))
        .then_with(|| {
            b.pct_gross_vs_issued_pct_num
                .total_cmp(&a.pct_gross_vs_issued_pct_num)
        })
        .then_with(|| a.code.cmp(&b.code))
}
