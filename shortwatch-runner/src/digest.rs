//! Top-N digest views over scored snapshots, and the plain-text notification.
//!
//! Every view is a "safe top": rows whose metric is missing are dropped
//! rather than sorted as zero, and `n = 0` or an empty snapshot gives an
//! empty view. Ties keep the engine's ordering.

use chrono::NaiveDate;
use serde::Serialize;

use shortwatch_core::config::AlertConfig;
use shortwatch_core::domain::{ScoredGross, ScoredPosition};

/// Rows per section of the notification text.
pub const NOTIFY_ROWS: usize = 5;

/// Top `n` rows by a nullable metric, descending.
pub fn safe_top<R, F>(rows: &[R], n: usize, metric: F) -> Vec<R>
where
    R: Clone,
    F: Fn(&R) -> Option<f64>,
{
    if n == 0 {
        return Vec::new();
    }
    let mut ranked: Vec<(f64, &R)> = rows
        .iter()
        .filter_map(|r| metric(r).filter(|v| v.is_finite()).map(|v| (v, r)))
        .collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
    ranked.into_iter().take(n).map(|(_, r)| r.clone()).collect()
}

/// The daily digest: every top-N view the report and notification show.
#[derive(Debug, Clone, Serialize)]
pub struct Digest {
    pub gross_date: NaiveDate,
    pub positions_date: NaiveDate,
    /// Largest gross short sales by quantity.
    pub gross_top_qty: Vec<ScoredGross>,
    /// Largest gross short sales relative to issue.
    pub gross_top_pct: Vec<ScoredGross>,
    /// Highest short interest.
    pub pos_high: Vec<ScoredPosition>,
    /// Largest rise in short interest.
    pub pos_delta: Vec<ScoredPosition>,
    /// Largest share-count fall (likely covering).
    pub pos_cover: Vec<ScoredPosition>,
    /// Highest days to cover; codes without volume are left out.
    pub pos_dtc: Vec<ScoredPosition>,
}

impl Digest {
    pub fn build(
        gross: &[ScoredGross],
        positions: &[ScoredPosition],
        gross_date: NaiveDate,
        positions_date: NaiveDate,
        cfg: &AlertConfig,
    ) -> Self {
        let gn = cfg.gross_shorts.top_n;
        let pn = cfg.short_positions.top_n;
        Self {
            gross_date,
            positions_date,
            gross_top_qty: safe_top(gross, gn, |r| r.gross),
            gross_top_pct: safe_top(gross, gn, |r| r.pct_gross_vs_issued_pct),
            pos_high: safe_top(positions, pn, |r| r.pct_short_pp),
            pos_delta: safe_top(positions, pn, |r| r.delta_pp),
            pos_cover: safe_top(positions, pn, |r| {
                r.delta_shares.filter(|v| *v < 0.0).map(|v| -v)
            }),
            pos_dtc: safe_top(positions, pn, |r| {
                Some(r.days_to_cover).filter(|v| *v > 0.0)
            }),
        }
    }

    /// Plain-text digest: one titled block per view, `Code | value | value` lines.
    pub fn notification_text(&self) -> String {
        let gross = |rows: &[ScoredGross]| {
            lines(rows.iter().take(NOTIFY_ROWS).map(|r| {
                vec![r.code.clone(), fmt_num(r.gross_num), fmt_num(r.pct_gross_vs_issued_pct_num)]
            }))
        };
        let pos = |rows: &[ScoredPosition], value: fn(&ScoredPosition) -> f64| {
            lines(rows.iter().take(NOTIFY_ROWS).map(|r| {
                vec![r.code.clone(), fmt_num(r.pct_short_pp_num), fmt_num(value(r))]
            }))
        };

        let blocks = [
            format!("Gross {} (Top QTY)\n{}", self.gross_date, gross(&self.gross_top_qty)),
            format!(
                "Positions {} (Δ pp)\n{}",
                self.positions_date,
                pos(&self.pos_delta, |r| r.delta_pp_num)
            ),
            format!(
                "Positions {} (Likely covering)\n{}",
                self.positions_date,
                pos(&self.pos_cover, |r| r.delta_shares_num)
            ),
            format!(
                "Positions {} (High DTC)\n{}",
                self.positions_date,
                pos(&self.pos_dtc, |r| r.days_to_cover)
            ),
        ];
        blocks
            .iter()
            .map(|b| b.trim_end().to_string())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn fmt_num(v: f64) -> String {
    format!("{v:.2}")
}

fn lines(rows: impl Iterator<Item = Vec<String>>) -> String {
    rows.map(|cells| format!(" • {}", cells.join(" | ")))
        .collect::<Vec<_>>()
        .join("\n")
}
