//! Static report: `index.md` plus the `report.json` context it was built from.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::covering::CoveringScore;
use crate::digest::Digest;
use crate::export::write_atomic;
use crate::trends::{HistoryTrends, TrendView};

/// Covering leaderboard for one window length.
#[derive(Debug, Clone, Serialize)]
pub struct CoveringBoard {
    pub window: usize,
    pub rows: Vec<CoveringScore>,
}

/// Everything the report shows.
#[derive(Debug, Clone, Serialize)]
pub struct ReportContext {
    pub generated_at: DateTime<FixedOffset>,
    pub digest: Digest,
    pub covering: Vec<CoveringBoard>,
    pub trends: HistoryTrends,
    /// Scored codes with no sector entry.
    pub unknown_sectors: Vec<String>,
}

pub struct MarkdownReport;

impl MarkdownReport {
    pub fn generate(&self, ctx: &ReportContext) -> String {
        let d = &ctx.digest;
        let mut out = format!(
            "# ASX Short Interest — Daily\n\n\
Generated: {}\n\n\
- Gross short sales date: {}\n\
- Short positions date: {}\n",
            ctx.generated_at.format("%Y-%m-%d %H:%M AWST"),
            d.gross_date,
            d.positions_date,
        );

        out.push_str("\n## Gross short sales\n");
        gross_table(&mut out, "Top by quantity", &d.gross_top_qty);
        gross_table(&mut out, "Top by % of issue", &d.gross_top_pct);

        out.push_str("\n## Short positions\n");
        position_table(&mut out, "Highest % short", &d.pos_high, "Δ pp", |r| r.delta_pp_num);
        position_table(&mut out, "Largest rise (Δ pp)", &d.pos_delta, "Δ pp", |r| r.delta_pp_num);
        position_table(&mut out, "Likely covering", &d.pos_cover, "Δ shares", |r| r.delta_shares_num);
        position_table(&mut out, "High days to cover", &d.pos_dtc, "Days to cover", |r| r.days_to_cover);

        if !ctx.covering.is_empty() {
            out.push_str("\n## Covering leaderboards\n");
            for board in &ctx.covering {
                covering_table(&mut out, board);
            }
        }

        out.push_str("\n## History trends\n");
        trend_table(
            &mut out,
            "Gross short sales, top by cumulative quantity",
            &ctx.trends.gross_cumulative,
            "Cumulative",
        );
        trend_table(
            &mut out,
            "% short leaders",
            &ctx.trends.pct_short_leaders,
            "Latest % short",
        );

        if !ctx.unknown_sectors.is_empty() {
            let _ = write!(
                out,
                "\n_{} codes have no sector mapping._\n",
                ctx.unknown_sectors.len()
            );
        }

        out
    }
}

fn gross_table(out: &mut String, title: &str, rows: &[shortwatch_core::ScoredGross]) {
    let _ = writeln!(out, "\n### {title}\n");
    if rows.is_empty() {
        out.push_str("_No data._\n");
        return;
    }
    out.push_str("| Code | Sector | Gross | % of issue | Score |\n");
    out.push_str("|------|--------|------:|-----------:|------:|\n");
    for r in rows {
        let _ = writeln!(
            out,
            "| {} | {} | {:.0} | {:.3} | {} |",
            r.code, r.sector, r.gross_num, r.pct_gross_vs_issued_pct_num, r.score
        );
    }
}

fn position_table(
    out: &mut String,
    title: &str,
    rows: &[shortwatch_core::ScoredPosition],
    label: &str,
    value: fn(&shortwatch_core::ScoredPosition) -> f64,
) {
    let _ = writeln!(out, "\n### {title}\n");
    if rows.is_empty() {
        out.push_str("_No data._\n");
        return;
    }
    let _ = writeln!(out, "| Code | Sector | % short | {label} | Cover score |");
    out.push_str("|------|--------|--------:|------:|------------:|\n");
    for r in rows {
        let _ = writeln!(
            out,
            "| {} | {} | {:.2} | {:.2} | {} |",
            r.code,
            r.sector,
            r.pct_short_pp_num,
            value(r),
            r.cover_score
        );
    }
}

fn covering_table(out: &mut String, board: &CoveringBoard) {
    let _ = writeln!(out, "\n### {}-day window\n", board.window);
    if board.rows.is_empty() {
        out.push_str("_No history yet._\n");
        return;
    }
    out.push_str("| Code | Score | Neg days | Σ Δ pp | Σ Δ shares | % short |\n");
    out.push_str("|------|------:|---------:|-------:|-----------:|--------:|\n");
    for r in &board.rows {
        let _ = writeln!(
            out,
            "| {} | {:.2} | {} | {:.2} | {:.0} | {:.2} |",
            r.code, r.cover_score, r.neg_days, r.cov_neg_pp, r.cov_neg_shares, r.pct_short_pp
        );
    }
}

fn trend_table(out: &mut String, title: &str, view: &TrendView, label: &str) {
    let _ = writeln!(out, "\n### {title} ({}d)\n", view.days);
    if view.series.is_empty() {
        out.push_str("_No history yet._\n");
        return;
    }
    let _ = writeln!(out, "| Code | {label} | Low | High | Days |");
    out.push_str("|------|------:|----:|-----:|-----:|\n");
    for s in &view.series {
        let low = s.points.iter().map(|p| p.value).fold(f64::INFINITY, f64::min);
        let high = s.points.iter().map(|p| p.value).fold(f64::NEG_INFINITY, f64::max);
        let _ = writeln!(
            out,
            "| {} | {:.2} | {:.2} | {:.2} | {} |",
            s.code,
            s.rank_value,
            low,
            high,
            s.points.len()
        );
    }
}

#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub markdown: PathBuf,
    pub context: PathBuf,
}

/// Write `index.md`, `report.json` and `.nojekyll` into the docs directory.
pub fn write_report(docs_dir: &Path, ctx: &ReportContext) -> Result<ReportPaths> {
    let markdown = docs_dir.join("index.md");
    let context = docs_dir.join("report.json");

    write_atomic(&markdown, MarkdownReport.generate(ctx).as_bytes())?;
    let json = serde_json::to_vec_pretty(ctx).context("Failed to serialize report context")?;
    write_atomic(&context, &json)?;
    write_atomic(&docs_dir.join(".nojekyll"), b"")?;

    Ok(ReportPaths { markdown, context })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use shortwatch_core::config::AlertConfig;
    use shortwatch_core::domain::GrossRow;
    use shortwatch_core::compute_gross_signals;
    use crate::trends::{TrendPoint, TrendSeries};

    fn ctx(covering: Vec<CoveringBoard>) -> ReportContext {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let cfg = AlertConfig::default();
        let gross = compute_gross_signals(
            &[GrossRow {
                code: "ABC".into(),
                date,
                gross: Some(250_000.0),
                issued: Some(100_000_000.0),
                vendor_pct: None,
            }],
            &cfg.gross_shorts,
        );
        ReportContext {
            generated_at: FixedOffset::east_opt(8 * 3600)
                .unwrap()
                .with_ymd_and_hms(2024, 5, 2, 7, 30, 0)
                .unwrap(),
            digest: Digest::build(&gross, &[], date, date, &cfg),
            covering,
            trends: HistoryTrends {
                gross_cumulative: TrendView { days: 30, series: vec![] },
                pct_short_leaders: TrendView {
                    days: 60,
                    series: vec![TrendSeries {
                        code: "ABC".into(),
                        rank_value: 10.0,
                        points: vec![
                            TrendPoint { date: date - chrono::Duration::days(1), value: 12.0 },
                            TrendPoint { date, value: 10.0 },
                        ],
                    }],
                },
            },
            unknown_sectors: vec!["ABC".into()],
        }
    }

    #[test]
    fn markdown_has_sections_and_rows() {
        let md = MarkdownReport.generate(&ctx(vec![CoveringBoard { window: 3, rows: vec![] }]));
        assert!(md.contains("Generated: 2024-05-02 07:30 AWST"));
        assert!(md.contains("| ABC | Unknown | 250000 | 0.250 | 2 |"));
        assert!(md.contains("### Highest % short\n\n_No data._"));
        assert!(md.contains("### 3-day window\n\n_No history yet._"));
        assert!(md.contains("_1 codes have no sector mapping._"));
        assert!(md.contains("### Gross short sales, top by cumulative quantity (30d)\n\n_No history yet._"));
        assert!(md.contains("| ABC | 10.00 | 10.00 | 12.00 | 2 |"));
    }

    #[test]
    fn report_files_written() {
        let tmp = tempfile::TempDir::new().unwrap();
        let paths = write_report(tmp.path(), &ctx(vec![])).unwrap();
        assert!(paths.markdown.exists());
        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&paths.context).unwrap()).unwrap();
        assert_eq!(json["digest"]["gross_top_qty"][0]["Code"], "ABC");
        assert_eq!(json["trends"]["pct_short_leaders"]["series"][0]["points"][1]["value"], 10.0);
        assert_eq!(json["trends"]["pct_short_leaders"]["series"][0]["points"][0]["date"], "2024-04-30");
        assert!(tmp.path().join(".nojekyll").exists());
    }
}
