//! Domain types — raw snapshots and scored signal rows.
//!
//! One row per security per day per category. Raw rows come straight from a
//! source parser with nullable measurements; scored rows add the derived,
//! flag and `_num` columns. Every scored row carries every column, so an empty
//! result has exactly the same shape as a populated one.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::normalize::{lenient_f64, normalize_code};

/// Sector label used when the static map has no entry for a code.
pub const UNKNOWN_SECTOR: &str = "Unknown";

/// Access to the identity column shared by every snapshot row.
pub trait SnapshotRow {
    fn code(&self) -> &str;
    fn code_mut(&mut self) -> &mut String;
}

/// Collapse a snapshot to one row per code.
///
/// Codes are normalized (trimmed, upper-case); rows with an empty code are
/// dropped. On duplicates the last row wins, keeping the position of the first.
pub fn collapse_duplicates<R: SnapshotRow + Clone>(rows: &[R]) -> Vec<R> {
    let mut out: Vec<R> = Vec::with_capacity(rows.len());
    let mut index: HashMap<String, usize> = HashMap::with_capacity(rows.len());

    for row in rows {
        let code = normalize_code(row.code());
        if code.is_empty() {
            continue;
        }
        let mut row = row.clone();
        *row.code_mut() = code.clone();
        match index.get(&code) {
            Some(&i) => out[i] = row,
            None => {
                index.insert(code, out.len());
                out.push(row);
            }
        }
    }

    out
}

// ── Raw snapshots ───────────────────────────────────────────────────

/// One row of a gross short-sale report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrossRow {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    /// Shares sold short on the day.
    #[serde(rename = "Gross", deserialize_with = "lenient_f64", default)]
    pub gross: Option<f64>,
    /// Total shares on issue.
    #[serde(rename = "Issued", deserialize_with = "lenient_f64", default)]
    pub issued: Option<f64>,
    /// Vendor-reported gross/issued percentage, unit unknown.
    #[serde(rename = "PctGrossVsIssued", deserialize_with = "lenient_f64", default)]
    pub vendor_pct: Option<f64>,
}

impl SnapshotRow for GrossRow {
    fn code(&self) -> &str {
        &self.code
    }
    fn code_mut(&mut self) -> &mut String {
        &mut self.code
    }
}

/// One row of an aggregate short-position report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRow {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    /// Reported short position in shares.
    #[serde(rename = "ReportedShort", deserialize_with = "lenient_f64", default)]
    pub reported_short: Option<f64>,
    #[serde(rename = "Issued", deserialize_with = "lenient_f64", default)]
    pub issued: Option<f64>,
    /// Percent of issue reported short, unit unknown.
    #[serde(rename = "PctShort", deserialize_with = "lenient_f64", default)]
    pub pct_short: Option<f64>,
}

impl SnapshotRow for PositionRow {
    fn code(&self) -> &str {
        &self.code
    }
    fn code_mut(&mut self) -> &mut String {
        &mut self.code
    }
}

// ── Scored snapshots ────────────────────────────────────────────────

/// Column order of a scored gross snapshot.
pub const GROSS_SIGNAL_COLUMNS: &[&str] = &[
    "Code",
    "Date",
    "Sector",
    "Gross",
    "Issued",
    "PctGrossVsIssuedPct",
    "Gross_num",
    "PctGrossVsIssuedPct_num",
    "FLAG_big_qty",
    "FLAG_big_pct",
    "Score",
];

/// Gross short-sale row after scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredGross {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Sector")]
    pub sector: String,
    #[serde(rename = "Gross")]
    pub gross: Option<f64>,
    #[serde(rename = "Issued")]
    pub issued: Option<f64>,
    /// Gross as percentage points of issue.
    #[serde(rename = "PctGrossVsIssuedPct")]
    pub pct_gross_vs_issued_pct: Option<f64>,
    #[serde(rename = "Gross_num")]
    pub gross_num: f64,
    #[serde(rename = "PctGrossVsIssuedPct_num")]
    pub pct_gross_vs_issued_pct_num: f64,
    #[serde(rename = "FLAG_big_qty")]
    pub flag_big_qty: bool,
    #[serde(rename = "FLAG_big_pct")]
    pub flag_big_pct: bool,
    /// Count of raised flags (0..=2).
    #[serde(rename = "Score")]
    pub score: u8,
}

/// Column order of a scored position snapshot.
pub const POSITION_SIGNAL_COLUMNS: &[&str] = &[
    "Code",
    "Date",
    "Sector",
    "ReportedShort",
    "Issued",
    "PctShort",
    "PctShort_pp",
    "PctShort_prev",
    "Delta_pp",
    "ShortedShares",
    "PrevShortedShares",
    "DeltaShares",
    "PctShort_pp_num",
    "Delta_pp_num",
    "DeltaShares_num",
    "FLAG_high_pct",
    "FLAG_delta",
    "FLAG_cover_pp",
    "FLAG_cover_shares",
    "CoverScore",
    "ADV",
    "DaysToCover",
];

/// Short-position row after scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPosition {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Sector")]
    pub sector: String,
    #[serde(rename = "ReportedShort")]
    pub reported_short: Option<f64>,
    #[serde(rename = "Issued")]
    pub issued: Option<f64>,
    /// Raw vendor value, unit unknown.
    #[serde(rename = "PctShort")]
    pub pct_short: Option<f64>,
    #[serde(rename = "PctShort_pp")]
    pub pct_short_pp: Option<f64>,
    /// Previous report's value, in percentage points.
    #[serde(rename = "PctShort_prev")]
    pub pct_short_prev: Option<f64>,
    #[serde(rename = "Delta_pp")]
    pub delta_pp: Option<f64>,
    #[serde(rename = "ShortedShares")]
    pub shorted_shares: Option<f64>,
    #[serde(rename = "PrevShortedShares")]
    pub prev_shorted_shares: Option<f64>,
    #[serde(rename = "DeltaShares")]
    pub delta_shares: Option<f64>,
    #[serde(rename = "PctShort_pp_num")]
    pub pct_short_pp_num: f64,
    #[serde(rename = "Delta_pp_num")]
    pub delta_pp_num: f64,
    #[serde(rename = "DeltaShares_num")]
    pub delta_shares_num: f64,
    #[serde(rename = "FLAG_high_pct")]
    pub flag_high_pct: bool,
    #[serde(rename = "FLAG_delta")]
    pub flag_delta: bool,
    #[serde(rename = "FLAG_cover_pp")]
    pub flag_cover_pp: bool,
    #[serde(rename = "FLAG_cover_shares")]
    pub flag_cover_shares: bool,
    /// Count of raised covering flags (0..=2).
    #[serde(rename = "CoverScore")]
    pub cover_score: u8,
    /// Average daily traded volume; 0 when unknown.
    #[serde(rename = "ADV")]
    pub adv: f64,
    #[serde(rename = "DaysToCover")]
    pub days_to_cover: f64,
}

/// Rows that carry a sector label.
pub trait Sectored {
    fn code(&self) -> &str;
    fn set_sector(&mut self, sector: String);
}

impl Sectored for ScoredGross {
    fn code(&self) -> &str {
        &self.code
    }
    fn set_sector(&mut self, sector: String) {
        self.sector = sector;
    }
}

impl Sectored for ScoredPosition {
    fn code(&self) -> &str {
        &self.code
    }
    fn set_sector(&mut self, sector: String) {
        self.sector = sector;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gross(code: &str, gross: f64) -> GrossRow {
        GrossRow {
            code: code.into(),
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            gross: Some(gross),
            issued: None,
            vendor_pct: None,
        }
    }

    #[test]
    fn collapse_keeps_last_value_at_first_position() {
        let rows = vec![gross("abc", 1.0), gross("XYZ", 2.0), gross(" ABC ", 3.0)];
        let out = collapse_duplicates(&rows);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].code, "ABC");
        assert_eq!(out[0].gross, Some(3.0));
        assert_eq!(out[1].code, "XYZ");
    }

    #[test]
    fn collapse_drops_blank_codes() {
        let out = collapse_duplicates(&[gross("  ", 1.0), gross("BHP", 2.0)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].code, "BHP");
    }
}
