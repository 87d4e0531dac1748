//! ASIC aggregate short position reports.
//!
//! ASIC publishes one CSV per trading day, roughly four trading days after the
//! positions were held:
//!
//! `https://download.asic.gov.au/short-selling/RR{YYYYMMDD}-001-SSDailyAggShortPos.csv`
//!
//! The newest report is found by walking back from `as_of - 4 days`. Files
//! have been seen both comma and tab delimited.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};

use super::provider::{ShortPositionSource, SourceError, TextFetcher};
use crate::domain::PositionRow;
use crate::normalize::parse_numeric;

const BASE_URL: &str = "https://download.asic.gov.au/short-selling";

/// Reporting lag before the first candidate date.
const REPORT_LAG_DAYS: i64 = 4;

/// URL of the ASIC report for a date.
pub fn asic_url(date: NaiveDate) -> String {
    format!(
        "{BASE_URL}/RR{}-001-SSDailyAggShortPos.csv",
        date.format("%Y%m%d")
    )
}

/// Parse an ASIC report. Every row gets `date` as its report date.
///
/// Header names are trimmed and matched case-insensitively. A report without
/// a code column or a percent-short column is a [`SourceError::SchemaChanged`].
pub fn parse_asic_csv(text: &str, date: NaiveDate) -> Result<Vec<PositionRow>, SourceError> {
    let text = text.trim_start_matches('\u{feff}');
    let header_line = text.lines().next().unwrap_or_default();
    let delimiter = if header_line.contains('\t') && !header_line.contains(',') {
        b'\t'
    } else {
        b','
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    let column = |name: &str| headers.iter().position(|h| h == name);

    let code_idx = column("product code")
        .ok_or_else(|| SourceError::SchemaChanged("ASIC report has no 'Product Code' column".into()))?;
    let pct_idx = column("% of total product in issue reported as short positions").ok_or_else(|| {
        SourceError::SchemaChanged("ASIC report has no percent-short column".into())
    })?;
    let short_idx = column("reported short positions");
    let issued_idx = column("total product in issue");

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let cell = |idx: Option<usize>| idx.and_then(|i| record.get(i)).and_then(parse_numeric);
        let code = record.get(code_idx).unwrap_or_default().to_string();
        if code.trim().is_empty() {
            continue;
        }
        rows.push(PositionRow {
            code,
            date,
            reported_short: cell(short_idx),
            issued: cell(issued_idx),
            pct_short: cell(Some(pct_idx)),
        });
    }

    Ok(rows)
}

/// ASIC short positions, discovered by date lookback.
pub struct AsicShortPositions {
    fetcher: Arc<dyn TextFetcher>,
    max_lookback_days: u32,
}

impl AsicShortPositions {
    pub fn new(fetcher: Arc<dyn TextFetcher>, max_lookback_days: u32) -> Self {
        Self {
            fetcher,
            max_lookback_days,
        }
    }

    /// Candidate report dates, newest first.
    pub fn candidate_dates(&self, as_of: NaiveDate) -> Vec<NaiveDate> {
        (0..i64::from(self.max_lookback_days))
            .map(|k| as_of - Duration::days(REPORT_LAG_DAYS + k))
            .collect()
    }
}

impl ShortPositionSource for AsicShortPositions {
    fn name(&self) -> &str {
        "ASIC"
    }

    fn fetch_latest(&self, as_of: NaiveDate) -> Result<(NaiveDate, Vec<PositionRow>), SourceError> {
        for date in self.candidate_dates(as_of) {
            let url = asic_url(date);
            let text = match self.fetcher.get_text(&url) {
                Ok(text) => text,
                Err(e @ SourceError::CircuitOpen { .. }) => return Err(e),
                Err(e) => {
                    tracing::debug!(source = "ASIC", %date, error = %e, "no report for date");
                    continue;
                }
            };
            match parse_asic_csv(&text, date) {
                Ok(rows) => {
                    tracing::info!(source = "ASIC", %date, rows = rows.len(), "short positions loaded");
                    return Ok((date, rows));
                }
                Err(e) => {
                    tracing::warn!(source = "ASIC", %date, error = %e, "unreadable report, trying earlier date");
                }
            }
        }

        Err(SourceError::NoReportInWindow {
            as_of,
            days: self.max_lookback_days,
        })
    }
}
