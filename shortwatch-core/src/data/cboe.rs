//! Cboe Australia short sell report (T+1).
//!
//! CSV with a few preface lines before the header. Header wording has drifted
//! over time, so columns are matched by lower-case substring.

use std::sync::Arc;

use chrono::NaiveDate;

use super::provider::{GrossShortSource, SourceError, TextFetcher};
use crate::domain::GrossRow;
use crate::normalize::parse_numeric;

const BASE_URL: &str = "https://cdn.cboe.com/data/au/equities/short_sale_reports";

pub fn cboe_url(date: NaiveDate) -> String {
    format!("{BASE_URL}/Short_Sell_{}.csv", date.format("%Y%m%d"))
}

/// First column (not already taken) whose lower-case name contains a snippet.
/// Snippets are tried in order.
fn find_column(headers: &[String], snippets: &[&str], taken: &[usize]) -> Option<usize> {
    snippets.iter().find_map(|snip| {
        headers
            .iter()
            .enumerate()
            .find(|(i, h)| !taken.contains(i) && h.contains(snip))
            .map(|(i, _)| i)
    })
}

struct Columns {
    code: usize,
    gross: usize,
    issued: usize,
    pct: usize,
}

fn map_columns(headers: &[String]) -> Result<Columns, SourceError> {
    let missing = |what: &str| SourceError::SchemaChanged(format!("Cboe report has no {what} column"));

    let code = find_column(headers, &["code"], &[]).ok_or_else(|| missing("code"))?;
    let gross = find_column(headers, &["reported gross short sales", "gross short"], &[code])
        .ok_or_else(|| missing("gross short"))?;
    let pct = find_column(headers, &["% of issued capital", "percent", "pct"], &[code, gross])
        .ok_or_else(|| missing("percent"))?;
    let issued = find_column(headers, &["issued capital"], &[code, gross, pct])
        .ok_or_else(|| missing("issued capital"))?;

    Ok(Columns {
        code,
        gross,
        issued,
        pct,
    })
}

/// Parse a Cboe report, skipping everything before the `Code,` header line.
pub fn parse_cboe_csv(text: &str, date: NaiveDate) -> Result<Vec<GrossRow>, SourceError> {
    let mut offset = None;
    let mut pos = 0;
    for line in text.split_inclusive('\n') {
        if line.trim_start_matches('\u{feff}').trim_start().starts_with("Code,") {
            offset = Some(pos);
            break;
        }
        pos += line.len();
    }
    let offset =
        offset.ok_or_else(|| SourceError::SchemaChanged("Cboe report header not found".into()))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text[offset..].as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_lowercase())
        .collect();
    let cols = map_columns(&headers)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let code = record.get(cols.code).unwrap_or_default();
        if code.is_empty() {
            continue;
        }
        let cell = |i: usize| record.get(i).and_then(parse_numeric);
        rows.push(GrossRow {
            code: code.to_string(),
            date,
            gross: cell(cols.gross),
            issued: cell(cols.issued),
            vendor_pct: cell(cols.pct),
        });
    }

    Ok(rows)
}

pub struct CboeGrossShorts {
    fetcher: Arc<dyn TextFetcher>,
}

impl CboeGrossShorts {
    pub fn new(fetcher: Arc<dyn TextFetcher>) -> Self {
        Self { fetcher }
    }
}

impl GrossShortSource for CboeGrossShorts {
    fn name(&self) -> &str {
        "Cboe"
    }

    fn fetch(&self, date: NaiveDate) -> Result<Vec<GrossRow>, SourceError> {
        let text = self.fetcher.get_text(&cboe_url(date))?;
        parse_cboe_csv(&text, date)
    }
}
