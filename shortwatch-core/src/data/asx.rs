//! ASX gross short sales text report (T+1).
//!
//! The report is fixed-width text with a preface. Data lines look like
//!
//! ```text
//! BHP  BHP GROUP LIMITED   FPO   1,234,567   5,062,000,000   .0244
//! ```
//!
//! Names contain arbitrary spaces, so lines are read from the right: three
//! numbers, then a security class, then the code at the start of the line.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};

use super::provider::{GrossShortSource, SourceError, TextFetcher};
use crate::domain::GrossRow;
use crate::normalize::parse_numeric;

const BASE_URL: &str = "https://asxonline.com/content/dam/asxonline/public/reports";

/// Security classes as whitespace-separated tokens, longest first.
const CLASSES: &[&[&str]] = &[
    &["ETF", "UNITS"],
    &["CDI", "1:1"],
    &["CDI", "3:1"],
    &["FPO", "NZX"],
    &["FPO", "NZ"],
    &["STAPLED"],
    &["FPO"],
];

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

pub fn asx_url(date: NaiveDate) -> String {
    let month = MONTHS[date.month0() as usize];
    format!(
        "{BASE_URL}/{}/{month}/shortsell_gross_{}.txt",
        date.year(),
        date.format("%Y%m%d")
    )
}

fn is_code(token: &str) -> bool {
    (2..=4).contains(&token.len())
        && token
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

fn is_quantity(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit() || c == ',')
}

fn is_percent(token: &str) -> bool {
    let digits = token.strip_prefix('.').unwrap_or(token);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// Parse one data line; `None` for preface, headings and totals.
fn parse_line(line: &str, date: NaiveDate) -> Option<GrossRow> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    // code, name, class, gross, issued, pct
    if tokens.len() < 6 {
        return None;
    }
    let (head, numbers) = tokens.split_at(tokens.len() - 3);
    let [gross, issued, pct] = [numbers[0], numbers[1], numbers[2]];
    if !is_quantity(gross) || !is_quantity(issued) || !is_percent(pct) {
        return None;
    }

    let class_len = CLASSES
        .iter()
        .find(|class| head.len() > class.len() + 1 && head.ends_with(class))
        .map(|class| class.len())?;
    let head = &head[..head.len() - class_len];

    let code = head[0];
    if !is_code(code) {
        return None;
    }

    Some(GrossRow {
        code: code.to_string(),
        date,
        gross: parse_numeric(gross),
        issued: parse_numeric(issued),
        vendor_pct: parse_numeric(pct),
    })
}

/// Parse a whole ASX report; unrecognised lines are skipped.
pub fn parse_asx_report(text: &str, date: NaiveDate) -> Vec<GrossRow> {
    text.lines().filter_map(|line| parse_line(line, date)).collect()
}

pub struct AsxGrossShorts {
    fetcher: Arc<dyn TextFetcher>,
}

impl AsxGrossShorts {
    pub fn new(fetcher: Arc<dyn TextFetcher>) -> Self {
        Self { fetcher }
    }
}

impl GrossShortSource for AsxGrossShorts {
    fn name(&self) -> &str {
        "ASX"
    }

    fn fetch(&self, date: NaiveDate) -> Result<Vec<GrossRow>, SourceError> {
        let text = self.fetcher.get_text(&asx_url(date))?;
        let rows = parse_asx_report(&text, date);
        if rows.is_empty() {
            tracing::warn!(source = "ASX", %date, "report contained no recognisable rows");
        }
        Ok(rows)
    }
}
