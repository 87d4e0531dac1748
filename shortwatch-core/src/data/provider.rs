//! Source traits and structured error types.
//!
//! Fetching is split in two layers:
//! - [`TextFetcher`] turns a URL into a document (HTTP, local directory, memory)
//! - source types parse that document into raw snapshot rows
//!
//! The pipeline only sees the source traits, so a failing fetch is always a
//! [`SourceError`] it can log and replace with an empty snapshot.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{GrossRow, PositionRow};

/// Structured error types for source operations.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("HTTP {status} for {url}")]
    Http { status: u16, url: String },

    #[error("rate limited by {url}")]
    RateLimited { url: String },

    #[error("circuit breaker open, refusing request to {url}")]
    CircuitOpen { url: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("report format changed: {0}")]
    SchemaChanged(String),

    #[error("no report found within {days} days before {as_of}")]
    NoReportInWindow { as_of: NaiveDate, days: u32 },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("source error: {0}")]
    Other(String),
}

impl SourceError {
    /// Whether another attempt at the same URL could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SourceError::NetworkUnreachable(_)
                | SourceError::RateLimited { .. }
                | SourceError::Http { .. }
        )
    }
}

/// Retrieves a text document by URL.
pub trait TextFetcher: Send + Sync {
    fn get_text(&self, url: &str) -> Result<String, SourceError>;
}

/// Producer of gross short-sale snapshots for a trading date.
pub trait GrossShortSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    fn fetch(&self, date: NaiveDate) -> Result<Vec<GrossRow>, SourceError>;
}

/// Producer of the latest short-position snapshot available on a date.
pub trait ShortPositionSource: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the report date together with its rows.
    fn fetch_latest(&self, as_of: NaiveDate) -> Result<(NaiveDate, Vec<PositionRow>), SourceError>;
}

/// Producer of average daily traded volume per code.
///
/// Codes that cannot be resolved are absent from the returned map.
pub trait AdvProvider: Send + Sync {
    fn name(&self) -> &str;

    fn fetch_adv(&self, codes: &[String], window_days: usize) -> HashMap<String, f64>;
}

/// Fetcher serving fixed documents from memory; records every request.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    documents: HashMap<String, String>,
    requests: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.documents.insert(url.into(), body.into());
        self
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl TextFetcher for MemoryFetcher {
    fn get_text(&self, url: &str) -> Result<String, SourceError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        self.documents
            .get(url)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(url.to_string()))
    }
}
