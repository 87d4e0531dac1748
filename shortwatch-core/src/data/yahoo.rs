//! Average daily volume from Yahoo Finance.
//!
//! Uses the v8 chart API for `{CODE}.AX` over the last six months of daily
//! bars. ADV is the mean of the most recent `window_days` non-missing volumes.
//!
//! Yahoo has no official API and changes format without notice. Any failure
//! for a code simply leaves it out of the result, which downstream means
//! `ADV = 0` and `DaysToCover = 0`.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Deserialize;

use super::provider::{AdvProvider, SourceError, TextFetcher};

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Yahoo ticker for an ASX code.
pub fn yahoo_symbol(code: &str) -> String {
    format!("{}.AX", code.trim().to_uppercase())
}

pub fn chart_url(symbol: &str) -> String {
    format!("https://query2.finance.yahoo.com/v8/finance/chart/{symbol}?range=6mo&interval=1d")
}

/// Daily volumes from a chart response, oldest first, missing days dropped.
pub fn parse_volumes(body: &str) -> Result<Vec<f64>, SourceError> {
    let resp: ChartResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::SchemaChanged(format!("chart response: {e}")))?;

    let result = match (resp.chart.result, resp.chart.error) {
        (Some(result), _) => result,
        (None, Some(err)) if err.code == "Not Found" => {
            return Err(SourceError::NotFound(err.description))
        }
        (None, Some(err)) => {
            return Err(SourceError::SchemaChanged(format!(
                "{}: {}",
                err.code, err.description
            )))
        }
        (None, None) => {
            return Err(SourceError::SchemaChanged("empty result with no error".into()))
        }
    };

    let volumes = result
        .into_iter()
        .next()
        .and_then(|data| data.indicators.quote.into_iter().next())
        .map(|quote| quote.volume)
        .unwrap_or_default();

    Ok(volumes
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .collect())
}

/// Mean of the last `window` volumes; `None` when there are none.
pub fn average_volume(volumes: &[f64], window: usize) -> Option<f64> {
    let start = volumes.len().saturating_sub(window.max(1));
    let tail = &volumes[start..];
    if tail.is_empty() {
        return None;
    }
    Some(tail.iter().sum::<f64>() / tail.len() as f64)
}

/// ADV provider backed by the Yahoo chart API.
pub struct YahooAdv {
    fetcher: Arc<dyn TextFetcher>,
    workers: usize,
}

impl YahooAdv {
    pub fn new(fetcher: Arc<dyn TextFetcher>, workers: usize) -> Self {
        Self {
            fetcher,
            workers: workers.max(1),
        }
    }

    fn adv_for(&self, code: &str, window_days: usize) -> Option<f64> {
        let url = chart_url(&yahoo_symbol(code));
        let volumes = match self.fetcher.get_text(&url).and_then(|body| parse_volumes(&body)) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(code, error = %e, "no volume history");
                return None;
            }
        };
        average_volume(&volumes, window_days)
    }
}

impl AdvProvider for YahooAdv {
    fn name(&self) -> &str {
        "Yahoo"
    }

    fn fetch_adv(&self, codes: &[String], window_days: usize) -> HashMap<String, f64> {
        let unique: Vec<String> = codes
            .iter()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let lookup = || -> HashMap<String, f64> {
            unique
                .par_iter()
                .filter_map(|code| self.adv_for(code, window_days).map(|adv| (code.clone(), adv)))
                .collect()
        };

        let adv = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
        {
            Ok(pool) => pool.install(lookup),
            Err(e) => {
                tracing::warn!(error = %e, "could not build ADV worker pool, using global pool");
                lookup()
            }
        };

        tracing::info!(requested = unique.len(), resolved = adv.len(), "ADV lookups finished");
        adv
    }
}
