//! Daily pipeline — one strictly sequential batch run.
//!
//! Steps, in order:
//! 1. gross shorts for AWST yesterday from every gross source, concatenated
//! 2. the latest short-position report, scored against the previous archived day
//! 3. sectors, then ADV and days to cover
//! 4. unmapped sector codes, raw archive, history, scored CSVs, API payload
//! 5. covering leaderboards and history trends (read after this run's history write)
//! 6. Markdown report and notification text
//!
//! Source failures degrade to an empty category; history and output I/O
//! failures abort the run.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};
use serde::Serialize;

use shortwatch_core::config::{AlertConfig, SourcesConfig};
use shortwatch_core::data::{
    AdvProvider, AsicShortPositions, AsxGrossShorts, CboeGrossShorts, DirFetcher,
    GrossShortSource, HttpFetcher, ShortPositionSource, SourceError, TextFetcher,
    YahooAdv,
};
use shortwatch_core::domain::{GrossRow, PositionRow, ScoredGross, ScoredPosition};
use shortwatch_core::{
    apply_days_to_cover, compute_gross_signals, compute_position_signals, SectorMap,
};

use crate::covering::{covering_scores, COVERING_COLUMNS};
use crate::digest::Digest;
use crate::export::{to_csv, write_api, write_atomic, write_gross_csv, write_positions_csv, ApiPayload};
use crate::history::{GrossHistoryRecord, HistoryStore, PositionHistoryRecord};
use crate::report::{write_report, CoveringBoard, ReportContext};
use crate::trends::history_trends;

/// Perth is UTC+8 all year.
pub const AWST_OFFSET_SECS: i32 = 8 * 3600;

pub fn awst() -> FixedOffset {
    FixedOffset::east_opt(AWST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

pub fn awst_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&awst())
}

// ── Collaborators ────────────────────────────────────────────────────

/// The fetch side of a run.
pub struct Sources {
    /// Tried in order; every successful batch is kept.
    pub gross: Vec<Box<dyn GrossShortSource>>,
    pub positions: Box<dyn ShortPositionSource>,
    pub adv: Option<Box<dyn AdvProvider>>,
}

impl Sources {
    /// ASX and Cboe gross shorts, ASIC positions and Yahoo volumes over HTTP.
    /// One fetcher is shared; its circuit breakers are per host.
    pub fn live(cfg: &SourcesConfig, with_adv: bool) -> Result<Self, SourceError> {
        let fetcher: Arc<dyn TextFetcher> = Arc::new(HttpFetcher::new(cfg)?);
        Ok(Self::from_fetcher(fetcher, cfg, with_adv))
    }

    /// Same sources reading saved documents from a directory.
    pub fn offline(dir: &Path, cfg: &SourcesConfig) -> Self {
        Self::from_fetcher(Arc::new(DirFetcher::new(dir)), cfg, false)
    }

    pub fn from_fetcher(fetcher: Arc<dyn TextFetcher>, cfg: &SourcesConfig, with_adv: bool) -> Self {
        let adv: Option<Box<dyn AdvProvider>> = if with_adv {
            Some(Box::new(YahooAdv::new(Arc::clone(&fetcher), cfg.adv_workers)))
        } else {
            None
        };
        Self {
            gross: vec![
                Box::new(AsxGrossShorts::new(Arc::clone(&fetcher))),
                Box::new(CboeGrossShorts::new(Arc::clone(&fetcher))),
            ],
            positions: Box::new(AsicShortPositions::new(fetcher, cfg.max_lookback_days)),
            adv,
        }
    }
}

// ── Options and summary ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub data_dir: PathBuf,
    pub docs_dir: PathBuf,
    /// AWST calendar day the run is for.
    pub as_of: NaiveDate,
    pub generated_at: DateTime<FixedOffset>,
}

impl RunOptions {
    /// A run for the current AWST day.
    pub fn new(data_dir: impl Into<PathBuf>, docs_dir: impl Into<PathBuf>) -> Self {
        let now = awst_now();
        Self {
            data_dir: data_dir.into(),
            docs_dir: docs_dir.into(),
            as_of: now.date_naive(),
            generated_at: now,
        }
    }

    pub fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = as_of;
        self
    }
}

/// What a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub gross_date: NaiveDate,
    pub positions_date: NaiveDate,
    pub prev_positions_date: Option<NaiveDate>,
    pub gross_rows: usize,
    pub position_rows: usize,
    pub unknown_sectors: usize,
    /// `(window, codes ranked)` per configured window.
    pub covering: Vec<(usize, usize)>,
    pub content_hash: String,
    pub notification: String,
}

// ── Run ──────────────────────────────────────────────────────────────

pub fn run_daily(
    cfg: &AlertConfig,
    sectors: &SectorMap,
    sources: &Sources,
    opts: &RunOptions,
) -> Result<RunSummary> {
    let store = HistoryStore::new(&opts.data_dir);
    let gross_date = opts.as_of - Duration::days(1);
    tracing::info!(as_of = %opts.as_of, %gross_date, "daily run started");

    // Gross shorts
    let gross_raw = fetch_gross(&sources.gross, gross_date);
    let mut gross = compute_gross_signals(&gross_raw, &cfg.gross_shorts);

    // Short positions
    let (positions_date, positions_raw) = match sources.positions.fetch_latest(opts.as_of) {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!(source = sources.positions.name(), error = %e, "short positions unavailable");
            (opts.as_of, Vec::new())
        }
    };
    let prev = store
        .latest_before::<PositionRow>(positions_date)
        .context("Failed to read previous position day")?;
    if let Some((date, rows)) = &prev {
        tracing::info!(prev_date = %date, rows = rows.len(), "previous position day loaded");
    }
    let mut positions = compute_position_signals(
        &positions_raw,
        prev.as_ref().map(|(_, rows)| rows.as_slice()),
        &cfg.short_positions,
    );

    // Sectors, volumes
    let mut unknown: BTreeSet<String> = sectors.attach(&mut gross);
    unknown.extend(sectors.attach(&mut positions));
    if let Some(adv) = &sources.adv {
        if !positions.is_empty() {
            let codes: Vec<String> = positions.iter().map(|r| r.code.clone()).collect();
            let volumes = adv.fetch_adv(&codes, cfg.short_positions.adv_window_days);
            tracing::info!(provider = adv.name(), codes = codes.len(), found = volumes.len(), "ADV fetched");
            apply_days_to_cover(&mut positions, &volumes);
        }
    }

    // Persist
    write_unknown_sectors(&opts.data_dir, opts.as_of, &unknown)?;
    if !gross_raw.is_empty() {
        store.write_day::<GrossRow>(gross_date, &gross_raw)?;
    }
    if !positions_raw.is_empty() {
        store.write_day::<PositionRow>(positions_date, &positions_raw)?;
    }
    write_history(&store, &gross, &positions, gross_date, positions_date)?;
    write_signal_csvs(&opts.data_dir, &gross, &positions, gross_date, positions_date)?;

    let payload = ApiPayload::new(&gross, &positions, gross_date, positions_date, opts.generated_at)?;
    write_api(&opts.docs_dir, &payload)?;

    // Covering
    let mut boards = Vec::with_capacity(cfg.covering.windows.len());
    for &window in &cfg.covering.windows {
        let mut rows = covering_scores(&store, window)?;
        let csv_path = opts
            .data_dir
            .join("signals")
            .join(format!("covering_{window}d.csv"));
        write_atomic(&csv_path, &to_csv(COVERING_COLUMNS, &rows)?)?;
        rows.truncate(cfg.covering.top_n);
        boards.push(CoveringBoard { window, rows });
    }
    let trends = history_trends(&store, opts.as_of).context("Failed to read history trends")?;

    // Report
    let digest = Digest::build(&gross, &positions, gross_date, positions_date, cfg);
    let notification = digest.notification_text();
    let ctx = ReportContext {
        generated_at: opts.generated_at,
        digest,
        covering: boards,
        trends,
        unknown_sectors: unknown.iter().cloned().collect(),
    };
    write_report(&opts.docs_dir, &ctx)?;
    write_atomic(&opts.docs_dir.join("notify.txt"), notification.as_bytes())?;

    let summary = RunSummary {
        gross_date,
        positions_date,
        prev_positions_date: prev.map(|(date, _)| date),
        gross_rows: gross.len(),
        position_rows: positions.len(),
        unknown_sectors: unknown.len(),
        covering: ctx.covering.iter().map(|b| (b.window, b.rows.len())).collect(),
        content_hash: payload.meta.content_hash,
        notification,
    };
    tracing::info!(
        gross_rows = summary.gross_rows,
        position_rows = summary.position_rows,
        %positions_date,
        "daily run finished"
    );
    Ok(summary)
}

fn fetch_gross(sources: &[Box<dyn GrossShortSource>], date: NaiveDate) -> Vec<GrossRow> {
    let mut rows = Vec::new();
    for source in sources {
        match source.fetch(date) {
            Ok(batch) => {
                tracing::info!(source = source.name(), %date, rows = batch.len(), "gross shorts fetched");
                rows.extend(batch);
            }
            Err(e) => {
                tracing::warn!(source = source.name(), %date, error = %e, "gross shorts unavailable");
            }
        }
    }
    if rows.is_empty() {
        tracing::warn!(%date, "no gross short rows, continuing");
    }
    rows
}

fn write_history(
    store: &HistoryStore,
    gross: &[ScoredGross],
    positions: &[ScoredPosition],
    gross_date: NaiveDate,
    positions_date: NaiveDate,
) -> Result<()> {
    if !gross.is_empty() {
        let records: Vec<GrossHistoryRecord> = gross.iter().map(GrossHistoryRecord::from).collect();
        store.write_day(gross_date, &records)?;
    }
    if !positions.is_empty() {
        let records: Vec<PositionHistoryRecord> =
            positions.iter().map(PositionHistoryRecord::from).collect();
        store.write_day(positions_date, &records)?;
    }
    Ok(())
}

/// Codes missing from the sector map, for `data/sectors/unknown_{date}.csv`.
fn write_unknown_sectors(data_dir: &Path, as_of: NaiveDate, unknown: &BTreeSet<String>) -> Result<()> {
    if unknown.is_empty() {
        return Ok(());
    }
    let path = data_dir.join("sectors").join(format!("unknown_{as_of}.csv"));
    let codes: Vec<&String> = unknown.iter().collect();
    write_atomic(&path, &to_csv(&["Code"], &codes)?)?;
    tracing::info!(path = %path.display(), codes = codes.len(), "unmapped sector codes written");
    Ok(())
}

fn write_signal_csvs(
    data_dir: &Path,
    gross: &[ScoredGross],
    positions: &[ScoredPosition],
    gross_date: NaiveDate,
    positions_date: NaiveDate,
) -> Result<()> {
    let dir = data_dir.join("signals");
    write_gross_csv(&dir.join("gross").join(format!("{gross_date}.csv")), gross)?;
    write_positions_csv(
        &dir.join("positions").join(format!("{positions_date}.csv")),
        positions,
    )
}
