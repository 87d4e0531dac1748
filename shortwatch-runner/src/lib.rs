//! Shortwatch runner — daily orchestration on top of `shortwatch-core`.
//!
//! - Per-day history store and raw snapshot archive
//! - Covering-score leaderboards over trailing windows
//! - Top-N digest and notification text
//! - API/CSV export and the static Markdown report
//! - 30/60-day history trends for the report
//! - The sequential daily pipeline

pub mod covering;
pub mod digest;
pub mod export;
pub mod history;
pub mod pipeline;
pub mod report;
pub mod trends;

pub use covering::{covering_scores, rank_covering, CoveringScore};
pub use digest::{safe_top, Digest};
pub use export::{write_api, ApiPayload};
pub use history::{
    GrossHistoryRecord, HistoryError, HistoryRecord, HistoryStore, HistorySummary,
    PositionHistoryRecord,
};
pub use pipeline::{run_daily, RunOptions, RunSummary, Sources};
pub use report::{write_report, MarkdownReport, ReportContext};
pub use trends::{history_trends, HistoryTrends};
