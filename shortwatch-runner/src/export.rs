//! Read-only exports for external consumers.
//!
//! - `api/latest.json` and `api/daily/{gross_date}.json` under the docs dir
//! - scored snapshots as CSV with the full fixed column schema
//!
//! The API payload carries a BLAKE3 hash of its records so consumers can
//! skip unchanged days.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use shortwatch_core::domain::{
    ScoredGross, ScoredPosition, GROSS_SIGNAL_COLUMNS, POSITION_SIGNAL_COLUMNS,
};

// ── API payload ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiGrossRecord {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Sector")]
    pub sector: String,
    #[serde(rename = "Gross_num")]
    pub gross_num: f64,
    #[serde(rename = "PctGrossVsIssuedPct_num")]
    pub pct_gross_vs_issued_pct_num: f64,
    #[serde(rename = "Date")]
    pub date: NaiveDate,
}

impl From<&ScoredGross> for ApiGrossRecord {
    fn from(r: &ScoredGross) -> Self {
        Self {
            code: r.code.clone(),
            sector: r.sector.clone(),
            gross_num: r.gross_num,
            pct_gross_vs_issued_pct_num: r.pct_gross_vs_issued_pct_num,
            date: r.date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiPositionRecord {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Sector")]
    pub sector: String,
    #[serde(rename = "PctShort_pp_num")]
    pub pct_short_pp_num: f64,
    #[serde(rename = "Delta_pp_num")]
    pub delta_pp_num: f64,
    #[serde(rename = "DeltaShares_num")]
    pub delta_shares_num: f64,
    #[serde(rename = "DaysToCover")]
    pub days_to_cover: f64,
    #[serde(rename = "ADV")]
    pub adv: f64,
    #[serde(rename = "Date")]
    pub date: NaiveDate,
}

impl From<&ScoredPosition> for ApiPositionRecord {
    fn from(r: &ScoredPosition) -> Self {
        Self {
            code: r.code.clone(),
            sector: r.sector.clone(),
            pct_short_pp_num: r.pct_short_pp_num,
            delta_pp_num: r.delta_pp_num,
            delta_shares_num: r.delta_shares_num,
            days_to_cover: r.days_to_cover,
            adv: r.adv,
            date: r.date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiMeta {
    pub gross_date: NaiveDate,
    pub positions_date: NaiveDate,
    pub generated_at: DateTime<FixedOffset>,
    /// BLAKE3 of the serialized `gross` and `positions` arrays, hex.
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiPayload {
    pub meta: ApiMeta,
    pub gross: Vec<ApiGrossRecord>,
    pub positions: Vec<ApiPositionRecord>,
}

impl ApiPayload {
    pub fn new(
        gross: &[ScoredGross],
        positions: &[ScoredPosition],
        gross_date: NaiveDate,
        positions_date: NaiveDate,
        generated_at: DateTime<FixedOffset>,
    ) -> Result<Self> {
        let gross: Vec<ApiGrossRecord> = gross.iter().map(ApiGrossRecord::from).collect();
        let positions: Vec<ApiPositionRecord> =
            positions.iter().map(ApiPositionRecord::from).collect();
        let content_hash = content_hash(&gross, &positions)?;

        Ok(Self {
            meta: ApiMeta {
                gross_date,
                positions_date,
                generated_at,
                content_hash,
            },
            gross,
            positions,
        })
    }
}

/// Hash of the record arrays only; independent of generation time.
pub fn content_hash(gross: &[ApiGrossRecord], positions: &[ApiPositionRecord]) -> Result<String> {
    let bytes = serde_json::to_vec(&(gross, positions)).context("Failed to serialize API records")?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// Paths written by [`write_api`].
#[derive(Debug, Clone)]
pub struct ApiPaths {
    pub latest: PathBuf,
    pub daily: PathBuf,
}

/// Write `latest.json` and the dated copy under `{docs_dir}/api`.
pub fn write_api(docs_dir: &Path, payload: &ApiPayload) -> Result<ApiPaths> {
    let json = serde_json::to_vec_pretty(payload).context("Failed to serialize API payload")?;

    let latest = docs_dir.join("api").join("latest.json");
    let daily = docs_dir
        .join("api")
        .join("daily")
        .join(format!("{}.json", payload.meta.gross_date));

    write_atomic(&latest, &json)?;
    write_atomic(&daily, &json)?;
    Ok(ApiPaths { latest, daily })
}

// ── Scored snapshot CSV ──────────────────────────────────────────────

/// Serialize rows under an explicit header, so an empty snapshot still
/// carries every column.
pub fn to_csv<R: Serialize>(columns: &[&str], rows: &[R]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(vec![]);
    writer.write_record(columns)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV buffer: {e}"))
}

pub fn write_gross_csv(path: &Path, rows: &[ScoredGross]) -> Result<()> {
    write_atomic(path, &to_csv(GROSS_SIGNAL_COLUMNS, rows)?)
}

pub fn write_positions_csv(path: &Path, rows: &[ScoredPosition]) -> Result<()> {
    write_atomic(path, &to_csv(POSITION_SIGNAL_COLUMNS, rows)?)
}

/// Write via a sibling `.tmp` file and rename into place.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, bytes).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move {} into place", path.display()))?;
    Ok(())
}
