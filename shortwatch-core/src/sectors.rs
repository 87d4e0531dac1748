//! Static sector map, `Code → Sector` from a local CSV.
//!
//! The file has `Code,Sector` columns. Codes are upper-cased and vendor sector
//! names are folded onto GICS names (e.g. "Basic Materials" → "Materials").
//! Codes without an entry are labelled `"Unknown"`. No network access.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;

use crate::domain::{Sectored, UNKNOWN_SECTOR};
use crate::normalize::normalize_code;

/// Vendor sector names (lower-case) → GICS sector.
const SECTOR_ALIASES: &[(&str, &str)] = &[
    ("basic materials", "Materials"),
    ("materials", "Materials"),
    ("consumer defensive", "Consumer Staples"),
    ("consumer staples", "Consumer Staples"),
    ("consumer cyclical", "Consumer Discretionary"),
    ("consumer discretionary", "Consumer Discretionary"),
    ("communication services", "Communication Services"),
    ("communications", "Communication Services"),
    ("energy", "Energy"),
    ("financial services", "Financials"),
    ("financials", "Financials"),
    ("healthcare", "Health Care"),
    ("health care", "Health Care"),
    ("industrials", "Industrials"),
    ("technology", "Information Technology"),
    ("information technology", "Information Technology"),
    ("real estate", "Real Estate"),
    ("utilities", "Utilities"),
    ("etf", "ETF/Listed Fund"),
    ("fund", "ETF/Listed Fund"),
    ("trust", "ETF/Listed Fund"),
];

/// Fold a vendor sector name onto its GICS name; unknown names pass through trimmed.
pub fn normalize_sector(name: &str) -> String {
    let trimmed = name.trim();
    let key = trimmed.to_lowercase();
    SECTOR_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, gics)| gics.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

#[derive(Debug, Deserialize)]
struct SectorRecord {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Sector")]
    sector: String,
}

/// Code → sector lookup.
#[derive(Debug, Clone, Default)]
pub struct SectorMap {
    sectors: BTreeMap<String, String>,
}

impl SectorMap {
    /// Load a `Code,Sector` CSV. A missing file yields an empty map.
    ///
    /// Unreadable rows are skipped; blank codes or sectors are ignored.
    pub fn from_csv_file(path: &Path) -> Result<Self, csv::Error> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no sector map, all sectors Unknown");
            return Ok(Self::default());
        }
        let reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
        Ok(Self::from_reader(reader))
    }

    /// Parse a `Code,Sector` CSV document.
    pub fn from_csv_str(content: &str) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        Self::from_reader(reader)
    }

    fn from_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> Self {
        let mut sectors = BTreeMap::new();
        for record in reader.deserialize::<SectorRecord>() {
            match record {
                Ok(r) => {
                    let code = normalize_code(&r.code);
                    let sector = normalize_sector(&r.sector);
                    if !code.is_empty() && !sector.is_empty() {
                        sectors.insert(code, sector);
                    }
                }
                Err(e) => tracing::debug!(error = %e, "skipping unreadable sector row"),
            }
        }
        Self { sectors }
    }

    pub fn insert(&mut self, code: &str, sector: &str) {
        self.sectors
            .insert(normalize_code(code), normalize_sector(sector));
    }

    /// Sector for a code, `"Unknown"` when unmapped.
    pub fn sector_for(&self, code: &str) -> &str {
        self.sectors
            .get(&normalize_code(code))
            .map(String::as_str)
            .unwrap_or(UNKNOWN_SECTOR)
    }

    /// Label every row; returns the sorted set of codes with no entry.
    pub fn attach<R: Sectored>(&self, rows: &mut [R]) -> BTreeSet<String> {
        let mut unknown = BTreeSet::new();
        for row in rows.iter_mut() {
            let sector = self.sector_for(row.code()).to_string();
            if sector == UNKNOWN_SECTOR {
                unknown.insert(row.code().to_string());
            }
            row.set_sector(sector);
        }
        unknown
    }

    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }
}
