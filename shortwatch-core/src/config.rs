//! Alert configuration — thresholds and knobs for a single daily run.
//!
//! Loaded once from TOML and passed by reference into every engine call.
//! Unknown keys are ignored and every missing key falls back to its default,
//! so an empty document is a valid configuration.
//!
//! ```toml
//! [gross_shorts]
//! absolute_qty_ge = 200000
//! as_percent_issued_ge = 0.10
//!
//! [short_positions]
//! pct_short_ge = 5.0
//! pct_short_change_ge = 0.50
//!
//! [covering]
//! windows = [3, 5]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading a configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub gross_shorts: GrossShortsConfig,
    pub short_positions: ShortPositionsConfig,
    pub covering: CoveringConfig,
    pub sources: SourcesConfig,
}

impl AlertConfig {
    /// Parse a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Load a configuration file, or use defaults when it does not exist.
    pub fn from_file_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }
}

/// Thresholds for gross short-sale signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrossShortsConfig {
    /// Rows shown per table.
    pub top_n: usize,
    /// `FLAG_big_qty` when gross shares >= this.
    pub absolute_qty_ge: f64,
    /// `FLAG_big_pct` when gross as percentage points of issue >= this.
    pub as_percent_issued_ge: f64,
}

impl Default for GrossShortsConfig {
    fn default() -> Self {
        Self {
            top_n: 25,
            absolute_qty_ge: 200_000.0,
            as_percent_issued_ge: 0.10,
        }
    }
}

/// Thresholds for short-position signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortPositionsConfig {
    pub top_n: usize,
    /// `FLAG_high_pct` when percent short >= this (percentage points).
    pub pct_short_ge: f64,
    /// `FLAG_delta` / `FLAG_cover_pp` magnitude (percentage points).
    pub pct_short_change_ge: f64,
    /// `FLAG_cover_shares` magnitude (shares).
    pub abs_shares_cover_ge: f64,
    /// Trailing window for average daily volume.
    pub adv_window_days: usize,
}

impl Default for ShortPositionsConfig {
    fn default() -> Self {
        Self {
            top_n: 25,
            pct_short_ge: 5.0,
            pct_short_change_ge: 0.50,
            abs_shares_cover_ge: 200_000.0,
            adv_window_days: 30,
        }
    }
}

/// Covering leaderboard settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoveringConfig {
    /// Trailing windows (in report days) to rank over.
    pub windows: Vec<usize>,
    pub top_n: usize,
}

impl Default for CoveringConfig {
    fn default() -> Self {
        Self {
            windows: vec![3, 5],
            top_n: 25,
        }
    }
}

/// Fetch behaviour of the source collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Days searched back (from T+4) for the latest position report.
    pub max_lookback_days: u32,
    pub retries: u32,
    /// Backoff before retry `n` is `backoff_secs * n`.
    pub backoff_secs: u64,
    pub timeout_secs: u64,
    /// Worker threads for volume lookups.
    pub adv_workers: usize,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            max_lookback_days: 8,
            retries: 6,
            backoff_secs: 10,
            timeout_secs: 30,
            adv_workers: 4,
        }
    }
}
