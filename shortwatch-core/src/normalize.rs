//! Numeric normalizer: coercion of noisy vendor values and percent-unit detection.
//!
//! Vendor files mix "0.0077" (fraction of issue) and "0.77" (percent) for the
//! same quantity. Units are decided once per column from the column maximum:
//! - `max <= 1` → the column is a fraction, every value is scaled by 100
//! - otherwise  → the column is already in percentage points
//!
//! A column whose true maximum is below 1 percentage point is indistinguishable
//! from a fraction column and will be scaled up. This is a known limitation of
//! the heuristic, not something the normalizer tries to repair.
//!
//! Coercion never fails: anything that is not a finite number becomes `None`,
//! and consumers read `_num` views through [`finite_or_zero`].

use serde::{Deserialize, Deserializer, Serialize};

/// Unit convention detected for a percentage column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PercentUnit {
    /// Values are a fraction of the whole (0..=1).
    Fraction,
    /// Values are already percentage points (0..=100+).
    PercentagePoints,
}

impl PercentUnit {
    /// Multiplier that converts a value in this unit to percentage points.
    pub fn scale(self) -> f64 {
        match self {
            PercentUnit::Fraction => 100.0,
            PercentUnit::PercentagePoints => 1.0,
        }
    }
}

/// Parse a raw cell into a finite number.
///
/// Strips surrounding whitespace and thousands separators (`1,234,567`).
/// Empty cells, non-numeric text and non-finite results all yield `None`.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Drop non-finite values.
pub fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Numeric view of a nullable measurement: missing or non-finite → `0.0`.
pub fn finite_or_zero(value: Option<f64>) -> f64 {
    finite(value).unwrap_or(0.0)
}

/// Detect the unit of a percentage column from its maximum finite value.
///
/// A column with no finite values is left as-is (`PercentagePoints`); there is
/// nothing to scale.
pub fn detect_unit(values: &[Option<f64>]) -> PercentUnit {
    let max = values
        .iter()
        .filter_map(|v| finite(*v))
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))));

    match max {
        Some(m) if m <= 1.0 => PercentUnit::Fraction,
        _ => PercentUnit::PercentagePoints,
    }
}

/// Convert a whole column to percentage points using a single unit decision.
pub fn to_percentage_points(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let scale = detect_unit(values).scale();
    values.iter().map(|v| finite(*v).map(|x| x * scale)).collect()
}

/// Canonical security code: trimmed, upper-case.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Cell value that may arrive as a number or as text.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

/// Serde helper for nullable numeric columns that tolerates junk.
///
/// Accepts numbers, numeric strings (with thousands separators) and empty
/// cells; anything else deserializes to `None` instead of failing the row.
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<NumberOrText>::deserialize(deserializer)?;
    Ok(match raw {
        None => None,
        Some(NumberOrText::Number(v)) => finite(Some(v)),
        Some(NumberOrText::Text(s)) => parse_numeric(&s),
    })
}

/// Like [`lenient_f64`] but for `_num` columns: missing or junk → `0.0`.
pub fn lenient_f64_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_f64(deserializer).map(finite_or_zero)
}
