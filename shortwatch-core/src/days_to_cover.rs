//! Days-to-cover augmentation.
//!
//! `DaysToCover = ShortedShares / ADV`, where ADV is the average daily traded
//! volume supplied by an external provider. Codes missing from the mapping,
//! and non-positive or non-finite volumes, count as `ADV = 0`, in which case
//! `DaysToCover = 0` rather than infinity.

use std::collections::HashMap;

use crate::domain::ScoredPosition;
use crate::normalize::{finite, finite_or_zero};

/// Attach `ADV` and `DaysToCover` to every scored position row.
pub fn apply_days_to_cover(rows: &mut [ScoredPosition], adv: &HashMap<String, f64>) {
    for row in rows.iter_mut() {
        let volume = adv
            .get(&row.code)
            .copied()
            .and_then(|v| finite(Some(v)))
            .filter(|v| *v > 0.0)
            .unwrap_or(0.0);

        row.adv = volume;
        row.days_to_cover = days_to_cover(row.shorted_shares, volume);
    }
}

/// Covering time in days; zero whenever the division is undefined.
pub fn days_to_cover(shorted_shares: Option<f64>, adv: f64) -> f64 {
    if adv.is_nan() || adv <= 0.0 {
        return 0.0;
    }
    finite_or_zero(shorted_shares.map(|s| s / adv))
}
