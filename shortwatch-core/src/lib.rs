//! Shortwatch Core — short-selling disclosure signals for ASX-listed securities.
//!
//! This crate holds everything that turns a raw disclosure snapshot into
//! scored, comparable rows:
//! - Domain types (raw snapshots, scored gross and position rows)
//! - Numeric normalizer (lenient parsing, percent unit detection)
//! - Gross-shorts and position signal engines
//! - Days-to-cover augmentation and the static sector map
//! - Alert configuration
//! - Report sources (ASIC, ASX, Cboe) and the ADV provider

pub mod config;
pub mod data;
pub mod days_to_cover;
pub mod domain;
pub mod normalize;
pub mod sectors;
pub mod signals;

pub use config::{AlertConfig, ConfigError};
pub use days_to_cover::apply_days_to_cover;
pub use domain::{GrossRow, PositionRow, ScoredGross, ScoredPosition};
pub use sectors::SectorMap;
pub use signals::{compute_gross_signals, compute_position_signals};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: engine inputs, outputs and sources can cross threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<GrossRow>();
        require_sync::<GrossRow>();
        require_send::<PositionRow>();
        require_sync::<PositionRow>();
        require_send::<ScoredGross>();
        require_sync::<ScoredGross>();
        require_send::<ScoredPosition>();
        require_sync::<ScoredPosition>();
        require_send::<AlertConfig>();
        require_sync::<AlertConfig>();
        require_send::<SectorMap>();
        require_sync::<SectorMap>();

        require_send::<data::HttpFetcher>();
        require_sync::<data::HttpFetcher>();
        require_send::<data::CircuitBreaker>();
        require_sync::<data::CircuitBreaker>();
        require_send::<data::YahooAdv>();
        require_sync::<data::YahooAdv>();
    }
}
