//! Per-category signal engines.
//!
//! Both engines take a raw snapshot and a threshold config, and return scored
//! rows in their ranking order. Neither ever fails: malformed or empty input
//! produces an empty `Vec` of the same row type.

pub mod gross;
pub mod position;

pub use gross::compute_gross_signals;
pub use position::compute_position_signals;
