//! Disclosure sources and volume data.
//!
//! - `provider`: source traits, `SourceError`, in-memory fetcher
//! - `http`: retrying HTTP fetcher and offline directory fetcher
//! - `circuit_breaker`: shared breaker for blocked or failing hosts
//! - `asic`, `asx`, `cboe`: report parsers and sources
//! - `yahoo`: average daily volume provider

pub mod asic;
pub mod asx;
pub mod cboe;
pub mod circuit_breaker;
pub mod http;
pub mod provider;
pub mod yahoo;

pub use asic::AsicShortPositions;
pub use asx::AsxGrossShorts;
pub use cboe::CboeGrossShorts;
pub use circuit_breaker::CircuitBreaker;
pub use http::{DirFetcher, HttpFetcher};
pub use provider::{
    AdvProvider, GrossShortSource, MemoryFetcher, ShortPositionSource, SourceError, TextFetcher,
};
pub use yahoo::YahooAdv;
