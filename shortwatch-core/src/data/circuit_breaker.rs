//! Circuit breaker for regulator and vendor endpoints.
//!
//! A host that answers HTTP 403, or fails repeatedly, is refused for a
//! cooldown period so a daily run does not keep hammering it through every
//! retry and every lookback date.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct BreakerInner {
    tripped_at: Option<Instant>,
    consecutive_failures: u32,
}

/// Circuit breaker for one host.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration, failure_threshold: u32) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                tripped_at: None,
                consecutive_failures: 0,
            }),
            cooldown,
            failure_threshold: failure_threshold.max(1),
        }
    }

    /// Whether a request may be sent now. Closes the breaker once the cooldown expired.
    pub fn allow(&self) -> bool {
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };
        match inner.tripped_at {
            None => true,
            Some(at) if at.elapsed() >= self.cooldown => {
                inner.tripped_at = None;
                inner.consecutive_failures = 0;
                true
            }
            Some(_) => false,
        }
    }

    pub fn on_success(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.consecutive_failures = 0;
        }
    }

    pub fn on_failure(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.consecutive_failures += 1;
            if inner.consecutive_failures >= self.failure_threshold {
                inner.tripped_at = Some(Instant::now());
            }
        }
    }

    /// Open immediately (403 / blocked).
    pub fn trip(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.tripped_at = Some(Instant::now());
        }
    }
}
