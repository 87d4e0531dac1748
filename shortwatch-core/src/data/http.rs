//! Document fetchers: blocking HTTP with retry, and a local directory mirror.
//!
//! Retry policy: up to `retries` attempts per URL, sleeping
//! `backoff * attempt` between them. 404 is final on the first answer since
//! regulator files simply do not exist yet for recent dates. 403 trips the
//! circuit breaker of that host only; every `host:port` gets its own breaker,
//! so a blocked vendor never refuses requests to the regulator.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::circuit_breaker::CircuitBreaker;
use super::provider::{SourceError, TextFetcher};
use crate::config::SourcesConfig;

/// Blocking HTTP fetcher with retry, incremental backoff and per-host circuit breakers.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
    cooldown: Duration,
    failure_threshold: u32,
    retries: u32,
    backoff: Duration,
}

/// Breaker key for a URL: `host:port`, or the whole string when it does not parse.
fn host_key(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(parsed) => match (parsed.host_str(), parsed.port_or_known_default()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            _ => url.to_string(),
        },
        Err(_) => url.to_string(),
    }
}

impl HttpFetcher {
    /// Breakers open for 15 minutes after 403 or 5 consecutive transient failures.
    pub fn new(cfg: &SourcesConfig) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36")
            .build()
            .map_err(|e| SourceError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            breakers: Mutex::new(HashMap::new()),
            cooldown: Duration::from_secs(15 * 60),
            failure_threshold: 5,
            retries: cfg.retries.max(1),
            backoff: Duration::from_secs(cfg.backoff_secs),
        })
    }

    /// The breaker guarding the host of `url`, created closed on first use.
    fn breaker(&self, url: &str) -> Arc<CircuitBreaker> {
        let key = host_key(url);
        match self.breakers.lock() {
            Ok(mut map) => Arc::clone(map.entry(key).or_insert_with(|| {
                Arc::new(CircuitBreaker::new(self.cooldown, self.failure_threshold))
            })),
            Err(_) => Arc::new(CircuitBreaker::new(self.cooldown, self.failure_threshold)),
        }
    }

    fn attempt(&self, url: &str, breaker: &CircuitBreaker) -> Result<String, SourceError> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| SourceError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(url.to_string()));
        }
        if status == reqwest::StatusCode::FORBIDDEN {
            tracing::warn!(url, host = %host_key(url), "HTTP 403, opening circuit breaker for host");
            breaker.trip();
            return Err(SourceError::CircuitOpen {
                url: url.to_string(),
            });
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        resp.text()
            .map_err(|e| SourceError::NetworkUnreachable(format!("reading body of {url}: {e}")))
    }
}

impl TextFetcher for HttpFetcher {
    fn get_text(&self, url: &str) -> Result<String, SourceError> {
        let breaker = self.breaker(url);
        let mut last_error = None;

        for attempt in 0..self.retries {
            if attempt > 0 {
                std::thread::sleep(self.backoff * attempt);
            }
            if !breaker.allow() {
                return Err(SourceError::CircuitOpen {
                    url: url.to_string(),
                });
            }

            match self.attempt(url, &breaker) {
                Ok(body) => {
                    breaker.on_success();
                    return Ok(body);
                }
                Err(e) if e.is_transient() => {
                    tracing::debug!(url, attempt, error = %e, "transient fetch failure");
                    breaker.on_failure();
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| SourceError::Other(format!("no attempts made for {url}"))))
    }
}

/// Serves previously downloaded files from a directory, by URL file name.
///
/// `https://host/path/Short_Sell_20240501.csv` → `{root}/Short_Sell_20240501.csv`.
#[derive(Debug, Clone)]
pub struct DirFetcher {
    root: PathBuf,
}

impl DirFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn local_path(&self, url: &str) -> Option<PathBuf> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let name = path.rsplit('/').next().filter(|n| !n.is_empty())?;
        Some(self.root.join(name))
    }
}

impl TextFetcher for DirFetcher {
    fn get_text(&self, url: &str) -> Result<String, SourceError> {
        let path = self
            .local_path(url)
            .ok_or_else(|| SourceError::NotFound(url.to_string()))?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SourceError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(SourceError::Other(format!("{}: {e}", path.display()))),
        }
    }
}
