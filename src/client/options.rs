//! Per-call request options.

use std::time::Duration;

use crate::config::Config;

/// Options of a single call: `{ cache, cache_ttl, retries, timeout }`.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    /// Serve from / store into the cache (read-only calls only)
    pub cache: bool,
    /// TTL of the stored response; `None` uses the cache default
    pub cache_ttl: Option<Duration>,
    /// Attempts after the first failed one
    pub retries: u32,
    /// Bound on each single attempt
    pub timeout: Duration,
}

impl RequestOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cache: true,
            cache_ttl: None,
            retries: config.retries,
            timeout: config.timeout(),
        }
    }

    pub fn no_cache(mut self) -> Self {
        self.cache = false;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
