//! Configuration Module
//!
//! Handles loading and managing client configuration from environment variables.

use std::env;
use std::time::Duration;

/// Client configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the remote data service
    pub base_url: String,
    /// Default TTL in seconds for cached responses without explicit TTL
    pub default_ttl: u64,
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,
    /// Number of retries after the first failed attempt
    pub retries: u32,
    /// Fixed delay between attempts in milliseconds
    pub retry_delay_ms: u64,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `FETCH_BASE_URL` - Remote service base URL (default: http://127.0.0.1:3000)
    /// - `FETCH_DEFAULT_TTL_SECS` - Default cache TTL in seconds (default: 300)
    /// - `FETCH_TIMEOUT_MS` - Per-attempt timeout (default: 10000)
    /// - `FETCH_RETRIES` - Retry budget (default: 3)
    /// - `FETCH_RETRY_DELAY_MS` - Delay between attempts (default: 1000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env::var("FETCH_BASE_URL").unwrap_or(defaults.base_url),
            default_ttl: parse_var("FETCH_DEFAULT_TTL_SECS").unwrap_or(defaults.default_ttl),
            timeout_ms: parse_var("FETCH_TIMEOUT_MS").unwrap_or(defaults.timeout_ms),
            retries: parse_var("FETCH_RETRIES").unwrap_or(defaults.retries),
            retry_delay_ms: parse_var("FETCH_RETRY_DELAY_MS").unwrap_or(defaults.retry_delay_ms),
            cleanup_interval: parse_var("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            default_ttl: 300,
            timeout_ms: 10_000,
            retries: 3,
            retry_delay_ms: 1000,
            cleanup_interval: 60,
        }
    }
}
