//! Cache Statistics Module
//!
//! Diagnostic snapshot of the cache: live keys plus hit/miss counters.
//! Never consulted for control flow.

use chrono::{DateTime, Utc};
use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics and the set of live keys.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Number of reads that found a live entry
    pub hits: u64,
    /// Number of reads that found nothing (missing or expired)
    pub misses: u64,
    /// Number of entries dropped because their TTL elapsed
    pub expirations: u64,
    /// Current number of physically stored entries
    pub total_entries: usize,
    /// Keys of the live entries at snapshot time, sorted
    pub keys: Vec<String>,
    /// Per-entry detail for the live entries, in `keys` order
    pub entries: Vec<EntryStats>,
    /// When the snapshot was taken
    pub generated_at: Option<DateTime<Utc>>,
}

/// Age and remaining lifetime of one live entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryStats {
    pub key: String,
    /// Wall-clock time the value was stored
    pub stored_at: DateTime<Utc>,
    pub ttl_remaining_ms: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }
}
