//! Cache Store Module
//!
//! Key/value store with per-entry expiry and lazy eviction on read.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::cache::{CacheEntry, CacheStats, EntryStats, InvalidationPattern, DEFAULT_TTL};

// == TTL Cache ==
/// Explicitly constructed TTL cache.
///
/// Each client (or test) owns its own instance; there is no process-wide
/// cache. Share it with `Arc<RwLock<TtlCache<V>>>` when several owners need it.
#[derive(Debug)]
pub struct TtlCache<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Hit/miss counters
    stats: CacheStats,
    /// TTL applied when `set` is given none
    default_ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    // == Constructor ==
    /// Creates an empty cache with the given default TTL.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    // == Set ==
    /// Stores a value stamped with the current time.
    ///
    /// Overwrites any prior entry for `key`, which also resets its timestamp.
    pub fn set(&mut self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        self.entries.insert(key.into(), CacheEntry::new(value, ttl));
    }

    // == Get ==
    /// Returns the value if present and not expired.
    ///
    /// An expired entry is removed as a side effect. Absence is a normal
    /// outcome, not an error.
    pub fn get(&mut self, key: &str) -> Option<V> {
        match self.entries.get(key) {
            Some(entry) if entry.is_expired() => {
                self.entries.remove(key);
                self.stats.record_expirations(1);
                self.stats.record_miss();
                debug!(key, "cache entry expired");
                None
            }
            Some(entry) => {
                let value = entry.value.clone();
                self.stats.record_hit();
                Some(value)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Remove ==
    /// Removes a single entry, returning its value whether or not it was live.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.entries.remove(key).map(|entry| entry.value)
    }

    // == Clear ==
    /// Removes all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    // == Invalidate ==
    /// Removes every key matched by `pattern`, returning how many were removed.
    pub fn invalidate(&mut self, pattern: &InvalidationPattern) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !pattern.matches(key));
        let removed = before - self.entries.len();
        debug!(?pattern, removed, "cache invalidated");
        removed
    }

    // == Purge Expired ==
    /// Removes all expired entries, returning the number removed.
    pub fn purge_expired(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        let removed = before - self.entries.len();
        self.stats.record_expirations(removed);
        removed
    }

    // == Stats ==
    /// Returns a diagnostic snapshot with the sorted set of live keys.
    pub fn stats(&self) -> CacheStats {
        let mut entries: Vec<EntryStats> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired())
            .map(|(key, entry)| EntryStats {
                key: key.clone(),
                stored_at: entry.stored_at_utc,
                ttl_remaining_ms: entry.ttl_remaining().as_millis() as u64,
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));

        let mut stats = self.stats.clone();
        stats.total_entries = self.entries.len();
        stats.keys = entries.iter().map(|entry| entry.key.clone()).collect();
        stats.entries = entries;
        stats.generated_at = Some(chrono::Utc::now());
        stats
    }

    /// Number of physically stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
