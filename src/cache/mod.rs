//! Cache Module
//!
//! Provides an in-memory response cache with per-entry TTL and
//! pattern-based invalidation.

mod entry;
mod pattern;
mod stats;
mod store;


use std::time::Duration;

// Re-export public types
pub use entry::CacheEntry;
pub use pattern::{InvalidationPattern, KEY_SEPARATOR};
pub use stats::{CacheStats, EntryStats};
pub use store::TtlCache;

// == Public Constants ==
/// TTL applied to entries stored without an explicit one (5 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
