//! Invalidation Patterns
//!
//! Cache keys start with the resource path (see `transport::CacheKey`), so a
//! resource family can be dropped by path prefix, by its first path segment,
//! or by an anchored regular expression.

use regex::Regex;

use crate::error::{FetchError, Result};

/// Separator between the path, method and body parts of a cache key.
pub const KEY_SEPARATOR: char = '|';

// == Invalidation Pattern ==
/// Selects the cache keys removed by `TtlCache::invalidate`.
#[derive(Debug, Clone)]
pub enum InvalidationPattern {
    /// Every key
    All,
    /// Keys beginning with the given string
    Prefix(String),
    /// Keys whose path's first segment equals the given name
    /// (`"claims"` matches `/claims`, `/claims/12` but not `/claims-archive`)
    Family(String),
    /// Keys matching a regular expression
    Regex(Regex),
}

impl InvalidationPattern {
    /// Compiles a regular-expression pattern.
    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(InvalidationPattern::Regex)
            .map_err(|e| FetchError::Internal(format!("invalid pattern '{}': {}", pattern, e)))
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        InvalidationPattern::Prefix(prefix.into())
    }

    pub fn family(name: impl Into<String>) -> Self {
        InvalidationPattern::Family(name.into())
    }

    /// Returns true if `key` is selected by this pattern.
    pub fn matches(&self, key: &str) -> bool {
        match self {
            InvalidationPattern::All => true,
            InvalidationPattern::Prefix(prefix) => key.starts_with(prefix.as_str()),
            InvalidationPattern::Family(name) => family_of(key) == name.trim_matches('/'),
            InvalidationPattern::Regex(re) => re.is_match(key),
        }
    }
}

/// First path segment of a key, ignoring leading slashes.
fn family_of(key: &str) -> &str {
    let path = key.split(KEY_SEPARATOR).next().unwrap_or(key);
    let path = path.trim_start_matches('/');
    let end = path.find(['/', '?']).unwrap_or(path.len());
    &path[..end]
}
