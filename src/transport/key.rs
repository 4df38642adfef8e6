//! Cache key derivation.

use std::fmt;

use crate::cache::KEY_SEPARATOR;
use crate::transport::Request;

// == Cache Key ==
/// Deterministic key of a request, laid out `"{path}|{METHOD}|{body}"`.
///
/// The path comes first so invalidation patterns can select a resource
/// family by prefix. The body is the compact JSON serialization; identical
/// values serialize identically, so equal requests always share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn from_request(request: &Request) -> Self {
        let body = request
            .body
            .as_ref()
            .map(|body| body.to_string())
            .unwrap_or_default();
        Self(format!(
            "{}{sep}{}{sep}{}",
            request.path,
            request.method,
            body,
            sep = KEY_SEPARATOR
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Request> for CacheKey {
    fn from(request: &Request) -> Self {
        Self::from_request(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Method;
    use serde_json::json;

    #[test]
    fn test_key_layout() {
        let key = CacheKey::from_request(&Request::get("/claims/1"));
        assert_eq!(key.as_str(), "/claims/1|GET|");

        let key = CacheKey::from_request(&Request::new(
            Method::Post,
            "/claims",
            Some(json!({"a": 1})),
        ));
        assert_eq!(key.to_string(), r#"/claims|POST|{"a":1}"#);
    }

    #[test]
    fn test_identical_requests_share_key() {
        let a = Request::new(Method::Put, "/x", Some(json!({"b": [1, 2], "a": "s"})));
        let b = Request::new(Method::Put, "/x", Some(json!({"a": "s", "b": [1, 2]})));
        assert_eq!(CacheKey::from(&a), CacheKey::from(&b));
    }

    #[test]
    fn test_distinct_requests_differ() {
        let get = CacheKey::from(&Request::get("/x"));
        let delete = CacheKey::from(&Request::new(Method::Delete, "/x", None));
        let other = CacheKey::from(&Request::get("/y"));
        let with_body = CacheKey::from(&Request::new(Method::Get, "/x", Some(json!(1))));

        assert_ne!(get, delete);
        assert_ne!(get, other);
        assert_ne!(get, with_body);
    }
}
