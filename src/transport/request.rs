//! Request description passed to a `Transport`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP-like method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    /// Only reads may be served from or stored in the cache.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Method::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single logical call to the remote service.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    /// Resource path, e.g. `/claims/12`
    pub path: String,
    pub body: Option<Value>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            body,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_strings() {
        assert_eq!(Method::Get.to_string(), "GET");
        assert_eq!(Method::Delete.as_str(), "DELETE");
        assert_eq!(serde_json::to_string(&Method::Put).unwrap(), "\"PUT\"");
    }

    #[test]
    fn test_only_get_is_read_only() {
        assert!(Method::Get.is_read_only());
        assert!(!Method::Post.is_read_only());
        assert!(!Method::Put.is_read_only());
        assert!(!Method::Delete.is_read_only());
    }

    #[test]
    fn test_request_constructors() {
        let req = Request::get("/claims");
        assert_eq!(req.method, Method::Get);
        assert!(req.body.is_none());

        let req = Request::new(Method::Post, "/claims", Some(json!({"amount": 10})));
        assert_eq!(req.path, "/claims");
        assert_eq!(req.body, Some(json!({"amount": 10})));
    }
}
