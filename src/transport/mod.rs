//! Transport Module
//!
//! The network capability consumed by the client: a request description,
//! the cache key derived from it, and the `Transport` trait implemented by
//! the HTTP backend (or by test doubles).

mod http;
mod key;
mod request;

pub use http::HttpTransport;
pub use key::CacheKey;
pub use request::{Method, Request};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

// == Transport Trait ==
/// Raw network call: `(method, path, body?) -> JSON`.
///
/// Implementations report non-success responses as
/// `FetchError::Transport`. Aborting is done by dropping the returned future,
/// so implementations must not hold resources that outlive it.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, request: &Request) -> Result<Value>;
}
