//! Client Module
//!
//! Request coalescing, read-through caching, timeouts and retries around a
//! `Transport`.
//!
//! # Call sequence
//! 1. Derive the `CacheKey` of the request
//! 2. Cacheable calls (GET with `cache` enabled) return a live cached value
//! 3. A call already in flight for the key is joined instead of repeated
//! 4. Otherwise a new call is registered and run on its own task, each
//!    attempt raced against `timeout`
//! 5. Retryable failures wait for the backoff delay and try again
//! 6. Successful cacheable results are stored with `cache_ttl`
//! 7. The in-flight slot is released on every exit path

mod backoff;
mod inflight;
mod options;

pub use backoff::{Backoff, ExponentialBackoff, FixedBackoff};
pub use options::RequestOptions;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cache::{CacheStats, InvalidationPattern, TtlCache};
use crate::cancel::{CancellationToken, Outcome};
use crate::config::Config;
use crate::error::{FetchError, Result};
use crate::transport::{CacheKey, Method, Request, Transport};
use inflight::{settled, CallHandle, InFlightRegistry, Registration};

/// Cache shared between a client and its background cleanup task.
pub type SharedCache = Arc<RwLock<TtlCache<Value>>>;

// == Fetch Client ==
/// Cheaply cloneable handle; clones share cache and in-flight registry.
#[derive(Clone)]
pub struct FetchClient {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    cache: SharedCache,
    in_flight: InFlightRegistry,
    backoff: Arc<dyn Backoff>,
    defaults: RequestOptions,
}

/// Releases the in-flight slot when the call task ends without settling
/// (panic or abort).
struct SlotGuard {
    inner: Arc<Inner>,
    key: CacheKey,
    id: u64,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.inner.in_flight.release(&self.key, self.id);
    }
}

impl FetchClient {
    // == Constructors ==
    /// Creates a client with its own cache, default options and a fixed
    /// one-second retry delay.
    pub fn new(transport: impl Transport) -> Self {
        Self::builder(transport).build()
    }

    /// Creates a client configured from `Config`.
    pub fn from_config(transport: impl Transport, config: &Config) -> Self {
        Self::builder(transport)
            .cache(Arc::new(RwLock::new(TtlCache::new(config.default_ttl()))))
            .backoff(FixedBackoff(config.retry_delay()))
            .default_options(RequestOptions::from_config(config))
            .build()
    }

    pub fn builder(transport: impl Transport) -> FetchClientBuilder {
        FetchClientBuilder {
            transport: Arc::new(transport),
            cache: None,
            backoff: Arc::new(FixedBackoff::default()),
            defaults: RequestOptions::default(),
        }
    }

    /// Options applied by the verb helpers.
    pub fn default_options(&self) -> RequestOptions {
        self.inner.defaults.clone()
    }

    pub fn cache(&self) -> SharedCache {
        Arc::clone(&self.inner.cache)
    }

    // == Verb Helpers ==
    pub async fn get(&self, path: &str) -> Result<Value> {
        self.send(Request::get(path), self.default_options()).await
    }

    pub async fn get_with(&self, path: &str, options: RequestOptions) -> Result<Value> {
        self.send(Request::get(path), options).await
    }

    /// GET decoded into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self.get(path).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<Value> {
        self.send(Request::new(Method::Post, path, Some(body)), self.default_options())
            .await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<Value> {
        self.send(Request::new(Method::Put, path, Some(body)), self.default_options())
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<Value> {
        self.send(Request::new(Method::Delete, path, None), self.default_options())
            .await
    }

    // == Send ==
    /// Runs a request to completion.
    pub async fn send(&self, request: Request, options: RequestOptions) -> Result<Value> {
        let token = CancellationToken::new();
        match self.send_cancellable(request, options, &token).await? {
            Outcome::Completed(value) => Ok(value),
            Outcome::Cancelled => Err(FetchError::Internal(
                "request cancelled without a cancel signal".to_string(),
            )),
        }
    }

    /// Runs a request until it settles or `token` is cancelled.
    ///
    /// A cancelled caller detaches from the shared call. The call itself is
    /// aborted only once no caller remains attached to it.
    pub async fn send_cancellable(
        &self,
        request: Request,
        options: RequestOptions,
        token: &CancellationToken,
    ) -> Result<Outcome<Value>> {
        if token.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }

        let key = CacheKey::from_request(&request);
        let cacheable = options.cache && request.method.is_read_only();

        if cacheable {
            if let Some(value) = self.inner.cache.write().await.get(key.as_str()) {
                debug!(%key, "cache hit");
                return Ok(Outcome::Completed(value));
            }
        }

        let Registration { id, rx, call } = self.inner.in_flight.register(&key);
        if let Some(call) = call {
            tokio::spawn(run_call(
                Arc::clone(&self.inner),
                request,
                options,
                key.clone(),
                cacheable,
                call,
            ));
        }

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = settled(rx) => Some(result),
        };

        match result {
            Some(result) => result.map(Outcome::Completed),
            None => {
                self.inner.in_flight.detach(&key, id);
                debug!(%key, "caller cancelled");
                Ok(Outcome::Cancelled)
            }
        }
    }

    // == Cache Management ==
    /// Drops cached responses selected by `pattern`; returns how many.
    pub async fn invalidate_cache(&self, pattern: &InvalidationPattern) -> usize {
        self.inner.cache.write().await.invalidate(pattern)
    }

    pub async fn clear_cache(&self) {
        self.inner.cache.write().await.clear();
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.inner.cache.read().await.stats()
    }

    /// Number of calls currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.len()
    }
}

// == Builder ==
pub struct FetchClientBuilder {
    transport: Arc<dyn Transport>,
    cache: Option<SharedCache>,
    backoff: Arc<dyn Backoff>,
    defaults: RequestOptions,
}

impl FetchClientBuilder {
    /// Uses an existing cache instead of a fresh one.
    pub fn cache(mut self, cache: SharedCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn backoff(mut self, backoff: impl Backoff) -> Self {
        self.backoff = Arc::new(backoff);
        self
    }

    pub fn default_options(mut self, options: RequestOptions) -> Self {
        self.defaults = options;
        self
    }

    pub fn build(self) -> FetchClient {
        FetchClient {
            inner: Arc::new(Inner {
                transport: self.transport,
                cache: self
                    .cache
                    .unwrap_or_else(|| Arc::new(RwLock::new(TtlCache::default()))),
                in_flight: InFlightRegistry::default(),
                backoff: self.backoff,
                defaults: self.defaults,
            }),
        }
    }
}

// == Call Task ==
/// Executes one registered call and publishes its outcome to every
/// attached caller.
async fn run_call(
    inner: Arc<Inner>,
    request: Request,
    options: RequestOptions,
    key: CacheKey,
    cacheable: bool,
    call: CallHandle,
) {
    let _slot = SlotGuard {
        inner: Arc::clone(&inner),
        key: key.clone(),
        id: call.id,
    };

    match execute(&inner, &request, &options, &call.abort).await {
        Ok(Outcome::Completed(value)) => {
            if cacheable {
                inner
                    .cache
                    .write()
                    .await
                    .set(key.as_str(), value.clone(), options.cache_ttl);
            }
            inner.in_flight.complete(&key, &call, Ok(value));
        }
        Ok(Outcome::Cancelled) => {
            debug!(%key, "call aborted, no caller attached");
        }
        Err(err) => {
            warn!(%key, error = %err, "request failed");
            inner.in_flight.complete(&key, &call, Err(err));
        }
    }
}

/// Bounded retry loop: each attempt races `options.timeout`; retryable
/// failures wait for the backoff delay while budget remains.
async fn execute(
    inner: &Inner,
    request: &Request,
    options: &RequestOptions,
    abort: &CancellationToken,
) -> Result<Outcome<Value>> {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let result = tokio::select! {
            biased;
            _ = abort.cancelled() => return Ok(Outcome::Cancelled),
            result = tokio::time::timeout(options.timeout, inner.transport.send(request)) => {
                result.unwrap_or(Err(FetchError::Timeout(options.timeout)))
            }
        };

        let err = match result {
            Ok(value) => return Ok(Outcome::Completed(value)),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => err,
        };

        if attempt > options.retries {
            return Err(FetchError::RetryExhausted {
                attempts: attempt,
                last: Box::new(err),
            });
        }

        let delay = inner.backoff.delay(attempt);
        debug!(
            method = %request.method,
            path = %request.path,
            attempt,
            ?delay,
            error = %err,
            "attempt failed, retrying"
        );
        tokio::select! {
            biased;
            _ = abort.cancelled() => return Ok(Outcome::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests;
