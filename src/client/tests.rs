use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;

use super::*;

// == Test Transport ==
/// Counts calls, waits `delay`, then replays scripted responses
/// (falling back to `fallback` once the script runs out).
#[derive(Clone)]
struct ScriptedTransport {
    calls: Arc<AtomicU32>,
    delay: Duration,
    script: Arc<Mutex<VecDeque<Result<Value>>>>,
    fallback: Result<Value>,
}

impl ScriptedTransport {
    fn ok(value: Value) -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
            delay: Duration::from_millis(100),
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Ok(value),
        }
    }

    fn failing(err: FetchError) -> Self {
        Self {
            fallback: Err(err),
            ..Self::ok(Value::Null)
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn then(self, response: Result<Value>) -> Self {
        self.script.lock().unwrap().push_back(response);
        self
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &Request) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if request.path == "/panic" {
            panic!("transport blew up");
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

fn unavailable() -> FetchError {
    FetchError::Transport {
        status: 503,
        message: "unavailable".to_string(),
    }
}

// == Coalescing ==

#[tokio::test(start_paused = true)]
async fn test_concurrent_identical_calls_coalesce() {
    let transport = ScriptedTransport::ok(json!({"id": 1}));
    let client = FetchClient::new(transport.clone());

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.get("/x").await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap(), Ok(json!({"id": 1})));
    }

    assert_eq!(transport.calls(), 1);
    assert_eq!(client.in_flight_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_coalesced_callers_share_failure() {
    let transport = ScriptedTransport::failing(unavailable());
    let client = FetchClient::new(transport.clone());
    let options = client.default_options().with_retries(0);

    let (a, b, c) = tokio::join!(
        client.get_with("/x", options.clone()),
        client.get_with("/x", options.clone()),
        client.get_with("/x", options),
    );

    assert_eq!(transport.calls(), 1);
    assert!(a.is_err());
    assert_eq!(a, b);
    assert_eq!(b, c);
    assert_eq!(a.unwrap_err().status(), Some(503));
    assert!(client.cache_stats().await.keys.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_distinct_keys_do_not_coalesce() {
    let transport = ScriptedTransport::ok(json!(true));
    let client = FetchClient::new(transport.clone());

    let (a, b) = tokio::join!(client.get("/a"), client.get("/b"));

    assert!(a.is_ok() && b.is_ok());
    assert_eq!(transport.calls(), 2);
}

// == Caching ==

#[tokio::test(start_paused = true)]
async fn test_cached_read_skips_network() {
    let transport = ScriptedTransport::ok(json!([1, 2, 3]));
    let client = FetchClient::new(transport.clone());

    client.get("/claims").await.unwrap();
    let value = client.get("/claims").await.unwrap();

    assert_eq!(value, json!([1, 2, 3]));
    assert_eq!(transport.calls(), 1);
    assert_eq!(client.cache_stats().await.keys, vec!["/claims|GET|".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_cache_disabled_always_calls() {
    let transport = ScriptedTransport::ok(json!(1));
    let client = FetchClient::new(transport.clone());
    let options = client.default_options().no_cache();

    client.get_with("/x", options.clone()).await.unwrap();
    client.get_with("/x", options).await.unwrap();

    assert_eq!(transport.calls(), 2);
    assert_eq!(client.cache_stats().await.total_entries, 0);
}

#[tokio::test(start_paused = true)]
async fn test_mutations_are_never_cached() {
    let transport = ScriptedTransport::ok(json!({"ok": true}));
    let client = FetchClient::new(transport.clone());

    client.post("/claims", json!({"amount": 5})).await.unwrap();
    client.post("/claims", json!({"amount": 5})).await.unwrap();
    client.put("/claims/1", json!({"amount": 6})).await.unwrap();
    client.delete("/claims/1").await.unwrap();

    assert_eq!(transport.calls(), 4);
    assert_eq!(client.cache_stats().await.total_entries, 0);
}

#[tokio::test(start_paused = true)]
async fn test_cache_ttl_option_expires_entry() {
    let transport = ScriptedTransport::ok(json!(1));
    let client = FetchClient::new(transport.clone());
    let options = client
        .default_options()
        .with_cache_ttl(Duration::from_millis(100));

    client.get_with("/x", options.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    client.get_with("/x", options).await.unwrap();

    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_invalidate_and_clear_cache() {
    let transport = ScriptedTransport::ok(json!(1));
    let client = FetchClient::new(transport.clone());

    client.get("/claims/1").await.unwrap();
    client.get("/claims/2").await.unwrap();
    client.get("/benefits").await.unwrap();

    let removed = client
        .invalidate_cache(&InvalidationPattern::family("claims"))
        .await;
    assert_eq!(removed, 2);
    assert_eq!(client.cache_stats().await.keys, vec!["/benefits|GET|".to_string()]);

    client.get("/claims/1").await.unwrap();
    assert_eq!(transport.calls(), 4);

    client.clear_cache().await;
    assert_eq!(client.cache_stats().await.total_entries, 0);
}

#[tokio::test(start_paused = true)]
async fn test_get_json_decodes() {
    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Plan {
        name: String,
    }

    let transport = ScriptedTransport::ok(json!({"name": "gold"}));
    let client = FetchClient::new(transport);

    let plan: Plan = client.get_json("/plans/1").await.unwrap();
    assert_eq!(plan, Plan { name: "gold".to_string() });

    let err = client.get_json::<Vec<u32>>("/plans/1").await.unwrap_err();
    assert!(matches!(err, FetchError::Decode(_)));
}

// == Retries and Timeouts ==

#[tokio::test(start_paused = true)]
async fn test_retry_budget_bounds_attempts() {
    let transport = ScriptedTransport::failing(unavailable());
    let client = FetchClient::new(transport.clone());

    let err = client
        .get_with("/x", client.default_options().with_retries(2))
        .await
        .unwrap_err();

    assert_eq!(transport.calls(), 3);
    match err {
        FetchError::RetryExhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert_eq!(*last, unavailable());
        }
        other => panic!("expected RetryExhausted, got {:?}", other),
    }
    assert_eq!(client.in_flight_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retry_recovers_after_fixed_delay() {
    let transport = ScriptedTransport::ok(json!("fresh")).then(Err(unavailable()));
    let client = FetchClient::new(transport.clone());

    let start = Instant::now();
    let value = client.get("/x").await.unwrap();

    assert_eq!(value, json!("fresh"));
    assert_eq!(transport.calls(), 2);
    // two 100ms attempts around the one-second fixed delay
    assert_eq!(start.elapsed(), Duration::from_millis(1200));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_counts_as_failure() {
    let transport = ScriptedTransport::ok(json!(1)).with_delay(Duration::from_secs(5));
    let client = FetchClient::new(transport.clone());
    let options = client
        .default_options()
        .with_timeout(Duration::from_millis(100))
        .with_retries(1);

    let err = client.get_with("/slow", options).await.unwrap_err();

    assert_eq!(transport.calls(), 2);
    assert_eq!(
        *err.root_cause(),
        FetchError::Timeout(Duration::from_millis(100))
    );
    assert_eq!(client.in_flight_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_error_returns_immediately() {
    let transport = ScriptedTransport::failing(FetchError::Decode("not json".to_string()));
    let client = FetchClient::new(transport.clone());

    let err = client.get("/x").await.unwrap_err();

    assert_eq!(err, FetchError::Decode("not json".to_string()));
    assert_eq!(transport.calls(), 1);
}

#[derive(Debug, Default)]
struct RecordingBackoff {
    attempts: Mutex<Vec<u32>>,
}

impl Backoff for Arc<RecordingBackoff> {
    fn delay(&self, attempt: u32) -> Duration {
        self.attempts.lock().unwrap().push(attempt);
        Duration::from_millis(10 * attempt as u64)
    }
}

#[tokio::test(start_paused = true)]
async fn test_injected_backoff_policy() {
    let backoff = Arc::new(RecordingBackoff::default());
    let transport = ScriptedTransport::failing(unavailable());
    let client = FetchClient::builder(transport)
        .backoff(Arc::clone(&backoff))
        .default_options(RequestOptions::default().with_retries(3))
        .build();

    let start = Instant::now();
    assert!(client.get("/x").await.is_err());

    assert_eq!(*backoff.attempts.lock().unwrap(), vec![1, 2, 3]);
    assert_eq!(start.elapsed(), Duration::from_millis(400 + 60));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_uncached_call_after_settle_is_fresh() {
    let transport = ScriptedTransport::ok(json!("second"))
        .then(Ok(json!("first")))
        .with_delay(Duration::from_millis(10));
    let client = FetchClient::new(transport.clone());
    let options = client.default_options().no_cache();

    let first = client.get_with("/x", options.clone()).await.unwrap();
    let second = client.get_with("/x", options).await.unwrap();

    assert_eq!(first, json!("first"));
    assert_eq!(second, json!("second"));
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_slot_released_after_transport_panic() {
    let transport = ScriptedTransport::ok(json!(1));
    let client = FetchClient::new(transport);

    let err = client.get("/panic").await.unwrap_err();

    assert!(matches!(err, FetchError::Internal(_)));
    assert_eq!(client.in_flight_count(), 0);
}

// == Cancellation ==

#[tokio::test(start_paused = true)]
async fn test_cancelled_caller_gets_cancelled_outcome() {
    let transport = ScriptedTransport::ok(json!(1)).with_delay(Duration::from_secs(1));
    let client = FetchClient::new(transport.clone());
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let outcome = client
        .send_cancellable(Request::get("/x"), client.default_options(), &token)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Cancelled);
    assert_eq!(client.in_flight_count(), 0);

    // The abandoned call was aborted and never reached the cache
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(client.cache_stats().await.total_entries, 0);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_one_of_two_callers() {
    let transport = ScriptedTransport::ok(json!("shared")).with_delay(Duration::from_millis(500));
    let client = FetchClient::new(transport.clone());
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let (cancelled, completed) = tokio::join!(
        client.send_cancellable(Request::get("/x"), client.default_options(), &token),
        client.get("/x"),
    );

    assert_eq!(cancelled.unwrap(), Outcome::Cancelled);
    assert_eq!(completed.unwrap(), json!("shared"));
    assert_eq!(transport.calls(), 1);
    assert_eq!(client.in_flight_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_already_cancelled_token_skips_network() {
    let transport = ScriptedTransport::ok(json!(1));
    let client = FetchClient::new(transport.clone());
    let token = CancellationToken::new();
    token.cancel();

    let outcome = client
        .send_cancellable(Request::get("/x"), client.default_options(), &token)
        .await
        .unwrap();

    assert!(outcome.is_cancelled());
    assert_eq!(transport.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_from_config_uses_configured_delay() {
    let config = Config {
        retry_delay_ms: 250,
        retries: 1,
        ..Config::default()
    };
    let transport = ScriptedTransport::failing(unavailable()).with_delay(Duration::ZERO);
    let client = FetchClient::from_config(transport.clone(), &config);

    let start = Instant::now();
    assert!(client.get("/x").await.is_err());

    assert_eq!(transport.calls(), 2);
    assert_eq!(start.elapsed(), Duration::from_millis(250));
}
