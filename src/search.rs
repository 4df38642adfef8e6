//! Cancellable Search Controller
//!
//! raw query -> debounce -> settled query -> cancellable search call.
//!
//! Every settled query cancels the previous call before issuing its own and
//! bumps a generation counter. A result is applied only if its generation is
//! still current, so a slow earlier call can never overwrite the state of a
//! later one.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cancel::{CancellationToken, Outcome};
use crate::client::{FetchClient, RequestOptions};
use crate::debounce::Debounced;
use crate::error::{FetchError, Result};
use crate::transport::Request;

// == Search Source ==
/// Search function `(query) -> ordered results`, abortable through `cancel`.
#[async_trait]
pub trait SearchSource: Send + Sync + 'static {
    type Item: Clone + Send + Sync + 'static;

    async fn search(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Outcome<Vec<Self::Item>>>;
}

// == Search State ==
/// Snapshot of what the search box should show.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchState<T> {
    /// Latest raw input
    pub query: String,
    /// Latest debounced input
    pub settled_query: String,
    pub results: Vec<T>,
    pub loading: bool,
    pub error: Option<FetchError>,
}

impl<T> Default for SearchState<T> {
    fn default() -> Self {
        Self {
            query: String::new(),
            settled_query: String::new(),
            results: Vec::new(),
            loading: false,
            error: None,
        }
    }
}

/// The most recently issued search.
struct Active {
    generation: u64,
    token: CancellationToken,
}

struct Shared<T> {
    state: watch::Sender<SearchState<T>>,
    active: Mutex<Active>,
}

impl<T: Clone + Send + Sync + 'static> Shared<T> {
    fn active(&self) -> MutexGuard<'_, Active> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancels the outstanding search and starts a new generation.
    fn supersede(&self) -> (u64, CancellationToken) {
        let mut active = self.active();
        active.token.cancel();
        active.generation += 1;
        active.token = CancellationToken::new();
        (active.generation, active.token.clone())
    }

    fn apply(&self, generation: u64, outcome: Result<Outcome<Vec<T>>>) {
        let active = self.active();
        if active.generation != generation {
            debug!(generation, current = active.generation, "stale search result discarded");
            return;
        }

        match outcome {
            Ok(Outcome::Completed(results)) => self.state.send_modify(|state| {
                state.results = results;
                state.loading = false;
            }),
            // Only a superseding search or a clear cancels, and both have
            // already moved the generation on.
            Ok(Outcome::Cancelled) => {}
            Err(err) => self.state.send_modify(|state| {
                state.error = Some(err);
                state.loading = false;
            }),
        }
    }
}

// == Search Controller ==
/// Exposes `{ query, set_query, results, loading, error, clear_results }`.
pub struct SearchController<S: SearchSource> {
    query: Debounced<String>,
    shared: Arc<Shared<S::Item>>,
    driver: JoinHandle<()>,
}

impl<S: SearchSource> SearchController<S> {
    pub fn new(source: S, delay: Duration) -> Self {
        let query = Debounced::new(String::new(), delay);
        let (state, _) = watch::channel(SearchState::default());
        let shared = Arc::new(Shared {
            state,
            active: Mutex::new(Active {
                generation: 0,
                token: CancellationToken::new(),
            }),
        });

        let driver = tokio::spawn(drive(
            Arc::new(source),
            query.subscribe(),
            Arc::clone(&shared),
        ));

        Self {
            query,
            shared,
            driver,
        }
    }

    pub fn set_query(&self, query: impl Into<String>) {
        let query = query.into();
        self.query.set(query.clone());
        self.shared.state.send_modify(|state| state.query = query);
    }

    /// Cancels any outstanding search and empties query, results and error.
    pub fn clear_results(&self) {
        self.shared.supersede();
        self.query.set(String::new());
        self.shared.state.send_modify(|state| *state = SearchState::default());
    }

    pub fn query(&self) -> String {
        self.shared.state.borrow().query.clone()
    }

    pub fn results(&self) -> Vec<S::Item> {
        self.shared.state.borrow().results.clone()
    }

    pub fn loading(&self) -> bool {
        self.shared.state.borrow().loading
    }

    pub fn error(&self) -> Option<FetchError> {
        self.shared.state.borrow().error.clone()
    }

    pub fn state(&self) -> SearchState<S::Item> {
        self.shared.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SearchState<S::Item>> {
        self.shared.state.subscribe()
    }
}

impl<S: SearchSource> Drop for SearchController<S> {
    fn drop(&mut self) {
        self.driver.abort();
        self.shared
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .token
            .cancel();
    }
}

/// Issues a search for every settled query.
async fn drive<S: SearchSource>(
    source: Arc<S>,
    mut settled: watch::Receiver<String>,
    shared: Arc<Shared<S::Item>>,
) {
    while settled.changed().await.is_ok() {
        let query = settled.borrow_and_update().clone();
        let (generation, token) = shared.supersede();

        if query.trim().is_empty() {
            shared.state.send_modify(|state| {
                state.settled_query = query;
                state.results.clear();
                state.loading = false;
                state.error = None;
            });
            continue;
        }

        shared.state.send_modify(|state| {
            state.settled_query = query.clone();
            state.loading = true;
            state.error = None;
        });

        debug!(%query, generation, "issuing search");
        let source = Arc::clone(&source);
        let shared = Arc::clone(&shared);
        tokio::spawn(async move {
            let search = tokio::spawn(async move { source.search(query.trim(), &token).await });
            let outcome = search.await.unwrap_or_else(|err| {
                Err(FetchError::Internal(format!("search task failed: {}", err)))
            });
            shared.apply(generation, outcome);
        });
    }
}

// == Client Search ==
/// `SearchSource` issuing cancellable `GET {path}?q={query}` calls through a
/// `FetchClient`; the response must be a JSON array of `T`.
pub struct ClientSearch<T> {
    client: FetchClient,
    path: String,
    options: RequestOptions,
    _item: PhantomData<fn() -> T>,
}

impl<T> ClientSearch<T> {
    pub fn new(client: FetchClient, path: impl Into<String>) -> Self {
        let options = client.default_options();
        Self {
            client,
            path: path.into(),
            options,
            _item: PhantomData,
        }
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    fn path_for(&self, query: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        let separator = if self.path.contains('?') { '&' } else { '?' };
        format!("{}{}q={}", self.path, separator, encoded)
    }
}

#[async_trait]
impl<T> SearchSource for ClientSearch<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    type Item = T;

    async fn search(&self, query: &str, cancel: &CancellationToken) -> Result<Outcome<Vec<T>>> {
        let request = Request::get(self.path_for(query));
        match self
            .client
            .send_cancellable(request, self.options.clone(), cancel)
            .await?
        {
            Outcome::Completed(value) => Ok(Outcome::Completed(serde_json::from_value(value)?)),
            Outcome::Cancelled => Ok(Outcome::Cancelled),
        }
    }
}
