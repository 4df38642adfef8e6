//! Incremental Pagination Accumulator
//!
//! Append-only item list fed by successive page fetches.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{FetchError, Result};

// == Page Source ==
/// One page of results.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

/// Page-fetch function `(page_number) -> { items, has_more }`; pages start at 1.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Clone + Send + Sync;

    async fn fetch_page(&self, page: u32) -> Result<Page<Self::Item>>;
}

// == Pagination State ==
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationState<T> {
    pub items: Vec<T>,
    /// Next page to fetch, starting at 1
    pub page: u32,
    pub has_more: bool,
    pub loading: bool,
    pub error: Option<FetchError>,
}

impl<T> PaginationState<T> {
    fn initial(items: Vec<T>) -> Self {
        Self {
            items,
            page: 1,
            has_more: true,
            loading: false,
            error: None,
        }
    }
}

/// What a `load_more` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMore {
    /// Already loading, or no more pages
    Skipped,
    /// Page fetched; number of items appended
    Appended(usize),
    /// Fetch failed; state keeps the error
    Failed,
    /// A `reset` happened while the page was loading
    Discarded,
}

struct Inner<T> {
    /// Bumped by `reset`; a load only applies within its own epoch
    epoch: u64,
    initial: Vec<T>,
}

// == Paginator ==
/// Exposes `{ items, loading, has_more, error, load_more, reset }`.
pub struct Paginator<S: PageSource> {
    source: S,
    state: watch::Sender<PaginationState<S::Item>>,
    inner: Mutex<Inner<S::Item>>,
}

impl<S: PageSource> Paginator<S> {
    pub fn new(source: S) -> Self {
        Self::with_initial(source, Vec::new())
    }

    /// Starts from `initial` items; `reset` restores them.
    pub fn with_initial(source: S, initial: Vec<S::Item>) -> Self {
        let (state, _) = watch::channel(PaginationState::initial(initial.clone()));
        Self {
            source,
            state,
            inner: Mutex::new(Inner { epoch: 0, initial }),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner<S::Item>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // == Load More ==
    /// Fetches the current page and appends it.
    ///
    /// No-op while a load is running or once `has_more` is false. On failure
    /// the page counter stays put and accumulated items are kept, so the
    /// same page is retried by the next call.
    pub async fn load_more(&self) -> LoadMore {
        let (epoch, page) = {
            let inner = self.inner();
            let mut start = None;
            self.state.send_if_modified(|state| {
                if state.loading || !state.has_more {
                    return false;
                }
                state.loading = true;
                state.error = None;
                start = Some(state.page);
                true
            });
            match start {
                Some(page) => (inner.epoch, page),
                None => return LoadMore::Skipped,
            }
        };

        let mut guard = LoadGuard {
            paginator: self,
            epoch,
            armed: true,
        };
        let fetched = self.source.fetch_page(page).await;
        guard.armed = false;

        let inner = self.inner();
        if inner.epoch != epoch {
            debug!(page, "page load discarded after reset");
            return LoadMore::Discarded;
        }

        match fetched {
            Ok(Page { items, has_more }) => {
                let count = items.len();
                self.state.send_modify(|state| {
                    state.items.extend(items);
                    state.has_more = has_more;
                    state.page += 1;
                    state.loading = false;
                });
                debug!(page, count, has_more, "page appended");
                LoadMore::Appended(count)
            }
            Err(err) => {
                warn!(page, error = %err, "page load failed");
                self.state.send_modify(|state| {
                    state.error = Some(err);
                    state.loading = false;
                });
                LoadMore::Failed
            }
        }
    }

    // == Reset ==
    /// Restores the initial items, page 1, `has_more`, and clears the error.
    pub fn reset(&self) {
        let mut inner = self.inner();
        inner.epoch += 1;
        let initial = PaginationState::initial(inner.initial.clone());
        self.state.send_replace(initial);
    }

    /// Clears `loading` for a load whose future was dropped mid-fetch, unless
    /// a `reset` has already replaced its state.
    fn abandon(&self, epoch: u64) {
        let inner = self.inner();
        if inner.epoch == epoch {
            self.state.send_modify(|state| state.loading = false);
            debug!(epoch, "page load abandoned");
        }
    }

    pub fn items(&self) -> Vec<S::Item> {
        self.state.borrow().items.clone()
    }

    pub fn loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn has_more(&self) -> bool {
        self.state.borrow().has_more
    }

    pub fn error(&self) -> Option<FetchError> {
        self.state.borrow().error.clone()
    }

    pub fn state(&self) -> PaginationState<S::Item> {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<PaginationState<S::Item>> {
        self.state.subscribe()
    }
}

/// Armed while a fetch is outstanding; dropping it armed releases `loading`.
struct LoadGuard<'a, S: PageSource> {
    paginator: &'a Paginator<S>,
    epoch: u64,
    armed: bool,
}

impl<S: PageSource> Drop for LoadGuard<'_, S> {
    fn drop(&mut self) {
        if self.armed {
            self.paginator.abandon(self.epoch);
        }
    }
}
