//! In-flight registry
//!
//! Maps a request key to the single call currently executing for it. The
//! registry lock is a plain `std::sync::Mutex`: it is never held across an
//! await, and slots must be releasable from `Drop`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::error::{FetchError, Result};
use crate::transport::CacheKey;

/// Shared result cell; `None` until the call settles.
pub(crate) type Settled = Option<Result<Value>>;

struct Slot {
    id: u64,
    result: Arc<watch::Sender<Settled>>,
    abort: CancellationToken,
}

/// Handle owned by the task that runs the call.
pub(crate) struct CallHandle {
    pub id: u64,
    pub result: Arc<watch::Sender<Settled>>,
    pub abort: CancellationToken,
}

/// A caller's view of a registered call.
pub(crate) struct Registration {
    pub id: u64,
    pub rx: watch::Receiver<Settled>,
    /// Present only for the caller that created the slot
    pub call: Option<CallHandle>,
}

#[derive(Default)]
pub(crate) struct InFlightRegistry {
    slots: Mutex<HashMap<CacheKey, Slot>>,
    next_id: AtomicU64,
}

impl InFlightRegistry {
    fn slots(&self) -> MutexGuard<'_, HashMap<CacheKey, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attaches to the call in flight for `key`, or registers a new one.
    pub fn register(&self, key: &CacheKey) -> Registration {
        let mut slots = self.slots();
        if let Some(slot) = slots.get(key) {
            debug!(%key, "attaching to in-flight call");
            return Registration {
                id: slot.id,
                rx: slot.result.subscribe(),
                call: None,
            };
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(None);
        let result = Arc::new(tx);
        let abort = CancellationToken::new();
        slots.insert(
            key.clone(),
            Slot {
                id,
                result: Arc::clone(&result),
                abort: abort.clone(),
            },
        );

        Registration {
            id,
            rx,
            call: Some(CallHandle { id, result, abort }),
        }
    }

    /// Called after a caller dropped its receiver. When no caller remains
    /// attached, the call is aborted and its slot freed at once.
    pub fn detach(&self, key: &CacheKey, id: u64) -> bool {
        let mut slots = self.slots();
        let abandoned = matches!(
            slots.get(key),
            Some(slot) if slot.id == id && slot.result.receiver_count() == 0
        );
        if abandoned {
            if let Some(slot) = slots.remove(key) {
                slot.abort.cancel();
                debug!(%key, "last caller detached, call aborted");
            }
        }
        abandoned
    }

    /// Frees the slot of call `id`; a newer call for the same key is left alone.
    pub fn release(&self, key: &CacheKey, id: u64) {
        let mut slots = self.slots();
        if slots.get(key).map(|slot| slot.id) == Some(id) {
            slots.remove(key);
        }
    }

    /// Frees the slot of `call`, then publishes `result` to its callers.
    ///
    /// The slot is gone before any caller can observe the result, so a
    /// request registered afterwards starts a fresh call instead of joining
    /// a settled one.
    pub fn complete(&self, key: &CacheKey, call: &CallHandle, result: Result<Value>) {
        self.release(key, call.id);
        call.result.send_replace(Some(result));
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.slots().contains_key(key)
    }
}

/// Waits until the call settles.
pub(crate) async fn settled(mut rx: watch::Receiver<Settled>) -> Result<Value> {
    match rx.wait_for(Option::is_some).await {
        Ok(value) => (*value)
            .clone()
            .unwrap_or_else(|| Err(FetchError::Internal("call settled without a value".to_string()))),
        Err(_) => Err(FetchError::Internal(
            "in-flight call dropped without settling".to_string(),
        )),
    }
}
