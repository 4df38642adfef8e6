//! Debounce Primitive
//!
//! Settles a rapidly changing value after a quiet period. Each new input
//! restarts the timer; only the value that stayed unchanged for the whole
//! delay is published.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

// == Debounced ==
/// Owns the input side and the settling task. Dropping it stops the task,
/// so no settled update fires afterwards.
#[derive(Debug)]
pub struct Debounced<T> {
    input: watch::Sender<T>,
    settled: watch::Receiver<T>,
    task: JoinHandle<()>,
    delay: Duration,
}

impl<T> Debounced<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Starts debouncing with `initial` as both the raw and settled value.
    pub fn new(initial: T, delay: Duration) -> Self {
        let (input, input_rx) = watch::channel(initial.clone());
        let (settled_tx, settled) = watch::channel(initial);
        let task = tokio::spawn(settle(input_rx, settled_tx, delay));

        Self {
            input,
            settled,
            task,
            delay,
        }
    }

    /// Feeds a new raw value, restarting the quiet period.
    pub fn set(&self, value: T) {
        self.input.send_replace(value);
    }

    /// Latest raw value.
    pub fn raw(&self) -> T {
        self.input.borrow().clone()
    }

    /// Latest settled value.
    pub fn settled(&self) -> T {
        self.settled.borrow().clone()
    }

    /// Receiver notified on every settled update.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.settled.clone()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl<T> Drop for Debounced<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Waits for an input change, then for a full quiet `delay`; any change
/// during the wait discards the pending timer and starts a new one.
async fn settle<T: Clone>(
    mut input: watch::Receiver<T>,
    settled: watch::Sender<T>,
    delay: Duration,
) {
    while input.changed().await.is_ok() {
        loop {
            tokio::select! {
                changed = input.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = tokio::time::sleep(delay) => {
                    let value = input.borrow_and_update().clone();
                    settled.send_replace(value);
                    break;
                }
            }
        }
    }
}
