//! Cooperative Cancellation
//!
//! A cancellation token is passed into every suspendable operation. Being
//! cancelled is reported as `Outcome::Cancelled`, never as an error.

use std::sync::Arc;

use tokio::sync::watch;

// == Outcome ==
/// Result of a cancellable operation that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Completed(T),
    Cancelled,
}

impl<T> Outcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    /// Returns the completed value, `None` if cancelled.
    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Cancelled => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Completed(value) => Outcome::Completed(f(value)),
            Outcome::Cancelled => Outcome::Cancelled,
        }
    }
}

// == Cancellation Token ==
/// Cloneable cancellation signal; all clones observe the same state.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    state: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            state: Arc::new(tx),
        }
    }

    /// Signals cancellation. Idempotent.
    pub fn cancel(&self) {
        self.state.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolves once the token is cancelled; immediately if it already is.
    pub async fn cancelled(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_token_starts_live() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_visible_to_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();

        clone.cancel();
        clone.cancel();

        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancelled_future_wakes_on_cancel() {
        let token = CancellationToken::new();
        let mut waiting = task::spawn(token.cancelled());

        assert_pending!(waiting.poll());

        token.cancel();

        assert!(waiting.is_woken());
        assert_ready!(waiting.poll());
    }

    #[test]
    fn test_cancelled_ready_when_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();

        let mut waiting = task::spawn(token.cancelled());
        assert_ready!(waiting.poll());
    }

    #[test]
    fn test_outcome_helpers() {
        let done: Outcome<u32> = Outcome::Completed(2);
        assert_eq!(done.clone().map(|v| v * 2), Outcome::Completed(4));
        assert_eq!(done.completed(), Some(2));

        let cancelled: Outcome<u32> = Outcome::Cancelled;
        assert!(cancelled.is_cancelled());
        assert_eq!(cancelled.completed(), None);
    }
}
