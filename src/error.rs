//! Error types for the request layer
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use thiserror::Error;

// == Fetch Error Enum ==
/// Unified error type for the request layer.
///
/// Cloneable so that every caller coalesced onto one in-flight call can
/// receive the identical failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Non-success response from the remote service
    #[error("Request failed with status {status}: {message}")]
    Transport { status: u16, message: String },

    /// A single attempt exceeded its configured bound
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection-level failure, no status received
    #[error("Network error: {0}")]
    Network(String),

    /// Response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Terminal failure once the retry budget is spent
    #[error("Request failed after {attempts} attempt(s): {last}")]
    RetryExhausted {
        attempts: u32,
        last: Box<FetchError>,
    },

    /// The shared call settled without producing an outcome
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FetchError {
    // == Retry Classification ==
    /// Returns true if another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Transport { .. } | FetchError::Timeout(_) | FetchError::Network(_)
        )
    }

    // == Root Cause ==
    /// Unwraps `RetryExhausted` down to the last underlying failure.
    pub fn root_cause(&self) -> &FetchError {
        match self {
            FetchError::RetryExhausted { last, .. } => last.root_cause(),
            other => other,
        }
    }

    /// HTTP status of the root cause, if it carried one.
    pub fn status(&self) -> Option<u16> {
        match self.root_cause() {
            FetchError::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the request layer.
pub type Result<T> = std::result::Result<T, FetchError>;
