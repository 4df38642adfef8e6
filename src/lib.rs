//! Fetch Layer - client-side request orchestration
//!
//! Sits between an interactive application and a remote data service:
//! a TTL response cache, request coalescing with timeouts and retries,
//! a debounce primitive, a cancellable search controller, an incremental
//! pagination accumulator and a scroll-window calculator.

pub mod cache;
pub mod cancel;
pub mod client;
pub mod config;
pub mod debounce;
pub mod error;
pub mod pagination;
pub mod scroll;
pub mod search;
pub mod tasks;
pub mod transport;

pub use cache::{InvalidationPattern, TtlCache};
pub use cancel::{CancellationToken, Outcome};
pub use client::{FetchClient, RequestOptions};
pub use config::Config;
pub use error::{FetchError, Result};
pub use tasks::spawn_cleanup_task;
pub use transport::{HttpTransport, Method, Request, Transport};
