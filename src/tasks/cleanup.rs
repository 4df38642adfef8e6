//! TTL Cleanup Task
//!
//! Background task that periodically purges expired cache entries. Reads
//! already evict lazily; this bounds memory held by keys nobody reads again.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::client::SharedCache;

/// Spawns a background task that periodically purges expired entries.
///
/// # Arguments
/// * `cache` - Cache shared with the client (see `FetchClient::cache`)
/// * `interval` - Time between purge runs
///
/// # Returns
/// A JoinHandle for the spawned task; abort it when the client is disposed.
///
/// # Example
/// ```ignore
/// let client = FetchClient::new(HttpTransport::new("http://localhost:3000"));
/// let cleanup_handle = spawn_cleanup_task(client.cache(), Duration::from_secs(60));
/// // Later, on teardown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(cache: SharedCache, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(?interval, "Starting TTL cleanup task");

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.write().await.purge_expired();

            if removed > 0 {
                info!("TTL cleanup: removed {} expired entries", removed);
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}
