//! Fetch Layer - command-line probe
//!
//! Fetches each path given on the command line through the request layer,
//! twice concurrently, and prints the responses plus the cache statistics.
//! The duplicate requests are coalesced into a single network call.
//!
//! ```text
//! FETCH_BASE_URL=http://localhost:3000 fetch_layer /claims /benefits
//! ```

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fetch_layer::{spawn_cleanup_task, Config, FetchClient, HttpTransport};

/// Main entry point.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the HTTP transport and client
/// 4. Start background TTL cleanup task
/// 5. Fetch every path, print results and cache statistics
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fetch_layer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        anyhow::bail!("usage: fetch_layer <path>...");
    }

    let config = Config::from_env();
    info!(
        "Configuration loaded: base_url={}, default_ttl={}s, timeout={}ms, retries={}",
        config.base_url, config.default_ttl, config.timeout_ms, config.retries
    );

    let client = FetchClient::from_config(HttpTransport::new(config.base_url.clone()), &config);
    let cleanup_handle = spawn_cleanup_task(client.cache(), config.cleanup_interval());

    for path in &paths {
        let (first, second) = tokio::join!(client.get(path), client.get(path));
        match first {
            Ok(value) => {
                let pretty = serde_json::to_string_pretty(&value)
                    .with_context(|| format!("rendering response of {}", path))?;
                println!("{}\n{}", path, pretty);
            }
            Err(err) => warn!("{} failed: {}", path, err),
        }
        if second.is_err() {
            warn!("{} failed for the coalesced caller too", path);
        }
    }

    let stats = client.cache_stats().await;
    println!(
        "{}",
        serde_json::to_string_pretty(&stats).context("rendering cache stats")?
    );

    cleanup_handle.abort();
    Ok(())
}
