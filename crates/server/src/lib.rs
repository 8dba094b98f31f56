//! Tessella Server
//!
//! HTTP front end for the Tessella fragmentation engine. Every route resolves
//! a tile, queries the upstream temporal entity source for the tile's region
//! and time window, and answers with a linked-data fragment.
//!
//! # Routes
//!
//! - `/{z}/{x}/{y}`, `/geohash/{hash}`, `/h3/{index}`: raw hourly pages
//! - the same paths with `/latest`: most recent values
//! - the same paths with `/summary`: hourly or daily aggregations
//! - `/health`
//!
//! # Example
//!
//! ```ignore
//! use tessella_server::{AppState, run_server};
//!
//! let state = Arc::new(AppState::new(config)?);
//! run_server(listener, state, shutdown).await?;
//! ```

pub mod cache;
pub mod error;
pub mod routes;
pub mod state;
pub mod upstream;

pub use error::ServerError;
pub use routes::build_router;
pub use state::AppState;
pub use upstream::{Fetched, HttpSource, TemporalSource};

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tessella::Config;
use tracing::{debug, info};

/// How often expired upstream answers are dropped from the cache.
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Serve the fragment routes on `listener` until `shutdown` resolves.
pub async fn run_server(
    listener: tokio::net::TcpListener,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    info!("Tessella server listening on {}", listener.local_addr()?);
    debug!("Upstream source: {}", state.config.ngsi.host);

    let janitor = tokio::spawn(purge_periodically(state.clone()));

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    janitor.abort();
    info!("Shutdown signal received, server stopped");
    Ok(())
}

async fn purge_periodically(state: Arc<AppState>) {
    let mut ticker = tokio::time::interval(PURGE_INTERVAL);
    loop {
        ticker.tick().await;
        state.cache.purge_expired();
    }
}

/// Load a configuration file; `.json` files are read as JSON, anything else
/// as TOML.
pub fn load_config(path: &Path) -> Result<Config, ServerError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ServerError::Config(format!("cannot read {}: {e}", path.display())))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let config = if is_json {
        Config::from_json(&contents).map_err(|e| ServerError::Config(e.to_string()))?
    } else {
        Config::from_toml(&contents).map_err(|e| ServerError::Config(e.to_string()))?
    };
    Ok(config)
}
