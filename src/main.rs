//! GlobeTalk API Server
//!
//! Run with: cargo run --bin globetalk-api
//!
//! # Configuration
//!
//! Settings come from `config.toml` (see `globetalk-cli config`), then
//! environment variables:
//! - `GLOBETALK_API_HOST`: Host to bind to (default: 0.0.0.0)
//! - `GLOBETALK_API_PORT` or `PORT`: Port to listen on (default: 5000)
//! - `GLOBETALK_STORE`: `memory` or `sqlite` (default: memory)
//! - `GLOBETALK_DATA_DIR`: Directory for the SQLite database
//! - `GLOBETALK_LOG_LEVEL`, `GLOBETALK_LOG_FORMAT`: Logging (info, pretty)
//! - `RUST_LOG`: Full filter directive, overrides the log level

use anyhow::Context;
use globetalk::api::{serve, AppState};
use globetalk::config::{Config, LoggingConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, source) = Config::discover();
    init_tracing(&config.logging);
    source.log();

    tracing::info!("Starting GlobeTalk API server v{}", env!("CARGO_PKG_VERSION"));

    let api_config = config.api.to_api_config();
    let store = config
        .store
        .open()
        .with_context(|| format!("Failed to open {:?} store", config.store.backend))?;

    tracing::info!(
        backend = store.backend(),
        data_dir = %config.store.data_dir,
        "Document store ready"
    );

    let state = AppState::new(store, api_config.clone());
    serve(state, &api_config).await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.default_directive()));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.is_json() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
