//! weighpoint server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, and serves the measurement API over HTTP.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use weighpoint_api::ServerConfig;
use weighpoint_core::store::MeasurementQueue;
use weighpoint_store_sqlite::SqliteStore;

#[derive(Parser)]
#[command(author, version, about = "Weighpoint measurement server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("WEIGHPOINT"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  // Background sweeper: no job may stay claimed forever.
  tokio::spawn(sweep_expired_claims(
    Arc::clone(&store),
    server_cfg.claim_timeout(),
  ));

  let app = axum::Router::new()
    .nest("/api", weighpoint_api::api_router(Arc::clone(&store)))
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Periodically revert claimed jobs whose agent never reported back.
async fn sweep_expired_claims(store: Arc<SqliteStore>, timeout: std::time::Duration) {
  let period = (timeout / 4).max(std::time::Duration::from_secs(1));
  let mut ticker = tokio::time::interval(period);
  loop {
    ticker.tick().await;
    match store.reclaim_expired(timeout).await {
      Ok(0) => {}
      Ok(reverted) => {
        tracing::info!(reverted, "reverted expired claims to pending");
      }
      Err(err) => tracing::warn!(error = %err, "claim sweep failed"),
    }
  }
}

/// Expand a leading `~/` to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
  if let Some(rest) = path.strip_prefix("~/") {
    if let Some(home) = std::env::var_os("HOME") {
      return Path::new(&home).join(rest);
    }
  }
  PathBuf::from(path)
}
