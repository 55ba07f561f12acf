//! rivmon server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), loads the
//! station registry, opens the SQLite archive, rehydrates sealed buckets and
//! serves the JSON API over HTTP.
//!
//! ```
//! RIVMON_PORT=9000 cargo run -p rivmon-server -- --config config.toml
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use rivmon_core::clock::SystemClock;
use rivmon_engine::{StationRegistry, Telemetry, tasks};
use rivmon_server::{ServerConfig, expand_tilde};
use rivmon_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "River monitoring telemetry server")]
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
    .add_source(config::Environment::with_prefix("RIVMON"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Load the station registry.
  let registry_path = expand_tilde(&server_cfg.registry_path);
  let snapshot = tokio::fs::read_to_string(&registry_path)
    .await
    .with_context(|| format!("failed to read registry at {registry_path:?}"))?;
  let registry = StationRegistry::from_json(&snapshot)
    .with_context(|| format!("invalid registry at {registry_path:?}"))?;
  tracing::info!(stations = registry.len(), "loaded station registry");

  // Open the archive and restore archived buckets from it.
  let archive_path = expand_tilde(&server_cfg.archive_path);
  let archive = SqliteStore::open(&archive_path)
    .await
    .with_context(|| format!("failed to open archive at {archive_path:?}"))?;

  let telemetry = Arc::new(Telemetry::new(
    registry,
    Arc::new(archive),
    Arc::new(SystemClock),
    server_cfg.limits(),
    server_cfg.retention(),
  ));
  telemetry
    .hydrate()
    .await
    .context("failed to rehydrate from archive")?;

  let rollup = tasks::spawn_rollup(telemetry.clone(), server_cfg.rollup_interval());
  let retention =
    tasks::spawn_retention(telemetry.clone(), server_cfg.retention_interval());

  let app = rivmon_api::api_router(telemetry.clone()).layer(TraceLayer::new_for_http());
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  rollup.abort();
  retention.abort();

  // Flush whatever sealed since the last tick.
  match telemetry.run_rollup().await {
    Ok(report) => tracing::info!(
      folded = report.folded,
      archived = report.archived,
      "final rollup sweep complete"
    ),
    Err(e) => tracing::warn!(error = %e, "final rollup sweep failed"),
  }

  // Checkpoint still-open buckets so the next start resumes them.
  match telemetry.checkpoint().await {
    Ok(n) => tracing::info!(buckets = n, "checkpointed open buckets"),
    Err(e) => tracing::warn!(error = %e, "open bucket checkpoint failed"),
  }

  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
}
