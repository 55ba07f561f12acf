//! `rivmon`: command-line client for the rivmon telemetry API.
//!
//! # Usage
//!
//! ```
//! rivmon --url http://localhost:8080 stations --type discharge
//! rivmon ingest ds-001 discharge 12.4
//! rivmon query ds-001 discharge --granularity hour --hours 24
//! rivmon --config ~/.config/rivmon/config.toml query ds-001 waterLevel
//! ```

mod client;
mod render;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, TimeDelta, Utc};
use clap::{Parser, Subcommand};
use client::ApiClient;
use rivmon_core::{
  bucket::Granularity,
  query::QueryRequest,
  reading::{NewReading, ReadingReason},
  station::StationKind,
};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "rivmon", about = "Client for the rivmon telemetry service")]
struct Args {
  /// Path to a TOML config file (url).
  #[arg(short, long, value_name = "FILE")]
  config: Option<std::path::PathBuf>,

  /// Base URL of the rivmon server (default: http://localhost:8080).
  #[arg(long, env = "RIVMON_URL")]
  url: Option<String>,

  /// Print raw JSON instead of tables.
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List stations, optionally of one type.
  Stations {
    #[arg(long = "type", value_name = "TYPE")]
    kind: Option<StationKind>,
  },
  /// Show one station.
  Station { id: String },
  /// Submit a single reading.
  Ingest {
    station_id: String,
    metric:     String,
    value:      f64,
    /// Observation time (RFC 3339); defaults to now.
    #[arg(long)]
    at:         Option<DateTime<Utc>>,
    #[arg(long, default_value_t = ReadingReason::RecordedByTime)]
    reason:     ReadingReason,
  },
  /// Run a range query.
  Query {
    station_id:  String,
    metric:      String,
    #[arg(short, long, default_value_t = Granularity::Hour)]
    granularity: Granularity,
    /// Range start (RFC 3339); defaults to `--hours` before the end.
    #[arg(long)]
    start:       Option<DateTime<Utc>>,
    /// Range end, exclusive (RFC 3339); defaults to now.
    #[arg(long)]
    end:         Option<DateTime<Utc>>,
    /// Span to query when `--start` is omitted.
    #[arg(long, default_value_t = 24)]
    hours:       i64,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url: String,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  // Load config file if provided.
  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let base_url = args
    .url
    .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
    .unwrap_or_else(|| "http://localhost:8080".to_string());

  let client = ApiClient::new(base_url)?;
  run(&client, args.command, args.json).await
}

async fn run(client: &ApiClient, command: Command, json: bool) -> Result<()> {
  match command {
    Command::Stations { kind } => {
      let stations = client.list_stations(kind).await?;
      if json {
        return render::json(&stations);
      }
      print!("{}", render::stations(&stations));
    }
    Command::Station { id } => {
      let station = client.get_station(&id).await?;
      if json {
        return render::json(&station);
      }
      print!("{}", render::stations(std::slice::from_ref(&station)));
    }
    Command::Ingest {
      station_id,
      metric,
      value,
      at,
      reason,
    } => {
      let reading =
        NewReading::new(station_id, metric, at.unwrap_or_else(Utc::now), value)
          .with_reason(reason);
      let receipt = client.ingest(&reading).await?;
      if json {
        return render::json(&receipt);
      }
      println!(
        "accepted {}/{} #{} at {} ({})",
        receipt.station_id,
        receipt.metric,
        receipt.sequence,
        receipt.timestamp.to_rfc3339(),
        receipt.token
      );
    }
    Command::Query {
      station_id,
      metric,
      granularity,
      start,
      end,
      hours,
    } => {
      if hours <= 0 {
        bail!("--hours must be positive");
      }
      let end = end.unwrap_or_else(Utc::now);
      let start = start.unwrap_or(end - TimeDelta::hours(hours));
      let result = client
        .query(&QueryRequest {
          station_id,
          metric,
          granularity,
          start,
          end,
        })
        .await?;
      if json {
        return render::json(&result);
      }
      print!("{}", render::query(&result));
    }
  }
  Ok(())
}
