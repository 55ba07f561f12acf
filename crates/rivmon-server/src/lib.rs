//! Configuration for the rivmon server binary.
//!
//! [`ServerConfig`] is deserialised from `config.toml` layered under
//! `RIVMON_*` environment variables, and converted into the engine's
//! [`Limits`] and [`RetentionPolicy`].

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use chrono::TimeDelta;
use rivmon_core::policy::{Limits, RetentionPolicy};
use serde::Deserialize;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration. Every key is optional.
///
/// Retention keys are in days; an unset key or `0` keeps that granularity
/// forever.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                    String,
  pub port:                    u16,
  pub registry_path:           PathBuf,
  pub archive_path:            PathBuf,
  pub raw_retention_days:      Option<u32>,
  pub minute_retention_days:   Option<u32>,
  pub hour_retention_days:     Option<u32>,
  pub day_retention_days:      Option<u32>,
  pub week_retention_days:     Option<u32>,
  pub month_retention_days:    Option<u32>,
  pub year_retention_days:     Option<u32>,
  pub max_query_span_days:     u32,
  pub max_query_rows:          usize,
  pub lateness_tolerance_secs: u32,
  pub rollup_interval_secs:    u64,
  pub retention_interval_secs: u64,
  pub prune_lock_timeout_ms:   u64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                    "127.0.0.1".to_string(),
      port:                    8080,
      registry_path:           PathBuf::from("stations.json"),
      archive_path:            PathBuf::from("rivmon.db"),
      raw_retention_days:      Some(7),
      minute_retention_days:   Some(30),
      hour_retention_days:     Some(365),
      day_retention_days:      None,
      week_retention_days:     None,
      month_retention_days:    None,
      year_retention_days:     None,
      max_query_span_days:     7,
      max_query_rows:          1000,
      lateness_tolerance_secs: 300,
      rollup_interval_secs:    5,
      retention_interval_secs: 3600,
      prune_lock_timeout_ms:   250,
    }
  }
}

fn days(n: Option<u32>) -> Option<TimeDelta> {
  n.filter(|&n| n > 0).map(|n| TimeDelta::days(i64::from(n)))
}

impl ServerConfig {
  /// `host:port`, ready for binding.
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn limits(&self) -> Limits {
    Limits {
      max_query_span:     TimeDelta::days(i64::from(self.max_query_span_days)),
      max_query_rows:     self.max_query_rows,
      lateness_tolerance: TimeDelta::seconds(i64::from(self.lateness_tolerance_secs)),
      prune_lock_timeout: Duration::from_millis(self.prune_lock_timeout_ms),
    }
  }

  pub fn retention(&self) -> RetentionPolicy {
    RetentionPolicy {
      raw:    days(self.raw_retention_days),
      minute: days(self.minute_retention_days),
      hour:   days(self.hour_retention_days),
      day:    days(self.day_retention_days),
      week:   days(self.week_retention_days),
      month:  days(self.month_retention_days),
      year:   days(self.year_retention_days),
    }
  }

  pub fn rollup_interval(&self) -> Duration {
    Duration::from_secs(self.rollup_interval_secs.max(1))
  }

  pub fn retention_interval(&self) -> Duration {
    Duration::from_secs(self.retention_interval_secs.max(1))
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
