//! Readings: single timestamped observations, the unit of ingest.
//!
//! Readings are immutable once accepted. Per (station, metric) pair they form
//! an append-only log in non-decreasing timestamp order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a reading was taken.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ReadingReason {
  /// Periodic logger sample.
  #[default]
  RecordedByTime,
  Manual,
  Alarm,
}

/// Input to ingest: an observation that has not yet been accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReading {
  pub station_id: String,
  pub metric:     String,
  pub timestamp:  DateTime<Utc>,
  pub value:      f64,
  #[serde(default)]
  pub reason:     ReadingReason,
}

impl NewReading {
  /// Convenience constructor with the default reason.
  pub fn new(
    station_id: impl Into<String>,
    metric: impl Into<String>,
    timestamp: DateTime<Utc>,
    value: f64,
  ) -> Self {
    Self {
      station_id: station_id.into(),
      metric: metric.into(),
      timestamp,
      value,
      reason: ReadingReason::default(),
    }
  }

  pub fn with_reason(mut self, reason: ReadingReason) -> Self {
    self.reason = reason;
    self
  }
}

/// An accepted observation as held in the raw log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
  /// Dense, 0-based position in the pair's log; never reused.
  pub sequence:  u64,
  pub timestamp: DateTime<Utc>,
  pub value:     f64,
  pub reason:    ReadingReason,
}

/// The acceptance token returned by a successful ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReceipt {
  pub token:      Uuid,
  pub station_id: String,
  pub metric:     String,
  pub sequence:   u64,
  pub timestamp:  DateTime<Utc>,
}
