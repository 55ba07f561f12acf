//! Error types for `rivmon-core`.

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown station: {0}")]
  UnknownStation(String),

  #[error("metric {metric:?} is not defined for station {station_id}")]
  InvalidMetric { station_id: String, metric: String },

  #[error(
    "out-of-order reading for {station_id}/{metric}: {timestamp} is before \
     last accepted {last_accepted}"
  )]
  OutOfOrder {
    station_id:    String,
    metric:        String,
    timestamp:     DateTime<Utc>,
    last_accepted: DateTime<Utc>,
  },

  #[error(
    "late reading for {station_id}/{metric}: {timestamp} is older than the \
     lateness horizon {horizon}"
  )]
  LateReading {
    station_id: String,
    metric:     String,
    timestamp:  DateTime<Utc>,
    horizon:    DateTime<Utc>,
  },

  #[error("invalid range: {0}")]
  InvalidRange(String),

  #[error("result has {rows} rows, more than the limit of {limit}")]
  ResultTooLarge { rows: usize, limit: usize },

  #[error("duplicate station: {0}")]
  DuplicateStation(String),

  #[error("invalid station {station_id}: {reason}")]
  InvalidStation { station_id: String, reason: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Build an [`Error::InvalidRange`] for a span that exceeds `max`.
  pub fn span_too_wide(span: TimeDelta, max: TimeDelta) -> Self {
    Self::InvalidRange(format!(
      "span of {}s exceeds the maximum of {}s",
      span.num_seconds(),
      max.num_seconds()
    ))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
