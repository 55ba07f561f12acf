//! Range-query request and response shapes shared by the engine, the REST
//! API and its clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  bucket::{Bucket, Granularity},
  reading::{Reading, ReadingReason},
};

/// Parameters of a range query. The range is half-open: `[start, end)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
  pub station_id:  String,
  pub metric:      String,
  pub granularity: Granularity,
  pub start:       DateTime<Utc>,
  pub end:         DateTime<Utc>,
}

/// A raw reading as returned by a `raw` query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
  pub timestamp: DateTime<Utc>,
  pub value:     f64,
  pub reason:    ReadingReason,
}

impl From<&Reading> for RawRow {
  fn from(r: &Reading) -> Self {
    Self {
      timestamp: r.timestamp,
      value:     r.value,
      reason:    r.reason,
    }
  }
}

/// An aggregate row as returned by a rollup query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketRow {
  pub bucket_start: DateTime<Utc>,
  pub count:        u64,
  pub sum:          f64,
  pub min:          f64,
  pub max:          f64,
  pub last:         f64,
  pub sealed:       bool,
}

impl From<Bucket> for BucketRow {
  fn from(b: Bucket) -> Self {
    Self {
      bucket_start: b.bucket_start,
      count:        b.count,
      sum:          b.sum,
      min:          b.min,
      max:          b.max,
      last:         b.last,
      sealed:       b.sealed,
    }
  }
}

/// One result row; the shape depends on the requested granularity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Row {
  Bucket(BucketRow),
  Raw(RawRow),
}

impl Row {
  /// The row's ordering key: `bucketStart` or `timestamp`.
  pub fn time_key(&self) -> DateTime<Utc> {
    match self {
      Self::Bucket(b) => b.bucket_start,
      Self::Raw(r) => r.timestamp,
    }
  }
}

/// The answer to a [`QueryRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
  pub station_id:  String,
  pub metric:      String,
  pub granularity: Granularity,
  /// Ascending by time key.
  pub rows:        Vec<Row>,
  /// Accepted readings for the pair not yet reflected in rollup rows.
  pub pending:     u64,
}
