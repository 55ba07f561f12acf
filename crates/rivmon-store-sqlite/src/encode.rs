//! Encoding and decoding helpers between domain types and SQLite columns.
//!
//! Bucket boundaries are unix seconds so range deletes can use an index;
//! `last_at` keeps full precision as an RFC 3339 string.

use chrono::{DateTime, Utc};
use rivmon_core::bucket::{Bucket, Granularity};

use crate::{Error, Result};

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_epoch(secs: i64) -> Result<DateTime<Utc>> {
  DateTime::from_timestamp(secs, 0)
    .ok_or_else(|| Error::DateParse(format!("timestamp out of range: {secs}")))
}

pub fn encode_granularity(g: Granularity) -> &'static str { g.into() }

pub fn decode_granularity(s: &str) -> Result<Granularity> {
  s.parse().map_err(|_| Error::Granularity(s.to_owned()))
}

/// Column values of one `buckets` row, bound in schema order.
pub struct RawBucket {
  pub station_id:   String,
  pub metric:       String,
  pub granularity:  String,
  pub bucket_start: i64,
  pub bucket_end:   i64,
  pub count:        i64,
  pub sum:          f64,
  pub min:          f64,
  pub max:          f64,
  pub last:         f64,
  pub last_at:      String,
  pub sealed:       bool,
}

impl RawBucket {
  pub fn from_bucket(b: &Bucket) -> Self {
    Self {
      station_id:   b.station_id.clone(),
      metric:       b.metric.clone(),
      granularity:  encode_granularity(b.granularity).to_owned(),
      bucket_start: b.bucket_start.timestamp(),
      bucket_end:   b.period_end().timestamp(),
      count:        b.count as i64,
      sum:          b.sum,
      min:          b.min,
      max:          b.max,
      last:         b.last,
      last_at:      encode_dt(b.last_at),
      sealed:       b.sealed,
    }
  }

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      station_id:   row.get(0)?,
      metric:       row.get(1)?,
      granularity:  row.get(2)?,
      bucket_start: row.get(3)?,
      bucket_end:   row.get(4)?,
      count:        row.get(5)?,
      sum:          row.get(6)?,
      min:          row.get(7)?,
      max:          row.get(8)?,
      last:         row.get(9)?,
      last_at:      row.get(10)?,
      sealed:       row.get(11)?,
    })
  }

  pub fn into_bucket(self) -> Result<Bucket> {
    let bucket = Bucket {
      station_id:   self.station_id,
      metric:       self.metric,
      granularity:  decode_granularity(&self.granularity)?,
      bucket_start: decode_epoch(self.bucket_start)?,
      count:        self.count as u64,
      sum:          self.sum,
      min:          self.min,
      max:          self.max,
      last:         self.last,
      last_at:      decode_dt(&self.last_at)?,
      sealed:       self.sealed,
    };
    debug_assert_eq!(bucket.period_end().timestamp(), self.bucket_end);
    Ok(bucket)
  }
}
