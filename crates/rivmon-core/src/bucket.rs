//! Granularities and rollup buckets.
//!
//! All alignment is in UTC. Weeks start on Monday; months and years start on
//! their first day at midnight.

use chrono::{DateTime, Datelike, NaiveTime, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::reading::Reading;

// ─── Granularity ─────────────────────────────────────────────────────────────

/// A time resolution. `Raw` addresses the unaggregated log; the other six
/// address rollup buckets.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Granularity {
  Raw,
  Minute,
  Hour,
  Day,
  Week,
  Month,
  Year,
}

impl Granularity {
  /// The granularities maintained by the rollup engine, finest first.
  pub const ROLLUPS: [Granularity; 6] = [
    Self::Minute,
    Self::Hour,
    Self::Day,
    Self::Week,
    Self::Month,
    Self::Year,
  ];

  pub fn is_raw(self) -> bool { matches!(self, Self::Raw) }

  /// Floor-align `ts` to the start of the period containing it.
  /// `Raw` is the identity.
  pub fn floor(self, ts: DateTime<Utc>) -> DateTime<Utc> {
    let sub_second = TimeDelta::nanoseconds(i64::from(ts.nanosecond()));
    match self {
      Self::Raw => ts,
      Self::Minute => {
        ts - TimeDelta::seconds(i64::from(ts.second())) - sub_second
      }
      Self::Hour => {
        ts - TimeDelta::seconds(i64::from(ts.minute() * 60 + ts.second()))
          - sub_second
      }
      Self::Day => midnight(ts),
      Self::Week => {
        let back = ts.weekday().num_days_from_monday();
        midnight(ts) - TimeDelta::days(i64::from(back))
      }
      Self::Month => midnight(ts) - TimeDelta::days(i64::from(ts.day0())),
      Self::Year => midnight(ts) - TimeDelta::days(i64::from(ts.ordinal0())),
    }
  }

  /// The exclusive end of the period starting at `start`, which must already
  /// be aligned. `Raw` periods are zero-length.
  pub fn period_end(self, start: DateTime<Utc>) -> DateTime<Utc> {
    match self {
      Self::Raw => start,
      Self::Minute => start + TimeDelta::minutes(1),
      Self::Hour => start + TimeDelta::hours(1),
      Self::Day => start + TimeDelta::days(1),
      Self::Week => start + TimeDelta::weeks(1),
      // Overshoot into the next period, then align back.
      Self::Month => Self::Month.floor(start + TimeDelta::days(32)),
      Self::Year => Self::Year.floor(start + TimeDelta::days(366)),
    }
  }
}

fn midnight(ts: DateTime<Utc>) -> DateTime<Utc> {
  ts.date_naive().and_time(NaiveTime::default()).and_utc()
}

// ─── Bucket ──────────────────────────────────────────────────────────────────

/// One rollup cell: the aggregate of every reading for a (station, metric)
/// pair whose timestamp falls inside `[bucket_start, period_end)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
  pub station_id:   String,
  pub metric:       String,
  pub granularity:  Granularity,
  pub bucket_start: DateTime<Utc>,
  pub count:        u64,
  pub sum:          f64,
  pub min:          f64,
  pub max:          f64,
  /// Value of the most recently arrived reading.
  pub last:         f64,
  /// Timestamp of the reading that set `last`.
  pub last_at:      DateTime<Utc>,
  /// Set once the period plus the lateness tolerance has elapsed.
  pub sealed:       bool,
}

impl Bucket {
  /// Open a bucket seeded from its first reading.
  pub fn open(
    station_id: &str,
    metric: &str,
    granularity: Granularity,
    reading: &Reading,
  ) -> Self {
    Self {
      station_id: station_id.to_owned(),
      metric: metric.to_owned(),
      granularity,
      bucket_start: granularity.floor(reading.timestamp),
      count: 1,
      sum: reading.value,
      min: reading.value,
      max: reading.value,
      last: reading.value,
      last_at: reading.timestamp,
      sealed: false,
    }
  }

  /// Fold another reading into the aggregate. Arrival order decides `last`.
  pub fn absorb(&mut self, reading: &Reading) {
    debug_assert!(!self.sealed, "absorb into sealed bucket");
    self.count += 1;
    self.sum += reading.value;
    self.min = self.min.min(reading.value);
    self.max = self.max.max(reading.value);
    self.last = reading.value;
    self.last_at = reading.timestamp;
  }

  pub fn period_end(&self) -> DateTime<Utc> {
    self.granularity.period_end(self.bucket_start)
  }

  pub fn mean(&self) -> f64 { self.sum / self.count as f64 }
}
