//! Tunable limits: retention horizons per granularity and query bounds.

use chrono::{DateTime, TimeDelta, Utc};

use crate::bucket::Granularity;

/// How long data of each granularity is kept. `None` keeps it indefinitely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
  pub raw:    Option<TimeDelta>,
  pub minute: Option<TimeDelta>,
  pub hour:   Option<TimeDelta>,
  pub day:    Option<TimeDelta>,
  pub week:   Option<TimeDelta>,
  pub month:  Option<TimeDelta>,
  pub year:   Option<TimeDelta>,
}

impl Default for RetentionPolicy {
  fn default() -> Self {
    Self {
      raw:    Some(TimeDelta::days(7)),
      minute: Some(TimeDelta::days(30)),
      hour:   Some(TimeDelta::days(365)),
      day:    None,
      week:   None,
      month:  None,
      year:   None,
    }
  }
}

impl RetentionPolicy {
  pub fn horizon(&self, granularity: Granularity) -> Option<TimeDelta> {
    match granularity {
      Granularity::Raw => self.raw,
      Granularity::Minute => self.minute,
      Granularity::Hour => self.hour,
      Granularity::Day => self.day,
      Granularity::Week => self.week,
      Granularity::Month => self.month,
      Granularity::Year => self.year,
    }
  }

  /// Data of `granularity` whose period ended before the returned instant is
  /// eligible for pruning at `now`.
  pub fn cutoff(
    &self,
    granularity: Granularity,
    now: DateTime<Utc>,
  ) -> Option<DateTime<Utc>> {
    self.horizon(granularity).map(|h| now - h)
  }
}

/// Service-wide bounds on ingest and query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
  /// Widest `end - start` a query may request.
  pub max_query_span:     TimeDelta,
  /// Most rows a single query may return.
  pub max_query_rows:     usize,
  /// How long after a period ends readings for it may still arrive.
  pub lateness_tolerance: TimeDelta,
  /// Bounded wait for a cell lock during pruning before deferring.
  pub prune_lock_timeout: std::time::Duration,
}

impl Default for Limits {
  fn default() -> Self {
    Self {
      max_query_span:     TimeDelta::days(7),
      max_query_rows:     1000,
      lateness_tolerance: TimeDelta::minutes(5),
      prune_lock_timeout: std::time::Duration::from_millis(250),
    }
  }
}
