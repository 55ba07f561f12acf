//! The ingest buffer: one append-only raw log per (station, metric) pair.
//!
//! The raw log doubles as the rollup queue. Each log keeps a cursor of the
//! readings already folded into buckets, so ingest never waits on rollup and
//! there is no second queue to grow without bound.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rivmon_core::{
  Error, Result,
  reading::{IngestReceipt, NewReading, Reading},
};
use uuid::Uuid;

use crate::registry::StationRegistry;

// ─── Keys ────────────────────────────────────────────────────────────────────

/// Identifies one raw log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
  pub station_id: String,
  pub metric:     String,
}

impl PairKey {
  pub fn new(station_id: impl Into<String>, metric: impl Into<String>) -> Self {
    Self {
      station_id: station_id.into(),
      metric:     metric.into(),
    }
  }
}

// ─── Raw log ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub(crate) struct RawLog {
  readings:       VecDeque<Reading>,
  next_sequence:  u64,
  /// Readings with `sequence < rolled_through` have been folded.
  rolled_through: u64,
  last_accepted:  Option<DateTime<Utc>>,
}

impl RawLog {
  fn append(&mut self, new: &NewReading) -> Reading {
    let reading = Reading {
      sequence:  self.next_sequence,
      timestamp: new.timestamp,
      value:     new.value,
      reason:    new.reason,
    };
    self.next_sequence += 1;
    self.last_accepted = Some(new.timestamp);
    self.readings.push_back(reading.clone());
    reading
  }

  pub(crate) fn len(&self) -> usize { self.readings.len() }

  pub(crate) fn pending(&self) -> u64 {
    self.next_sequence - self.rolled_through
  }

  /// Readings not yet folded, in arrival order.
  pub(crate) fn unrolled(&self) -> Vec<Reading> {
    // Only rolled readings are ever pruned, so every unrolled reading is
    // still in the deque, and it sits at the tail.
    let pending = self.pending() as usize;
    self
      .readings
      .iter()
      .skip(self.readings.len().saturating_sub(pending))
      .cloned()
      .collect()
  }

  pub(crate) fn mark_rolled(&mut self, through: u64) {
    self.rolled_through = self.rolled_through.max(through);
  }

  /// Readings with timestamps in `[start, end)`, in stored order.
  pub(crate) fn range(
    &self,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
  ) -> impl Iterator<Item = &Reading> {
    let lo = self.readings.partition_point(|r| r.timestamp < start);
    let hi = self.readings.partition_point(|r| r.timestamp < end);
    self.readings.range(lo..hi.max(lo))
  }

  /// Drop rolled-up readings older than `cutoff`. Returns how many went.
  fn prune(&mut self, cutoff: DateTime<Utc>) -> usize {
    let mut removed = 0;
    while let Some(front) = self.readings.front() {
      if front.timestamp >= cutoff || front.sequence >= self.rolled_through {
        break;
      }
      self.readings.pop_front();
      removed += 1;
    }
    removed
  }
}

// ─── Buffer ──────────────────────────────────────────────────────────────────

/// Outcome of pruning the raw logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawPrune {
  pub removed:  usize,
  /// Logs skipped because their lock could not be taken in time.
  pub deferred: usize,
}

/// Validates and appends readings. Writers to different pairs never contend;
/// writers to the same pair serialise on that pair's log.
pub struct IngestBuffer {
  registry: Arc<StationRegistry>,
  logs:     DashMap<PairKey, Arc<Mutex<RawLog>>>,
}

impl IngestBuffer {
  pub fn new(registry: Arc<StationRegistry>) -> Self {
    Self {
      registry,
      logs: DashMap::new(),
    }
  }

  pub fn registry(&self) -> &StationRegistry { &self.registry }

  /// Validate and append a reading.
  ///
  /// Readings older than the horizon returned by `late_before` are refused
  /// even when they are in order, since the buckets they belong to may
  /// already be sealed. The horizon is read while the pair's log is locked,
  /// so a rollup sweep that snapshots the log first has read its seal time
  /// no later than this horizon's clock reading.
  pub fn ingest(
    &self,
    new: &NewReading,
    late_before: impl FnOnce() -> DateTime<Utc>,
  ) -> Result<IngestReceipt> {
    self.registry.check_metric(&new.station_id, &new.metric)?;

    let key = PairKey::new(&new.station_id, &new.metric);
    let log = self.log_or_create(key);
    let mut log = log.lock();

    if let Some(last_accepted) = log.last_accepted
      && new.timestamp < last_accepted
    {
      return Err(Error::OutOfOrder {
        station_id: new.station_id.clone(),
        metric: new.metric.clone(),
        timestamp: new.timestamp,
        last_accepted,
      });
    }
    let horizon = late_before();
    if new.timestamp < horizon {
      return Err(Error::LateReading {
        station_id: new.station_id.clone(),
        metric: new.metric.clone(),
        timestamp: new.timestamp,
        horizon,
      });
    }

    let reading = log.append(new);
    Ok(IngestReceipt {
      token:      Uuid::new_v4(),
      station_id: new.station_id.clone(),
      metric:     new.metric.clone(),
      sequence:   reading.sequence,
      timestamp:  reading.timestamp,
    })
  }

  fn log_or_create(&self, key: PairKey) -> Arc<Mutex<RawLog>> {
    // Clone the handle out so the shard lock is released before the log
    // lock is taken.
    self.logs.entry(key).or_default().value().clone()
  }

  pub(crate) fn log(&self, key: &PairKey) -> Option<Arc<Mutex<RawLog>>> {
    self.logs.get(key).map(|entry| entry.value().clone())
  }

  /// A point-in-time list of every log.
  pub(crate) fn logs(&self) -> Vec<(PairKey, Arc<Mutex<RawLog>>)> {
    self
      .logs
      .iter()
      .map(|entry| (entry.key().clone(), entry.value().clone()))
      .collect()
  }

  /// Number of readings currently retained for `key`.
  pub fn len(&self, key: &PairKey) -> usize {
    self.log(key).map_or(0, |log| log.lock().len())
  }

  /// Number of accepted readings for `key` not yet folded into buckets.
  pub fn pending(&self, key: &PairKey) -> u64 {
    self.log(key).map_or(0, |log| log.lock().pending())
  }

  pub fn total_pending(&self) -> u64 {
    self.logs().iter().map(|(_, log)| log.lock().pending()).sum()
  }

  pub fn last_accepted(&self, key: &PairKey) -> Option<DateTime<Utc>> {
    self.log(key).and_then(|log| log.lock().last_accepted)
  }

  /// Raise the ordering watermark for `key` to at least `at`. Used when
  /// rehydrating from the archive after a restart.
  pub fn restore_watermark(&self, key: PairKey, at: DateTime<Utc>) {
    let log = self.log_or_create(key);
    let mut log = log.lock();
    log.last_accepted = Some(log.last_accepted.map_or(at, |prev| prev.max(at)));
  }

  /// Remove rolled-up readings older than `cutoff` from every log.
  pub fn prune(&self, cutoff: DateTime<Utc>, lock_timeout: Duration) -> RawPrune {
    let mut outcome = RawPrune::default();
    for (key, log) in self.logs() {
      match log.try_lock_for(lock_timeout) {
        Some(mut log) => outcome.removed += log.prune(cutoff),
        None => {
          tracing::warn!(
            station_id = %key.station_id,
            metric = %key.metric,
            "raw log busy; deferring prune to next cycle"
          );
          outcome.deferred += 1;
        }
      }
    }
    outcome
  }
}
