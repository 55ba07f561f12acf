//! The rollup engine: an arena of independently lockable bucket cells.
//!
//! Cells are grouped into series, one per (station, metric, granularity).
//! A series holds an ordered index from bucket start to cell handle. The
//! index lock is taken only to find, create or remove a cell; folding a
//! reading into an existing cell takes that cell's lock alone.

use std::{
  collections::{BTreeMap, btree_map::Entry},
  sync::Arc,
  time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use rivmon_core::{
  Error, Result,
  bucket::{Bucket, Granularity},
  policy::RetentionPolicy,
  reading::Reading,
};

use crate::ingest::PairKey;

// ─── Cells ───────────────────────────────────────────────────────────────────

/// Identifies one series of cells.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
  pub station_id:  String,
  pub metric:      String,
  pub granularity: Granularity,
}

impl SeriesKey {
  pub fn new(pair: &PairKey, granularity: Granularity) -> Self {
    Self {
      station_id: pair.station_id.clone(),
      metric: pair.metric.clone(),
      granularity,
    }
  }

  fn of(bucket: &Bucket) -> Self {
    Self {
      station_id:  bucket.station_id.clone(),
      metric:      bucket.metric.clone(),
      granularity: bucket.granularity,
    }
  }
}

#[derive(Debug)]
struct Cell {
  bucket:   Bucket,
  archived: bool,
  /// Set by retention under the cell's write lock just before the cell is
  /// unlinked. A writer that finds it set must re-resolve the cell.
  evicted:  bool,
}

type CellHandle = Arc<RwLock<Cell>>;

#[derive(Debug, Default)]
struct Series {
  cells: RwLock<BTreeMap<DateTime<Utc>, CellHandle>>,
}

impl Series {
  /// Handles for cells starting in `[start, end)`, in order.
  fn handles(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<CellHandle> {
    if start >= end {
      return Vec::new();
    }
    self.cells.read().range(start..end).map(|(_, h)| h.clone()).collect()
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Counts from one bucket-retention pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketPrune {
  pub removed:  usize,
  pub deferred: usize,
}

/// Owns every bucket. Nothing outside this type mutates bucket state.
#[derive(Default)]
pub struct RollupEngine {
  series: DashMap<SeriesKey, Arc<Series>>,
}

impl RollupEngine {
  pub fn new() -> Self { Self::default() }

  /// Fold one reading into every rollup granularity.
  pub fn apply(&self, pair: &PairKey, reading: &Reading) {
    for granularity in Granularity::ROLLUPS {
      self.apply_one(pair, granularity, reading);
    }
  }

  fn apply_one(&self, pair: &PairKey, granularity: Granularity, reading: &Reading) {
    let series = self.series_or_create(SeriesKey::new(pair, granularity));
    let start = granularity.floor(reading.timestamp);

    loop {
      let existing = series.cells.read().get(&start).cloned();
      let handle = match existing {
        Some(handle) => handle,
        None => {
          let mut cells = series.cells.write();
          match cells.entry(start) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
              let bucket = Bucket::open(
                &pair.station_id,
                &pair.metric,
                granularity,
                reading,
              );
              entry.insert(Arc::new(RwLock::new(Cell {
                bucket,
                archived: false,
                evicted: false,
              })));
              return;
            }
          }
        }
      };

      let mut cell = handle.write();
      if cell.evicted {
        // Pruned between lookup and lock; the index no longer holds it.
        continue;
      }
      if cell.bucket.sealed {
        tracing::warn!(
          station_id = %pair.station_id,
          metric = %pair.metric,
          %granularity,
          bucket_start = %start,
          "reading arrived for a sealed bucket; not folded"
        );
        return;
      }
      cell.bucket.absorb(reading);
      return;
    }
  }

  fn series_or_create(&self, key: SeriesKey) -> Arc<Series> {
    self.series.entry(key).or_default().value().clone()
  }

  fn series(&self, key: &SeriesKey) -> Option<Arc<Series>> {
    self.series.get(key).map(|entry| entry.value().clone())
  }

  fn all_series(&self) -> Vec<(SeriesKey, Arc<Series>)> {
    self
      .series
      .iter()
      .map(|entry| (entry.key().clone(), entry.value().clone()))
      .collect()
  }

  /// Copies of the buckets starting in `[start, end)`, ascending. Fails with
  /// [`Error::ResultTooLarge`] rather than truncating.
  pub fn range(
    &self,
    key: &SeriesKey,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    max_rows: usize,
  ) -> Result<Vec<Bucket>> {
    let Some(series) = self.series(key) else {
      return Ok(Vec::new());
    };
    let handles = series.handles(start, end);
    if handles.len() > max_rows {
      return Err(Error::ResultTooLarge {
        rows:  handles.len(),
        limit: max_rows,
      });
    }
    Ok(
      handles
        .iter()
        .filter_map(|handle| {
          let cell = handle.read();
          (!cell.evicted).then(|| cell.bucket.clone())
        })
        .collect(),
    )
  }

  /// Look up a single bucket.
  pub fn get(&self, key: &SeriesKey, bucket_start: DateTime<Utc>) -> Option<Bucket> {
    let series = self.series(key)?;
    let handle = series.cells.read().get(&bucket_start).cloned()?;
    let cell = handle.read();
    (!cell.evicted).then(|| cell.bucket.clone())
  }

  /// Seal every bucket whose period plus `lateness` has elapsed at `now`.
  ///
  /// Returns the number newly sealed, and copies of all sealed buckets not
  /// yet archived (including ones whose earlier archive attempt failed).
  pub fn seal_elapsed(
    &self,
    now: DateTime<Utc>,
    lateness: TimeDelta,
  ) -> (usize, Vec<Bucket>) {
    let mut newly_sealed = 0;
    let mut unarchived = Vec::new();

    for (_, series) in self.all_series() {
      let handles: Vec<CellHandle> = series.cells.read().values().cloned().collect();
      for handle in handles {
        if handle.read().archived {
          continue;
        }
        let mut cell = handle.write();
        if cell.evicted {
          continue;
        }
        if !cell.bucket.sealed && cell.bucket.period_end() + lateness <= now {
          cell.bucket.sealed = true;
          newly_sealed += 1;
        }
        if cell.bucket.sealed && !cell.archived {
          unarchived.push(cell.bucket.clone());
        }
      }
    }
    (newly_sealed, unarchived)
  }

  /// Record that `buckets` reached the archive.
  pub fn mark_archived(&self, buckets: &[Bucket]) {
    for bucket in buckets {
      let Some(series) = self.series(&SeriesKey::of(bucket)) else {
        continue;
      };
      let handle = series.cells.read().get(&bucket.bucket_start).cloned();
      if let Some(handle) = handle {
        handle.write().archived = true;
      }
    }
  }

  /// Install buckets loaded from the archive; an existing in-memory cell for
  /// the same start wins.
  ///
  /// Sealed buckets come back archived. Checkpointed open buckets come back
  /// open and unarchived, so they keep absorbing and are archived again once
  /// sealed.
  pub fn hydrate(&self, buckets: Vec<Bucket>) -> usize {
    let mut installed = 0;
    for bucket in buckets {
      let series = self.series_or_create(SeriesKey::of(&bucket));
      let mut cells = series.cells.write();
      if let Entry::Vacant(entry) = cells.entry(bucket.bucket_start) {
        let archived = bucket.sealed;
        entry.insert(Arc::new(RwLock::new(Cell {
          bucket,
          archived,
          evicted: false,
        })));
        installed += 1;
      }
    }
    installed
  }

  /// Copies of every bucket not yet sealed.
  pub fn open_buckets(&self) -> Vec<Bucket> {
    let mut open = Vec::new();
    for (_, series) in self.all_series() {
      let handles: Vec<CellHandle> = series.cells.read().values().cloned().collect();
      for handle in handles {
        let cell = handle.read();
        if !cell.evicted && !cell.bucket.sealed {
          open.push(cell.bucket.clone());
        }
      }
    }
    open
  }

  /// Remove buckets whose period ended before their granularity's cutoff.
  ///
  /// Each cell is taken under its write lock, waiting at most `lock_timeout`;
  /// cells that stay busy are left for the next cycle.
  pub fn prune(
    &self,
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
    lock_timeout: Duration,
  ) -> BucketPrune {
    let mut outcome = BucketPrune::default();

    for (key, series) in self.all_series() {
      let Some(cutoff) = policy.cutoff(key.granularity, now) else {
        continue;
      };
      let mut cells = series.cells.write();
      let expired: Vec<DateTime<Utc>> = cells
        .keys()
        .take_while(|start| key.granularity.period_end(**start) < cutoff)
        .copied()
        .collect();

      for start in expired {
        let Some(handle) = cells.get(&start).cloned() else {
          continue;
        };
        match handle.try_write_for(lock_timeout) {
          Some(mut cell) => {
            cell.evicted = true;
            drop(cell);
            cells.remove(&start);
            outcome.removed += 1;
          }
          None => {
            tracing::warn!(
              station_id = %key.station_id,
              metric = %key.metric,
              granularity = %key.granularity,
              bucket_start = %start,
              "bucket busy; deferring prune to next cycle"
            );
            outcome.deferred += 1;
          }
        }
      }
    }
    outcome
  }

  /// Total live cells across all series.
  pub fn bucket_count(&self) -> usize {
    self
      .all_series()
      .iter()
      .map(|(_, series)| series.cells.read().len())
      .sum()
  }
}

#[cfg(test)]
mod tests {
  use rivmon_core::reading::ReadingReason;

  use super::*;

  fn at(s: &str) -> DateTime<Utc> { s.parse().unwrap() }

  fn reading(sequence: u64, ts: &str, value: f64) -> Reading {
    Reading {
      sequence,
      timestamp: at(ts),
      value,
      reason: ReadingReason::RecordedByTime,
    }
  }

  fn pair() -> PairKey { PairKey::new("ds-001", "discharge") }

  #[test]
  fn apply_populates_all_granularities() {
    let engine = RollupEngine::new();
    engine.apply(&pair(), &reading(0, "2026-01-13T02:02:54Z", 12.5));

    assert_eq!(engine.bucket_count(), 6);
    let week = engine
      .get(
        &SeriesKey::new(&pair(), Granularity::Week),
        at("2026-01-12T00:00:00Z"),
      )
      .unwrap();
    assert_eq!(week.count, 1);
    assert_eq!(week.last, 12.5);
  }

  #[test]
  fn readings_in_one_period_share_a_bucket() {
    let engine = RollupEngine::new();
    engine.apply(&pair(), &reading(0, "2026-01-13T02:00:10Z", 1.0));
    engine.apply(&pair(), &reading(1, "2026-01-13T02:00:50Z", 3.0));
    engine.apply(&pair(), &reading(2, "2026-01-13T02:01:00Z", 2.0));

    let key = SeriesKey::new(&pair(), Granularity::Minute);
    let rows = engine
      .range(&key, at("2026-01-13T02:00:00Z"), at("2026-01-13T03:00:00Z"), 10)
      .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!((rows[0].count, rows[0].sum, rows[0].last), (2, 4.0, 3.0));
    assert_eq!(rows[1].count, 1);
  }

  #[test]
  fn range_refuses_to_truncate() {
    let engine = RollupEngine::new();
    for i in 0..5 {
      let ts = format!("2026-01-13T02:0{i}:00Z");
      engine.apply(&pair(), &reading(i, &ts, 1.0));
    }
    let key = SeriesKey::new(&pair(), Granularity::Minute);
    let err = engine
      .range(&key, at("2026-01-13T02:00:00Z"), at("2026-01-13T03:00:00Z"), 4)
      .unwrap_err();
    assert!(matches!(err, Error::ResultTooLarge { rows: 5, limit: 4 }));
  }

  #[test]
  fn sealing_waits_for_lateness_and_reports_unarchived() {
    let engine = RollupEngine::new();
    engine.apply(&pair(), &reading(0, "2026-01-13T02:00:30Z", 1.0));

    let lateness = TimeDelta::minutes(5);
    let (sealed, _) = engine.seal_elapsed(at("2026-01-13T02:05:59Z"), lateness);
    assert_eq!(sealed, 0);

    let (sealed, unarchived) =
      engine.seal_elapsed(at("2026-01-13T02:06:00Z"), lateness);
    assert_eq!(sealed, 1);
    assert_eq!(unarchived.len(), 1);
    assert_eq!(unarchived[0].granularity, Granularity::Minute);

    // Not archived yet: reported again, but not re-counted.
    let (sealed, unarchived) =
      engine.seal_elapsed(at("2026-01-13T02:07:00Z"), lateness);
    assert_eq!((sealed, unarchived.len()), (0, 1));

    engine.mark_archived(&unarchived);
    let (_, unarchived) = engine.seal_elapsed(at("2026-01-13T02:08:00Z"), lateness);
    assert!(unarchived.is_empty());
  }

  #[test]
  fn prune_is_idempotent() {
    let engine = RollupEngine::new();
    engine.apply(&pair(), &reading(0, "2026-01-01T00:00:00Z", 1.0));
    engine.apply(&pair(), &reading(1, "2026-03-01T00:00:00Z", 2.0));

    let policy = RetentionPolicy::default();
    let now = at("2026-03-01T00:10:00Z");
    let timeout = Duration::from_millis(10);

    let first = engine.prune(&policy, now, timeout);
    // January's minute bucket is past the 30-day minute horizon.
    assert_eq!(first, BucketPrune { removed: 1, deferred: 0 });
    let remaining = engine.bucket_count();

    let second = engine.prune(&policy, now, timeout);
    assert_eq!(second, BucketPrune::default());
    assert_eq!(engine.bucket_count(), remaining);
  }

  #[test]
  fn prune_defers_busy_cells() {
    let engine = RollupEngine::new();
    engine.apply(&pair(), &reading(0, "2026-01-01T00:00:00Z", 1.0));

    let key = SeriesKey::new(&pair(), Granularity::Minute);
    let series = engine.series(&key).unwrap();
    let handle = series.cells.read().values().next().cloned().unwrap();
    let guard = handle.read();

    let outcome = engine.prune(
      &RetentionPolicy::default(),
      at("2026-06-01T00:00:00Z"),
      Duration::from_millis(5),
    );
    assert_eq!(outcome.deferred, 1);
    drop(guard);

    let outcome = engine.prune(
      &RetentionPolicy::default(),
      at("2026-06-01T00:00:00Z"),
      Duration::from_millis(5),
    );
    assert_eq!(outcome.removed, 1);
  }

  #[test]
  fn writer_holding_an_evicted_cell_re_resolves() {
    let engine = RollupEngine::new();
    engine.apply(&pair(), &reading(0, "2026-01-01T00:00:00Z", 1.0));

    // Simulate a writer that resolved the handle before retention ran.
    let key = SeriesKey::new(&pair(), Granularity::Minute);
    let series = engine.series(&key).unwrap();
    let stale = series.cells.read().values().next().cloned().unwrap();

    engine.prune(
      &RetentionPolicy::default(),
      at("2026-06-01T00:00:00Z"),
      Duration::from_millis(5),
    );
    assert!(stale.read().evicted);

    engine.apply(&pair(), &reading(1, "2026-01-01T00:00:20Z", 4.0));
    let fresh = engine.get(&key, at("2026-01-01T00:00:00Z")).unwrap();
    assert_eq!((fresh.count, fresh.sum), (1, 4.0));
    assert_eq!(stale.read().bucket.count, 1);
  }

  #[test]
  fn hydrate_installs_sealed_buckets_without_overwriting() {
    let engine = RollupEngine::new();
    engine.apply(&pair(), &reading(0, "2026-01-13T02:00:00Z", 1.0));

    let sealed = |ts: &str, value: f64| {
      let mut bucket = Bucket::open(
        "ds-001",
        "discharge",
        Granularity::Minute,
        &reading(0, ts, value),
      );
      bucket.sealed = true;
      bucket
    };
    let mut archived = sealed("2026-01-13T02:00:00Z", 99.0);
    archived.count = 42;
    let other = sealed("2026-01-13T01:00:00Z", 7.0);

    let installed = engine.hydrate(vec![archived, other]);
    assert_eq!(installed, 1);

    let key = SeriesKey::new(&pair(), Granularity::Minute);
    let live = engine.get(&key, at("2026-01-13T02:00:00Z")).unwrap();
    assert_eq!(live.count, 1);
    let restored = engine.get(&key, at("2026-01-13T01:00:00Z")).unwrap();
    assert!(restored.sealed);

    // Already archived: not reported again.
    let (_, unarchived) =
      engine.seal_elapsed(at("2026-01-13T01:30:00Z"), TimeDelta::minutes(5));
    assert!(unarchived.is_empty());
  }

  #[test]
  fn hydrated_open_bucket_keeps_absorbing_and_reseals() {
    let engine = RollupEngine::new();
    let checkpoint = Bucket::open(
      "ds-001",
      "discharge",
      Granularity::Hour,
      &reading(0, "2026-01-13T02:10:00Z", 2.0),
    );
    assert_eq!(engine.hydrate(vec![checkpoint]), 1);
    assert_eq!(engine.open_buckets().len(), 1);

    engine.apply(&pair(), &reading(0, "2026-01-13T02:40:00Z", 5.0));
    let key = SeriesKey::new(&pair(), Granularity::Hour);
    let hour = engine.get(&key, at("2026-01-13T02:00:00Z")).unwrap();
    assert_eq!((hour.count, hour.sum, hour.last), (2, 7.0, 5.0));

    let (_, unarchived) =
      engine.seal_elapsed(at("2026-01-13T03:05:00Z"), TimeDelta::minutes(5));
    let hours: Vec<_> = unarchived
      .iter()
      .filter(|b| b.granularity == Granularity::Hour)
      .collect();
    assert_eq!(hours.len(), 1);
    assert!(hours[0].sealed);
    assert_eq!(hours[0].count, 2);
  }
}
