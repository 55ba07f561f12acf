//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{DateTime, TimeDelta, Utc};
use rivmon_core::{
  archive::BucketArchive,
  bucket::{Bucket, Granularity},
  reading::{Reading, ReadingReason},
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn at(s: &str) -> DateTime<Utc> { s.parse().unwrap() }

fn bucket(granularity: Granularity, ts: &str, values: &[f64]) -> Bucket {
  let reading = |i: usize, value: f64| Reading {
    sequence: i as u64,
    timestamp: at(ts) + TimeDelta::milliseconds(i as i64 * 250),
    value,
    reason: ReadingReason::RecordedByTime,
  };
  let mut b = Bucket::open("ds-001", "discharge", granularity, &reading(0, values[0]));
  for (i, v) in values.iter().enumerate().skip(1) {
    b.absorb(&reading(i, *v));
  }
  b.sealed = true;
  b
}

#[tokio::test]
async fn store_and_load_preserves_aggregates_exactly() {
  let s = store().await;
  let original = bucket(Granularity::Hour, "2026-01-13T02:10:00Z", &[0.1, 0.2, 0.3]);
  s.store(vec![original.clone()]).await.unwrap();

  let loaded = s.load_all().await.unwrap();
  assert_eq!(loaded, vec![original]);
  // 0.1 + 0.2 + 0.3 is not 0.6 in f64; the archive must not round it.
  assert_eq!(loaded[0].sum, 0.1 + 0.2 + 0.3);
  assert_eq!(loaded[0].last_at, at("2026-01-13T02:10:00.5Z"));
}

#[tokio::test]
async fn store_is_idempotent() {
  let s = store().await;
  let b = bucket(Granularity::Minute, "2026-01-13T02:10:00Z", &[1.0, 2.0]);
  s.store(vec![b.clone()]).await.unwrap();
  s.store(vec![b.clone()]).await.unwrap();
  assert_eq!(s.len().await.unwrap(), 1);
}

#[tokio::test]
async fn open_checkpoint_is_superseded_by_sealed_bucket() {
  let s = store().await;
  let mut open = bucket(Granularity::Day, "2026-01-13T02:10:00Z", &[1.0, 2.0]);
  open.sealed = false;
  s.store(vec![open.clone()]).await.unwrap();

  let loaded = s.load_all().await.unwrap();
  assert_eq!(loaded, vec![open]);
  assert!(!loaded[0].sealed);

  let sealed = bucket(Granularity::Day, "2026-01-13T02:10:00Z", &[1.0, 2.0, 3.0]);
  s.store(vec![sealed.clone()]).await.unwrap();
  assert_eq!(s.len().await.unwrap(), 1);
  assert_eq!(s.load_all().await.unwrap(), vec![sealed]);
}

#[tokio::test]
async fn load_all_on_empty_archive() {
  let s = store().await;
  assert!(s.load_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn prune_removes_only_expired_rows_of_one_granularity() {
  let s = store().await;
  s.store(vec![
    bucket(Granularity::Minute, "2026-01-01T00:00:00Z", &[1.0]),
    bucket(Granularity::Minute, "2026-02-01T00:00:00Z", &[1.0]),
    bucket(Granularity::Hour, "2026-01-01T00:00:00Z", &[1.0]),
  ])
  .await
  .unwrap();

  let removed = s
    .prune(Granularity::Minute, at("2026-01-15T00:00:00Z"))
    .await
    .unwrap();
  assert_eq!(removed, 1);
  assert_eq!(s.len().await.unwrap(), 2);

  let again = s
    .prune(Granularity::Minute, at("2026-01-15T00:00:00Z"))
    .await
    .unwrap();
  assert_eq!(again, 0);
}

#[tokio::test]
async fn prune_cutoff_is_exclusive_at_period_end() {
  let s = store().await;
  s.store(vec![bucket(Granularity::Minute, "2026-01-01T00:00:00Z", &[1.0])])
    .await
    .unwrap();

  // Period ends exactly at the cutoff: kept.
  let removed = s
    .prune(Granularity::Minute, at("2026-01-01T00:01:00Z"))
    .await
    .unwrap();
  assert_eq!(removed, 0);

  let removed = s
    .prune(Granularity::Minute, at("2026-01-01T00:01:00.001Z"))
    .await
    .unwrap();
  assert_eq!(removed, 1);
}

#[tokio::test]
async fn month_bucket_end_survives_round_trip() {
  let s = store().await;
  let b = bucket(Granularity::Month, "2024-02-10T00:00:00Z", &[3.0]);
  s.store(vec![b]).await.unwrap();
  let loaded = s.load_all().await.unwrap();
  assert_eq!(loaded[0].bucket_start, at("2024-02-01T00:00:00Z"));
  assert_eq!(loaded[0].period_end(), at("2024-03-01T00:00:00Z"));
}
