//! The `BucketArchive` trait: durable storage for rollup buckets.
//!
//! The trait is implemented by storage backends (e.g. `rivmon-store-sqlite`).
//! The engine keeps every live bucket in memory; the archive exists so sealed
//! buckets, and open buckets checkpointed at shutdown, survive a restart.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::bucket::{Bucket, Granularity};

/// Abstraction over a bucket archive backend.
///
/// Writes replace by (station, metric, granularity, start): archiving a
/// bucket already present overwrites it, so a sealed bucket supersedes its
/// open checkpoint and re-archiving is idempotent.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait BucketArchive: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist buckets, keeping each one's `sealed` flag.
  fn store(
    &self,
    buckets: Vec<Bucket>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Load every archived bucket, in no particular order.
  fn load_all(
    &self,
  ) -> impl Future<Output = Result<Vec<Bucket>, Self::Error>> + Send + '_;

  /// Delete buckets of `granularity` whose period ended before `cutoff`.
  /// Returns the number of rows removed.
  fn prune(
    &self,
    granularity: Granularity,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}
