//! [`SqliteStore`], the SQLite implementation of [`BucketArchive`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rivmon_core::{
  archive::BucketArchive,
  bucket::{Bucket, Granularity},
};

use crate::{
  Result,
  encode::{RawBucket, encode_granularity},
  schema::SCHEMA,
};

/// A bucket archive backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) an archive at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory archive, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Number of archived rows.
  pub async fn len(&self) -> Result<u64> {
    let n: i64 = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM buckets", [], |r| r.get(0))?)
      })
      .await?;
    Ok(n as u64)
  }
}

// ─── BucketArchive impl ──────────────────────────────────────────────────────

impl BucketArchive for SqliteStore {
  type Error = crate::Error;

  async fn store(&self, buckets: Vec<Bucket>) -> Result<()> {
    let raws: Vec<RawBucket> = buckets.iter().map(RawBucket::from_bucket).collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO buckets (
               station_id, metric, granularity, bucket_start, bucket_end,
               count, sum, min, max, last, last_at, sealed
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
          )?;
          for raw in &raws {
            stmt.execute(rusqlite::params![
              raw.station_id,
              raw.metric,
              raw.granularity,
              raw.bucket_start,
              raw.bucket_end,
              raw.count,
              raw.sum,
              raw.min,
              raw.max,
              raw.last,
              raw.last_at,
              raw.sealed,
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn load_all(&self) -> Result<Vec<Bucket>> {
    let raws: Vec<RawBucket> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT station_id, metric, granularity, bucket_start, bucket_end,
                  count, sum, min, max, last, last_at, sealed
           FROM buckets
           ORDER BY station_id, metric, granularity, bucket_start",
        )?;
        let rows = stmt
          .query_map([], RawBucket::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawBucket::into_bucket).collect()
  }

  async fn prune(&self, granularity: Granularity, cutoff: DateTime<Utc>) -> Result<u64> {
    let g = encode_granularity(granularity);
    // Bucket ends are whole seconds, so `end < cutoff` is `end < ceil(cutoff)`.
    let cutoff = cutoff.timestamp() + i64::from(cutoff.timestamp_subsec_nanos() > 0);

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM buckets WHERE granularity = ?1 AND bucket_end < ?2",
          rusqlite::params![g, cutoff],
        )?)
      })
      .await?;
    Ok(removed as u64)
  }
}
