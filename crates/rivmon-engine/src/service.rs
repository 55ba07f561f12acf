//! [`Telemetry`], the assembled service: registry, ingest buffer, rollup
//! engine and archive behind one handle.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rivmon_core::{
  Result,
  archive::BucketArchive,
  clock::Clock,
  policy::{Limits, RetentionPolicy},
  reading::{IngestReceipt, NewReading},
};
use tokio::sync::Notify;

use crate::{
  ingest::{IngestBuffer, PairKey},
  registry::StationRegistry,
  rollup::RollupEngine,
};

/// Counts from one rollup sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollupReport {
  /// Readings folded into buckets.
  pub folded:   usize,
  /// Buckets sealed during this sweep.
  pub sealed:   usize,
  /// Sealed buckets written to the archive.
  pub archived: usize,
}

/// The telemetry service.
///
/// Ingest and query are synchronous and short: they touch only the locks of
/// the pair or series involved. Rollup and retention run as sweeps, usually
/// from the background tasks in [`crate::tasks`].
pub struct Telemetry<A: BucketArchive> {
  pub(crate) registry: Arc<StationRegistry>,
  pub(crate) buffer:   IngestBuffer,
  pub(crate) rollups:  RollupEngine,
  pub(crate) archive:  Arc<A>,
  pub(crate) clock:    Arc<dyn Clock>,
  pub(crate) limits:   Limits,
  pub(crate) policy:   RetentionPolicy,
  /// Serialises rollup consumers so each pair's cursor has a single owner.
  fold_lock:           Mutex<()>,
  wake_rollup:         Notify,
}

impl<A: BucketArchive> Telemetry<A> {
  pub fn new(
    registry: StationRegistry,
    archive: Arc<A>,
    clock: Arc<dyn Clock>,
    limits: Limits,
    policy: RetentionPolicy,
  ) -> Self {
    let registry = Arc::new(registry);
    Self {
      buffer: IngestBuffer::new(registry.clone()),
      registry,
      rollups: RollupEngine::new(),
      archive,
      clock,
      limits,
      policy,
      fold_lock: Mutex::new(()),
      wake_rollup: Notify::new(),
    }
  }

  pub fn registry(&self) -> &StationRegistry { &self.registry }

  pub fn buffer(&self) -> &IngestBuffer { &self.buffer }

  pub fn rollups(&self) -> &RollupEngine { &self.rollups }

  pub fn limits(&self) -> &Limits { &self.limits }

  pub fn policy(&self) -> &RetentionPolicy { &self.policy }

  pub fn clock(&self) -> &dyn Clock { self.clock.as_ref() }

  /// Resolves when an ingest has queued work for the rollup consumer.
  pub(crate) fn rollup_wanted(&self) -> &Notify { &self.wake_rollup }

  // ── Ingest ────────────────────────────────────────────────────────────────

  /// Validate and append a reading, then wake the rollup consumer.
  pub fn ingest(&self, reading: NewReading) -> Result<IngestReceipt> {
    let late_before = || self.clock.now() - self.limits.lateness_tolerance;
    match self.buffer.ingest(&reading, late_before) {
      Ok(receipt) => {
        self.wake_rollup.notify_one();
        Ok(receipt)
      }
      Err(e) => {
        tracing::debug!(
          station_id = %reading.station_id,
          metric = %reading.metric,
          error = %e,
          "reading rejected"
        );
        Err(e)
      }
    }
  }

  // ── Rollup ────────────────────────────────────────────────────────────────

  /// Fold every accepted-but-unrolled reading into its buckets. Returns the
  /// number of readings folded.
  pub fn fold_pending(&self) -> usize {
    let _consumer = self.fold_lock.lock();
    let mut folded = 0;

    for (pair, log) in self.buffer.logs() {
      let batch = log.lock().unrolled();
      let Some(last) = batch.last() else {
        continue;
      };
      for reading in &batch {
        self.rollups.apply(&pair, reading);
      }
      log.lock().mark_rolled(last.sequence + 1);
      folded += batch.len();
    }
    folded
  }

  /// One full rollup sweep: fold pending readings, seal elapsed buckets and
  /// archive any sealed bucket the archive has not yet accepted.
  ///
  /// An archive failure leaves the buckets marked unarchived; the next sweep
  /// retries them.
  pub async fn run_rollup(&self) -> Result<RollupReport, A::Error> {
    // Read before folding. Any reading appended after its log was folded
    // passed a lateness check at a later clock reading, so it cannot belong
    // to a bucket sealed at `now`.
    let now = self.clock.now();
    let folded = self.fold_pending();
    self.seal_and_archive(now, folded).await
  }

  /// The second half of [`Self::run_rollup`]. `now` must have been read
  /// before the fold that produced `folded`.
  pub(crate) async fn seal_and_archive(
    &self,
    now: DateTime<Utc>,
    folded: usize,
  ) -> Result<RollupReport, A::Error> {
    let (sealed, unarchived) =
      self.rollups.seal_elapsed(now, self.limits.lateness_tolerance);

    let mut report = RollupReport {
      folded,
      sealed,
      archived: 0,
    };
    if !unarchived.is_empty() {
      self.archive.store(unarchived.clone()).await?;
      self.rollups.mark_archived(&unarchived);
      report.archived = unarchived.len();
    }
    Ok(report)
  }

  /// Write every open bucket to the archive so a restart resumes it rather
  /// than starting the period over. Open buckets stay unarchived in memory;
  /// once sealed, the next sweep replaces the archived copy.
  pub async fn checkpoint(&self) -> Result<usize, A::Error> {
    let open = self.rollups.open_buckets();
    let count = open.len();
    if count > 0 {
      self.archive.store(open).await?;
    }
    Ok(count)
  }

  // ── Startup ───────────────────────────────────────────────────────────────

  /// Load archived buckets into memory and restore each pair's ordering
  /// watermark from them. Checkpointed open buckets come back open.
  /// Returns the number of buckets installed.
  pub async fn hydrate(&self) -> Result<usize, A::Error> {
    let buckets = self.archive.load_all().await?;
    for bucket in &buckets {
      self.buffer.restore_watermark(
        PairKey::new(&bucket.station_id, &bucket.metric),
        bucket.last_at,
      );
    }
    let installed = self.rollups.hydrate(buckets);
    tracing::info!(buckets = installed, "rehydrated buckets from archive");
    Ok(installed)
  }
}
