//! The retention manager: scheduled pruning of raw readings and buckets.

use chrono::{DateTime, Utc};
use rivmon_core::{archive::BucketArchive, bucket::Granularity};

use crate::service::Telemetry;

/// Counts from one retention pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
  pub readings_removed: usize,
  pub buckets_removed:  usize,
  /// Archive rows removed.
  pub archived_removed: u64,
  /// Logs or cells whose lock stayed busy; retried next cycle.
  pub deferred:         usize,
}

impl<A: BucketArchive> Telemetry<A> {
  /// Delete raw readings and buckets that have aged past their granularity's
  /// horizon at `now`. Deletion is irreversible; running it twice with the
  /// same `now` removes nothing the second time.
  ///
  /// Raw readings are only removed once folded into buckets, so a lagging
  /// rollup consumer accumulates data rather than losing it.
  pub async fn prune(&self, now: DateTime<Utc>) -> Result<PruneReport, A::Error> {
    let timeout = self.limits.prune_lock_timeout;
    let mut report = PruneReport::default();

    if let Some(cutoff) = self.policy.cutoff(Granularity::Raw, now) {
      let raw = self.buffer.prune(cutoff, timeout);
      report.readings_removed = raw.removed;
      report.deferred += raw.deferred;
    }

    let buckets = self.rollups.prune(&self.policy, now, timeout);
    report.buckets_removed = buckets.removed;
    report.deferred += buckets.deferred;

    for granularity in Granularity::ROLLUPS {
      if let Some(cutoff) = self.policy.cutoff(granularity, now) {
        report.archived_removed += self.archive.prune(granularity, cutoff).await?;
      }
    }
    Ok(report)
  }

  /// [`Self::prune`] at the service clock's current time.
  pub async fn prune_now(&self) -> Result<PruneReport, A::Error> {
    self.prune(self.clock.now()).await
  }
}
