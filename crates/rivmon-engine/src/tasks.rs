//! Background sweeps. Each runs on its own timer, logs failures and tries
//! again on the next tick; neither ever takes the service down.

use std::{sync::Arc, time::Duration};

use rivmon_core::archive::BucketArchive;
use tokio::{
  task::JoinHandle,
  time::{MissedTickBehavior, interval},
};

use crate::service::Telemetry;

/// Spawn the rollup consumer. It sweeps every `every`, and sooner when an
/// ingest signals new work.
pub fn spawn_rollup<A>(telemetry: Arc<Telemetry<A>>, every: Duration) -> JoinHandle<()>
where
  A: BucketArchive + 'static,
{
  tokio::spawn(async move {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
      tokio::select! {
        _ = ticker.tick() => {}
        _ = telemetry.rollup_wanted().notified() => {}
      }
      match telemetry.run_rollup().await {
        Ok(report) if report == Default::default() => {}
        Ok(report) => tracing::debug!(
          folded = report.folded,
          sealed = report.sealed,
          archived = report.archived,
          "rollup sweep complete"
        ),
        Err(e) => tracing::warn!(error = %e, "rollup sweep failed; retrying next tick"),
      }
    }
  })
}

/// Spawn the retention sweep, running every `every`.
pub fn spawn_retention<A>(
  telemetry: Arc<Telemetry<A>>,
  every: Duration,
) -> JoinHandle<()>
where
  A: BucketArchive + 'static,
{
  tokio::spawn(async move {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
      ticker.tick().await;
      match telemetry.prune_now().await {
        Ok(report) => {
          if report.deferred > 0 {
            tracing::warn!(
              deferred = report.deferred,
              "retention deferred busy data to next cycle"
            );
          }
          tracing::debug!(
            readings = report.readings_removed,
            buckets = report.buckets_removed,
            archived = report.archived_removed,
            "retention sweep complete"
          );
        }
        Err(e) => {
          tracing::warn!(error = %e, "retention sweep failed; retrying next tick")
        }
      }
    }
  })
}
