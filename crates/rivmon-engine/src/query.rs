//! The query service: validated, bounded range reads over the raw log or a
//! rollup series. Queries never mutate state.

use rivmon_core::{
  Error, Result,
  archive::BucketArchive,
  query::{QueryRequest, QueryResult, RawRow, Row},
};

use crate::{ingest::PairKey, rollup::SeriesKey, service::Telemetry};

impl<A: BucketArchive> Telemetry<A> {
  /// Answer a range query.
  ///
  /// Fails with [`Error::UnknownStation`] / [`Error::InvalidMetric`] for bad
  /// targets, [`Error::InvalidRange`] if `start >= end` or the span exceeds
  /// the configured maximum, and [`Error::ResultTooLarge`] if more rows
  /// match than the configured cap.
  pub fn query(&self, request: &QueryRequest) -> Result<QueryResult> {
    self
      .registry
      .check_metric(&request.station_id, &request.metric)?;

    if request.start >= request.end {
      return Err(Error::InvalidRange(format!(
        "start {} is not before end {}",
        request.start, request.end
      )));
    }
    let span = request.end - request.start;
    if span > self.limits.max_query_span {
      return Err(Error::span_too_wide(span, self.limits.max_query_span));
    }

    let pair = PairKey::new(&request.station_id, &request.metric);
    let max_rows = self.limits.max_query_rows;

    let rows = if request.granularity.is_raw() {
      self.raw_rows(&pair, request, max_rows)?
    } else {
      self
        .rollups
        .range(
          &SeriesKey::new(&pair, request.granularity),
          request.start,
          request.end,
          max_rows,
        )?
        .into_iter()
        .map(|bucket| Row::Bucket(bucket.into()))
        .collect()
    };

    Ok(QueryResult {
      station_id: request.station_id.clone(),
      metric: request.metric.clone(),
      granularity: request.granularity,
      rows,
      pending: self.buffer.pending(&pair),
    })
  }

  fn raw_rows(
    &self,
    pair: &PairKey,
    request: &QueryRequest,
    max_rows: usize,
  ) -> Result<Vec<Row>> {
    let Some(log) = self.buffer.log(pair) else {
      return Ok(Vec::new());
    };
    let log = log.lock();
    let matched = log.range(request.start, request.end).count();
    if matched > max_rows {
      return Err(Error::ResultTooLarge {
        rows:  matched,
        limit: max_rows,
      });
    }
    Ok(
      log
        .range(request.start, request.end)
        .map(|reading| Row::Raw(RawRow::from(reading)))
        .collect(),
    )
  }
}
