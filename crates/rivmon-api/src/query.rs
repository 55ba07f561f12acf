//! Handler for `GET /query`.
//!
//! `?stationId=&metric=&granularity=&start=&end=` with RFC 3339 timestamps.
//! The range is half-open. A malformed parameter or bad range is `400`, an
//! over-cap result `413`.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State, rejection::QueryRejection},
};
use rivmon_core::{
  archive::BucketArchive,
  query::{QueryRequest, QueryResult},
};
use rivmon_engine::Telemetry;

use crate::error::ApiError;

/// `GET /query`
pub async fn handler<A>(
  State(telemetry): State<Arc<Telemetry<A>>>,
  params: Result<Query<QueryRequest>, QueryRejection>,
) -> Result<Json<QueryResult>, ApiError>
where
  A: BucketArchive + 'static,
{
  let Query(request) = params?;
  Ok(Json(telemetry.query(&request)?))
}
