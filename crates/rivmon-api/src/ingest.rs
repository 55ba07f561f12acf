//! Handler for `POST /ingest`.
//!
//! Body: `{"stationId","metric","timestamp","value","reason"?}`. Responds
//! `201` with the acceptance receipt, `404` for an unknown station or metric,
//! `409` for an out-of-order or late reading.

use std::sync::Arc;

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use rivmon_core::{archive::BucketArchive, reading::NewReading};
use rivmon_engine::Telemetry;

use crate::error::ApiError;

/// `POST /ingest`
pub async fn handler<A>(
  State(telemetry): State<Arc<Telemetry<A>>>,
  body: Result<Json<NewReading>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  A: BucketArchive + 'static,
{
  let Json(reading) = body?;
  let receipt = telemetry.ingest(reading)?;
  Ok((StatusCode::CREATED, Json(receipt)))
}
