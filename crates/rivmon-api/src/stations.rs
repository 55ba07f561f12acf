//! Handlers for `/stations` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/stations` | Optional `?type=discharge\|weather\|rain-gauge` |
//! | `GET`  | `/stations/{id}` | 404 if unknown |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State, rejection::QueryRejection},
};
use rivmon_core::{
  archive::BucketArchive,
  station::{Station, StationKind},
};
use rivmon_engine::Telemetry;
use serde::Deserialize;

use crate::error::ApiError;

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(rename = "type")]
  pub kind: Option<StationKind>,
}

/// `GET /stations[?type=<kind>]`
pub async fn list<A>(
  State(telemetry): State<Arc<Telemetry<A>>>,
  params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Station>>, ApiError>
where
  A: BucketArchive + 'static,
{
  let Query(params) = params?;
  Ok(Json(telemetry.registry().list(params.kind)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /stations/{id}`
pub async fn get_one<A>(
  State(telemetry): State<Arc<Telemetry<A>>>,
  Path(id): Path<String>,
) -> Result<Json<Station>, ApiError>
where
  A: BucketArchive + 'static,
{
  Ok(Json(telemetry.registry().lookup(&id)?.clone()))
}
