//! JSON REST API for rivmon.
//!
//! Exposes an axum [`Router`] backed by a [`Telemetry`] service over any
//! [`BucketArchive`]. TLS and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = rivmon_api::api_router(telemetry.clone());
//! ```

pub mod error;
pub mod ingest;
pub mod query;
pub mod stations;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use rivmon_core::archive::BucketArchive;
use rivmon_engine::Telemetry;

pub use error::ApiError;

/// Build a fully-materialised API router for `telemetry`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<A>(telemetry: Arc<Telemetry<A>>) -> Router<()>
where
  A: BucketArchive + 'static,
{
  Router::new()
    .route("/ingest", post(ingest::handler::<A>))
    .route("/query", get(query::handler::<A>))
    .route("/stations", get(stations::list::<A>))
    .route("/stations/{id}", get(stations::get_one::<A>))
    .with_state(telemetry)
}
