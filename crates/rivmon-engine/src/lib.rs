//! The in-memory telemetry engine: station registry, ingest buffer, rollup
//! engine, retention manager and query service.
//!
//! Everything here is generic over a [`rivmon_core::archive::BucketArchive`]
//! backend, which only ever sees sealed buckets.

pub mod ingest;
pub mod query;
pub mod registry;
pub mod retention;
pub mod rollup;
pub mod service;
pub mod tasks;

pub use ingest::{IngestBuffer, PairKey};
pub use registry::StationRegistry;
pub use retention::PruneReport;
pub use rollup::{RollupEngine, SeriesKey};
pub use service::{RollupReport, Telemetry};
