//! Core types and trait definitions for the river-monitoring telemetry
//! service.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod archive;
pub mod bucket;
pub mod clock;
pub mod error;
pub mod policy;
pub mod query;
pub mod reading;
pub mod station;

pub use error::{Error, Result};
