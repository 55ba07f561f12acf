//! Error type for `rivmon-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time decode error: {0}")]
  DateParse(String),

  #[error("unknown granularity in archive: {0:?}")]
  Granularity(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
