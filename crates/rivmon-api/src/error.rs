//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::{JsonRejection, QueryRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use rivmon_core::Error;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("too large: {0}")]
  TooLarge(String),

  #[error("internal error: {0}")]
  Internal(String),
}

impl ApiError {
  fn status(&self) -> StatusCode {
    match self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
      ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn message(&self) -> &str {
    match self {
      ApiError::NotFound(m)
      | ApiError::BadRequest(m)
      | ApiError::Conflict(m)
      | ApiError::TooLarge(m)
      | ApiError::Internal(m) => m.as_str(),
    }
  }
}

impl From<Error> for ApiError {
  fn from(e: Error) -> Self {
    let message = e.to_string();
    match e {
      Error::UnknownStation(_) | Error::InvalidMetric { .. } => {
        ApiError::NotFound(message)
      }
      Error::OutOfOrder { .. } | Error::LateReading { .. } => {
        ApiError::Conflict(message)
      }
      Error::InvalidRange(_) => ApiError::BadRequest(message),
      Error::ResultTooLarge { .. } => ApiError::TooLarge(message),
      Error::DuplicateStation(_)
      | Error::InvalidStation { .. }
      | Error::Serialization(_) => ApiError::Internal(message),
    }
  }
}

impl From<QueryRejection> for ApiError {
  fn from(e: QueryRejection) -> Self { ApiError::BadRequest(e.body_text()) }
}

impl From<JsonRejection> for ApiError {
  fn from(e: JsonRejection) -> Self { ApiError::BadRequest(e.body_text()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    if let ApiError::Internal(m) = &self {
      tracing::error!(error = %m, "request failed");
    }
    (self.status(), Json(json!({ "error": self.message() }))).into_response()
  }
}
