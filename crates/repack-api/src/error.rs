//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use repack_core::{ingest::IngestError, submission::ValidationError};
use serde_json::json;
use thiserror::Error;

/// Message returned when a submitted site fails the reachability probe.
pub const UNREACHABLE_MESSAGE: &str = "We were unable to reach your site.";

/// Message returned when a submission is accepted.
pub const ACCEPTED_MESSAGE: &str = "Data submitted successfully.";

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Invalid(#[from] ValidationError),

  #[error("site is not reachable")]
  Unreachable,

  #[error("unauthorized")]
  Unauthorized,

  #[error("not found: {0}")]
  NotFound(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Invalid(_) | ApiError::Unreachable => StatusCode::FORBIDDEN,
      ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  /// Human-readable message shown to submitters.
  pub fn message(&self) -> String {
    match self {
      ApiError::Invalid(e) => e.message(),
      ApiError::Unreachable => UNREACHABLE_MESSAGE.to_owned(),
      ApiError::Store(_) => "Unable to store the submission.".to_owned(),
      other => other.to_string(),
    }
  }
}

impl<E> From<IngestError<E>> for ApiError
where
  E: std::error::Error + Send + Sync + 'static,
{
  fn from(e: IngestError<E>) -> Self {
    match e {
      IngestError::Invalid(v) => ApiError::Invalid(v),
      IngestError::Unreachable(_) => ApiError::Unreachable,
      IngestError::Store(e) => ApiError::store(e),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    match self {
      ApiError::Invalid(ref e) => (
        status,
        Json(json!({
          "code": "invalid_request",
          "message": e.message(),
          "data": {
            "status": status.as_u16(),
            "missing": e.missing,
            "malformed": e.malformed,
          },
        })),
      )
        .into_response(),
      ApiError::Unreachable => {
        (status, Json(json!({ "message": UNREACHABLE_MESSAGE }))).into_response()
      }
      ApiError::Unauthorized => {
        let mut res = (status, Json(json!({ "error": "unauthorized" })))
          .into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"repack\""),
        );
        res
      }
      other => {
        (status, Json(json!({ "error": other.to_string() }))).into_response()
      }
    }
  }
}
