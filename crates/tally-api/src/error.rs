//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use tally_core::executor::ExecutionErrorKind;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Pipeline(#[from] tally_core::Error),

  #[error("store error: {0}")]
  Store(#[from] tally_store_sqlite::Error),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    use tally_core::Error as E;

    match self {
      Self::BadRequest(_) => StatusCode::BAD_REQUEST,
      Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
      Self::Pipeline(e) => match e {
        E::EmptyInput => StatusCode::BAD_REQUEST,
        E::Flagged(_) | E::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        E::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        E::Service(_) => StatusCode::SERVICE_UNAVAILABLE,
        E::Execution(x) => match x.kind {
          ExecutionErrorKind::Busy => StatusCode::SERVICE_UNAVAILABLE,
          ExecutionErrorKind::Constraint | ExecutionErrorKind::Malformed => {
            StatusCode::UNPROCESSABLE_ENTITY
          }
          ExecutionErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        },
      },
    }
  }

  pub fn kind(&self) -> &'static str {
    match self {
      Self::BadRequest(_) => "bad_request",
      Self::Store(_) => "store",
      Self::Pipeline(e) => e.kind(),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let (retryable, retry_after) = match &self {
      Self::Pipeline(e) => (e.is_retryable(), e.retry_after()),
      Self::BadRequest(_) | Self::Store(_) => (false, None),
    };
    // Whole seconds, rounded up.
    let retry_after_secs =
      retry_after.map(|d| (d.as_secs() + u64::from(d.subsec_nanos() > 0)).max(1));

    let body = Json(json!({
      "error": {
        "kind":             self.kind(),
        "message":          self.to_string(),
        "retryable":        retryable,
        "retry_after_secs": retry_after_secs,
      }
    }));

    let mut response = (status, body).into_response();
    if let Some(secs) = retry_after_secs {
      response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(secs));
    }
    response
  }
}
