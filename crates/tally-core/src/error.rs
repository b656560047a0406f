//! Error types for `tally-core`.

use std::time::Duration;

use thiserror::Error;

use crate::{completion::ServiceError, executor::ExecutionError, guard::Rejection};

/// Every way a single pipeline invocation can fail. None of these is fatal to
/// the process; each is scoped to one request.
#[derive(Debug, Error)]
pub enum Error {
  #[error("input is empty; describe an expense or ask a question")]
  EmptyInput,

  #[error("input flagged as misuse (matched {0:?})")]
  Flagged(String),

  #[error("rate limit exceeded")]
  RateLimited { retry_after: Option<Duration> },

  #[error("completion service error: {0}")]
  Service(#[from] ServiceError),

  #[error("statement rejected: {0}")]
  Rejected(#[from] Rejection),

  #[error("execution failed: {0}")]
  Execution(#[from] ExecutionError),
}

impl Error {
  /// Stable machine-readable discriminant for API bodies and logs.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::EmptyInput => "empty_input",
      Self::Flagged(_) => "flagged",
      Self::RateLimited { .. } => "rate_limited",
      Self::Service(_) => "service",
      Self::Rejected(_) => "guard_rejection",
      Self::Execution(_) => "execution",
    }
  }

  /// Whether resubmitting the same request later may succeed.
  pub fn is_retryable(&self) -> bool {
    match self {
      Self::RateLimited { .. } | Self::Service(_) => true,
      Self::Execution(e) => e.is_retryable(),
      Self::EmptyInput | Self::Flagged(_) | Self::Rejected(_) => false,
    }
  }

  pub fn retry_after(&self) -> Option<Duration> {
    match self {
      Self::RateLimited { retry_after } => *retry_after,
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
