//! The completion-service boundary.
//!
//! Implemented by `tally-server` against a hosted model; tests substitute a
//! canned implementation.

use std::future::Future;

use thiserror::Error;

/// Why the completion service produced no text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
  #[error("completion service is not configured: {0}")]
  NotConfigured(String),

  #[error("completion service unavailable: {0}")]
  Unavailable(String),

  #[error("completion request timed out")]
  Timeout,

  #[error("completion quota exhausted")]
  QuotaExhausted,

  #[error("malformed completion response: {0}")]
  Malformed(String),
}

/// A text-completion service: one prompt in, one completion out.
///
/// Implementations make a single attempt; retry policy, if any, belongs to
/// the caller.
pub trait CompletionClient: Send + Sync {
  fn complete<'a>(
    &'a self,
    prompt: &'a str,
  ) -> impl Future<Output = Result<String, ServiceError>> + Send + 'a;
}
