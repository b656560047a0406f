//! The rate-limiting checkpoint.
//!
//! The pipeline consults a [`RateLimiter`] after the prompt is built and
//! before the completion service is called, so denied callers never consume
//! model quota. The limiting algorithm itself lives with the implementation.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

/// Who is asking; the unit rate limits apply to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerId(String);

impl CallerId {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CallerId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
  Allow,
  Deny { retry_after: Option<Duration> },
}

pub trait RateLimiter: Send + Sync {
  /// Record one attempt by `caller` and decide whether it may proceed.
  fn check(&self, caller: &CallerId) -> RateDecision;
}

/// Allows everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlimited;

impl RateLimiter for Unlimited {
  fn check(&self, _caller: &CallerId) -> RateDecision { RateDecision::Allow }
}

impl<L: RateLimiter + ?Sized> RateLimiter for std::sync::Arc<L> {
  fn check(&self, caller: &CallerId) -> RateDecision { (**self).check(caller) }
}
