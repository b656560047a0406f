//! In-memory fixed-window rate limiting per caller.

use std::{
  collections::HashMap,
  sync::{Mutex, PoisonError},
  time::{Duration, Instant},
};

use tally_core::limiter::{CallerId, RateDecision, RateLimiter, Unlimited};

use crate::settings::RateLimitConfig;

/// Past this many tracked callers, expired windows are dropped on the next
/// check.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct Window {
  started: Instant,
  count:   u32,
}

/// Allows `max_requests` per caller in each window of `window` length,
/// counted from the caller's first request in that window.
#[derive(Debug)]
pub struct FixedWindowLimiter {
  max_requests: u32,
  window:       Duration,
  windows:      Mutex<HashMap<CallerId, Window>>,
}

impl FixedWindowLimiter {
  pub fn new(max_requests: u32, window: Duration) -> Self {
    Self { max_requests, window, windows: Mutex::new(HashMap::new()) }
  }

  fn check_at(&self, caller: &CallerId, now: Instant) -> RateDecision {
    let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

    if windows.len() > PRUNE_THRESHOLD {
      windows.retain(|_, w| now.duration_since(w.started) < self.window);
    }

    let window = windows
      .entry(caller.clone())
      .or_insert(Window { started: now, count: 0 });
    if now.duration_since(window.started) >= self.window {
      *window = Window { started: now, count: 0 };
    }

    if window.count >= self.max_requests {
      let elapsed = now.duration_since(window.started);
      return RateDecision::Deny { retry_after: Some(self.window.saturating_sub(elapsed)) };
    }
    window.count += 1;
    RateDecision::Allow
  }
}

impl RateLimiter for FixedWindowLimiter {
  fn check(&self, caller: &CallerId) -> RateDecision { self.check_at(caller, Instant::now()) }
}

/// The limiter selected by configuration.
#[derive(Debug)]
pub enum ConfiguredLimiter {
  Unlimited(Unlimited),
  FixedWindow(FixedWindowLimiter),
}

impl ConfiguredLimiter {
  pub fn from_config(cfg: &RateLimitConfig) -> Self {
    if cfg.max_requests == 0 {
      Self::Unlimited(Unlimited)
    } else {
      Self::FixedWindow(FixedWindowLimiter::new(
        cfg.max_requests,
        Duration::from_secs(cfg.window_secs),
      ))
    }
  }
}

impl RateLimiter for ConfiguredLimiter {
  fn check(&self, caller: &CallerId) -> RateDecision {
    match self {
      Self::Unlimited(l) => l.check(caller),
      Self::FixedWindow(l) => l.check(caller),
    }
  }
}
