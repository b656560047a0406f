//! Caller identity for rate limiting.

use std::{convert::Infallible, net::SocketAddr};

use axum::{
  extract::{ConnectInfo, FromRequestParts},
  http::request::Parts,
};
use tally_core::limiter::CallerId;

use crate::AppState;

/// Explicit caller header, checked first when forwarded headers are trusted.
pub const CALLER_HEADER: &str = "x-caller-id";

/// Who sent the request.
///
/// By default this is the peer address of the connection. With
/// [`ApiConfig::trust_forwarded_headers`](crate::ApiConfig) set,
/// `x-caller-id` and then the first `x-forwarded-for` hop take precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub CallerId);

impl<C, L> FromRequestParts<AppState<C, L>> for Caller
where
  C: Send + Sync,
  L: Send + Sync,
{
  type Rejection = Infallible;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<C, L>,
  ) -> Result<Self, Self::Rejection> {
    let header = |name: &str| {
      parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    };

    let forwarded = if state.config.trust_forwarded_headers {
      header(CALLER_HEADER)
        .or_else(|| header("x-forwarded-for").and_then(|v| v.split(',').next()).map(str::trim))
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
    } else {
      None
    };

    let id = forwarded
      .or_else(|| {
        parts
          .extensions
          .get::<ConnectInfo<SocketAddr>>()
          .map(|ConnectInfo(addr)| addr.ip().to_string())
      })
      .unwrap_or_else(|| "anonymous".to_owned());

    Ok(Caller(CallerId::new(id)))
  }
}
