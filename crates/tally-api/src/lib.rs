//! JSON HTTP API for Tally.
//!
//! Exposes an axum [`Router`] over a [`Pipeline`] whose executor is a
//! [`SqliteStore`]. TLS and authentication are the caller's responsibility.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/` | Health check |
//! | `POST` | `/query` | Body: `{"question":"I spent 250 on groceries"}` |
//! | `GET`  | `/analytics` | Spending per category, largest first |
//! | `GET`  | `/recent` | The five most recent expenses |

pub mod caller;
pub mod dashboard;
pub mod error;
pub mod query;

use std::sync::Arc;

use axum::{
  Json, Router,
  routing::{get, post},
};
use serde_json::{Value, json};
use tally_core::{completion::CompletionClient, limiter::RateLimiter, pipeline::Pipeline};
use tally_store_sqlite::SqliteStore;

pub use caller::Caller;
pub use error::ApiError;

/// The pipeline, shared across requests.
pub type SharedPipeline<C, L> = Arc<Pipeline<C, L, SqliteStore>>;

/// Settings that change how requests are interpreted.
#[derive(Debug, Clone, Default)]
pub struct ApiConfig {
  /// Take caller identity from `x-caller-id` / `x-forwarded-for`. Only
  /// safe behind a proxy that overwrites both headers.
  pub trust_forwarded_headers: bool,
}

/// Router state.
pub struct AppState<C, L> {
  pub pipeline: SharedPipeline<C, L>,
  pub config:   Arc<ApiConfig>,
}

impl<C, L> AppState<C, L> {
  pub fn new(pipeline: SharedPipeline<C, L>, config: ApiConfig) -> Self {
    Self { pipeline, config: Arc::new(config) }
  }
}

impl<C, L> Clone for AppState<C, L> {
  fn clone(&self) -> Self {
    Self { pipeline: Arc::clone(&self.pipeline), config: Arc::clone(&self.config) }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router around `state`.
pub fn api_router<C, L>(state: AppState<C, L>) -> Router<()>
where
  C: CompletionClient + 'static,
  L: RateLimiter + 'static,
{
  Router::new()
    .route("/", get(health))
    .route("/query", post(query::handler::<C, L>))
    .route("/analytics", get(dashboard::analytics::<C, L>))
    .route("/recent", get(dashboard::recent::<C, L>))
    .with_state(state)
}

/// `GET /`
async fn health() -> Json<Value> {
  Json(json!({ "status": "ok", "service": "tally" }))
}
