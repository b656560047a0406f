//! Read-only dashboard endpoints. These run fixed queries against the store
//! and never touch the completion service.

use axum::{Json, extract::State};
use serde::Serialize;
use tally_core::{
  completion::CompletionClient,
  limiter::RateLimiter,
  schema::{CategoryTotal, FinanceRecord},
};

use crate::{AppState, error::ApiError};

/// How many records `GET /recent` returns.
pub const RECENT_LIMIT: usize = 5;

#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
  pub status: &'static str,
  pub data:   Vec<T>,
}

impl<T> DataResponse<T> {
  fn success(data: Vec<T>) -> Json<Self> { Json(Self { status: "success", data }) }
}

/// `GET /analytics`
pub async fn analytics<C, L>(
  State(state): State<AppState<C, L>>,
) -> Result<Json<DataResponse<CategoryTotal>>, ApiError>
where
  C: CompletionClient + 'static,
  L: RateLimiter + 'static,
{
  let totals = state.pipeline.store().category_totals().await?;
  Ok(DataResponse::success(totals))
}

/// `GET /recent`
pub async fn recent<C, L>(
  State(state): State<AppState<C, L>>,
) -> Result<Json<DataResponse<FinanceRecord>>, ApiError>
where
  C: CompletionClient + 'static,
  L: RateLimiter + 'static,
{
  let records = state.pipeline.store().recent(RECENT_LIMIT).await?;
  Ok(DataResponse::success(records))
}
