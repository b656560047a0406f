//! Handler for `POST /query`: one line of text through the pipeline.

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use tally_core::{
  completion::CompletionClient,
  limiter::RateLimiter,
  pipeline::TranslationRequest,
  present::Presented,
};
use tracing::Instrument as _;
use uuid::Uuid;

use crate::{AppState, Caller, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct QueryBody {
  pub question: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
  pub message: String,
  /// The statement that was executed.
  pub sql:     String,
  pub result:  Presented,
}

/// `POST /query`: body `{"question":"..."}`
pub async fn handler<C, L>(
  State(state): State<AppState<C, L>>,
  Caller(caller): Caller,
  body: Result<Json<QueryBody>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError>
where
  C: CompletionClient + 'static,
  L: RateLimiter + 'static,
{
  let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
  let request = TranslationRequest::new(body.question, caller);
  let today = chrono::Local::now().date_naive();

  let span = tracing::info_span!("query", request_id = %Uuid::new_v4(), caller = %request.caller);
  let translation = state.pipeline.run(&request, today).instrument(span).await?;

  Ok(Json(QueryResponse {
    message: translation.result.message(),
    sql:     translation.statement.text().to_owned(),
    result:  translation.result,
  }))
}
