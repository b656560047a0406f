//! The translation pipeline: screening, prompt, rate limit, completion,
//! guard, execution and presentation, in that order.

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
  Error, Result,
  completion::CompletionClient,
  executor::StatementExecutor,
  guard::{ApprovedStatement, Guard, Verdict},
  limiter::{CallerId, RateDecision, RateLimiter},
  present::{Presented, present},
  prompt::build_prompt,
  screen::InputScreen,
};

/// Alias used at the API boundary.
pub type PipelineError = Error;

/// One submission: raw user text plus who sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
  pub text:   String,
  pub caller: CallerId,
}

impl TranslationRequest {
  pub fn new(text: impl Into<String>, caller: CallerId) -> Self {
    Self { text: text.into(), caller }
  }
}

/// The statement that ran and what it produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Translation {
  pub statement: ApprovedStatement,
  pub result:    Presented,
}

/// Composes the stages around three injected capabilities. Holds no mutable
/// state of its own; concurrent `run` calls are independent.
pub struct Pipeline<C, L, E> {
  completion: C,
  limiter:    L,
  executor:   E,
  guard:      Guard,
  screen:     InputScreen,
}

impl<C, L, E> Pipeline<C, L, E>
where
  C: CompletionClient,
  L: RateLimiter,
  E: StatementExecutor,
{
  /// A pipeline with the default guard policy and misuse screen.
  pub fn new(completion: C, limiter: L, executor: E) -> Self {
    Self {
      completion,
      limiter,
      executor,
      guard: Guard::default(),
      screen: InputScreen::default(),
    }
  }

  pub fn with_guard(mut self, guard: Guard) -> Self {
    self.guard = guard;
    self
  }

  pub fn with_screen(mut self, screen: InputScreen) -> Self {
    self.screen = screen;
    self
  }

  /// The executor, for read-only queries outside the pipeline.
  pub fn store(&self) -> &E { &self.executor }

  pub fn guard(&self) -> &Guard { &self.guard }

  /// Translate and execute one request. `today` anchors relative dates.
  pub async fn run(
    &self,
    request: &TranslationRequest,
    today: NaiveDate,
  ) -> Result<Translation> {
    let caller = &request.caller;
    if request.text.trim().is_empty() {
      return Err(Error::EmptyInput);
    }

    if let Some(word) = self.screen.flagged_word(&request.text) {
      tracing::warn!(%caller, word, "input flagged");
      return Err(Error::Flagged(word.to_owned()));
    }

    let prompt = build_prompt(&request.text, today)?;

    if let RateDecision::Deny { retry_after } = self.limiter.check(caller) {
      tracing::warn!(%caller, ?retry_after, "rate limited");
      return Err(Error::RateLimited { retry_after });
    }

    let completion = self
      .completion
      .complete(prompt.as_str())
      .await
      .inspect_err(|e| tracing::error!(%caller, error = %e, "completion failed"))?;

    let candidate = self.guard.candidate(completion);
    let statement = match candidate.verdict {
      Verdict::Approved(statement) => statement,
      Verdict::Rejected(rejection) => {
        tracing::warn!(
          %caller,
          rule = %rejection.rule,
          raw = %candidate.raw,
          "statement rejected: {}",
          rejection.detail
        );
        return Err(rejection.into());
      }
    };
    tracing::info!(%caller, kind = ?statement.kind(), sql = statement.text(), "statement approved");

    let outcome = self
      .executor
      .execute(&statement)
      .await
      .inspect_err(|e| tracing::error!(%caller, error = %e, "execution failed"))?;

    let result = present(outcome);
    tracing::info!(%caller, "{}", result.message());
    Ok(Translation { statement, result })
  }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::{
      Mutex,
      atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
  };

  use super::*;
  use crate::{
    completion::ServiceError,
    executor::{Cell, ExecutionError, ExecutionErrorKind, ExecutionOutcome},
    guard::{GuardRule, StatementKind},
    limiter::Unlimited,
  };

  // ─── Fakes ─────────────────────────────────────────────────────────────────

  struct Canned {
    reply:  Result<String, ServiceError>,
    calls:  AtomicUsize,
    prompt: Mutex<Option<String>>,
  }

  impl Canned {
    fn replying(sql: &str) -> Self {
      Self { reply: Ok(sql.to_owned()), calls: AtomicUsize::new(0), prompt: Mutex::new(None) }
    }

    fn failing(error: ServiceError) -> Self {
      Self { reply: Err(error), calls: AtomicUsize::new(0), prompt: Mutex::new(None) }
    }
  }

  impl CompletionClient for Canned {
    async fn complete<'a>(&'a self, prompt: &'a str) -> Result<String, ServiceError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      *self.prompt.lock().unwrap() = Some(prompt.to_owned());
      self.reply.clone()
    }
  }

  struct DenyAll;

  impl RateLimiter for DenyAll {
    fn check(&self, _caller: &CallerId) -> RateDecision {
      RateDecision::Deny { retry_after: Some(Duration::from_secs(42)) }
    }
  }

  /// Records what it was asked to run and answers with a fixed outcome.
  struct Recorder {
    outcome:  Result<ExecutionOutcome, ExecutionError>,
    executed: Mutex<Vec<String>>,
  }

  impl Recorder {
    fn inserting(id: i64) -> Self {
      Self {
        outcome:  Ok(ExecutionOutcome::Inserted { affected: 1, id }),
        executed: Mutex::new(Vec::new()),
      }
    }

    fn count(&self) -> usize { self.executed.lock().unwrap().len() }
  }

  impl StatementExecutor for Recorder {
    async fn execute<'a>(
      &'a self,
      statement: &'a ApprovedStatement,
    ) -> Result<ExecutionOutcome, ExecutionError> {
      self.executed.lock().unwrap().push(statement.text().to_owned());
      self.outcome.clone()
    }
  }

  fn today() -> NaiveDate { NaiveDate::from_ymd_opt(2025, 10, 22).unwrap() }

  fn request(text: &str) -> TranslationRequest {
    TranslationRequest::new(text, CallerId::new("tester"))
  }

  const GROCERIES: &str = "INSERT INTO Finance (purchased, categorization, amount, date, payment_type) VALUES ('groceries', 'Food', 250.0, '2025-10-21', 'UPI')";

  // ─── Scenarios ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn groceries_yesterday_is_inserted() {
    let pipeline = Pipeline::new(
      Canned::replying(&format!("```sql\n{GROCERIES};\n```")),
      Unlimited,
      Recorder::inserting(1),
    );

    let translation = pipeline
      .run(&request("I spent 250 on groceries yesterday using UPI"), today())
      .await
      .unwrap();

    assert_eq!(translation.statement.kind(), StatementKind::Insert);
    assert_eq!(translation.statement.text(), GROCERIES);
    assert_eq!(translation.result, Presented::Insert { affected: 1, id: 1 });
    assert_eq!(*pipeline.store().executed.lock().unwrap(), [GROCERIES]);

    let prompt = pipeline.completion.prompt.lock().unwrap().clone().unwrap();
    assert!(prompt.contains("yesterday is 2025-10-21"));
    assert!(prompt.contains("I spent 250 on groceries yesterday using UPI"));
  }

  #[tokio::test]
  async fn drop_table_is_rejected_before_execution() {
    let pipeline =
      Pipeline::new(Canned::replying("DROP TABLE Finance;"), Unlimited, Recorder::inserting(1));

    let err = pipeline.run(&request("delete everything"), today()).await.unwrap_err();

    assert!(matches!(err, Error::Rejected(ref r) if r.rule == GuardRule::KindNotAllowed));
    assert!(!err.is_retryable());
    assert_eq!(pipeline.store().count(), 0);
  }

  #[tokio::test]
  async fn stacked_statements_are_rejected() {
    let pipeline = Pipeline::new(
      Canned::replying("SELECT * FROM Finance; SELECT * FROM sqlite_master;"),
      Unlimited,
      Recorder::inserting(1),
    );

    let err = pipeline.run(&request("show everything"), today()).await.unwrap_err();

    assert!(matches!(err, Error::Rejected(ref r) if r.rule == GuardRule::MultipleStatements));
    assert_eq!(pipeline.store().count(), 0);
  }

  #[tokio::test]
  async fn rate_limit_is_checked_before_completion() {
    let pipeline = Pipeline::new(Canned::replying(GROCERIES), DenyAll, Recorder::inserting(1));

    let err = pipeline.run(&request("coffee 4"), today()).await.unwrap_err();

    assert!(matches!(err, Error::RateLimited { .. }));
    assert_eq!(err.retry_after(), Some(Duration::from_secs(42)));
    assert!(err.is_retryable());
    assert_eq!(pipeline.completion.calls.load(Ordering::SeqCst), 0);
    assert_eq!(pipeline.store().count(), 0);
  }

  // ─── Early exits ───────────────────────────────────────────────────────────

  #[tokio::test]
  async fn blank_input_never_reaches_the_model() {
    let pipeline = Pipeline::new(Canned::replying(GROCERIES), Unlimited, Recorder::inserting(1));

    let err = pipeline.run(&request("   "), today()).await.unwrap_err();

    assert!(matches!(err, Error::EmptyInput));
    assert_eq!(pipeline.completion.calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn flagged_input_never_reaches_the_model() {
    let pipeline = Pipeline::new(Canned::replying(GROCERIES), Unlimited, Recorder::inserting(1));

    let err = pipeline.run(&request("how to hack the bank"), today()).await.unwrap_err();

    assert!(matches!(err, Error::Flagged(ref w) if w == "hack"));
    assert_eq!(pipeline.completion.calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn custom_screen_replaces_the_default() {
    let pipeline = Pipeline::new(Canned::replying(GROCERIES), Unlimited, Recorder::inserting(3))
      .with_screen(InputScreen::new(["casino"]));

    assert!(pipeline.run(&request("casino night 40"), today()).await.is_err());
    assert!(pipeline.run(&request("hack day lunch 40"), today()).await.is_ok());
  }

  // ─── Failures from collaborators ───────────────────────────────────────────

  #[tokio::test]
  async fn service_errors_surface_unchanged() {
    let pipeline = Pipeline::new(
      Canned::failing(ServiceError::QuotaExhausted),
      Unlimited,
      Recorder::inserting(1),
    );

    let err = pipeline.run(&request("taxi 30"), today()).await.unwrap_err();

    assert!(matches!(err, Error::Service(ServiceError::QuotaExhausted)));
    assert!(err.is_retryable());
    assert_eq!(pipeline.store().count(), 0);
  }

  #[tokio::test]
  async fn busy_store_is_retryable_but_constraint_is_not() {
    for (kind, retryable) in [
      (ExecutionErrorKind::Busy, true),
      (ExecutionErrorKind::Constraint, false),
    ] {
      let executor = Recorder {
        outcome:  Err(ExecutionError::new(kind, "nope")),
        executed: Mutex::new(Vec::new()),
      };
      let pipeline = Pipeline::new(Canned::replying(GROCERIES), Unlimited, executor);

      let err = pipeline.run(&request("groceries 250"), today()).await.unwrap_err();

      assert_eq!(err.kind(), "execution");
      assert_eq!(err.is_retryable(), retryable);
    }
  }

  #[tokio::test]
  async fn select_results_are_presented_in_order() {
    let executor = Recorder {
      outcome:  Ok(ExecutionOutcome::Selected {
        columns: vec!["purchased".into(), "amount".into()],
        rows:    vec![
          vec![Cell::Text("tea".into()), Cell::Real(3.0)],
          vec![Cell::Text("bus".into()), Cell::Real(2.0)],
        ],
      }),
      executed: Mutex::new(Vec::new()),
    };
    let pipeline = Pipeline::new(
      Canned::replying("SELECT purchased, amount FROM Finance ORDER BY id DESC"),
      Unlimited,
      executor,
    );

    let translation = pipeline.run(&request("what did I buy"), today()).await.unwrap();

    assert_eq!(translation.statement.kind(), StatementKind::Select);
    assert_eq!(translation.result.message(), "Found 2 records.");
  }
}
