//! The executor boundary: runs one [`ApprovedStatement`] against the store.
//!
//! Only the guard can construct an `ApprovedStatement`, so implementations
//! never see text that skipped validation.

use std::{fmt, future::Future};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::guard::ApprovedStatement;

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// One value in a result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
  Null,
  Integer(i64),
  Real(f64),
  Text(String),
}

impl fmt::Display for Cell {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Null => f.write_str("NULL"),
      Self::Integer(i) => write!(f, "{i}"),
      Self::Real(r) => write!(f, "{r}"),
      Self::Text(s) => f.write_str(s),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
  Inserted {
    affected: u64,
    /// Row id assigned by the store.
    id:       i64,
  },
  Selected {
    columns: Vec<String>,
    rows:    Vec<Vec<Cell>>,
  },
}

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionErrorKind {
  /// The database was locked by another writer.
  Busy,
  /// A NOT NULL, type or uniqueness constraint failed.
  Constraint,
  /// The engine refused the statement text, or it did not behave like the
  /// kind it was approved as.
  Malformed,
  Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?}: {message}")]
pub struct ExecutionError {
  pub kind:    ExecutionErrorKind,
  pub message: String,
}

impl ExecutionError {
  pub fn new(kind: ExecutionErrorKind, message: impl Into<String>) -> Self {
    Self { kind, message: message.into() }
  }

  /// Lock contention clears on its own; nothing else does.
  pub fn is_retryable(&self) -> bool { self.kind == ExecutionErrorKind::Busy }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Runs approved statements, each in its own transaction.
pub trait StatementExecutor: Send + Sync {
  /// Execute the approved text verbatim. An INSERT must affect exactly one
  /// row or it is rolled back and reported.
  fn execute<'a>(
    &'a self,
    statement: &'a ApprovedStatement,
  ) -> impl Future<Output = Result<ExecutionOutcome, ExecutionError>> + Send + 'a;
}
